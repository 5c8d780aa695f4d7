use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use ledger_rs::{
    config::Config,
    health::health,
    routes::accounts::{
        create_account, delete_account, get_account_tree, get_balance, recalculate_all,
        recalculate_balance, update_account,
    },
    routes::entries::{get_entry, post_entry, reverse_entry},
    routes::periods::{close_fiscal_year, close_period, generate_periods, list_periods, lock_period},
    routes::reconciliation::{lock_account, unlock_account},
    routes::reports::{get_balance_sheet, get_profit_and_loss, get_trial_balance},
};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting ledger service...");

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        "Configuration loaded: host={}, port={}",
        config.host,
        config.port
    );

    // Database connection
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    sqlx::migrate!("./db/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Build the application router
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/ledger/entries", post(post_entry))
        .route("/api/ledger/entries/{entry_id}", get(get_entry))
        .route("/api/ledger/entries/{entry_id}/reverse", post(reverse_entry))
        .route("/api/accounts", post(create_account))
        .route("/api/accounts/tree", get(get_account_tree))
        .route("/api/accounts/recalculate-all", post(recalculate_all))
        .route("/api/accounts/{code}", put(update_account).delete(delete_account))
        .route("/api/accounts/{code}/balance", get(get_balance))
        .route("/api/accounts/{code}/recalculate", post(recalculate_balance))
        .route("/api/accounts/{code}/reconciliation/lock", post(lock_account))
        .route("/api/accounts/{code}/reconciliation/unlock", post(unlock_account))
        .route("/api/periods", get(list_periods))
        .route("/api/periods/generate", post(generate_periods))
        .route("/api/periods/{fiscal_year}/{period_no}/lock", post(lock_period))
        .route("/api/periods/{fiscal_year}/{period_no}/close", post(close_period))
        .route("/api/fiscal-years/{fiscal_year}/close", post(close_fiscal_year))
        .route("/api/reports/trial-balance", get(get_trial_balance))
        .route("/api/reports/profit-and-loss", get(get_profit_and_loss))
        .route("/api/reports/balance-sheet", get(get_balance_sheet))
        .with_state(Arc::new(pool.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    // Bind to the configured address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Ledger service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    // Start the server
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
