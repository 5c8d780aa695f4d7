//! Rebuild balances tool
//!
//! Admin-only tool that deterministically recomputes every postable account's
//! cached balance from the posted journal, treating the journal as the source
//! of truth. Recovery path for cache drift; same journal always produces the
//! same balances.
//!
//! # Usage
//! ```bash
//! rebuild_balances --tenant TENANT_ID
//! ```

use std::env;

use ledger_rs::db::init_pool;
use ledger_rs::services::balance_service;

/// Parse command-line arguments manually (no external crate needed)
struct Args {
    tenant_id: String,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();

        let mut tenant_id = None;
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--tenant" => {
                    if i + 1 < args.len() {
                        tenant_id = Some(args[i + 1].clone());
                        i += 2;
                    } else {
                        return Err("--tenant requires a value".to_string());
                    }
                }
                _ => return Err(format!("Unknown argument: {}", args[i])),
            }
        }

        Ok(Args {
            tenant_id: tenant_id.ok_or_else(|| {
                format!(
                    "Usage: {} --tenant TENANT_ID",
                    args.first().map(|s| s.as_str()).unwrap_or("rebuild_balances")
                )
            })?,
        })
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = match Args::parse() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };

    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL must be set");
            std::process::exit(2);
        }
    };

    let pool = match init_pool(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(tenant_id = %args.tenant_id, "Rebuilding account balances");

    match balance_service::recalculate_all(&pool, &args.tenant_id).await {
        Ok(updated) => {
            tracing::info!(
                tenant_id = %args.tenant_id,
                accounts = updated,
                "Balance rebuild complete"
            );
            println!("Rebuilt balances for {} accounts", updated);
        }
        Err(e) => {
            tracing::error!(tenant_id = %args.tenant_id, error = %e, "Balance rebuild failed");
            eprintln!("Balance rebuild failed: {}", e);
            std::process::exit(1);
        }
    }
}
