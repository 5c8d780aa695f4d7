//! Financial reporting API routes.
//!
//! Read-only consumers of the ledger: trial balance, profit and loss,
//! balance sheet. Amounts are returned in major units.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repos::account_repo::{AccountType, NormalBalance};
use crate::routes::accounts::parse_opt_date;
use crate::routes::error::ApiError;
use crate::services::report_service::{self, ReportLine};
use crate::validation;

/// Query parameters for trial balance and balance sheet
#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    pub tenant_id: String,
    pub as_of: Option<String>,
}

/// Trial balance row response
#[derive(Debug, Serialize)]
pub struct TrialBalanceRowResponse {
    pub account_code: String,
    pub account_name: String,
    pub account_type: String,
    pub normal_balance: String,
    pub debit: f64,
    pub credit: f64,
}

/// Trial balance response
#[derive(Debug, Serialize)]
pub struct TrialBalanceResponse {
    pub tenant_id: String,
    pub as_of: Option<String>,
    pub rows: Vec<TrialBalanceRowResponse>,
    pub total_debit: f64,
    pub total_credit: f64,
    pub is_balanced: bool,
}

/// Handler for GET /api/reports/trial-balance
pub async fn get_trial_balance(
    State(pool): State<Arc<PgPool>>,
    Query(params): Query<AsOfQuery>,
) -> Result<Json<TrialBalanceResponse>, ApiError> {
    let as_of = parse_opt_date(params.as_of.as_deref())?;

    let report = report_service::trial_balance(&pool, &params.tenant_id, as_of)
        .await
        .map_err(|e| ApiError::new("DATABASE", e.to_string()))?;

    let rows = report
        .rows
        .into_iter()
        .map(|row| TrialBalanceRowResponse {
            account_code: row.account_code,
            account_name: row.account_name,
            account_type: format_account_type(&row.account_type),
            normal_balance: format_normal_balance(&row.normal_balance),
            debit: validation::to_major(row.debit_minor),
            credit: validation::to_major(row.credit_minor),
        })
        .collect();

    Ok(Json(TrialBalanceResponse {
        tenant_id: params.tenant_id,
        as_of: params.as_of,
        rows,
        total_debit: validation::to_major(report.total_debit_minor),
        total_credit: validation::to_major(report.total_credit_minor),
        is_balanced: report.is_balanced,
    }))
}

/// Query parameters for profit and loss
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub tenant_id: String,
    pub from: String,
    pub to: String,
}

/// Report section line response
#[derive(Debug, Serialize)]
pub struct ReportLineResponse {
    pub account_code: String,
    pub account_name: String,
    pub amount: f64,
}

impl From<ReportLine> for ReportLineResponse {
    fn from(line: ReportLine) -> Self {
        ReportLineResponse {
            account_code: line.account_code,
            account_name: line.account_name,
            amount: validation::to_major(line.amount_minor),
        }
    }
}

/// Profit and loss response
#[derive(Debug, Serialize)]
pub struct ProfitAndLossResponse {
    pub tenant_id: String,
    pub from: String,
    pub to: String,
    pub revenue: Vec<ReportLineResponse>,
    pub expenses: Vec<ReportLineResponse>,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_income: f64,
}

/// Handler for GET /api/reports/profit-and-loss
pub async fn get_profit_and_loss(
    State(pool): State<Arc<PgPool>>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<ProfitAndLossResponse>, ApiError> {
    let from = parse_date(&params.from)?;
    let to = parse_date(&params.to)?;

    let report = report_service::profit_and_loss(&pool, &params.tenant_id, from, to)
        .await
        .map_err(|e| ApiError::new("DATABASE", e.to_string()))?;

    Ok(Json(ProfitAndLossResponse {
        tenant_id: params.tenant_id,
        from: params.from,
        to: params.to,
        revenue: report.revenue.into_iter().map(Into::into).collect(),
        expenses: report.expenses.into_iter().map(Into::into).collect(),
        total_revenue: validation::to_major(report.total_revenue_minor),
        total_expenses: validation::to_major(report.total_expense_minor),
        net_income: validation::to_major(report.net_income_minor),
    }))
}

/// Balance sheet response
#[derive(Debug, Serialize)]
pub struct BalanceSheetResponse {
    pub tenant_id: String,
    pub as_of: String,
    pub assets: Vec<ReportLineResponse>,
    pub liabilities: Vec<ReportLineResponse>,
    pub equity: Vec<ReportLineResponse>,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub total_equity: f64,
    pub current_earnings: f64,
    pub is_balanced: bool,
}

/// Handler for GET /api/reports/balance-sheet
pub async fn get_balance_sheet(
    State(pool): State<Arc<PgPool>>,
    Query(params): Query<AsOfQuery>,
) -> Result<Json<BalanceSheetResponse>, ApiError> {
    let as_of = match parse_opt_date(params.as_of.as_deref())? {
        Some(date) => date,
        None => chrono::Utc::now().date_naive(),
    };

    let report = report_service::balance_sheet(&pool, &params.tenant_id, as_of)
        .await
        .map_err(|e| ApiError::new("DATABASE", e.to_string()))?;

    Ok(Json(BalanceSheetResponse {
        tenant_id: params.tenant_id,
        as_of: as_of.to_string(),
        assets: report.assets.into_iter().map(Into::into).collect(),
        liabilities: report.liabilities.into_iter().map(Into::into).collect(),
        equity: report.equity.into_iter().map(Into::into).collect(),
        total_assets: validation::to_major(report.total_assets_minor),
        total_liabilities: validation::to_major(report.total_liabilities_minor),
        total_equity: validation::to_major(report.total_equity_minor),
        current_earnings: validation::to_major(report.current_earnings_minor),
        is_balanced: report.is_balanced,
    }))
}

fn parse_date(value: &str) -> Result<chrono::NaiveDate, ApiError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ApiError::validation(format!("Invalid date {}: {}", value, e)))
}

/// Format AccountType enum for JSON response
fn format_account_type(account_type: &AccountType) -> String {
    match account_type {
        AccountType::Asset => "asset".to_string(),
        AccountType::Liability => "liability".to_string(),
        AccountType::Equity => "equity".to_string(),
        AccountType::Revenue => "revenue".to_string(),
        AccountType::Expense => "expense".to_string(),
    }
}

/// Format NormalBalance enum for JSON response
fn format_normal_balance(normal_balance: &NormalBalance) -> String {
    match normal_balance {
        NormalBalance::Debit => "debit".to_string(),
        NormalBalance::Credit => "credit".to_string(),
    }
}
