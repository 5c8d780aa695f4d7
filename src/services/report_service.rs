//! Financial reporting over the posted journal.
//!
//! Strictly read-only: reports replay journal totals plus chart-of-accounts
//! metadata and never mutate either. The balance sheet checks the accounting
//! equation and logs drift as a data-quality signal instead of failing.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::repos::account_repo::{self, Account, AccountType, NormalBalance};
use crate::repos::journal_repo;
use crate::services::balance_service::signed_balance;

/// Tolerance in minor units for the accounting equation check
const EQUATION_TOLERANCE_MINOR: i64 = 1;

/// Errors that can occur while building reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One account's contribution to a report section
#[derive(Debug, Clone, Serialize)]
pub struct ReportLine {
    pub account_code: String,
    pub account_name: String,
    pub amount_minor: i64,
}

/// Trial balance row: the account's signed balance placed on its side
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceRow {
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

/// Trial balance report
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    pub as_of: Option<NaiveDate>,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
    pub is_balanced: bool,
}

/// Profit and loss over a date range
#[derive(Debug, Clone, Serialize)]
pub struct ProfitAndLoss {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub revenue: Vec<ReportLine>,
    pub expenses: Vec<ReportLine>,
    pub total_revenue_minor: i64,
    pub total_expense_minor: i64,
    pub net_income_minor: i64,
}

/// Balance sheet as of a date
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<ReportLine>,
    pub liabilities: Vec<ReportLine>,
    pub equity: Vec<ReportLine>,
    pub total_assets_minor: i64,
    pub total_liabilities_minor: i64,
    pub total_equity_minor: i64,
    /// Revenue minus expenses up to the report date, shown inside equity
    pub current_earnings_minor: i64,
    pub is_balanced: bool,
}

/// Build the trial balance: every postable account's raw debit/credit totals
pub async fn trial_balance(
    pool: &PgPool,
    tenant_id: &str,
    as_of: Option<NaiveDate>,
) -> Result<TrialBalance, ReportError> {
    let accounts = account_repo::list_postable(pool, tenant_id)
        .await
        .map_err(db_only)?;
    let totals = totals_map(journal_repo::account_totals_bulk(pool, tenant_id, as_of).await?);

    let mut rows = Vec::new();
    let mut total_debit_minor = 0;
    let mut total_credit_minor = 0;

    for account in &accounts {
        let (debit, credit) = totals.get(&account.code).copied().unwrap_or((0, 0));
        // Opening balances sit on the account's normal side.
        let (opening_debit, opening_credit) = match account.normal_balance {
            NormalBalance::Debit => (account.opening_balance_minor, 0),
            NormalBalance::Credit => (0, account.opening_balance_minor),
        };
        let debit = debit + opening_debit;
        let credit = credit + opening_credit;

        if debit == 0 && credit == 0 {
            continue;
        }

        total_debit_minor += debit;
        total_credit_minor += credit;
        rows.push(TrialBalanceRow {
            account_code: account.code.clone(),
            account_name: account.name.clone(),
            account_type: account.account_type,
            normal_balance: account.normal_balance,
            debit_minor: debit,
            credit_minor: credit,
        });
    }

    Ok(TrialBalance {
        as_of,
        rows,
        total_debit_minor,
        total_credit_minor,
        is_balanced: total_debit_minor == total_credit_minor,
    })
}

/// Build the profit-and-loss statement for a date range
pub async fn profit_and_loss(
    pool: &PgPool,
    tenant_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<ProfitAndLoss, ReportError> {
    let accounts = account_repo::list_postable(pool, tenant_id)
        .await
        .map_err(db_only)?;
    let totals = totals_map(
        journal_repo::account_totals_bulk_between(pool, tenant_id, from, to).await?,
    );

    let mut revenue = Vec::new();
    let mut expenses = Vec::new();
    let mut total_revenue_minor = 0;
    let mut total_expense_minor = 0;

    for account in &accounts {
        let (debit, credit) = totals.get(&account.code).copied().unwrap_or((0, 0));
        if debit == 0 && credit == 0 {
            continue;
        }
        // P&L amounts exclude opening balances: only period activity counts.
        let amount = signed_balance(account.normal_balance, 0, debit, credit);
        match account.account_type {
            AccountType::Revenue => {
                total_revenue_minor += amount;
                revenue.push(report_line(account, amount));
            }
            AccountType::Expense => {
                total_expense_minor += amount;
                expenses.push(report_line(account, amount));
            }
            _ => {}
        }
    }

    Ok(ProfitAndLoss {
        from,
        to,
        revenue,
        expenses,
        total_revenue_minor,
        total_expense_minor,
        net_income_minor: total_revenue_minor - total_expense_minor,
    })
}

/// Build the balance sheet as of a date.
///
/// Current-period earnings (revenue minus expenses up to the date) are
/// folded into equity so the statement balances without a closing entry.
pub async fn balance_sheet(
    pool: &PgPool,
    tenant_id: &str,
    as_of: NaiveDate,
) -> Result<BalanceSheet, ReportError> {
    let accounts = account_repo::list_postable(pool, tenant_id)
        .await
        .map_err(db_only)?;
    let totals = totals_map(
        journal_repo::account_totals_bulk(pool, tenant_id, Some(as_of)).await?,
    );

    let mut assets = Vec::new();
    let mut liabilities = Vec::new();
    let mut equity = Vec::new();
    let mut total_assets_minor = 0;
    let mut total_liabilities_minor = 0;
    let mut total_equity_minor = 0;
    let mut current_earnings_minor = 0;

    for account in &accounts {
        let (debit, credit) = totals.get(&account.code).copied().unwrap_or((0, 0));
        let amount = signed_balance(
            account.normal_balance,
            account.opening_balance_minor,
            debit,
            credit,
        );
        if amount == 0 {
            continue;
        }
        match account.account_type {
            AccountType::Asset => {
                total_assets_minor += amount;
                assets.push(report_line(account, amount));
            }
            AccountType::Liability => {
                total_liabilities_minor += amount;
                liabilities.push(report_line(account, amount));
            }
            AccountType::Equity => {
                total_equity_minor += amount;
                equity.push(report_line(account, amount));
            }
            AccountType::Revenue => current_earnings_minor += amount,
            AccountType::Expense => current_earnings_minor -= amount,
        }
    }

    let equation_rhs = total_liabilities_minor + total_equity_minor + current_earnings_minor;
    let drift = (total_assets_minor - equation_rhs).abs();
    let is_balanced = drift <= EQUATION_TOLERANCE_MINOR;

    if !is_balanced {
        // Data-quality signal, not a failure: the statement still renders.
        tracing::warn!(
            tenant_id = %tenant_id,
            as_of = %as_of,
            total_assets_minor = total_assets_minor,
            total_liabilities_minor = total_liabilities_minor,
            total_equity_minor = total_equity_minor,
            current_earnings_minor = current_earnings_minor,
            drift_minor = drift,
            "Accounting equation drift detected in balance sheet"
        );
    }

    Ok(BalanceSheet {
        as_of,
        assets,
        liabilities,
        equity,
        total_assets_minor,
        total_liabilities_minor,
        total_equity_minor,
        current_earnings_minor,
        is_balanced,
    })
}

fn report_line(account: &Account, amount_minor: i64) -> ReportLine {
    ReportLine {
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        amount_minor,
    }
}

fn totals_map(rows: Vec<(String, i64, i64)>) -> HashMap<String, (i64, i64)> {
    rows.into_iter().map(|(code, d, c)| (code, (d, c))).collect()
}

fn db_only(e: account_repo::AccountError) -> ReportError {
    match e {
        account_repo::AccountError::Database(e) => ReportError::Database(e),
        account_repo::AccountError::NotFound { .. } => {
            ReportError::Database(sqlx::Error::RowNotFound)
        }
    }
}
