//! Account balance calculation and caching.
//!
//! The journal is the only authoritative source for a balance: calculation
//! replays posted entries and applies the account's normal-balance sign
//! convention. The value cached on the account row is a convenience copy;
//! posting invalidates it (`balance_calculated_at = NULL`) and recomputation
//! happens on demand, never synchronously inside the posting transaction.
//!
//! Summary (parent) accounts are always derived from their active children
//! and never cached.

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;

use crate::repos::account_repo::{self, Account, AccountStatus, NormalBalance};
use crate::repos::journal_repo;

/// Errors that can occur during balance operations
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("Account not found: tenant_id={tenant_id}, code={code}")]
    AccountNotFound { tenant_id: String, code: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BalanceError {
    pub fn code(&self) -> &'static str {
        match self {
            BalanceError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            BalanceError::Database(_) => "DATABASE",
        }
    }
}

/// Apply the sign convention: debit-normal accounts grow with debits,
/// credit-normal accounts grow with credits.
pub fn signed_balance(
    normal_balance: NormalBalance,
    opening_minor: i64,
    debit_minor: i64,
    credit_minor: i64,
) -> i64 {
    match normal_balance {
        NormalBalance::Debit => opening_minor + debit_minor - credit_minor,
        NormalBalance::Credit => opening_minor + credit_minor - debit_minor,
    }
}

/// Derive an account's balance by replaying posted journal entries,
/// optionally as of a date. Pure read; touches no cache.
///
/// For a summary account this is the sum of its active children's balances
/// (parents hold no journal lines of their own).
pub async fn calculate_balance(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    as_of: Option<NaiveDate>,
) -> Result<i64, BalanceError> {
    let account = account_repo::find_by_code(pool, tenant_id, code)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| BalanceError::AccountNotFound {
            tenant_id: tenant_id.to_string(),
            code: code.to_string(),
        })?;

    if account.is_summary() {
        return derived_parent_balance(pool, tenant_id, &account, as_of).await;
    }

    let (debit_minor, credit_minor) =
        journal_repo::account_totals(pool, tenant_id, &account.code, as_of).await?;

    Ok(signed_balance(
        account.normal_balance,
        account.opening_balance_minor,
        debit_minor,
        credit_minor,
    ))
}

/// Recalculate a postable account's balance and store it on the account row.
///
/// Summary accounts are returned derived but never cached; a second cache
/// layer over parents would be harder to invalidate than it is worth.
pub async fn recalculate_and_cache(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
) -> Result<i64, BalanceError> {
    let balance = calculate_balance(pool, tenant_id, code, None).await?;

    let account = account_repo::find_by_code(pool, tenant_id, code)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| BalanceError::AccountNotFound {
            tenant_id: tenant_id.to_string(),
            code: code.to_string(),
        })?;

    if account.is_summary() {
        tracing::debug!(
            tenant_id = %tenant_id,
            code = %code,
            "Summary account balance derived on demand, not cached"
        );
        return Ok(balance);
    }

    account_repo::write_balance_cache(pool, tenant_id, code, balance)
        .await
        .map_err(repo_err)?;

    tracing::debug!(
        tenant_id = %tenant_id,
        code = %code,
        balance_minor = balance,
        "Account balance recalculated and cached"
    );

    Ok(balance)
}

/// Recalculate and cache every postable account of a tenant.
///
/// One grouped aggregate over the journal instead of a query per account.
pub async fn recalculate_all(pool: &PgPool, tenant_id: &str) -> Result<usize, BalanceError> {
    let accounts = account_repo::list_postable(pool, tenant_id)
        .await
        .map_err(repo_err)?;
    let totals = journal_repo::account_totals_bulk(pool, tenant_id, None).await?;

    let totals_by_code: HashMap<String, (i64, i64)> = totals
        .into_iter()
        .map(|(code, d, c)| (code, (d, c)))
        .collect();

    let mut updated = 0;
    for account in &accounts {
        let (debit_minor, credit_minor) = totals_by_code
            .get(&account.code)
            .copied()
            .unwrap_or((0, 0));
        let balance = signed_balance(
            account.normal_balance,
            account.opening_balance_minor,
            debit_minor,
            credit_minor,
        );
        account_repo::write_balance_cache(pool, tenant_id, &account.code, balance)
            .await
            .map_err(repo_err)?;
        updated += 1;
    }

    tracing::info!(
        tenant_id = %tenant_id,
        accounts = updated,
        "Recalculated balances for all postable accounts"
    );

    Ok(updated)
}

/// Sum the calculated balances of every active descendant leaf
async fn derived_parent_balance(
    pool: &PgPool,
    tenant_id: &str,
    parent: &Account,
    as_of: Option<NaiveDate>,
) -> Result<i64, BalanceError> {
    let accounts = account_repo::list_active(pool, tenant_id)
        .await
        .map_err(repo_err)?;
    let totals = journal_repo::account_totals_bulk(pool, tenant_id, as_of).await?;

    let totals_by_code: HashMap<String, (i64, i64)> = totals
        .into_iter()
        .map(|(code, d, c)| (code, (d, c)))
        .collect();

    Ok(sum_subtree(&parent.code, &accounts, &totals_by_code))
}

/// Walk the active subtree under `parent_code`, summing leaf balances.
/// Iterative so deep hierarchies cost nothing special.
fn sum_subtree(
    parent_code: &str,
    accounts: &[Account],
    totals_by_code: &HashMap<String, (i64, i64)>,
) -> i64 {
    let mut children_of: HashMap<&str, Vec<&Account>> = HashMap::new();
    for account in accounts {
        if account.status != AccountStatus::Active {
            continue;
        }
        if let Some(parent) = account.parent_code.as_deref() {
            children_of.entry(parent).or_default().push(account);
        }
    }

    let mut balance = 0;
    let mut stack: Vec<&str> = vec![parent_code];
    while let Some(code) = stack.pop() {
        if let Some(children) = children_of.get(code) {
            for child in children {
                if child.allow_direct_posting {
                    let (d, c) = totals_by_code.get(&child.code).copied().unwrap_or((0, 0));
                    balance += signed_balance(
                        child.normal_balance,
                        child.opening_balance_minor,
                        d,
                        c,
                    );
                } else {
                    stack.push(child.code.as_str());
                }
            }
        }
    }

    balance
}

fn repo_err(e: account_repo::AccountError) -> BalanceError {
    match e {
        account_repo::AccountError::Database(e) => BalanceError::Database(e),
        account_repo::AccountError::NotFound { tenant_id, code } => {
            BalanceError::AccountNotFound { tenant_id, code }
        }
    }
}
