//! Journal posting service.
//!
//! The single entry point for recording financial events. Validation, account
//! resolution, period/reconciliation guards, entry numbering, persistence and
//! balance-cache invalidation all happen inside one transaction; a failure at
//! any step leaves no visible partial state.

use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::contracts::posting_request_v1::PostingRequestV1;
use crate::repos::account_repo::{self, Account, AccountStatus};
use crate::repos::counter_repo;
use crate::repos::journal_repo::{self, JournalEntry, JournalLineInsert, NewJournalEntry};
use crate::repos::period_repo::{self, PeriodStatus};
use crate::services::reconciliation_service::{self, ReconError};
use crate::validation::{self, validate_posting_request, ValidationError};

/// Errors that can occur during journal posting
#[derive(Debug, thiserror::Error)]
pub enum PostingError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid entry date: {0}")]
    InvalidDate(String),

    #[error("Fiscal period is not open for posting: date={date}, fiscal_year={fiscal_year}, period_no={period_no}")]
    PeriodClosed {
        date: NaiveDate,
        fiscal_year: i32,
        period_no: i16,
    },

    #[error("Account not found for posting: code={code}")]
    AccountNotFound { code: String },

    #[error("Account {code} is a summary account and does not allow direct posting")]
    DirectPostingDenied { code: String },

    #[error("Account {code} is locked for reconciliation by {locked_by}")]
    ReconciliationLocked { code: String, locked_by: String },

    #[error("Entry date {entry_date} predates reconciled boundary {boundary} on account {code}")]
    BeforeReconciledDate {
        code: String,
        entry_date: NaiveDate,
        boundary: NaiveDate,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PostingError {
    /// Stable error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            PostingError::Validation(ValidationError::Unbalanced(_, _)) => "UNBALANCED_ENTRY",
            PostingError::Validation(ValidationError::ZeroAmount(_, _)) => "ZERO_AMOUNT_ENTRY",
            PostingError::Validation(_) | PostingError::InvalidDate(_) => "VALIDATION",
            PostingError::PeriodClosed { .. } => "PERIOD_CLOSED",
            PostingError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            PostingError::DirectPostingDenied { .. } => "PARENT_ACCOUNT_POSTING_DENIED",
            PostingError::ReconciliationLocked { .. } => "RECONCILIATION_LOCKED",
            PostingError::BeforeReconciledDate { .. } => "BEFORE_RECONCILED_DATE",
            PostingError::Database(_) => "DATABASE",
        }
    }
}

/// Result type for posting operations
pub type PostingResult<T> = Result<T, PostingError>;

/// Format an entry number: `{PREFIX}-{YYYYMMDD}-{zero-padded seq}`
pub fn format_entry_number(prefix: &str, entry_date: NaiveDate, seq: i64) -> String {
    format!("{}-{}-{:04}", prefix, entry_date.format("%Y%m%d"), seq)
}

/// Post a balanced journal entry.
///
/// Validation sequence (fail fast, no partial writes):
/// 1. Payload shape: at least 2 lines, one side per line, balanced totals
/// 2. Fiscal-period guard on the entry date
/// 3. Resolve each account, restoring soft-deleted ones and reactivating
///    inactive system accounts
/// 4. Summary accounts rejected
/// 5. Reconciliation lease / watermark checked per account
/// Then: allocate the entry number, persist header + lines as `posted`, and
/// mark the balance cache stale on every distinct touched account.
pub async fn post_entry(pool: &PgPool, payload: &PostingRequestV1) -> PostingResult<JournalEntry> {
    validate_posting_request(payload)?;

    let entry_date = parse_entry_date(payload.entry_date.as_deref())?;
    let tenant_id = payload.tenant_id.as_str();

    let mut tx = pool.begin().await?;

    assert_period_open_tx(&mut tx, tenant_id, entry_date).await?;

    // Resolve and guard every account before writing anything.
    let now = Utc::now();
    let mut resolved: Vec<Account> = Vec::with_capacity(payload.lines.len());
    for line in &payload.lines {
        let code = line.account_code.trim().to_uppercase();
        let account = resolve_for_posting_tx(&mut tx, tenant_id, &code).await?;

        if account.is_summary() {
            return Err(PostingError::DirectPostingDenied { code: account.code });
        }

        reconciliation_service::check_posting_allowed(&account, entry_date, now)
            .map_err(recon_to_posting)?;

        resolved.push(account);
    }

    let prefix = payload.reference_type.prefix();
    let seq = counter_repo::next_entry_seq_tx(&mut tx, tenant_id, prefix, entry_date).await?;
    let entry_number = format_entry_number(prefix, entry_date, seq);

    let total_debit_minor: i64 = payload.lines.iter().map(|l| validation::to_minor(l.debit)).sum();
    let total_credit_minor: i64 = payload.lines.iter().map(|l| validation::to_minor(l.credit)).sum();

    let entry = journal_repo::insert_entry_tx(
        &mut tx,
        &NewJournalEntry {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            entry_number,
            entry_date,
            reference_type: payload.reference_type,
            reference_id: payload.reference_id.clone(),
            description: Some(payload.description.clone()),
            total_debit_minor,
            total_credit_minor,
            reverses_entry_id: None,
            reversal_reason: None,
            created_by: payload.created_by.clone(),
        },
    )
    .await?;

    let line_inserts: Vec<JournalLineInsert> = payload
        .lines
        .iter()
        .zip(resolved.iter())
        .enumerate()
        .map(|(idx, (line, account))| JournalLineInsert {
            id: Uuid::new_v4(),
            line_no: (idx + 1) as i32,
            account_code: account.code.clone(),
            account_name: account.name.clone(),
            debit_minor: validation::to_minor(line.debit),
            credit_minor: validation::to_minor(line.credit),
            memo: line.memo.clone(),
        })
        .collect();

    journal_repo::bulk_insert_lines_tx(&mut tx, entry.id, line_inserts).await?;

    invalidate_touched_accounts_tx(&mut tx, tenant_id, &resolved).await?;

    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        entry_id = %entry.id,
        entry_number = %entry.entry_number,
        total_debit_minor = entry.total_debit_minor,
        total_credit_minor = entry.total_credit_minor,
        "Journal entry posted"
    );

    Ok(entry)
}

/// Parse the payload date or default to today
pub(crate) fn parse_entry_date(entry_date: Option<&str>) -> PostingResult<NaiveDate> {
    match entry_date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| PostingError::InvalidDate(format!("{}: {}", s, e))),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Reject dates falling in a locked or closed fiscal period.
///
/// A date with no configured period is allowed; tenants without a fiscal
/// calendar still post.
pub(crate) async fn assert_period_open_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    entry_date: NaiveDate,
) -> PostingResult<()> {
    let period = period_repo::find_by_date_tx(tx, tenant_id, entry_date)
        .await
        .map_err(period_err)?;

    if let Some(period) = period {
        if period.status != PeriodStatus::Open {
            return Err(PostingError::PeriodClosed {
                date: entry_date,
                fiscal_year: period.fiscal_year,
                period_no: period.period_no,
            });
        }
    }

    Ok(())
}

/// Resolve the account a line posts against.
///
/// Soft-deleted accounts are restored (history references them again);
/// inactive system-owned accounts are reactivated; an inactive manual account
/// does not resolve.
pub(crate) async fn resolve_for_posting_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    code: &str,
) -> PostingResult<Account> {
    let account = account_repo::find_by_code_tx(tx, tenant_id, code)
        .await
        .map_err(account_err)?
        .ok_or_else(|| PostingError::AccountNotFound {
            code: code.to_string(),
        })?;

    match account.status {
        AccountStatus::Active => Ok(account),
        AccountStatus::Deleted => {
            tracing::info!(
                tenant_id = %tenant_id,
                code = %code,
                "Restoring soft-deleted account referenced by posting"
            );
            account_repo::restore_tx(tx, account.id)
                .await
                .map_err(account_err)?;
            Ok(Account {
                status: AccountStatus::Active,
                deleted_at: None,
                deleted_by: None,
                ..account
            })
        }
        AccountStatus::Inactive if account.is_system => {
            tracing::info!(
                tenant_id = %tenant_id,
                code = %code,
                "Reactivating inactive system account referenced by posting"
            );
            account_repo::restore_tx(tx, account.id)
                .await
                .map_err(account_err)?;
            Ok(Account {
                status: AccountStatus::Active,
                ..account
            })
        }
        AccountStatus::Inactive => Err(PostingError::AccountNotFound {
            code: code.to_string(),
        }),
    }
}

/// Mark the balance cache stale for every distinct account in the entry
pub(crate) async fn invalidate_touched_accounts_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    accounts: &[Account],
) -> PostingResult<()> {
    let mut codes: Vec<String> = accounts.iter().map(|a| a.code.clone()).collect();
    codes.sort();
    codes.dedup();

    account_repo::invalidate_balance_cache_tx(tx, tenant_id, &codes)
        .await
        .map_err(account_err)?;

    tracing::debug!(
        tenant_id = %tenant_id,
        accounts = codes.len(),
        "Balance cache invalidated for touched accounts"
    );

    Ok(())
}

fn account_err(e: account_repo::AccountError) -> PostingError {
    match e {
        account_repo::AccountError::Database(e) => PostingError::Database(e),
        account_repo::AccountError::NotFound { code, .. } => PostingError::AccountNotFound { code },
    }
}

fn period_err(e: period_repo::PeriodError) -> PostingError {
    match e {
        period_repo::PeriodError::Database(e) => PostingError::Database(e),
        period_repo::PeriodError::NotFound { .. } => {
            // find_by_date never reports NotFound; absence comes back as None
            PostingError::Database(sqlx::Error::RowNotFound)
        }
    }
}

fn recon_to_posting(e: ReconError) -> PostingError {
    match e {
        ReconError::ReconciliationLocked { code, locked_by } => {
            PostingError::ReconciliationLocked { code, locked_by }
        }
        ReconError::BeforeReconciledDate {
            code,
            entry_date,
            boundary,
        } => PostingError::BeforeReconciledDate {
            code,
            entry_date,
            boundary,
        },
        ReconError::Database(e) => PostingError::Database(e),
        other => PostingError::Database(sqlx::Error::Protocol(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();
        assert_eq!(format_entry_number("SAL", date, 7), "SAL-20260211-0007");
        assert_eq!(format_entry_number("JV", date, 12345), "JV-20260211-12345");
    }

    #[test]
    fn test_parse_entry_date() {
        let date = parse_entry_date(Some("2026-02-11")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 11).unwrap());

        let err = parse_entry_date(Some("11/02/2026")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        // Absent date defaults to today.
        assert_eq!(parse_entry_date(None).unwrap(), Utc::now().date_naive());
    }

    #[test]
    fn test_error_codes_are_distinct_per_guard() {
        let period = PostingError::PeriodClosed {
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            fiscal_year: 2026,
            period_no: 1,
        };
        let recon = PostingError::ReconciliationLocked {
            code: "1100".to_string(),
            locked_by: "user_a".to_string(),
        };
        let watermark = PostingError::BeforeReconciledDate {
            code: "1100".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            boundary: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        };
        assert_eq!(period.code(), "PERIOD_CLOSED");
        assert_eq!(recon.code(), "RECONCILIATION_LOCKED");
        assert_eq!(watermark.code(), "BEFORE_RECONCILED_DATE");
    }
}
