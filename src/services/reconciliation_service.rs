//! Account reconciliation lease.
//!
//! The lock embedded on the account row is a lease: owner, wall-clock expiry,
//! and an optional date range under reconciliation. Acquisition and release
//! are single compare-and-set statements in the repo; an expired lease counts
//! as released without anyone calling unlock. Unlocking records the outcome
//! and advances the `reconciled_up_to` watermark, below which postings are
//! rejected forever.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use thiserror::Error;

use crate::repos::account_repo::{self, Account, ReconStatus};

/// Default lease length when the caller does not specify one
pub const DEFAULT_LOCK_MINUTES: i64 = 60;

/// Errors that can occur during reconciliation operations
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Account not found: tenant_id={tenant_id}, code={code}")]
    AccountNotFound { tenant_id: String, code: String },

    #[error("Account already locked for reconciliation by {locked_by}: code={code}")]
    AlreadyLocked { code: String, locked_by: String },

    #[error("Reconciliation lock on account {code} is held by {locked_by}, not {caller}")]
    NotLockOwner {
        code: String,
        locked_by: String,
        caller: String,
    },

    #[error("Account {code} is not locked for reconciliation")]
    NotLocked { code: String },

    #[error("Unlock outcome must be reconciled or discrepancy, got {0:?}")]
    InvalidOutcome(ReconStatus),

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

impl ReconError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            ReconError::AlreadyLocked { .. } => "ALREADY_LOCKED",
            ReconError::NotLockOwner { .. } => "NOT_LOCK_OWNER",
            ReconError::NotLocked { .. } => "NOT_LOCKED",
            ReconError::InvalidOutcome(_) => "VALIDATION",
            ReconError::ReconciliationLocked { .. } => "RECONCILIATION_LOCKED",
            ReconError::BeforeReconciledDate { .. } => "BEFORE_RECONCILED_DATE",
            ReconError::Database(_) => "DATABASE",
        }
    }
}

/// A live reconciliation lease read off an account row
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationLease {
    pub owner: String,
    pub expires_at: DateTime<Utc>,
    pub lock_start: Option<NaiveDate>,
    pub lock_end: Option<NaiveDate>,
}

impl ReconciliationLease {
    /// Extract the lease from an account, if one was ever taken
    pub fn from_account(account: &Account) -> Option<Self> {
        let owner = account.recon_locked_by.clone()?;
        let expires_at = account.recon_lock_expires_at?;
        Some(ReconciliationLease {
            owner,
            expires_at,
            lock_start: account.recon_lock_start,
            lock_end: account.recon_lock_end,
        })
    }

    /// An expired lease counts as released even if never unlocked
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether a posting date falls inside the locked range.
    /// A lease without an explicit range covers every date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.lock_start, self.lock_end) {
            (None, None) => true,
            (Some(start), None) => date >= start,
            (None, Some(end)) => date <= end,
            (Some(start), Some(end)) => date >= start && date <= end,
        }
    }
}

/// Posting-time guard: reject dates under a live lease or behind the
/// reconciled watermark. Re-validated inside the posting transaction, never
/// just at UI-gating time.
pub fn check_posting_allowed(
    account: &Account,
    entry_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<(), ReconError> {
    if let Some(lease) = ReconciliationLease::from_account(account) {
        if !lease.is_expired(now) && lease.covers(entry_date) {
            return Err(ReconError::ReconciliationLocked {
                code: account.code.clone(),
                locked_by: lease.owner,
            });
        }
    }

    if let Some(boundary) = account.reconciled_up_to {
        if entry_date < boundary {
            return Err(ReconError::BeforeReconciledDate {
                code: account.code.clone(),
                entry_date,
                boundary,
            });
        }
    }

    Ok(())
}

/// Acquire the reconciliation lease on an account.
///
/// Fails with `AlreadyLocked` while another user's unexpired lease is live.
pub async fn lock_account(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    user: &str,
    lock_minutes: Option<i64>,
    lock_start: Option<NaiveDate>,
    lock_end: Option<NaiveDate>,
) -> Result<Account, ReconError> {
    let minutes = lock_minutes.unwrap_or(DEFAULT_LOCK_MINUTES);
    let expires_at = Utc::now() + Duration::minutes(minutes);

    let acquired = account_repo::try_acquire_recon_lock(
        pool, tenant_id, code, user, expires_at, lock_start, lock_end,
    )
    .await
    .map_err(repo_err)?;

    match acquired {
        Some(account) => {
            tracing::info!(
                tenant_id = %tenant_id,
                code = %code,
                locked_by = %user,
                expires_at = %expires_at,
                "Reconciliation lock acquired"
            );
            Ok(account)
        }
        None => {
            // CAS missed: either no such account, or a live lease is held.
            let account = account_repo::find_live_by_code(pool, tenant_id, code)
                .await
                .map_err(repo_err)?
                .ok_or_else(|| ReconError::AccountNotFound {
                    tenant_id: tenant_id.to_string(),
                    code: code.to_string(),
                })?;

            let locked_by = account
                .recon_locked_by
                .unwrap_or_else(|| "unknown".to_string());
            Err(ReconError::AlreadyLocked {
                code: code.to_string(),
                locked_by,
            })
        }
    }
}

/// Release the lease, recording the outcome and the reconciled watermark.
///
/// Only the locking user may release; the outcome must be `Reconciled` or
/// `Discrepancy`.
pub async fn unlock_account(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    user: &str,
    outcome: ReconStatus,
    reconciled_up_to: Option<NaiveDate>,
    discrepancy_minor: Option<i64>,
    note: Option<&str>,
) -> Result<Account, ReconError> {
    if !matches!(outcome, ReconStatus::Reconciled | ReconStatus::Discrepancy) {
        return Err(ReconError::InvalidOutcome(outcome));
    }

    let released = account_repo::release_recon_lock(
        pool,
        tenant_id,
        code,
        user,
        outcome,
        reconciled_up_to,
        discrepancy_minor,
        note,
    )
    .await
    .map_err(repo_err)?;

    match released {
        Some(account) => {
            tracing::info!(
                tenant_id = %tenant_id,
                code = %code,
                released_by = %user,
                outcome = ?outcome,
                reconciled_up_to = ?reconciled_up_to,
                "Reconciliation lock released"
            );
            Ok(account)
        }
        None => {
            let account = account_repo::find_live_by_code(pool, tenant_id, code)
                .await
                .map_err(repo_err)?
                .ok_or_else(|| ReconError::AccountNotFound {
                    tenant_id: tenant_id.to_string(),
                    code: code.to_string(),
                })?;

            match account.recon_locked_by {
                Some(locked_by) => Err(ReconError::NotLockOwner {
                    code: code.to_string(),
                    locked_by,
                    caller: user.to_string(),
                }),
                None => Err(ReconError::NotLocked {
                    code: code.to_string(),
                }),
            }
        }
    }
}

fn repo_err(e: account_repo::AccountError) -> ReconError {
    match e {
        account_repo::AccountError::Database(e) => ReconError::Database(e),
        account_repo::AccountError::NotFound { tenant_id, code } => {
            ReconError::AccountNotFound { tenant_id, code }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::account_repo::{
        AccountOrigin, AccountStatus, AccountType, NormalBalance,
    };
    use uuid::Uuid;

    fn test_account() -> Account {
        Account {
            id: Uuid::new_v4(),
            tenant_id: "tenant_001".to_string(),
            code: "1100".to_string(),
            name: "Accounts Receivable".to_string(),
            account_type: AccountType::Asset,
            category: None,
            normal_balance: NormalBalance::Debit,
            parent_code: None,
            level: 0,
            allow_direct_posting: true,
            is_system: false,
            is_protected: false,
            origin: AccountOrigin::Manual,
            opening_balance_minor: 0,
            current_balance_minor: 0,
            balance_calculated_at: None,
            status: AccountStatus::Active,
            deleted_at: None,
            deleted_by: None,
            recon_status: ReconStatus::NotStarted,
            recon_locked_by: None,
            recon_locked_at: None,
            recon_lock_expires_at: None,
            recon_lock_start: None,
            recon_lock_end: None,
            reconciled_up_to: None,
            recon_discrepancy_minor: None,
            recon_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unlocked_account_allows_posting() {
        let account = test_account();
        assert!(check_posting_allowed(&account, date(2026, 2, 11), Utc::now()).is_ok());
    }

    #[test]
    fn test_live_lock_blocks_posting() {
        let mut account = test_account();
        account.recon_locked_by = Some("user_a".to_string());
        account.recon_lock_expires_at = Some(Utc::now() + Duration::minutes(30));

        let err = check_posting_allowed(&account, date(2026, 2, 11), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "RECONCILIATION_LOCKED");
    }

    #[test]
    fn test_expired_lock_allows_posting() {
        let mut account = test_account();
        account.recon_locked_by = Some("user_a".to_string());
        account.recon_lock_expires_at = Some(Utc::now() - Duration::minutes(1));

        assert!(check_posting_allowed(&account, date(2026, 2, 11), Utc::now()).is_ok());
    }

    #[test]
    fn test_lock_range_only_covers_range() {
        let mut account = test_account();
        account.recon_locked_by = Some("user_a".to_string());
        account.recon_lock_expires_at = Some(Utc::now() + Duration::minutes(30));
        account.recon_lock_start = Some(date(2026, 1, 1));
        account.recon_lock_end = Some(date(2026, 1, 31));

        let err = check_posting_allowed(&account, date(2026, 1, 15), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "RECONCILIATION_LOCKED");

        // Outside the locked range the posting goes through.
        assert!(check_posting_allowed(&account, date(2026, 2, 1), Utc::now()).is_ok());
    }

    #[test]
    fn test_watermark_blocks_earlier_dates() {
        let mut account = test_account();
        account.reconciled_up_to = Some(date(2026, 2, 1));

        let err = check_posting_allowed(&account, date(2026, 1, 31), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "BEFORE_RECONCILED_DATE");

        // The boundary date itself and anything after are fine.
        assert!(check_posting_allowed(&account, date(2026, 2, 1), Utc::now()).is_ok());
        assert!(check_posting_allowed(&account, date(2026, 2, 2), Utc::now()).is_ok());
    }

    #[test]
    fn test_watermark_survives_unlock_state() {
        // Watermark applies even with no live lease.
        let mut account = test_account();
        account.recon_status = ReconStatus::Reconciled;
        account.reconciled_up_to = Some(date(2026, 3, 1));

        let err = check_posting_allowed(&account, date(2026, 2, 28), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "BEFORE_RECONCILED_DATE");
    }

    #[test]
    fn test_lease_expiry_boundary() {
        let now = Utc::now();
        let lease = ReconciliationLease {
            owner: "user_a".to_string(),
            expires_at: now,
            lock_start: None,
            lock_end: None,
        };
        assert!(lease.is_expired(now));
        assert!(!lease.is_expired(now - Duration::seconds(1)));
    }
}
