//! Repository for chart-of-accounts rows.
//!
//! Accounts carry a derived balance cache (`balance_calculated_at = NULL`
//! means stale) and an embedded reconciliation lease. Soft-deleted rows keep
//! their code so historical journal lines stay resolvable; the partial unique
//! index guarantees at most one live row per (tenant, code).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use serde::{Deserialize, Serialize};

/// Account type enum matching database account_type
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[sqlx(type_name = "account_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Normal balance enum matching database normal_balance
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "normal_balance", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// Tri-state account lifecycle matching database account_status
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Deleted,
}

/// How the account came to exist, matching database account_origin
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "account_origin", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountOrigin {
    System,
    AutoGenerated,
    Manual,
}

/// Reconciliation state matching database recon_status
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "recon_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReconStatus {
    NotStarted,
    InProgress,
    Reconciled,
    Discrepancy,
}

/// Chart-of-accounts row
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    #[sqlx(rename = "type")]
    pub account_type: AccountType,
    pub category: Option<String>,
    pub normal_balance: NormalBalance,
    pub parent_code: Option<String>,
    pub level: i16,
    pub allow_direct_posting: bool,
    pub is_system: bool,
    pub is_protected: bool,
    pub origin: AccountOrigin,
    pub opening_balance_minor: i64,
    pub current_balance_minor: i64,
    pub balance_calculated_at: Option<DateTime<Utc>>,
    pub status: AccountStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub recon_status: ReconStatus,
    pub recon_locked_by: Option<String>,
    pub recon_locked_at: Option<DateTime<Utc>>,
    pub recon_lock_expires_at: Option<DateTime<Utc>>,
    pub recon_lock_start: Option<NaiveDate>,
    pub recon_lock_end: Option<NaiveDate>,
    pub reconciled_up_to: Option<NaiveDate>,
    pub recon_discrepancy_minor: Option<i64>,
    pub recon_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Summary accounts aggregate their children and never take postings.
    pub fn is_summary(&self) -> bool {
        !self.allow_direct_posting
    }
}

/// Fields for inserting a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<String>,
    pub normal_balance: NormalBalance,
    pub parent_code: Option<String>,
    pub level: i16,
    pub allow_direct_posting: bool,
    pub is_system: bool,
    pub is_protected: bool,
    pub origin: AccountOrigin,
    pub opening_balance_minor: i64,
}

/// Errors that can occur during account repository operations
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account not found: tenant_id={tenant_id}, code={code}")]
    NotFound { tenant_id: String, code: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Find an account by tenant and code, preferring the live row over
/// soft-deleted ones (several deleted rows may share a code).
pub async fn find_by_code(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
) -> Result<Option<Account>, AccountError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        WHERE tenant_id = $1 AND code = $2
        ORDER BY (status = 'deleted') ASC, deleted_at DESC
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Find an account by tenant and code within a transaction
pub async fn find_by_code_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    code: &str,
) -> Result<Option<Account>, AccountError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        WHERE tenant_id = $1 AND code = $2
        ORDER BY (status = 'deleted') ASC, deleted_at DESC
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(account)
}

/// Find the live (non-deleted) account for a code, if any
pub async fn find_live_by_code(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
) -> Result<Option<Account>, AccountError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        WHERE tenant_id = $1 AND code = $2 AND status <> 'deleted'
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Insert a new account and return the stored row
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    account: &NewAccount,
) -> Result<Account, AccountError> {
    let stored = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts
            (id, tenant_id, code, name, type, category, normal_balance,
             parent_code, level, allow_direct_posting, is_system, is_protected,
             origin, opening_balance_minor)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&account.tenant_id)
    .bind(&account.code)
    .bind(&account.name)
    .bind(account.account_type)
    .bind(&account.category)
    .bind(account.normal_balance)
    .bind(&account.parent_code)
    .bind(account.level)
    .bind(account.allow_direct_posting)
    .bind(account.is_system)
    .bind(account.is_protected)
    .bind(account.origin)
    .bind(account.opening_balance_minor)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stored)
}

/// Persist mutable account fields after a service-level update
pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    account: &Account,
) -> Result<(), AccountError> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET name = $2, category = $3, parent_code = $4, level = $5,
            allow_direct_posting = $6, is_protected = $7, status = $8,
            opening_balance_minor = $9, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account.id)
    .bind(&account.name)
    .bind(&account.category)
    .bind(&account.parent_code)
    .bind(account.level)
    .bind(account.allow_direct_posting)
    .bind(account.is_protected)
    .bind(account.status)
    .bind(account.opening_balance_minor)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Bring an inactive or soft-deleted account back to active
pub async fn restore_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<(), AccountError> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET status = 'active', deleted_at = NULL, deleted_by = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Soft-delete an account, recording who removed it
pub async fn soft_delete_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    deleted_by: &str,
) -> Result<(), AccountError> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET status = 'deleted', deleted_at = NOW(), deleted_by = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(deleted_by)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// All non-deleted accounts for a tenant, ordered by code
pub async fn list_active(pool: &PgPool, tenant_id: &str) -> Result<Vec<Account>, AccountError> {
    let accounts = sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        WHERE tenant_id = $1 AND status <> 'deleted'
        ORDER BY code
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

/// Postable (leaf) active accounts for a tenant; used by bulk recalculation
pub async fn list_postable(pool: &PgPool, tenant_id: &str) -> Result<Vec<Account>, AccountError> {
    let accounts = sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        WHERE tenant_id = $1 AND status = 'active' AND allow_direct_posting = TRUE
        ORDER BY code
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

/// Count non-deleted children of a parent code
pub async fn active_children_count(
    pool: &PgPool,
    tenant_id: &str,
    parent_code: &str,
) -> Result<i64, AccountError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM accounts
        WHERE tenant_id = $1 AND parent_code = $2 AND status <> 'deleted'
        "#,
    )
    .bind(tenant_id)
    .bind(parent_code)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Mark the cached balance stale for every touched account.
///
/// This is the write-through invalidation on the posting hot path; the
/// recompute itself happens later, on demand.
pub async fn invalidate_balance_cache_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    codes: &[String],
) -> Result<u64, AccountError> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET balance_calculated_at = NULL, updated_at = NOW()
        WHERE tenant_id = $1 AND code = ANY($2) AND status <> 'deleted'
        "#,
    )
    .bind(tenant_id)
    .bind(codes)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Store a freshly calculated balance and stamp the calculation time
pub async fn write_balance_cache(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    balance_minor: i64,
) -> Result<(), AccountError> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET current_balance_minor = $3, balance_calculated_at = NOW(), updated_at = NOW()
        WHERE tenant_id = $1 AND code = $2 AND status <> 'deleted'
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .bind(balance_minor)
    .execute(pool)
    .await?;

    Ok(())
}

/// Acquire the reconciliation lease in a single compare-and-set statement.
///
/// The update only matches when no live lease exists (never locked, or the
/// previous lease expired), so two concurrent callers can never both win.
/// Returns the locked row, or None when the account is missing or the lease
/// is held.
pub async fn try_acquire_recon_lock(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    locked_by: &str,
    expires_at: DateTime<Utc>,
    lock_start: Option<NaiveDate>,
    lock_end: Option<NaiveDate>,
) -> Result<Option<Account>, AccountError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts
        SET recon_status = 'in_progress', recon_locked_by = $3, recon_locked_at = NOW(),
            recon_lock_expires_at = $4, recon_lock_start = $5, recon_lock_end = $6,
            updated_at = NOW()
        WHERE tenant_id = $1 AND code = $2 AND status <> 'deleted'
          AND (recon_locked_by IS NULL
               OR recon_lock_expires_at IS NULL
               OR recon_lock_expires_at <= NOW())
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .bind(locked_by)
    .bind(expires_at)
    .bind(lock_start)
    .bind(lock_end)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Release the reconciliation lease; only matches when `released_by` holds it.
///
/// Records the outcome and advances the `reconciled_up_to` watermark — the
/// watermark never moves backwards.
pub async fn release_recon_lock(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    released_by: &str,
    outcome: ReconStatus,
    reconciled_up_to: Option<NaiveDate>,
    discrepancy_minor: Option<i64>,
    note: Option<&str>,
) -> Result<Option<Account>, AccountError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts
        SET recon_status = $4, recon_locked_by = NULL, recon_locked_at = NULL,
            recon_lock_expires_at = NULL, recon_lock_start = NULL, recon_lock_end = NULL,
            reconciled_up_to = CASE WHEN $5::date IS NULL THEN reconciled_up_to
                                    ELSE GREATEST(COALESCE(reconciled_up_to, $5), $5) END,
            recon_discrepancy_minor = $6, recon_note = $7, updated_at = NOW()
        WHERE tenant_id = $1 AND code = $2 AND status <> 'deleted'
          AND recon_locked_by = $3
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .bind(released_by)
    .bind(outcome)
    .bind(reconciled_up_to)
    .bind(discrepancy_minor)
    .bind(note)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}
