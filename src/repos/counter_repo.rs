//! Atomic counters for account codes and entry numbers.
//!
//! Every increment is a single upsert-and-return round trip. Two concurrent
//! callers hit the same row and serialize inside Postgres, so they can never
//! observe the same value. Never read-then-write these counters at the
//! application layer.

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};

use crate::repos::account_repo::AccountType;

/// Increment and return the account-code counter for (tenant, type)
pub async fn next_account_code(
    pool: &PgPool,
    tenant_id: &str,
    account_type: AccountType,
) -> Result<i64, sqlx::Error> {
    let last_code = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO account_code_counters (tenant_id, account_type, last_code)
        VALUES ($1, $2, 1)
        ON CONFLICT (tenant_id, account_type)
        DO UPDATE SET last_code = account_code_counters.last_code + 1
        RETURNING last_code
        "#,
    )
    .bind(tenant_id)
    .bind(account_type)
    .fetch_one(pool)
    .await?;

    Ok(last_code)
}

/// Increment and return the account-code counter within a transaction
pub async fn next_account_code_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    account_type: AccountType,
) -> Result<i64, sqlx::Error> {
    let last_code = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO account_code_counters (tenant_id, account_type, last_code)
        VALUES ($1, $2, 1)
        ON CONFLICT (tenant_id, account_type)
        DO UPDATE SET last_code = account_code_counters.last_code + 1
        RETURNING last_code
        "#,
    )
    .bind(tenant_id)
    .bind(account_type)
    .fetch_one(&mut **tx)
    .await?;

    Ok(last_code)
}

/// Increment and return the entry-number sequence for (tenant, prefix, day)
pub async fn next_entry_seq_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    prefix: &str,
    entry_date: NaiveDate,
) -> Result<i64, sqlx::Error> {
    let last_seq = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO entry_number_counters (tenant_id, prefix, entry_date, last_seq)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (tenant_id, prefix, entry_date)
        DO UPDATE SET last_seq = entry_number_counters.last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(tenant_id)
    .bind(prefix)
    .bind(entry_date)
    .fetch_one(&mut **tx)
    .await?;

    Ok(last_seq)
}
