//! Repository for fiscal period governance.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

/// Period lifecycle matching database period_status
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "period_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    Open,
    Locked,
    Closed,
}

/// Fiscal period row
#[derive(Debug, Clone, FromRow)]
pub struct FiscalPeriod {
    pub id: Uuid,
    pub tenant_id: String,
    pub fiscal_year: i32,
    pub period_no: i16,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: PeriodStatus,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Errors that can occur during period repository operations
#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("No fiscal period found: tenant_id={tenant_id}, fiscal_year={fiscal_year}, period_no={period_no}")]
    NotFound {
        tenant_id: String,
        fiscal_year: i32,
        period_no: i16,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Find the period containing a date, if one is configured
pub async fn find_by_date(
    pool: &PgPool,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<Option<FiscalPeriod>, PeriodError> {
    let period = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        SELECT * FROM fiscal_periods
        WHERE tenant_id = $1 AND period_start <= $2 AND period_end >= $2
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(period)
}

/// Find the period containing a date within a transaction
pub async fn find_by_date_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<Option<FiscalPeriod>, PeriodError> {
    let period = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        SELECT * FROM fiscal_periods
        WHERE tenant_id = $1 AND period_start <= $2 AND period_end >= $2
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(date)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(period)
}

/// Find a specific period by fiscal year and number
pub async fn find_by_number(
    pool: &PgPool,
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
) -> Result<Option<FiscalPeriod>, PeriodError> {
    let period = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        SELECT * FROM fiscal_periods
        WHERE tenant_id = $1 AND fiscal_year = $2 AND period_no = $3
        "#,
    )
    .bind(tenant_id)
    .bind(fiscal_year)
    .bind(period_no)
    .fetch_optional(pool)
    .await?;

    Ok(period)
}

/// All periods of a fiscal year, ordered by period number
pub async fn list_year(
    pool: &PgPool,
    tenant_id: &str,
    fiscal_year: i32,
) -> Result<Vec<FiscalPeriod>, PeriodError> {
    let periods = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        SELECT * FROM fiscal_periods
        WHERE tenant_id = $1 AND fiscal_year = $2
        ORDER BY period_no
        "#,
    )
    .bind(tenant_id)
    .bind(fiscal_year)
    .fetch_all(pool)
    .await?;

    Ok(periods)
}

/// Insert one fiscal period
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<FiscalPeriod, PeriodError> {
    let period = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        INSERT INTO fiscal_periods (id, tenant_id, fiscal_year, period_no, period_start, period_end)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(fiscal_year)
    .bind(period_no)
    .bind(period_start)
    .bind(period_end)
    .fetch_one(&mut **tx)
    .await?;

    Ok(period)
}

/// Move an open period to locked; only matches while still open
pub async fn lock_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
    locked_by: &str,
) -> Result<Option<FiscalPeriod>, PeriodError> {
    let period = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        UPDATE fiscal_periods
        SET status = 'locked', locked_by = $4, locked_at = NOW()
        WHERE tenant_id = $1 AND fiscal_year = $2 AND period_no = $3 AND status = 'open'
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(fiscal_year)
    .bind(period_no)
    .bind(locked_by)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(period)
}

/// Move a locked period to closed, sealing the close hash
pub async fn close_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
    closed_by: &str,
    close_hash: &str,
) -> Result<Option<FiscalPeriod>, PeriodError> {
    let period = sqlx::query_as::<_, FiscalPeriod>(
        r#"
        UPDATE fiscal_periods
        SET status = 'closed', closed_by = $4, closed_at = NOW(), close_hash = $5
        WHERE tenant_id = $1 AND fiscal_year = $2 AND period_no = $3 AND status = 'locked'
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(fiscal_year)
    .bind(period_no)
    .bind(closed_by)
    .bind(close_hash)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_error_display() {
        let err = PeriodError::NotFound {
            tenant_id: "tenant_123".to_string(),
            fiscal_year: 2026,
            period_no: 3,
        };
        assert!(err.to_string().contains("tenant_123"));
        assert!(err.to_string().contains("2026"));
    }
}
