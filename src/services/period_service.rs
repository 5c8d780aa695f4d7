//! Fiscal period governance.
//!
//! Twelve periods per fiscal year, each independently lockable and closable.
//! Closing requires the period to be locked first; closing a fiscal year
//! requires all twelve periods closed. Closes are sealed with a
//! deterministic SHA-256 hash over the period's journal totals for tamper
//! detection.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;

use crate::repos::journal_repo;
use crate::repos::period_repo::{self, FiscalPeriod, PeriodStatus};

/// Errors that can occur during period governance
#[derive(Debug, Error)]
pub enum PeriodServiceError {
    #[error("Fiscal period not found: fiscal_year={fiscal_year}, period_no={period_no}")]
    PeriodNotFound { fiscal_year: i32, period_no: i16 },

    #[error("Fiscal periods already exist for fiscal_year={fiscal_year}")]
    PeriodsExist { fiscal_year: i32 },

    #[error("Period {period_no}/{fiscal_year} is {status:?}; only an open period can be locked")]
    NotOpen {
        fiscal_year: i32,
        period_no: i16,
        status: PeriodStatus,
    },

    #[error("Period {period_no}/{fiscal_year} is {status:?}; a period must be locked before closing")]
    NotLocked {
        fiscal_year: i32,
        period_no: i16,
        status: PeriodStatus,
    },

    #[error("Fiscal year {fiscal_year} has {unclosed} periods not yet closed")]
    YearNotClosable { fiscal_year: i32, unclosed: usize },

    #[error("Invalid fiscal year: {0}")]
    InvalidYear(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PeriodServiceError {
    /// Stable error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            PeriodServiceError::PeriodNotFound { .. } => "PERIOD_NOT_FOUND",
            PeriodServiceError::PeriodsExist { .. } => "PERIODS_EXIST",
            PeriodServiceError::NotOpen { .. } => "PERIOD_NOT_OPEN",
            PeriodServiceError::NotLocked { .. } => "PERIOD_NOT_LOCKED",
            PeriodServiceError::YearNotClosable { .. } => "YEAR_NOT_CLOSABLE",
            PeriodServiceError::InvalidYear(_) => "VALIDATION",
            PeriodServiceError::Database(_) => "DATABASE",
        }
    }
}

/// Summary returned by a fiscal-year close
#[derive(Debug, Clone, serde::Serialize)]
pub struct YearCloseSummary {
    pub fiscal_year: i32,
    pub entry_count: i64,
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
    pub close_hash: String,
}

/// Compute the deterministic close hash.
///
/// Format: SHA-256(tenant_id|fiscal_year|period_no|entry_count|debits|credits),
/// hex-encoded.
pub fn compute_close_hash(
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
    entry_count: i64,
    total_debit_minor: i64,
    total_credit_minor: i64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(b"|");
    hasher.update(fiscal_year.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(period_no.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(entry_count.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(total_debit_minor.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(total_credit_minor.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First and last day of a calendar month
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

/// Provision the twelve calendar-month periods of a fiscal year
pub async fn generate_periods(
    pool: &PgPool,
    tenant_id: &str,
    fiscal_year: i32,
) -> Result<Vec<FiscalPeriod>, PeriodServiceError> {
    if !(1900..=9999).contains(&fiscal_year) {
        return Err(PeriodServiceError::InvalidYear(fiscal_year));
    }

    let existing = period_repo::list_year(pool, tenant_id, fiscal_year)
        .await
        .map_err(period_err)?;
    if !existing.is_empty() {
        return Err(PeriodServiceError::PeriodsExist { fiscal_year });
    }

    let mut tx = pool.begin().await?;
    let mut periods = Vec::with_capacity(12);
    for month in 1..=12u32 {
        let (start, end) = month_bounds(fiscal_year, month)
            .ok_or(PeriodServiceError::InvalidYear(fiscal_year))?;
        let period = period_repo::insert_tx(&mut tx, tenant_id, fiscal_year, month as i16, start, end)
            .await
            .map_err(period_err)?;
        periods.push(period);
    }
    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        fiscal_year = fiscal_year,
        "Generated 12 fiscal periods"
    );

    Ok(periods)
}

/// Lock an open period against further postings
pub async fn lock_period(
    pool: &PgPool,
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
    locked_by: &str,
) -> Result<FiscalPeriod, PeriodServiceError> {
    let mut tx = pool.begin().await?;
    let locked = period_repo::lock_tx(&mut tx, tenant_id, fiscal_year, period_no, locked_by)
        .await
        .map_err(period_err)?;
    tx.commit().await?;

    match locked {
        Some(period) => {
            tracing::info!(
                tenant_id = %tenant_id,
                fiscal_year = fiscal_year,
                period_no = period_no,
                locked_by = %locked_by,
                "Fiscal period locked"
            );
            Ok(period)
        }
        None => {
            let period = period_repo::find_by_number(pool, tenant_id, fiscal_year, period_no)
                .await
                .map_err(period_err)?
                .ok_or(PeriodServiceError::PeriodNotFound {
                    fiscal_year,
                    period_no,
                })?;
            Err(PeriodServiceError::NotOpen {
                fiscal_year,
                period_no,
                status: period.status,
            })
        }
    }
}

/// Close a locked period, sealing its journal totals
pub async fn close_period(
    pool: &PgPool,
    tenant_id: &str,
    fiscal_year: i32,
    period_no: i16,
    closed_by: &str,
) -> Result<FiscalPeriod, PeriodServiceError> {
    let period = period_repo::find_by_number(pool, tenant_id, fiscal_year, period_no)
        .await
        .map_err(period_err)?
        .ok_or(PeriodServiceError::PeriodNotFound {
            fiscal_year,
            period_no,
        })?;

    if period.status != PeriodStatus::Locked {
        return Err(PeriodServiceError::NotLocked {
            fiscal_year,
            period_no,
            status: period.status,
        });
    }

    let mut tx = pool.begin().await?;

    let (entry_count, total_debit_minor, total_credit_minor) =
        journal_repo::range_totals_tx(&mut tx, tenant_id, period.period_start, period.period_end)
            .await?;
    let close_hash = compute_close_hash(
        tenant_id,
        fiscal_year,
        period_no,
        entry_count,
        total_debit_minor,
        total_credit_minor,
    );

    let closed =
        period_repo::close_tx(&mut tx, tenant_id, fiscal_year, period_no, closed_by, &close_hash)
            .await
            .map_err(period_err)?;

    let Some(closed) = closed else {
        // Lost a race with another closer; abort without committing.
        return Err(PeriodServiceError::NotLocked {
            fiscal_year,
            period_no,
            status: PeriodStatus::Closed,
        });
    };

    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        fiscal_year = fiscal_year,
        period_no = period_no,
        entry_count = entry_count,
        close_hash = %close_hash,
        "Fiscal period closed and sealed"
    );

    Ok(closed)
}

/// Close a fiscal year once all twelve periods are closed.
///
/// Seals a year-level hash over the year's journal totals.
pub async fn close_fiscal_year(
    pool: &PgPool,
    tenant_id: &str,
    fiscal_year: i32,
) -> Result<YearCloseSummary, PeriodServiceError> {
    let periods = period_repo::list_year(pool, tenant_id, fiscal_year)
        .await
        .map_err(period_err)?;

    if periods.len() < 12 {
        return Err(PeriodServiceError::YearNotClosable {
            fiscal_year,
            unclosed: 12 - periods.len(),
        });
    }

    let unclosed = periods
        .iter()
        .filter(|p| p.status != PeriodStatus::Closed)
        .count();
    if unclosed > 0 {
        return Err(PeriodServiceError::YearNotClosable {
            fiscal_year,
            unclosed,
        });
    }

    let year_start = periods[0].period_start;
    let year_end = periods[11].period_end;

    let mut tx = pool.begin().await?;
    let (entry_count, total_debit_minor, total_credit_minor) =
        journal_repo::range_totals_tx(&mut tx, tenant_id, year_start, year_end).await?;
    tx.commit().await?;

    // Period 0 marks the year-level seal.
    let close_hash = compute_close_hash(
        tenant_id,
        fiscal_year,
        0,
        entry_count,
        total_debit_minor,
        total_credit_minor,
    );

    tracing::info!(
        tenant_id = %tenant_id,
        fiscal_year = fiscal_year,
        entry_count = entry_count,
        close_hash = %close_hash,
        "Fiscal year closed"
    );

    Ok(YearCloseSummary {
        fiscal_year,
        entry_count,
        total_debit_minor,
        total_credit_minor,
        close_hash,
    })
}

fn period_err(e: period_repo::PeriodError) -> PeriodServiceError {
    match e {
        period_repo::PeriodError::Database(e) => PeriodServiceError::Database(e),
        period_repo::PeriodError::NotFound {
            fiscal_year,
            period_no,
            ..
        } => PeriodServiceError::PeriodNotFound {
            fiscal_year,
            period_no,
        },
    }
}
