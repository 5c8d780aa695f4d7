//! Range-scoped account code generation.
//!
//! Each account type owns a fixed numeric range; codes are allocated from an
//! atomic per-(tenant, type) counter. A collision with an externally inserted
//! code is retried exactly once, then surfaced as a conflict for manual
//! intervention — looping would mask systemic corruption.

use sqlx::PgPool;
use thiserror::Error;

use crate::repos::account_repo::{self, AccountType};
use crate::repos::counter_repo;

/// Errors that can occur during code generation
#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("Account code range exhausted: tenant_id={tenant_id}, type={account_type:?}, next={next_code}")]
    RangeExhausted {
        tenant_id: String,
        account_type: AccountType,
        next_code: i64,
    },

    #[error("Code generation conflict after retry: tenant_id={tenant_id}, code={code}")]
    Conflict { tenant_id: String, code: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CodeGenError {
    pub fn code(&self) -> &'static str {
        match self {
            CodeGenError::RangeExhausted { .. } => "RANGE_EXHAUSTED",
            CodeGenError::Conflict { .. } => "CODE_GENERATION_CONFLICT",
            CodeGenError::Database(_) => "DATABASE",
        }
    }
}

/// Numeric code range for an account type
pub fn code_range(account_type: AccountType) -> (i64, i64) {
    match account_type {
        AccountType::Asset => (1000, 1999),
        AccountType::Liability => (2000, 2999),
        AccountType::Equity => (3000, 3999),
        AccountType::Revenue => (4000, 4999),
        AccountType::Expense => (5000, 5999),
    }
}

/// Allocate the next unique account code for (tenant, type).
///
/// One atomic counter increment per attempt; the double-check against live
/// accounts defends against codes inserted outside this generator.
pub async fn generate_code(
    pool: &PgPool,
    tenant_id: &str,
    account_type: AccountType,
) -> Result<String, CodeGenError> {
    let first = allocate_candidate(pool, tenant_id, account_type).await?;
    let code = match first {
        Allocation::Free(code) => return Ok(code),
        Allocation::Collision(code) => code,
    };

    tracing::warn!(
        tenant_id = %tenant_id,
        code = %code,
        "Generated account code collides with existing account, retrying once"
    );

    match allocate_candidate(pool, tenant_id, account_type).await? {
        Allocation::Free(code) => Ok(code),
        Allocation::Collision(code) => {
            tracing::error!(
                tenant_id = %tenant_id,
                code = %code,
                "Account code collision persisted after retry, manual intervention required"
            );
            Err(CodeGenError::Conflict {
                tenant_id: tenant_id.to_string(),
                code,
            })
        }
    }
}

enum Allocation {
    Free(String),
    Collision(String),
}

/// Take one counter value and check it against live accounts
async fn allocate_candidate(
    pool: &PgPool,
    tenant_id: &str,
    account_type: AccountType,
) -> Result<Allocation, CodeGenError> {
    let (range_start, range_end) = code_range(account_type);

    let counter = counter_repo::next_account_code(pool, tenant_id, account_type).await?;
    let numeric = range_start + counter;

    if numeric > range_end {
        tracing::error!(
            tenant_id = %tenant_id,
            account_type = ?account_type,
            next_code = numeric,
            "Account code range exhausted"
        );
        return Err(CodeGenError::RangeExhausted {
            tenant_id: tenant_id.to_string(),
            account_type,
            next_code: numeric,
        });
    }

    let code = numeric.to_string();

    let existing = account_repo::find_live_by_code(pool, tenant_id, &code)
        .await
        .map_err(|e| match e {
            account_repo::AccountError::Database(e) => CodeGenError::Database(e),
            // find_live_by_code returns Ok(None) for missing rows
            account_repo::AccountError::NotFound { .. } => {
                CodeGenError::Database(sqlx::Error::RowNotFound)
            }
        })?;

    match existing {
        None => Ok(Allocation::Free(code)),
        Some(_) => Ok(Allocation::Collision(code)),
    }
}
