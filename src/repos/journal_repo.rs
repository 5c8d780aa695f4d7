//! Repository for journal entries and lines.
//!
//! The journal is append-only: lines are never updated once posted, and the
//! only header mutation is the status flip performed by the reversal flow.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Journal entry lifecycle matching database entry_status
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "entry_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
    Cancelled,
}

/// Business event that originated a posting, matching database reference_type
#[derive(Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(type_name = "reference_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    Purchase,
    Payment,
    Expense,
    Inventory,
    Adjustment,
    Manual,
    OpeningBalance,
    PeriodClosing,
}

impl ReferenceType {
    /// Entry-number prefix for this reference type
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceType::Sale => "SAL",
            ReferenceType::Purchase => "PUR",
            ReferenceType::Payment => "PAY",
            ReferenceType::Expense => "EXP",
            ReferenceType::Inventory => "INV",
            ReferenceType::Adjustment => "ADJ",
            ReferenceType::Manual => "JV",
            ReferenceType::OpeningBalance => "OB",
            ReferenceType::PeriodClosing => "PCL",
        }
    }
}

/// Journal entry header
#[derive(Debug, Clone, FromRow)]
pub struct JournalEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub status: EntryStatus,
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
    pub reverses_entry_id: Option<Uuid>,
    pub reversed_by_entry_id: Option<Uuid>,
    pub reversal_reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Journal line (read model)
#[derive(Debug, Clone, FromRow)]
pub struct JournalLine {
    pub id: Uuid,
    pub journal_entry_id: Uuid,
    pub line_no: i32,
    pub account_code: String,
    pub account_name: String,
    pub debit_minor: i64,
    pub credit_minor: i64,
    pub memo: Option<String>,
}

/// Fields for inserting a journal entry header
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub total_debit_minor: i64,
    pub total_credit_minor: i64,
    pub reverses_entry_id: Option<Uuid>,
    pub reversal_reason: Option<String>,
    pub created_by: String,
}

/// Fields for inserting a journal line
#[derive(Debug, Clone)]
pub struct JournalLineInsert {
    pub id: Uuid,
    pub line_no: i32,
    pub account_code: String,
    pub account_name: String,
    pub debit_minor: i64,
    pub credit_minor: i64,
    pub memo: Option<String>,
}

/// Insert a journal entry header as `posted`
pub async fn insert_entry_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry: &NewJournalEntry,
) -> Result<JournalEntry, sqlx::Error> {
    let stored = sqlx::query_as::<_, JournalEntry>(
        r#"
        INSERT INTO journal_entries
            (id, tenant_id, entry_number, entry_date, reference_type, reference_id,
             description, status, total_debit_minor, total_credit_minor,
             reverses_entry_id, reversal_reason, created_by, posted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'posted', $8, $9, $10, $11, $12, NOW())
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(&entry.tenant_id)
    .bind(&entry.entry_number)
    .bind(entry.entry_date)
    .bind(entry.reference_type)
    .bind(&entry.reference_id)
    .bind(&entry.description)
    .bind(entry.total_debit_minor)
    .bind(entry.total_credit_minor)
    .bind(entry.reverses_entry_id)
    .bind(&entry.reversal_reason)
    .bind(&entry.created_by)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stored)
}

/// Bulk insert journal lines for an entry
pub async fn bulk_insert_lines_tx(
    tx: &mut Transaction<'_, Postgres>,
    journal_entry_id: Uuid,
    lines: Vec<JournalLineInsert>,
) -> Result<(), sqlx::Error> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO journal_lines
                (id, journal_entry_id, line_no, account_code, account_name,
                 debit_minor, credit_minor, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(line.id)
        .bind(journal_entry_id)
        .bind(line.line_no)
        .bind(&line.account_code)
        .bind(&line.account_name)
        .bind(line.debit_minor)
        .bind(line.credit_minor)
        .bind(&line.memo)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Fetch a tenant's journal entry by id with its lines
pub async fn fetch_entry_with_lines(
    pool: &PgPool,
    tenant_id: &str,
    entry_id: Uuid,
) -> Result<Option<(JournalEntry, Vec<JournalLine>)>, sqlx::Error> {
    let entry = sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT * FROM journal_entries
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(entry_id)
    .fetch_optional(pool)
    .await?;

    let Some(entry) = entry else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, JournalLine>(
        r#"
        SELECT * FROM journal_lines
        WHERE journal_entry_id = $1
        ORDER BY line_no
        "#,
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await?;

    Ok(Some((entry, lines)))
}

/// Flip a posted entry to `reversed`, recording the reversing entry.
///
/// The `status = 'posted'` guard makes concurrent double-reversal a no-op for
/// the loser; callers must treat 0 affected rows as a conflict.
pub async fn mark_reversed_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    entry_id: Uuid,
    reversed_by_entry_id: Uuid,
    reason: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE journal_entries
        SET status = 'reversed', reversed_by_entry_id = $3, reversal_reason = $4
        WHERE tenant_id = $1 AND id = $2 AND status = 'posted'
        "#,
    )
    .bind(tenant_id)
    .bind(entry_id)
    .bind(reversed_by_entry_id)
    .bind(reason)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Posted debit/credit totals for one account code, optionally as of a date.
///
/// This replay over the journal is the authoritative source for balances;
/// the cache on the account row is derived from it.
pub async fn account_totals(
    pool: &PgPool,
    tenant_id: &str,
    account_code: &str,
    as_of: Option<NaiveDate>,
) -> Result<(i64, i64), sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT COALESCE(SUM(jl.debit_minor), 0)::BIGINT,
               COALESCE(SUM(jl.credit_minor), 0)::BIGINT
        FROM journal_lines jl
        INNER JOIN journal_entries je ON je.id = jl.journal_entry_id
        WHERE je.tenant_id = $1
          AND jl.account_code = $2
          AND je.status = 'posted'
          AND ($3::date IS NULL OR je.entry_date <= $3)
        "#,
    )
    .bind(tenant_id)
    .bind(account_code)
    .bind(as_of)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Per-account posted totals for a whole tenant in one pass.
///
/// Feeds trial balance and bulk recalculation without issuing one aggregate
/// query per account.
pub async fn account_totals_bulk(
    pool: &PgPool,
    tenant_id: &str,
    as_of: Option<NaiveDate>,
) -> Result<Vec<(String, i64, i64)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT jl.account_code,
               COALESCE(SUM(jl.debit_minor), 0)::BIGINT,
               COALESCE(SUM(jl.credit_minor), 0)::BIGINT
        FROM journal_lines jl
        INNER JOIN journal_entries je ON je.id = jl.journal_entry_id
        WHERE je.tenant_id = $1
          AND je.status = 'posted'
          AND ($2::date IS NULL OR je.entry_date <= $2)
        GROUP BY jl.account_code
        ORDER BY jl.account_code
        "#,
    )
    .bind(tenant_id)
    .bind(as_of)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per-account posted totals restricted to a date range.
///
/// Feeds profit-and-loss style reports that only look at a window of the
/// journal rather than its full history.
pub async fn account_totals_bulk_between(
    pool: &PgPool,
    tenant_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<(String, i64, i64)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT jl.account_code,
               COALESCE(SUM(jl.debit_minor), 0)::BIGINT,
               COALESCE(SUM(jl.credit_minor), 0)::BIGINT
        FROM journal_lines jl
        INNER JOIN journal_entries je ON je.id = jl.journal_entry_id
        WHERE je.tenant_id = $1
          AND je.status = 'posted'
          AND je.entry_date >= $2
          AND je.entry_date <= $3
        GROUP BY jl.account_code
        ORDER BY jl.account_code
        "#,
    )
    .bind(tenant_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Posted entry count and debit/credit totals over a date range.
///
/// Used by fiscal-year close sealing.
pub async fn range_totals_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(i64, i64, i64), sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT COUNT(DISTINCT je.id)::BIGINT,
               COALESCE(SUM(jl.debit_minor), 0)::BIGINT,
               COALESCE(SUM(jl.credit_minor), 0)::BIGINT
        FROM journal_entries je
        LEFT JOIN journal_lines jl ON jl.journal_entry_id = je.id
        WHERE je.tenant_id = $1
          AND je.status = 'posted'
          AND je.entry_date >= $2
          AND je.entry_date <= $3
        "#,
    )
    .bind(tenant_id)
    .bind(from)
    .bind(to)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_type_prefixes_are_distinct() {
        let all = [
            ReferenceType::Sale,
            ReferenceType::Purchase,
            ReferenceType::Payment,
            ReferenceType::Expense,
            ReferenceType::Inventory,
            ReferenceType::Adjustment,
            ReferenceType::Manual,
            ReferenceType::OpeningBalance,
            ReferenceType::PeriodClosing,
        ];
        let mut prefixes: Vec<&str> = all.iter().map(|r| r.prefix()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), all.len());
    }

    #[test]
    fn test_reference_type_serde_snake_case() {
        let json = serde_json::to_string(&ReferenceType::OpeningBalance).unwrap();
        assert_eq!(json, r#""opening_balance""#);
        let back: ReferenceType = serde_json::from_str(r#""period_closing""#).unwrap();
        assert_eq!(back, ReferenceType::PeriodClosing);
    }
}
