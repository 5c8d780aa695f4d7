//! Reversal service for backing out posted journal entries.
//!
//! A reversal never edits the original entry's lines. It posts a new entry
//! with every line's debit/credit swapped, links the two entries, and flips
//! the original's status — all in one transaction. The `status = 'posted'`
//! guard on the flip makes a concurrent double-reversal lose cleanly.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::counter_repo;
use crate::repos::journal_repo::{
    self, EntryStatus, JournalEntry, JournalLineInsert, NewJournalEntry,
};
use crate::services::posting_service::{self, PostingError};
use crate::services::reconciliation_service;

/// Errors that can occur during reversal operations
#[derive(Debug, thiserror::Error)]
pub enum ReversalError {
    #[error("Original entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Entry already reversed: {0}")]
    AlreadyReversed(Uuid),

    #[error("Entry {entry_id} has status {status:?} and cannot be reversed")]
    InvalidStatus {
        entry_id: Uuid,
        status: EntryStatus,
    },

    #[error(transparent)]
    Posting(#[from] PostingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ReversalError {
    /// Stable error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            ReversalError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            ReversalError::AlreadyReversed(_) => "ALREADY_REVERSED",
            ReversalError::InvalidStatus { .. } => "INVALID_STATUS",
            ReversalError::Posting(p) => p.code(),
            ReversalError::Database(_) => "DATABASE",
        }
    }
}

/// Result type for reversal operations
pub type ReversalResult<T> = Result<T, ReversalError>;

/// Create a reversal entry for a posted journal entry.
///
/// The reversal posts on the current date and passes through the same
/// period and reconciliation guards as any posting.
pub async fn reverse_entry(
    pool: &PgPool,
    tenant_id: &str,
    entry_id: Uuid,
    reason: &str,
    requested_by: &str,
) -> ReversalResult<JournalEntry> {
    let (original, original_lines) = journal_repo::fetch_entry_with_lines(pool, tenant_id, entry_id)
        .await?
        .ok_or(ReversalError::EntryNotFound(entry_id))?;

    match original.status {
        EntryStatus::Posted => {}
        EntryStatus::Reversed => return Err(ReversalError::AlreadyReversed(entry_id)),
        status => {
            return Err(ReversalError::InvalidStatus { entry_id, status });
        }
    }

    let entry_date = Utc::now().date_naive();

    let mut tx = pool.begin().await?;

    posting_service::assert_period_open_tx(&mut tx, tenant_id, entry_date).await?;

    let now = Utc::now();
    let mut resolved = Vec::with_capacity(original_lines.len());
    for line in &original_lines {
        let account =
            posting_service::resolve_for_posting_tx(&mut tx, tenant_id, &line.account_code).await?;

        if account.is_summary() {
            return Err(ReversalError::Posting(PostingError::DirectPostingDenied {
                code: account.code,
            }));
        }

        reconciliation_service::check_posting_allowed(&account, entry_date, now).map_err(|e| {
            match e {
                reconciliation_service::ReconError::ReconciliationLocked { code, locked_by } => {
                    ReversalError::Posting(PostingError::ReconciliationLocked { code, locked_by })
                }
                reconciliation_service::ReconError::BeforeReconciledDate {
                    code,
                    entry_date,
                    boundary,
                } => ReversalError::Posting(PostingError::BeforeReconciledDate {
                    code,
                    entry_date,
                    boundary,
                }),
                other => ReversalError::Database(sqlx::Error::Protocol(other.to_string())),
            }
        })?;

        resolved.push(account);
    }

    let prefix = original.reference_type.prefix();
    let seq = counter_repo::next_entry_seq_tx(&mut tx, tenant_id, prefix, entry_date).await?;
    let entry_number = posting_service::format_entry_number(prefix, entry_date, seq);

    let reversal = journal_repo::insert_entry_tx(
        &mut tx,
        &NewJournalEntry {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            entry_number,
            entry_date,
            reference_type: original.reference_type,
            reference_id: original.reference_id.clone(),
            description: Some(format!(
                "Reversal of {}: {}",
                original.entry_number, reason
            )),
            // Swapped on purpose; equal for a balanced entry but kept
            // consistent with the swapped lines.
            total_debit_minor: original.total_credit_minor,
            total_credit_minor: original.total_debit_minor,
            reverses_entry_id: Some(original.id),
            reversal_reason: Some(reason.to_string()),
            created_by: requested_by.to_string(),
        },
    )
    .await?;

    let reversal_lines: Vec<JournalLineInsert> = original_lines
        .iter()
        .map(|line| JournalLineInsert {
            id: Uuid::new_v4(),
            line_no: line.line_no,
            account_code: line.account_code.clone(),
            account_name: line.account_name.clone(),
            debit_minor: line.credit_minor,
            credit_minor: line.debit_minor,
            memo: line.memo.as_ref().map(|m| format!("REVERSAL: {}", m)),
        })
        .collect();

    journal_repo::bulk_insert_lines_tx(&mut tx, reversal.id, reversal_lines).await?;

    let flipped =
        journal_repo::mark_reversed_tx(&mut tx, tenant_id, original.id, reversal.id, reason)
            .await?;
    if flipped == 0 {
        // Someone reversed it between our read and this statement; abort.
        return Err(ReversalError::AlreadyReversed(entry_id));
    }

    posting_service::invalidate_touched_accounts_tx(&mut tx, tenant_id, &resolved).await?;

    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        original_entry_id = %original.id,
        reversal_entry_id = %reversal.id,
        reversal_entry_number = %reversal.entry_number,
        requested_by = %requested_by,
        "Journal entry reversed"
    );

    Ok(reversal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversal_error_codes() {
        let err = ReversalError::EntryNotFound(Uuid::new_v4());
        assert_eq!(err.code(), "ENTRY_NOT_FOUND");

        let err = ReversalError::InvalidStatus {
            entry_id: Uuid::new_v4(),
            status: EntryStatus::Cancelled,
        };
        assert_eq!(err.code(), "INVALID_STATUS");
        assert!(err.to_string().contains("Cancelled"));
    }
}
