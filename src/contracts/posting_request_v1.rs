//! Posting Request V1 Contract Types
//!
//! The single entry point for recording a financial event. Producers compute
//! the debit/credit split for their domain event (revenue recognition, COGS,
//! receivable splits); the ledger only enforces the accounting invariants.

use serde::{Deserialize, Serialize};

use crate::repos::journal_repo::ReferenceType;

/// Payload for a journal posting request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostingRequestV1 {
    /// Tenant scope, supplied by the already-authenticated caller
    pub tenant_id: String,

    /// Accounting date for the journal entry (YYYY-MM-DD); defaults to today
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_date: Option<String>,

    /// Business event that originated this posting
    pub reference_type: ReferenceType,

    /// Identifier of the source document in the originating module
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,

    /// Human-readable description for the journal entry (1-500 chars)
    pub description: String,

    /// User recorded as the entry author
    pub created_by: String,

    /// Journal entry lines (must have at least 2 items)
    pub lines: Vec<EntryLineV1>,
}

/// A single line in a posting request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryLineV1 {
    /// Account code in the tenant's chart of accounts
    pub account_code: String,

    /// Debit amount in major units (must be >= 0)
    pub debit: f64,

    /// Credit amount in major units (must be >= 0)
    pub credit: f64,

    /// Optional line-level memo (<= 500 chars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}
