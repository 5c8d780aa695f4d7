//! Journal entry API routes: post, reverse, fetch.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::posting_request_v1::PostingRequestV1;
use crate::contracts::reverse_request_v1::ReverseRequestV1;
use crate::repos::journal_repo::{self, EntryStatus, JournalEntry, JournalLine, ReferenceType};
use crate::routes::error::ApiError;
use crate::services::{posting_service, reversal_service};
use crate::validation;

/// Journal entry response DTO (amounts in major units)
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: Uuid,
    pub tenant_id: String,
    pub entry_number: String,
    pub entry_date: String,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub status: EntryStatus,
    pub total_debit: f64,
    pub total_credit: f64,
    pub reverses_entry_id: Option<Uuid>,
    pub reversed_by_entry_id: Option<Uuid>,
    pub created_by: String,
}

impl From<JournalEntry> for EntryResponse {
    fn from(entry: JournalEntry) -> Self {
        EntryResponse {
            id: entry.id,
            tenant_id: entry.tenant_id,
            entry_number: entry.entry_number,
            entry_date: entry.entry_date.to_string(),
            reference_type: entry.reference_type,
            reference_id: entry.reference_id,
            description: entry.description,
            status: entry.status,
            total_debit: validation::to_major(entry.total_debit_minor),
            total_credit: validation::to_major(entry.total_credit_minor),
            reverses_entry_id: entry.reverses_entry_id,
            reversed_by_entry_id: entry.reversed_by_entry_id,
            created_by: entry.created_by,
        }
    }
}

/// Journal line response DTO
#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub line_no: i32,
    pub account_code: String,
    pub account_name: String,
    pub debit: f64,
    pub credit: f64,
    pub memo: Option<String>,
}

impl From<JournalLine> for LineResponse {
    fn from(line: JournalLine) -> Self {
        LineResponse {
            line_no: line.line_no,
            account_code: line.account_code,
            account_name: line.account_name,
            debit: validation::to_major(line.debit_minor),
            credit: validation::to_major(line.credit_minor),
            memo: line.memo,
        }
    }
}

/// Entry with lines
#[derive(Debug, Serialize)]
pub struct EntryDetailResponse {
    #[serde(flatten)]
    pub entry: EntryResponse,
    pub lines: Vec<LineResponse>,
}

/// Handler for POST /api/ledger/entries
pub async fn post_entry(
    State(pool): State<Arc<PgPool>>,
    Json(payload): Json<PostingRequestV1>,
) -> Result<Json<EntryResponse>, ApiError> {
    let entry = posting_service::post_entry(&pool, &payload)
        .await
        .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(entry.into()))
}

/// Handler for POST /api/ledger/entries/{entry_id}/reverse
pub async fn reverse_entry(
    State(pool): State<Arc<PgPool>>,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<ReverseRequestV1>,
) -> Result<Json<EntryResponse>, ApiError> {
    let reversal = reversal_service::reverse_entry(
        &pool,
        &payload.tenant_id,
        entry_id,
        &payload.reason,
        &payload.requested_by,
    )
    .await
    .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(reversal.into()))
}

/// Query parameters for fetching an entry
#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub tenant_id: String,
}

/// Handler for GET /api/ledger/entries/{entry_id}
pub async fn get_entry(
    State(pool): State<Arc<PgPool>>,
    Path(entry_id): Path<Uuid>,
    Query(params): Query<EntryQuery>,
) -> Result<Json<EntryDetailResponse>, ApiError> {
    let found = journal_repo::fetch_entry_with_lines(&pool, &params.tenant_id, entry_id)
        .await
        .map_err(|e| ApiError::new("DATABASE", e.to_string()))?;

    let (entry, lines) = found.ok_or_else(|| {
        ApiError::new("ENTRY_NOT_FOUND", format!("Entry not found: {}", entry_id))
    })?;

    Ok(Json(EntryDetailResponse {
        entry: entry.into(),
        lines: lines.into_iter().map(Into::into).collect(),
    }))
}
