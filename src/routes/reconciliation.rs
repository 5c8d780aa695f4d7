//! Reconciliation lock API routes.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repos::account_repo::ReconStatus;
use crate::routes::accounts::parse_opt_date;
use crate::routes::error::ApiError;
use crate::services::reconciliation_service;
use crate::validation;

/// Request body for acquiring a reconciliation lock
#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub tenant_id: String,
    pub user_id: String,
    /// Lease length; defaults to 60 minutes
    pub lock_minutes: Option<i64>,
    /// Optional locked date range (YYYY-MM-DD)
    pub lock_start: Option<String>,
    pub lock_end: Option<String>,
}

/// Reconciliation state response
#[derive(Debug, Serialize)]
pub struct ReconResponse {
    pub account_code: String,
    pub recon_status: ReconStatus,
    pub locked_by: Option<String>,
    pub lock_expires_at: Option<String>,
    pub reconciled_up_to: Option<String>,
}

/// Handler for POST /api/accounts/{code}/reconciliation/lock
pub async fn lock_account(
    State(pool): State<Arc<PgPool>>,
    Path(code): Path<String>,
    Json(req): Json<LockRequest>,
) -> Result<Json<ReconResponse>, ApiError> {
    let lock_start = parse_opt_date(req.lock_start.as_deref())?;
    let lock_end = parse_opt_date(req.lock_end.as_deref())?;

    let account = reconciliation_service::lock_account(
        &pool,
        &req.tenant_id,
        &code,
        &req.user_id,
        req.lock_minutes,
        lock_start,
        lock_end,
    )
    .await
    .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(ReconResponse {
        account_code: account.code,
        recon_status: account.recon_status,
        locked_by: account.recon_locked_by,
        lock_expires_at: account.recon_lock_expires_at.map(|t| t.to_rfc3339()),
        reconciled_up_to: account.reconciled_up_to.map(|d| d.to_string()),
    }))
}

/// Request body for releasing a reconciliation lock
#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub tenant_id: String,
    pub user_id: String,
    /// `reconciled` or `discrepancy`
    pub outcome: ReconStatus,
    /// Watermark date below which postings are rejected from now on
    pub reconciled_up_to: Option<String>,
    /// Discrepancy amount in major units, when outcome is `discrepancy`
    pub discrepancy_amount: Option<f64>,
    pub note: Option<String>,
}

/// Handler for POST /api/accounts/{code}/reconciliation/unlock
pub async fn unlock_account(
    State(pool): State<Arc<PgPool>>,
    Path(code): Path<String>,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<ReconResponse>, ApiError> {
    let reconciled_up_to = parse_opt_date(req.reconciled_up_to.as_deref())?;

    let account = reconciliation_service::unlock_account(
        &pool,
        &req.tenant_id,
        &code,
        &req.user_id,
        req.outcome,
        reconciled_up_to,
        req.discrepancy_amount.map(validation::to_minor),
        req.note.as_deref(),
    )
    .await
    .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(ReconResponse {
        account_code: account.code,
        recon_status: account.recon_status,
        locked_by: account.recon_locked_by,
        lock_expires_at: account.recon_lock_expires_at.map(|t| t.to_rfc3339()),
        reconciled_up_to: account.reconciled_up_to.map(|d| d.to_string()),
    }))
}
