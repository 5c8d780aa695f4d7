//! Fiscal period governance API routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repos::period_repo::{self, FiscalPeriod, PeriodStatus};
use crate::routes::error::ApiError;
use crate::services::period_service::{self, YearCloseSummary};

/// Fiscal period response DTO
#[derive(Debug, Serialize)]
pub struct PeriodResponse {
    pub fiscal_year: i32,
    pub period_no: i16,
    pub period_start: String,
    pub period_end: String,
    pub status: PeriodStatus,
    pub close_hash: Option<String>,
}

impl From<FiscalPeriod> for PeriodResponse {
    fn from(period: FiscalPeriod) -> Self {
        PeriodResponse {
            fiscal_year: period.fiscal_year,
            period_no: period.period_no,
            period_start: period.period_start.to_string(),
            period_end: period.period_end.to_string(),
            status: period.status,
            close_hash: period.close_hash,
        }
    }
}

/// Request body for period mutations
#[derive(Debug, Deserialize)]
pub struct PeriodActionRequest {
    pub tenant_id: String,
    pub user_id: String,
}

/// Request body for generating a fiscal year
#[derive(Debug, Deserialize)]
pub struct GeneratePeriodsRequest {
    pub tenant_id: String,
    pub fiscal_year: i32,
}

/// Handler for POST /api/periods/generate
pub async fn generate_periods(
    State(pool): State<Arc<PgPool>>,
    Json(req): Json<GeneratePeriodsRequest>,
) -> Result<Json<Vec<PeriodResponse>>, ApiError> {
    let periods = period_service::generate_periods(&pool, &req.tenant_id, req.fiscal_year)
        .await
        .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(periods.into_iter().map(Into::into).collect()))
}

/// Query parameters for listing periods
#[derive(Debug, Deserialize)]
pub struct ListPeriodsQuery {
    pub tenant_id: String,
    pub fiscal_year: i32,
}

/// Handler for GET /api/periods
pub async fn list_periods(
    State(pool): State<Arc<PgPool>>,
    Query(params): Query<ListPeriodsQuery>,
) -> Result<Json<Vec<PeriodResponse>>, ApiError> {
    let periods = period_repo::list_year(&pool, &params.tenant_id, params.fiscal_year)
        .await
        .map_err(|e| ApiError::new("DATABASE", e.to_string()))?;

    Ok(Json(periods.into_iter().map(Into::into).collect()))
}

/// Handler for POST /api/periods/{fiscal_year}/{period_no}/lock
pub async fn lock_period(
    State(pool): State<Arc<PgPool>>,
    Path((fiscal_year, period_no)): Path<(i32, i16)>,
    Json(req): Json<PeriodActionRequest>,
) -> Result<Json<PeriodResponse>, ApiError> {
    let period =
        period_service::lock_period(&pool, &req.tenant_id, fiscal_year, period_no, &req.user_id)
            .await
            .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(period.into()))
}

/// Handler for POST /api/periods/{fiscal_year}/{period_no}/close
pub async fn close_period(
    State(pool): State<Arc<PgPool>>,
    Path((fiscal_year, period_no)): Path<(i32, i16)>,
    Json(req): Json<PeriodActionRequest>,
) -> Result<Json<PeriodResponse>, ApiError> {
    let period =
        period_service::close_period(&pool, &req.tenant_id, fiscal_year, period_no, &req.user_id)
            .await
            .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(period.into()))
}

/// Handler for POST /api/fiscal-years/{fiscal_year}/close
pub async fn close_fiscal_year(
    State(pool): State<Arc<PgPool>>,
    Path(fiscal_year): Path<i32>,
    Json(req): Json<PeriodActionRequest>,
) -> Result<Json<YearCloseSummary>, ApiError> {
    let summary = period_service::close_fiscal_year(&pool, &req.tenant_id, fiscal_year)
        .await
        .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(summary))
}
