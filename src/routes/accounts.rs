//! Chart-of-accounts API routes: CRUD, tree, balances.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repos::account_repo::{
    Account, AccountOrigin, AccountStatus, AccountType, NormalBalance,
};
use crate::routes::error::ApiError;
use crate::services::account_service::{self, AccountNode, CreateAccount, UpdateAccount};
use crate::services::balance_service;
use crate::validation;

/// Account response DTO (balances in major units)
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<String>,
    pub normal_balance: NormalBalance,
    pub parent_code: Option<String>,
    pub level: i16,
    pub allow_direct_posting: bool,
    pub is_system: bool,
    pub is_protected: bool,
    pub origin: AccountOrigin,
    pub status: AccountStatus,
    pub opening_balance: f64,
    pub current_balance: f64,
    pub balance_stale: bool,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            code: account.code,
            name: account.name,
            account_type: account.account_type,
            category: account.category,
            normal_balance: account.normal_balance,
            parent_code: account.parent_code,
            level: account.level,
            allow_direct_posting: account.allow_direct_posting,
            is_system: account.is_system,
            is_protected: account.is_protected,
            origin: account.origin,
            status: account.status,
            opening_balance: validation::to_major(account.opening_balance_minor),
            current_balance: validation::to_major(account.current_balance_minor),
            balance_stale: account.balance_calculated_at.is_none(),
        }
    }
}

/// Request body for creating an account
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub tenant_id: String,
    /// Omit to allocate a code from the type's numeric range
    pub code: Option<String>,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<String>,
    pub normal_balance: NormalBalance,
    pub parent_code: Option<String>,
    #[serde(default = "default_true")]
    pub allow_direct_posting: bool,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_protected: bool,
    #[serde(default = "default_origin")]
    pub origin: AccountOrigin,
    #[serde(default)]
    pub opening_balance: f64,
}

fn default_true() -> bool {
    true
}

/// Distinguish an absent field (skip the update) from an explicit null
/// (clear the value): present fields always land in the outer Some.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn default_origin() -> AccountOrigin {
    AccountOrigin::Manual
}

/// Handler for POST /api/accounts
pub async fn create_account(
    State(pool): State<Arc<PgPool>>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = account_service::create_account(
        &pool,
        CreateAccount {
            tenant_id: req.tenant_id,
            code: req.code,
            name: req.name,
            account_type: req.account_type,
            category: req.category,
            normal_balance: req.normal_balance,
            parent_code: req.parent_code,
            allow_direct_posting: req.allow_direct_posting,
            is_system: req.is_system,
            is_protected: req.is_protected,
            origin: req.origin,
            opening_balance: req.opening_balance,
        },
    )
    .await
    .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(account.into()))
}

/// Request body for updating an account
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub tenant_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    /// Present-and-null clears the parent; absent leaves it unchanged
    #[serde(default, deserialize_with = "deserialize_present")]
    pub parent_code: Option<Option<String>>,
    pub allow_direct_posting: Option<bool>,
    pub is_protected: Option<bool>,
    pub status: Option<AccountStatus>,
    #[serde(default)]
    pub elevated: bool,
}

/// Handler for PUT /api/accounts/{code}
pub async fn update_account(
    State(pool): State<Arc<PgPool>>,
    Path(code): Path<String>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = account_service::update_account(
        &pool,
        &req.tenant_id,
        &code,
        UpdateAccount {
            name: req.name,
            category: req.category,
            parent_code: req.parent_code,
            allow_direct_posting: req.allow_direct_posting,
            is_protected: req.is_protected,
            status: req.status,
            elevated: req.elevated,
        },
    )
    .await
    .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(account.into()))
}

/// Query parameters for deleting an account
#[derive(Debug, Deserialize)]
pub struct DeleteAccountQuery {
    pub tenant_id: String,
    pub deleted_by: String,
    #[serde(default)]
    pub elevated: bool,
}

/// Handler for DELETE /api/accounts/{code}
pub async fn delete_account(
    State(pool): State<Arc<PgPool>>,
    Path(code): Path<String>,
    Query(params): Query<DeleteAccountQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    account_service::delete_account(
        &pool,
        &params.tenant_id,
        &code,
        &params.deleted_by,
        params.elevated,
    )
    .await
    .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(serde_json::json!({ "deleted": code })))
}

/// Query parameters for the account tree
#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub tenant_id: String,
}

/// Handler for GET /api/accounts/tree
pub async fn get_account_tree(
    State(pool): State<Arc<PgPool>>,
    Query(params): Query<TreeQuery>,
) -> Result<Json<Vec<AccountNode>>, ApiError> {
    let tree = account_service::account_tree(&pool, &params.tenant_id)
        .await
        .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(tree))
}

/// Query parameters for a balance read
#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub tenant_id: String,
    /// Optional YYYY-MM-DD cutoff
    pub as_of: Option<String>,
}

/// Balance response (major units)
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_code: String,
    pub balance: f64,
    pub as_of: Option<String>,
}

/// Handler for GET /api/accounts/{code}/balance
///
/// Always derived from the journal, never the cache.
pub async fn get_balance(
    State(pool): State<Arc<PgPool>>,
    Path(code): Path<String>,
    Query(params): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let as_of = parse_opt_date(params.as_of.as_deref())?;

    let balance_minor =
        balance_service::calculate_balance(&pool, &params.tenant_id, &code, as_of)
            .await
            .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(BalanceResponse {
        account_code: code,
        balance: validation::to_major(balance_minor),
        as_of: params.as_of,
    }))
}

/// Handler for POST /api/accounts/{code}/recalculate
pub async fn recalculate_balance(
    State(pool): State<Arc<PgPool>>,
    Path(code): Path<String>,
    Query(params): Query<TreeQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance_minor = balance_service::recalculate_and_cache(&pool, &params.tenant_id, &code)
        .await
        .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(BalanceResponse {
        account_code: code,
        balance: validation::to_major(balance_minor),
        as_of: None,
    }))
}

/// Handler for POST /api/accounts/recalculate-all
pub async fn recalculate_all(
    State(pool): State<Arc<PgPool>>,
    Query(params): Query<TreeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = balance_service::recalculate_all(&pool, &params.tenant_id)
        .await
        .map_err(|e| ApiError::new(e.code(), e.to_string()))?;

    Ok(Json(serde_json::json!({ "recalculated": updated })))
}

pub(crate) fn parse_opt_date(value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| ApiError::validation(format!("Invalid date {}: {}", s, e))),
    }
}
