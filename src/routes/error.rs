//! HTTP error envelope for route handlers.
//!
//! Service errors carry a stable string code; this module maps each code to
//! an HTTP status so callers can distinguish temporal locks (409) from
//! missing references (404), permission-adjacent failures (403), and
//! malformed input (400).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Error wrapper carrying the HTTP status alongside the ledger error code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(code: &'static str, message: String) -> Self {
        ApiError {
            status: status_for(code),
            code,
            message,
        }
    }

    pub fn validation(message: String) -> Self {
        ApiError::new("VALIDATION", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

/// HTTP status for a ledger error code
fn status_for(code: &str) -> StatusCode {
    match code {
        "VALIDATION" | "UNBALANCED_ENTRY" | "ZERO_AMOUNT_ENTRY" => StatusCode::BAD_REQUEST,
        "ACCOUNT_NOT_FOUND" | "ENTRY_NOT_FOUND" | "PERIOD_NOT_FOUND" => StatusCode::NOT_FOUND,
        "PROTECTED_ACCOUNT" => StatusCode::FORBIDDEN,
        "PARENT_ACCOUNT_POSTING_DENIED"
        | "PERIOD_CLOSED"
        | "RECONCILIATION_LOCKED"
        | "BEFORE_RECONCILED_DATE"
        | "ALREADY_LOCKED"
        | "NOT_LOCK_OWNER"
        | "NOT_LOCKED"
        | "ALREADY_REVERSED"
        | "INVALID_STATUS"
        | "DUPLICATE_CODE"
        | "PARENT_NOT_SUMMARY"
        | "HAS_CHILDREN_CANNOT_POST"
        | "HAS_SUBACCOUNTS"
        | "NONZERO_BALANCE"
        | "PERIODS_EXIST"
        | "PERIOD_NOT_OPEN"
        | "PERIOD_NOT_LOCKED"
        | "YEAR_NOT_CLOSABLE" => StatusCode::CONFLICT,
        // RANGE_EXHAUSTED, CODE_GENERATION_CONFLICT, DATABASE: operator attention
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for("UNBALANCED_ENTRY"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("ACCOUNT_NOT_FOUND"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("PROTECTED_ACCOUNT"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("RECONCILIATION_LOCKED"), StatusCode::CONFLICT);
        assert_eq!(status_for("PERIOD_CLOSED"), StatusCode::CONFLICT);
        assert_eq!(
            status_for("CODE_GENERATION_CONFLICT"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
