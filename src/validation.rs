//! Validation logic for posting requests.
//!
//! Every posting, whatever business event produced it, passes through this
//! module before anything is written. Amounts arrive in major units and are
//! rounded to minor units (cents) here; all downstream math is integer.

use crate::contracts::posting_request_v1::{EntryLineV1, PostingRequestV1};
use thiserror::Error;

/// Balance tolerance in minor units (one cent), guarding against
/// floating-point rounding at the contract boundary.
pub const BALANCE_TOLERANCE_MINOR: i64 = 1;

/// Convert a major-unit amount to minor units
pub fn to_minor(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Convert minor units back to a major-unit amount
pub fn to_major(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// Validation errors for posting requests
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Lines must have at least 2 items, got {0}")]
    InsufficientLines(usize),

    #[error("Description must be between 1 and 500 characters, got {0} characters")]
    InvalidDescriptionLength(usize),

    #[error("Line {0}: account_code cannot be empty")]
    EmptyAccountCode(usize),

    #[error("Line {0}: debit must be non-negative, got {1}")]
    NegativeDebit(usize, f64),

    #[error("Line {0}: credit must be non-negative, got {1}")]
    NegativeCredit(usize, f64),

    #[error("Line {0}: exactly one of debit/credit must be set, got debit={1} credit={2}")]
    BothSidesSet(usize, f64, f64),

    #[error("Line {0}: either debit or credit must be positive")]
    NeitherSideSet(usize),

    #[error("Line {0}: memo exceeds 500 characters, got {1}")]
    MemoTooLong(usize, usize),

    #[error("Total debits ({0}) must equal total credits ({1})")]
    Unbalanced(f64, f64),

    #[error("Entry totals must be positive, got debit={0} credit={1}")]
    ZeroAmount(f64, f64),
}

/// Validate a posting request payload
///
/// # Validation Rules
///
/// - `description`: 1-500 characters
/// - `lines`: at least 2 items
/// - Each line: non-empty account code, debit >= 0, credit >= 0, exactly one
///   side positive, memo <= 500 characters if present
/// - Totals, rounded to minor units: debits equal credits within one cent,
///   and both positive
pub fn validate_posting_request(payload: &PostingRequestV1) -> Result<(), ValidationError> {
    let desc_len = payload.description.len();
    if desc_len == 0 || desc_len > 500 {
        return Err(ValidationError::InvalidDescriptionLength(desc_len));
    }

    if payload.lines.len() < 2 {
        return Err(ValidationError::InsufficientLines(payload.lines.len()));
    }

    let mut total_debit_minor: i64 = 0;
    let mut total_credit_minor: i64 = 0;

    for (idx, line) in payload.lines.iter().enumerate() {
        validate_entry_line(line, idx)?;
        total_debit_minor += to_minor(line.debit);
        total_credit_minor += to_minor(line.credit);
    }

    if (total_debit_minor - total_credit_minor).abs() > BALANCE_TOLERANCE_MINOR {
        return Err(ValidationError::Unbalanced(
            to_major(total_debit_minor),
            to_major(total_credit_minor),
        ));
    }

    if total_debit_minor <= 0 || total_credit_minor <= 0 {
        return Err(ValidationError::ZeroAmount(
            to_major(total_debit_minor),
            to_major(total_credit_minor),
        ));
    }

    Ok(())
}

/// Validate a single line
fn validate_entry_line(line: &EntryLineV1, index: usize) -> Result<(), ValidationError> {
    if line.account_code.trim().is_empty() {
        return Err(ValidationError::EmptyAccountCode(index));
    }

    if line.debit < 0.0 {
        return Err(ValidationError::NegativeDebit(index, line.debit));
    }

    if line.credit < 0.0 {
        return Err(ValidationError::NegativeCredit(index, line.credit));
    }

    let has_debit = to_minor(line.debit) > 0;
    let has_credit = to_minor(line.credit) > 0;

    if has_debit && has_credit {
        return Err(ValidationError::BothSidesSet(index, line.debit, line.credit));
    }
    if !has_debit && !has_credit {
        return Err(ValidationError::NeitherSideSet(index));
    }

    if let Some(ref memo) = line.memo {
        if memo.len() > 500 {
            return Err(ValidationError::MemoTooLong(index, memo.len()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::journal_repo::ReferenceType;

    fn line(code: &str, debit: f64, credit: f64) -> EntryLineV1 {
        EntryLineV1 {
            account_code: code.to_string(),
            debit,
            credit,
            memo: None,
        }
    }

    fn create_valid_payload() -> PostingRequestV1 {
        PostingRequestV1 {
            tenant_id: "tenant_001".to_string(),
            entry_date: Some("2026-02-11".to_string()),
            reference_type: ReferenceType::Sale,
            reference_id: Some("inv_123".to_string()),
            description: "Test invoice".to_string(),
            created_by: "user_1".to_string(),
            lines: vec![line("1100", 100.0, 0.0), line("4000", 0.0, 100.0)],
        }
    }

    #[test]
    fn test_valid_payload() {
        assert!(validate_posting_request(&create_valid_payload()).is_ok());
    }

    #[test]
    fn test_empty_description() {
        let mut payload = create_valid_payload();
        payload.description = "".to_string();
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::InvalidDescriptionLength(0))
        );
    }

    #[test]
    fn test_description_too_long() {
        let mut payload = create_valid_payload();
        payload.description = "x".repeat(501);
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::InvalidDescriptionLength(501))
        );
    }

    #[test]
    fn test_insufficient_lines() {
        let mut payload = create_valid_payload();
        payload.lines.truncate(1);
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::InsufficientLines(1))
        );
    }

    #[test]
    fn test_empty_account_code() {
        let mut payload = create_valid_payload();
        payload.lines[0].account_code = "  ".to_string();
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::EmptyAccountCode(0))
        );
    }

    #[test]
    fn test_negative_debit() {
        let mut payload = create_valid_payload();
        payload.lines[0].debit = -50.0;
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::NegativeDebit(0, -50.0))
        );
    }

    #[test]
    fn test_both_sides_set() {
        let mut payload = create_valid_payload();
        payload.lines[0].credit = 25.0;
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::BothSidesSet(0, 100.0, 25.0))
        );
    }

    #[test]
    fn test_neither_side_set() {
        let mut payload = create_valid_payload();
        payload.lines[0].debit = 0.0;
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::NeitherSideSet(0))
        );
    }

    #[test]
    fn test_memo_too_long() {
        let mut payload = create_valid_payload();
        payload.lines[0].memo = Some("x".repeat(501));
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::MemoTooLong(0, 501))
        );
    }

    #[test]
    fn test_unbalanced_entry() {
        let mut payload = create_valid_payload();
        payload.lines[1].credit = 50.0;
        assert_eq!(
            validate_posting_request(&payload),
            Err(ValidationError::Unbalanced(100.0, 50.0))
        );
    }

    #[test]
    fn test_one_cent_difference_tolerated() {
        let mut payload = create_valid_payload();
        payload.lines[1].credit = 99.99;
        assert!(validate_posting_request(&payload).is_ok());
    }

    #[test]
    fn test_zero_amount_entry() {
        // Two lines that cancel to zero on both sides are rejected even
        // though they technically balance.
        let mut payload = create_valid_payload();
        payload.lines[0].debit = 0.004;
        payload.lines[1].credit = 0.004;
        assert!(matches!(
            validate_posting_request(&payload),
            Err(ValidationError::NeitherSideSet(0))
        ));
    }

    #[test]
    fn test_rounding_at_boundary() {
        assert_eq!(to_minor(123.45), 12_345);
        assert_eq!(to_minor(0.1 + 0.2), 30);
        assert_eq!(to_major(12_345), 123.45);
    }

    #[test]
    fn test_balanced_entry_with_multiple_lines() {
        let mut payload = create_valid_payload();
        payload.lines.push(line("5000", 50.0, 0.0));
        payload.lines.push(line("2000", 0.0, 50.0));
        assert!(validate_posting_request(&payload).is_ok());
    }
}
