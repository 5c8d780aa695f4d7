//! Request contract types for the ledger core.
//!
//! Business-event producers (sales, purchasing, payments) hand the ledger a
//! fully-formed, balanced line set through these payloads. Field names are
//! part of the wire contract; do not rename without a version bump.

pub mod posting_request_v1;
pub mod reverse_request_v1;
