//! Reverse Request V1 Contract Types

use serde::{Deserialize, Serialize};

/// Payload requesting a full reversal of a posted journal entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReverseRequestV1 {
    /// Tenant scope, supplied by the already-authenticated caller
    pub tenant_id: String,

    /// Why the original entry is being backed out
    pub reason: String,

    /// User recorded as the reversal author
    pub requested_by: String,
}
