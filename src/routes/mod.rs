pub mod accounts;
pub mod entries;
pub mod error;
pub mod periods;
pub mod reconciliation;
pub mod reports;
