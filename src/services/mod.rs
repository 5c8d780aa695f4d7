pub mod account_service;
pub mod balance_service;
pub mod code_generator;
pub mod period_service;
pub mod posting_service;
pub mod reconciliation_service;
pub mod report_service;
pub mod reversal_service;
