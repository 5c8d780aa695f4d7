//! Chart-of-accounts maintenance.
//!
//! Creation, update and deletion enforce the hierarchy and protection rules:
//! parents must be summary accounts, summary accounts with children cannot be
//! switched back to postable, system/protected accounts require elevated
//! permission, and deletion demands a freshly computed zero balance. Deletes
//! are always soft.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::repos::account_repo::{
    self, Account, AccountOrigin, AccountStatus, AccountType, NormalBalance,
};
use crate::services::balance_service::{self, BalanceError};
use crate::services::code_generator::{self, CodeGenError};
use crate::validation;

/// Maximum hierarchy depth (root = 0)
pub const MAX_LEVEL: i16 = 5;

/// Errors that can occur during chart-of-accounts maintenance
#[derive(Debug, Error)]
pub enum AccountServiceError {
    #[error("Account not found: tenant_id={tenant_id}, code={code}")]
    NotFound { tenant_id: String, code: String },

    #[error("Account code already in use: tenant_id={tenant_id}, code={code}")]
    DuplicateCode { tenant_id: String, code: String },

    #[error("Parent account not found: code={parent_code}")]
    ParentNotFound { parent_code: String },

    #[error("Parent account {parent_code} allows direct posting and cannot hold children")]
    ParentNotSummary { parent_code: String },

    #[error("Account {code} has active children and cannot allow direct posting")]
    HasChildrenCannotPost { code: String },

    #[error("Hierarchy depth limit exceeded: parent {parent_code} is at level {parent_level}")]
    MaxDepthExceeded {
        parent_code: String,
        parent_level: i16,
    },

    #[error("Account {code} is protected; elevated permission required")]
    ProtectedAccount { code: String },

    #[error("Account {code} has active sub-accounts and cannot be deleted")]
    HasSubaccounts { code: String },

    #[error("Account {code} has a non-zero balance ({balance_minor} minor units) and cannot be deleted")]
    NonzeroBalance { code: String, balance_minor: i64 },

    #[error(transparent)]
    CodeGeneration(#[from] CodeGenError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AccountServiceError {
    /// Stable error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            AccountServiceError::NotFound { .. } => "ACCOUNT_NOT_FOUND",
            AccountServiceError::DuplicateCode { .. } => "DUPLICATE_CODE",
            AccountServiceError::ParentNotFound { .. } => "PARENT_NOT_SUMMARY",
            AccountServiceError::ParentNotSummary { .. } => "PARENT_NOT_SUMMARY",
            AccountServiceError::HasChildrenCannotPost { .. } => "HAS_CHILDREN_CANNOT_POST",
            AccountServiceError::MaxDepthExceeded { .. } => "VALIDATION",
            AccountServiceError::ProtectedAccount { .. } => "PROTECTED_ACCOUNT",
            AccountServiceError::HasSubaccounts { .. } => "HAS_SUBACCOUNTS",
            AccountServiceError::NonzeroBalance { .. } => "NONZERO_BALANCE",
            AccountServiceError::CodeGeneration(e) => e.code(),
            AccountServiceError::Database(_) => "DATABASE",
        }
    }
}

/// Fields for creating an account
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub tenant_id: String,
    /// Explicit code, or None to allocate one from the type's range
    pub code: Option<String>,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<String>,
    pub normal_balance: NormalBalance,
    pub parent_code: Option<String>,
    pub allow_direct_posting: bool,
    pub is_system: bool,
    pub is_protected: bool,
    pub origin: AccountOrigin,
    /// Opening balance in major units
    pub opening_balance: f64,
}

/// Fields for updating an account; None leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub category: Option<String>,
    pub parent_code: Option<Option<String>>,
    pub allow_direct_posting: Option<bool>,
    pub is_protected: Option<bool>,
    pub status: Option<AccountStatus>,
    /// Caller holds elevated permission for protected accounts
    pub elevated: bool,
}

/// Create an account, allocating a code when none is supplied
pub async fn create_account(
    pool: &PgPool,
    req: CreateAccount,
) -> Result<Account, AccountServiceError> {
    let code = match &req.code {
        Some(code) => code.trim().to_uppercase(),
        None => code_generator::generate_code(pool, &req.tenant_id, req.account_type).await?,
    };

    if account_repo::find_live_by_code(pool, &req.tenant_id, &code)
        .await
        .map_err(repo_err)?
        .is_some()
    {
        return Err(AccountServiceError::DuplicateCode {
            tenant_id: req.tenant_id.clone(),
            code,
        });
    }

    let level = match &req.parent_code {
        Some(parent_code) => {
            let parent = validate_parent(pool, &req.tenant_id, parent_code).await?;
            parent.level + 1
        }
        None => 0,
    };

    let mut tx = pool.begin().await?;
    let account = account_repo::insert_tx(
        &mut tx,
        &account_repo::NewAccount {
            tenant_id: req.tenant_id.clone(),
            code: code.clone(),
            name: req.name,
            account_type: req.account_type,
            category: req.category,
            normal_balance: req.normal_balance,
            parent_code: req.parent_code,
            level,
            allow_direct_posting: req.allow_direct_posting,
            is_system: req.is_system,
            is_protected: req.is_protected,
            origin: req.origin,
            opening_balance_minor: validation::to_minor(req.opening_balance),
        },
    )
    .await
    .map_err(repo_err)?;
    tx.commit().await?;

    tracing::info!(
        tenant_id = %account.tenant_id,
        code = %account.code,
        account_type = ?account.account_type,
        origin = ?account.origin,
        "Account created"
    );

    Ok(account)
}

/// Update an account's mutable fields under the protection rules
pub async fn update_account(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    req: UpdateAccount,
) -> Result<Account, AccountServiceError> {
    let mut account = account_repo::find_live_by_code(pool, tenant_id, code)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AccountServiceError::NotFound {
            tenant_id: tenant_id.to_string(),
            code: code.to_string(),
        })?;

    assert_not_protected(&account, req.elevated)?;

    if let Some(allow) = req.allow_direct_posting {
        if allow && !account.allow_direct_posting {
            let children =
                account_repo::active_children_count(pool, tenant_id, &account.code)
                    .await
                    .map_err(repo_err)?;
            if children > 0 {
                return Err(AccountServiceError::HasChildrenCannotPost {
                    code: account.code,
                });
            }
        }
        account.allow_direct_posting = allow;
    }

    if let Some(parent_change) = req.parent_code {
        match parent_change {
            Some(parent_code) => {
                let parent = validate_parent(pool, tenant_id, &parent_code).await?;
                account.level = parent.level + 1;
                account.parent_code = Some(parent.code);
            }
            None => {
                account.parent_code = None;
                account.level = 0;
            }
        }
    }

    if let Some(name) = req.name {
        account.name = name;
    }
    if let Some(category) = req.category {
        account.category = Some(category);
    }
    if let Some(is_protected) = req.is_protected {
        account.is_protected = is_protected;
    }
    if let Some(status) = req.status {
        // Deletion goes through delete_account, never a status update.
        if status != AccountStatus::Deleted {
            account.status = status;
        }
    }

    let mut tx = pool.begin().await?;
    account_repo::update_tx(&mut tx, &account)
        .await
        .map_err(repo_err)?;
    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        code = %account.code,
        "Account updated"
    );

    Ok(account)
}

/// Soft-delete an account.
///
/// Requires no active children and a freshly computed zero balance; the
/// cached value is not trusted for this decision.
pub async fn delete_account(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    deleted_by: &str,
    elevated: bool,
) -> Result<(), AccountServiceError> {
    let account = account_repo::find_live_by_code(pool, tenant_id, code)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AccountServiceError::NotFound {
            tenant_id: tenant_id.to_string(),
            code: code.to_string(),
        })?;

    assert_not_protected(&account, elevated)?;

    let children = account_repo::active_children_count(pool, tenant_id, &account.code)
        .await
        .map_err(repo_err)?;
    if children > 0 {
        return Err(AccountServiceError::HasSubaccounts { code: account.code });
    }

    let balance_minor = balance_service::calculate_balance(pool, tenant_id, &account.code, None)
        .await
        .map_err(balance_err)?;
    if balance_minor != 0 {
        return Err(AccountServiceError::NonzeroBalance {
            code: account.code,
            balance_minor,
        });
    }

    let mut tx = pool.begin().await?;
    account_repo::soft_delete_tx(&mut tx, account.id, deleted_by)
        .await
        .map_err(repo_err)?;
    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        code = %code,
        deleted_by = %deleted_by,
        "Account soft-deleted"
    );

    Ok(())
}

/// A node in the rendered account hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct AccountNode {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub level: i16,
    pub allow_direct_posting: bool,
    pub status: AccountStatus,
    pub current_balance_minor: i64,
    pub children: Vec<AccountNode>,
}

/// Build the full account tree for a tenant: roots with nested children,
/// sorted by code at every level
pub async fn account_tree(
    pool: &PgPool,
    tenant_id: &str,
) -> Result<Vec<AccountNode>, AccountServiceError> {
    let accounts = account_repo::list_active(pool, tenant_id)
        .await
        .map_err(repo_err)?;
    Ok(build_tree(&accounts))
}

/// Group accounts by parent and nest children under their roots
pub fn build_tree(accounts: &[Account]) -> Vec<AccountNode> {
    let mut children_of: HashMap<&str, Vec<&Account>> = HashMap::new();
    let mut roots: Vec<&Account> = Vec::new();

    for account in accounts {
        match account.parent_code.as_deref() {
            Some(parent) => children_of.entry(parent).or_default().push(account),
            None => roots.push(account),
        }
    }

    roots.sort_by(|a, b| a.code.cmp(&b.code));
    roots
        .iter()
        .map(|root| build_node(root, &children_of))
        .collect()
}

fn build_node(account: &Account, children_of: &HashMap<&str, Vec<&Account>>) -> AccountNode {
    let mut child_nodes: Vec<AccountNode> = children_of
        .get(account.code.as_str())
        .map(|children| {
            children
                .iter()
                .map(|child| build_node(child, children_of))
                .collect()
        })
        .unwrap_or_default();
    child_nodes.sort_by(|a, b| a.code.cmp(&b.code));

    AccountNode {
        code: account.code.clone(),
        name: account.name.clone(),
        account_type: account.account_type,
        normal_balance: account.normal_balance,
        level: account.level,
        allow_direct_posting: account.allow_direct_posting,
        status: account.status,
        current_balance_minor: account.current_balance_minor,
        children: child_nodes,
    }
}

/// Verify a parent reference: exists, live, summary-only, not at max depth
async fn validate_parent(
    pool: &PgPool,
    tenant_id: &str,
    parent_code: &str,
) -> Result<Account, AccountServiceError> {
    let parent_code = parent_code.trim().to_uppercase();
    let parent = account_repo::find_live_by_code(pool, tenant_id, &parent_code)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AccountServiceError::ParentNotFound {
            parent_code: parent_code.clone(),
        })?;

    if !parent.is_summary() {
        return Err(AccountServiceError::ParentNotSummary {
            parent_code: parent.code,
        });
    }

    if parent.level >= MAX_LEVEL {
        return Err(AccountServiceError::MaxDepthExceeded {
            parent_code: parent.code,
            parent_level: parent.level,
        });
    }

    Ok(parent)
}

/// System, protected, and system-origin accounts need elevated permission
fn assert_not_protected(account: &Account, elevated: bool) -> Result<(), AccountServiceError> {
    let protected =
        account.is_system || account.is_protected || account.origin == AccountOrigin::System;
    if protected && !elevated {
        return Err(AccountServiceError::ProtectedAccount {
            code: account.code.clone(),
        });
    }
    Ok(())
}

fn repo_err(e: account_repo::AccountError) -> AccountServiceError {
    match e {
        account_repo::AccountError::Database(e) => AccountServiceError::Database(e),
        account_repo::AccountError::NotFound { tenant_id, code } => {
            AccountServiceError::NotFound { tenant_id, code }
        }
    }
}

fn balance_err(e: BalanceError) -> AccountServiceError {
    match e {
        BalanceError::Database(e) => AccountServiceError::Database(e),
        BalanceError::AccountNotFound { tenant_id, code } => {
            AccountServiceError::NotFound { tenant_id, code }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn account(code: &str, parent: Option<&str>, level: i16, postable: bool) -> Account {
        Account {
            id: Uuid::new_v4(),
            tenant_id: "tenant_001".to_string(),
            code: code.to_string(),
            name: format!("Account {}", code),
            account_type: AccountType::Asset,
            category: None,
            normal_balance: NormalBalance::Debit,
            parent_code: parent.map(|p| p.to_string()),
            level,
            allow_direct_posting: postable,
            is_system: false,
            is_protected: false,
            origin: AccountOrigin::Manual,
            opening_balance_minor: 0,
            current_balance_minor: 0,
            balance_calculated_at: None,
            status: AccountStatus::Active,
            deleted_at: None,
            deleted_by: None,
            recon_status: crate::repos::account_repo::ReconStatus::NotStarted,
            recon_locked_by: None,
            recon_locked_at: None,
            recon_lock_expires_at: None,
            recon_lock_start: None,
            recon_lock_end: None,
            reconciled_up_to: None,
            recon_discrepancy_minor: None,
            recon_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree_nests_children_under_roots() {
        let accounts = vec![
            account("1000", None, 0, false),
            account("1100", Some("1000"), 1, true),
            account("1200", Some("1000"), 1, true),
            account("2000", None, 0, true),
        ];

        let tree = build_tree(&accounts);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].code, "1000");
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].code, "1100");
        assert_eq!(tree[0].children[1].code, "1200");
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_build_tree_sorts_by_code() {
        let accounts = vec![
            account("2000", None, 0, true),
            account("1000", None, 0, false),
            account("1190", Some("1000"), 1, true),
            account("1110", Some("1000"), 1, true),
        ];

        let tree = build_tree(&accounts);
        assert_eq!(tree[0].code, "1000");
        assert_eq!(tree[0].children[0].code, "1110");
        assert_eq!(tree[0].children[1].code, "1190");
    }

    #[test]
    fn test_build_tree_three_levels() {
        let accounts = vec![
            account("1000", None, 0, false),
            account("1100", Some("1000"), 1, false),
            account("1110", Some("1100"), 2, true),
        ];

        let tree = build_tree(&accounts);
        assert_eq!(tree[0].children[0].children[0].code, "1110");
    }

    #[test]
    fn test_protected_account_guard() {
        let mut acc = account("1100", None, 0, true);
        acc.is_protected = true;

        let err = assert_not_protected(&acc, false).unwrap_err();
        assert_eq!(err.code(), "PROTECTED_ACCOUNT");
        assert!(assert_not_protected(&acc, true).is_ok());
    }

    #[test]
    fn test_system_origin_is_protected() {
        let mut acc = account("3000", None, 0, true);
        acc.origin = AccountOrigin::System;

        let err = assert_not_protected(&acc, false).unwrap_err();
        assert_eq!(err.code(), "PROTECTED_ACCOUNT");
    }
}
