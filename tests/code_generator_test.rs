//! Account code generation integration tests: range scoping, collision
//! retry, and uniqueness under concurrency.

mod common;

use common::unique_tenant;
use ledger_rs::repos::account_repo::{AccountOrigin, AccountType, NormalBalance};
use ledger_rs::services::account_service::{self, CreateAccount};
use ledger_rs::services::code_generator;
use serial_test::serial;
use std::collections::HashSet;

#[tokio::test]
#[serial]
async fn test_codes_allocated_from_type_range() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("gen-range");

    let asset = code_generator::generate_code(&pool, &tenant, AccountType::Asset)
        .await
        .unwrap();
    let liability = code_generator::generate_code(&pool, &tenant, AccountType::Liability)
        .await
        .unwrap();
    let expense = code_generator::generate_code(&pool, &tenant, AccountType::Expense)
        .await
        .unwrap();

    assert_eq!(asset, "1001");
    assert_eq!(liability, "2001");
    assert_eq!(expense, "5001");
}

#[tokio::test]
#[serial]
async fn test_sequential_allocation_per_tenant_and_type() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("gen-seq");

    let first = code_generator::generate_code(&pool, &tenant, AccountType::Revenue)
        .await
        .unwrap();
    let second = code_generator::generate_code(&pool, &tenant, AccountType::Revenue)
        .await
        .unwrap();
    assert_eq!(first, "4001");
    assert_eq!(second, "4002");

    // A different tenant starts from the beginning of the range.
    let other_tenant = unique_tenant("gen-seq-other");
    let other = code_generator::generate_code(&pool, &other_tenant, AccountType::Revenue)
        .await
        .unwrap();
    assert_eq!(other, "4001");
}

#[tokio::test]
#[serial]
async fn test_collision_with_external_code_retries_once() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("gen-collision");

    // Occupy the first generated slot by creating the account directly.
    account_service::create_account(
        &pool,
        CreateAccount {
            tenant_id: tenant.clone(),
            code: Some("1001".to_string()),
            name: "Manually coded".to_string(),
            account_type: AccountType::Asset,
            category: None,
            normal_balance: NormalBalance::Debit,
            parent_code: None,
            allow_direct_posting: true,
            is_system: false,
            is_protected: false,
            origin: AccountOrigin::Manual,
            opening_balance: 0.0,
        },
    )
    .await
    .unwrap();

    // Generator hits 1001, detects the collision, and lands on 1002.
    let code = code_generator::generate_code(&pool, &tenant, AccountType::Asset)
        .await
        .unwrap();
    assert_eq!(code, "1002");
}

#[tokio::test]
#[serial]
async fn test_concurrent_generation_yields_distinct_codes() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("gen-concurrent");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        let tenant = tenant.clone();
        handles.push(tokio::spawn(async move {
            code_generator::generate_code(&pool, &tenant, AccountType::Asset).await
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        let code = handle.await.unwrap().expect("generation should succeed");
        assert!(
            codes.insert(code.clone()),
            "duplicate code generated: {}",
            code
        );
    }

    assert_eq!(codes.len(), 10);
    for code in &codes {
        let numeric: i64 = code.parse().unwrap();
        assert!((1000..=1999).contains(&numeric));
    }
}
