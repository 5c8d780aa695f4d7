//! Balance calculation and caching integration tests.

mod common;

use common::{create_leaf_account, create_sale_accounts, line, posting, unique_tenant};
use ledger_rs::repos::account_repo::{AccountOrigin, AccountType, NormalBalance};
use ledger_rs::repos::journal_repo::ReferenceType;
use ledger_rs::services::account_service::{self, CreateAccount};
use ledger_rs::services::{balance_service, posting_service};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_round_trip_posting_to_balance() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("bal-roundtrip");
    create_sale_accounts(&pool, &tenant).await;

    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-03-01",
            ReferenceType::Sale,
            vec![line("1100", 123.45, 0.0), line("4000", 0.0, 123.45)],
        ),
    )
    .await
    .unwrap();

    // Exactly one entry's contribution, nothing dropped or double-counted.
    let ar = balance_service::calculate_balance(&pool, &tenant, "1100", None)
        .await
        .unwrap();
    assert_eq!(ar, 12_345);
}

#[tokio::test]
#[serial]
async fn test_as_of_date_filters_later_entries() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("bal-asof");
    create_sale_accounts(&pool, &tenant).await;

    for (date, amount) in [("2026-01-15", 100.0), ("2026-02-15", 50.0)] {
        posting_service::post_entry(
            &pool,
            &posting(
                &tenant,
                date,
                ReferenceType::Sale,
                vec![line("1100", amount, 0.0), line("4000", 0.0, amount)],
            ),
        )
        .await
        .unwrap();
    }

    let cutoff = chrono::NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
    let at_january = balance_service::calculate_balance(&pool, &tenant, "1100", Some(cutoff))
        .await
        .unwrap();
    let full = balance_service::calculate_balance(&pool, &tenant, "1100", None)
        .await
        .unwrap();

    assert_eq!(at_january, 10_000);
    assert_eq!(full, 15_000);
}

#[tokio::test]
#[serial]
async fn test_recalculate_and_cache_is_idempotent() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("bal-idempotent");
    create_sale_accounts(&pool, &tenant).await;

    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-03-01",
            ReferenceType::Sale,
            vec![line("1100", 200.0, 0.0), line("4000", 0.0, 200.0)],
        ),
    )
    .await
    .unwrap();

    let first = balance_service::recalculate_and_cache(&pool, &tenant, "1100")
        .await
        .unwrap();
    let second = balance_service::recalculate_and_cache(&pool, &tenant, "1100")
        .await
        .unwrap();

    assert_eq!(first, 20_000);
    assert_eq!(first, second);

    let account = ledger_rs::repos::account_repo::find_live_by_code(&pool, &tenant, "1100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.current_balance_minor, 20_000);
    assert!(account.balance_calculated_at.is_some());
}

#[tokio::test]
#[serial]
async fn test_opening_balance_included_in_calculation() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("bal-opening");

    account_service::create_account(
        &pool,
        CreateAccount {
            tenant_id: tenant.clone(),
            code: Some("1050".to_string()),
            name: "Petty Cash".to_string(),
            account_type: AccountType::Asset,
            category: None,
            normal_balance: NormalBalance::Debit,
            parent_code: None,
            allow_direct_posting: true,
            is_system: false,
            is_protected: false,
            origin: AccountOrigin::Manual,
            opening_balance: 500.0,
        },
    )
    .await
    .unwrap();

    let balance = balance_service::calculate_balance(&pool, &tenant, "1050", None)
        .await
        .unwrap();
    assert_eq!(balance, 50_000);
}

#[tokio::test]
#[serial]
async fn test_parent_balance_derived_from_children() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("bal-parent");

    // Summary parent with two postable children.
    common::create_summary_account(
        &pool,
        &tenant,
        "1000",
        "Current Assets",
        AccountType::Asset,
        NormalBalance::Debit,
    )
    .await;
    for (code, name) in [("1010", "Cash"), ("1020", "Bank")] {
        account_service::create_account(
            &pool,
            CreateAccount {
                tenant_id: tenant.clone(),
                code: Some(code.to_string()),
                name: name.to_string(),
                account_type: AccountType::Asset,
                category: None,
                normal_balance: NormalBalance::Debit,
                parent_code: Some("1000".to_string()),
                allow_direct_posting: true,
                is_system: false,
                is_protected: false,
                origin: AccountOrigin::Manual,
                opening_balance: 0.0,
            },
        )
        .await
        .unwrap();
    }
    create_leaf_account(
        &pool,
        &tenant,
        "4000",
        "Sales Revenue",
        AccountType::Revenue,
        NormalBalance::Credit,
    )
    .await;

    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-03-01",
            ReferenceType::Sale,
            vec![
                line("1010", 30.0, 0.0),
                line("1020", 70.0, 0.0),
                line("4000", 0.0, 100.0),
            ],
        ),
    )
    .await
    .unwrap();

    // Parent reports the sum of its children and caches nothing.
    let parent = balance_service::calculate_balance(&pool, &tenant, "1000", None)
        .await
        .unwrap();
    assert_eq!(parent, 10_000);

    balance_service::recalculate_and_cache(&pool, &tenant, "1000")
        .await
        .unwrap();
    let parent_row = ledger_rs::repos::account_repo::find_live_by_code(&pool, &tenant, "1000")
        .await
        .unwrap()
        .unwrap();
    assert!(parent_row.balance_calculated_at.is_none());
}

#[tokio::test]
#[serial]
async fn test_recalculate_all_covers_every_postable_account() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("bal-recalc-all");
    create_sale_accounts(&pool, &tenant).await;

    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-03-01",
            ReferenceType::Sale,
            vec![line("1100", 80.0, 0.0), line("4000", 0.0, 80.0)],
        ),
    )
    .await
    .unwrap();

    let updated = balance_service::recalculate_all(&pool, &tenant).await.unwrap();
    assert_eq!(updated, 2);

    for code in ["1100", "4000"] {
        let account = ledger_rs::repos::account_repo::find_live_by_code(&pool, &tenant, code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.current_balance_minor, 8_000);
        assert!(account.balance_calculated_at.is_some());
    }
}
