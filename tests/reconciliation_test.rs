//! Reconciliation lease integration tests: lock conflicts, expiry,
//! posting guards, and the reconciled watermark.

mod common;

use common::{create_sale_accounts, line, posting, unique_tenant};
use chrono::NaiveDate;
use ledger_rs::repos::account_repo::ReconStatus;
use ledger_rs::repos::journal_repo::ReferenceType;
use ledger_rs::services::{posting_service, reconciliation_service};
use serial_test::serial;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
#[serial]
async fn test_second_lock_attempt_fails_until_released() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-conflict");
    create_sale_accounts(&pool, &tenant).await;

    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_a", Some(60), None, None)
        .await
        .expect("first lock succeeds");

    let err = reconciliation_service::lock_account(
        &pool, &tenant, "1100", "user_b", Some(60), None, None,
    )
    .await
    .expect_err("second lock must fail while lease is live");
    assert_eq!(err.code(), "ALREADY_LOCKED");

    reconciliation_service::unlock_account(
        &pool,
        &tenant,
        "1100",
        "user_a",
        ReconStatus::Reconciled,
        None,
        None,
        None,
    )
    .await
    .expect("owner unlock succeeds");

    // After release the second user can take the lease.
    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_b", Some(60), None, None)
        .await
        .expect("lock succeeds after release");
}

#[tokio::test]
#[serial]
async fn test_expired_lock_counts_as_released() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-expiry");
    create_sale_accounts(&pool, &tenant).await;

    // Zero-minute lease expires immediately.
    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_a", Some(0), None, None)
        .await
        .expect("lock succeeds");

    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_b", Some(60), None, None)
        .await
        .expect("expired lease must not block a new lock");
}

#[tokio::test]
#[serial]
async fn test_only_owner_can_unlock() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-owner");
    create_sale_accounts(&pool, &tenant).await;

    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_a", Some(60), None, None)
        .await
        .unwrap();

    let err = reconciliation_service::unlock_account(
        &pool,
        &tenant,
        "1100",
        "user_b",
        ReconStatus::Reconciled,
        None,
        None,
        None,
    )
    .await
    .expect_err("non-owner unlock must fail");
    assert_eq!(err.code(), "NOT_LOCK_OWNER");
}

#[tokio::test]
#[serial]
async fn test_posting_blocked_while_account_locked() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-posting");
    create_sale_accounts(&pool, &tenant).await;

    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_a", Some(60), None, None)
        .await
        .unwrap();

    let err = posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-02-11",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect_err("posting must fail while account is locked");
    assert_eq!(err.code(), "RECONCILIATION_LOCKED");
}

#[tokio::test]
#[serial]
async fn test_date_range_lock_only_blocks_range() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-range");
    create_sale_accounts(&pool, &tenant).await;

    reconciliation_service::lock_account(
        &pool,
        &tenant,
        "1100",
        "user_a",
        Some(60),
        Some(date(2026, 1, 1)),
        Some(date(2026, 1, 31)),
    )
    .await
    .unwrap();

    let blocked = posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-01-15",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect_err("date inside locked range must fail");
    assert_eq!(blocked.code(), "RECONCILIATION_LOCKED");

    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-02-15",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect("date outside locked range posts fine");
}

#[tokio::test]
#[serial]
async fn test_reconciled_watermark_blocks_backdated_postings() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-watermark");
    create_sale_accounts(&pool, &tenant).await;

    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_a", Some(60), None, None)
        .await
        .unwrap();
    reconciliation_service::unlock_account(
        &pool,
        &tenant,
        "1100",
        "user_a",
        ReconStatus::Reconciled,
        Some(date(2026, 2, 1)),
        None,
        None,
    )
    .await
    .unwrap();

    // Strictly before the watermark: rejected forever.
    let err = posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-01-31",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect_err("backdated posting must fail");
    assert_eq!(err.code(), "BEFORE_RECONCILED_DATE");

    // On the boundary: allowed.
    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-02-01",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect("posting on the watermark date succeeds");
}

#[tokio::test]
#[serial]
async fn test_discrepancy_outcome_recorded() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("recon-discrepancy");
    create_sale_accounts(&pool, &tenant).await;

    reconciliation_service::lock_account(&pool, &tenant, "1100", "user_a", Some(60), None, None)
        .await
        .unwrap();

    let account = reconciliation_service::unlock_account(
        &pool,
        &tenant,
        "1100",
        "user_a",
        ReconStatus::Discrepancy,
        Some(date(2026, 2, 1)),
        Some(1_250),
        Some("bank statement short by 12.50"),
    )
    .await
    .unwrap();

    assert_eq!(account.recon_status, ReconStatus::Discrepancy);
    assert_eq!(account.recon_discrepancy_minor, Some(1_250));
    assert_eq!(account.reconciled_up_to, Some(date(2026, 2, 1)));
    assert!(account.recon_locked_by.is_none());
}
