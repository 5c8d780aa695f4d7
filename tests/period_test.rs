//! Fiscal period governance integration tests.

mod common;

use common::{create_sale_accounts, line, posting, unique_tenant};
use ledger_rs::repos::journal_repo::ReferenceType;
use ledger_rs::repos::period_repo::PeriodStatus;
use ledger_rs::services::{period_service, posting_service};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_generate_creates_twelve_calendar_periods() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("period-gen");

    let periods = period_service::generate_periods(&pool, &tenant, 2026)
        .await
        .unwrap();

    assert_eq!(periods.len(), 12);
    assert_eq!(periods[0].period_start.to_string(), "2026-01-01");
    assert_eq!(periods[0].period_end.to_string(), "2026-01-31");
    assert_eq!(periods[11].period_start.to_string(), "2026-12-01");
    assert_eq!(periods[11].period_end.to_string(), "2026-12-31");
    assert!(periods.iter().all(|p| p.status == PeriodStatus::Open));

    // Regenerating the same year is rejected.
    let err = period_service::generate_periods(&pool, &tenant, 2026)
        .await
        .expect_err("duplicate generation must fail");
    assert_eq!(err.code(), "PERIODS_EXIST");
}

#[tokio::test]
#[serial]
async fn test_close_requires_lock_first() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("period-order");
    period_service::generate_periods(&pool, &tenant, 2026)
        .await
        .unwrap();

    let err = period_service::close_period(&pool, &tenant, 2026, 1, "admin")
        .await
        .expect_err("closing an open period must fail");
    assert_eq!(err.code(), "PERIOD_NOT_LOCKED");

    period_service::lock_period(&pool, &tenant, 2026, 1, "admin")
        .await
        .unwrap();
    let closed = period_service::close_period(&pool, &tenant, 2026, 1, "admin")
        .await
        .unwrap();

    assert_eq!(closed.status, PeriodStatus::Closed);
    assert!(closed.close_hash.is_some());

    // Locking a closed period is rejected.
    let err = period_service::lock_period(&pool, &tenant, 2026, 1, "admin")
        .await
        .expect_err("re-locking a closed period must fail");
    assert_eq!(err.code(), "PERIOD_NOT_OPEN");
}

#[tokio::test]
#[serial]
async fn test_posting_into_locked_period_fails() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("period-post");
    create_sale_accounts(&pool, &tenant).await;
    period_service::generate_periods(&pool, &tenant, 2026)
        .await
        .unwrap();

    // January open: posting succeeds.
    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-01-15",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect("posting into an open period succeeds");

    period_service::lock_period(&pool, &tenant, 2026, 1, "admin")
        .await
        .unwrap();

    let err = posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-01-20",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect_err("posting into a locked period must fail");
    assert_eq!(err.code(), "PERIOD_CLOSED");

    // February untouched: still open for posting.
    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-02-05",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect("posting into the next open period succeeds");
}

#[tokio::test]
#[serial]
async fn test_posting_without_fiscal_calendar_allowed() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("period-nocal");
    create_sale_accounts(&pool, &tenant).await;

    // No periods configured for this tenant at all.
    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-06-15",
            ReferenceType::Sale,
            vec![line("1100", 10.0, 0.0), line("4000", 0.0, 10.0)],
        ),
    )
    .await
    .expect("tenants without a fiscal calendar can post");
}

#[tokio::test]
#[serial]
async fn test_year_close_requires_all_periods_closed() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("period-year");
    period_service::generate_periods(&pool, &tenant, 2026)
        .await
        .unwrap();

    let err = period_service::close_fiscal_year(&pool, &tenant, 2026)
        .await
        .expect_err("year close with open periods must fail");
    assert_eq!(err.code(), "YEAR_NOT_CLOSABLE");

    for period_no in 1..=12i16 {
        period_service::lock_period(&pool, &tenant, 2026, period_no, "admin")
            .await
            .unwrap();
        period_service::close_period(&pool, &tenant, 2026, period_no, "admin")
            .await
            .unwrap();
    }

    let summary = period_service::close_fiscal_year(&pool, &tenant, 2026)
        .await
        .expect("year closes once all periods are closed");
    assert_eq!(summary.fiscal_year, 2026);
    assert_eq!(summary.close_hash.len(), 64);
}

#[tokio::test]
#[serial]
async fn test_close_hash_seals_period_totals() {
    let pool = common::get_test_pool().await;
    let tenant = unique_tenant("period-hash");
    create_sale_accounts(&pool, &tenant).await;
    period_service::generate_periods(&pool, &tenant, 2026)
        .await
        .unwrap();

    posting_service::post_entry(
        &pool,
        &posting(
            &tenant,
            "2026-03-10",
            ReferenceType::Sale,
            vec![line("1100", 250.0, 0.0), line("4000", 0.0, 250.0)],
        ),
    )
    .await
    .unwrap();

    period_service::lock_period(&pool, &tenant, 2026, 3, "admin")
        .await
        .unwrap();
    let closed = period_service::close_period(&pool, &tenant, 2026, 3, "admin")
        .await
        .unwrap();

    // One entry, 250.00 on each side.
    let expected = period_service::compute_close_hash(&tenant, 2026, 3, 1, 25_000, 25_000);
    assert_eq!(closed.close_hash.as_deref(), Some(expected.as_str()));
}
