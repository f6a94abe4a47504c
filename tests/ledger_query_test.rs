//! Ledger drill-down tests: running balances, page continuity, and the
//! closed-period read gate.

mod common;

use chrono::NaiveDate;
use ledger_rs::domain::{Actor, JournalStatus, JournalType, Permission};
use ledger_rs::errors::EngineError;
use ledger_rs::repos::journal_repo::JournalLineInsert;
use ledger_rs::services::journal_service::{self, NewJournal};
use ledger_rs::services::ledger_service::{self, LedgerQuery, MAX_LEDGER_OFFSET};
use serial_test::serial;
use uuid::Uuid;

fn line(line_no: i32, account_id: Uuid, legal_entity_id: Uuid, debit: i64, credit: i64) -> JournalLineInsert {
    JournalLineInsert {
        line_no,
        account_id: Some(account_id),
        legal_entity_id: Some(legal_entity_id),
        department_id: None,
        project_id: None,
        fund_id: None,
        description: None,
        debit_minor: debit,
        credit_minor: credit,
    }
}

struct Fixture {
    tenant: String,
    expense: Uuid,
    cash: Uuid,
    legal_entity: Uuid,
    creator: Actor,
    approver: Actor,
    poster: Actor,
}

async fn setup_fixture(pool: &sqlx::PgPool, tenant: &str) -> Fixture {
    common::cleanup_tenant(pool, tenant).await;
    common::setup_tenant(pool, tenant, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).await;
    let expense =
        common::setup_account(pool, tenant, "6000", "Supplies", "EXPENSE", "DEBIT", "OPTIONAL")
            .await;
    let cash =
        common::setup_account(pool, tenant, "1000", "Cash", "ASSET", "DEBIT", "OPTIONAL").await;

    Fixture {
        tenant: tenant.to_string(),
        expense,
        cash,
        legal_entity: Uuid::new_v4(),
        creator: Actor::new(Uuid::new_v4(), []),
        approver: Actor::new(Uuid::new_v4(), [Permission::Approve]),
        poster: Actor::new(Uuid::new_v4(), [Permission::Post]),
    }
}

/// Run one journal through the full cycle to POSTED.
async fn post_journal(pool: &sqlx::PgPool, fx: &Fixture, date: NaiveDate, amount: i64) -> Uuid {
    let journal = journal_service::create_journal(
        pool,
        &fx.creator,
        &fx.tenant,
        NewJournal {
            journal_type: JournalType::Standard,
            journal_date: date,
            description: format!("Purchase {amount}"),
            budget_override_justification: None,
            lines: vec![
                line(1, fx.expense, fx.legal_entity, amount, 0),
                line(2, fx.cash, fx.legal_entity, 0, amount),
            ],
        },
    )
    .await
    .unwrap();
    journal_service::submit_journal(pool, &fx.creator, &fx.tenant, journal.id)
        .await
        .unwrap();
    journal_service::review_journal(pool, &fx.approver, &fx.tenant, journal.id)
        .await
        .unwrap();
    let posted = journal_service::post_journal(pool, &fx.poster, &fx.tenant, journal.id)
        .await
        .unwrap();
    assert_eq!(posted.status, JournalStatus::Posted);
    journal.id
}

#[tokio::test]
#[serial]
async fn test_running_balance_over_closed_period() {
    let Some(pool) = common::try_test_pool().await else { return };
    let fx = setup_fixture(&pool, "lg-balance-001").await;

    let may = common::setup_period(
        &pool,
        &fx.tenant,
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
        false,
    )
    .await;
    let june = common::setup_period(
        &pool,
        &fx.tenant,
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        false,
    )
    .await;

    // One posting in May feeds the June opening balance; two in June become
    // the rows.
    post_journal(&pool, &fx, NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(), 2_500).await;
    post_journal(&pool, &fx, NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(), 10_000).await;
    post_journal(&pool, &fx, NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(), 5_000).await;

    // The gate refuses while the period is still open.
    let query = LedgerQuery {
        account_id: fx.expense,
        period_id: Some(june),
        start_date: None,
        end_date: None,
        limit: 50,
        offset: 0,
    };
    let err = ledger_service::get_ledger(&pool, &fx.tenant, &query)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ClosedPeriodRequired));

    common::close_period(&pool, may).await;
    common::close_period(&pool, june).await;

    let page = ledger_service::get_ledger(&pool, &fx.tenant, &query)
        .await
        .expect("closed period should be readable");
    assert_eq!(page.opening_balance_minor, 2_500);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].debit_minor, 10_000);
    assert_eq!(page.rows[0].running_balance_minor, 12_500);
    assert_eq!(page.rows[1].running_balance_minor, 17_500);
    assert_eq!(page.pagination.total_count, 2);
    assert!(!page.pagination.has_more);

    // Page 2 opens where page 1 ended.
    let paged = ledger_service::get_ledger(
        &pool,
        &fx.tenant,
        &LedgerQuery {
            limit: 1,
            offset: 1,
            ..query.clone()
        },
    )
    .await
    .unwrap();
    assert_eq!(paged.page_opening_minor, 12_500);
    assert_eq!(paged.rows.len(), 1);
    assert_eq!(paged.rows[0].running_balance_minor, 17_500);

    common::cleanup_tenant(&pool, &fx.tenant).await;
}

#[tokio::test]
#[serial]
async fn test_date_range_gate_requires_full_closed_coverage() {
    let Some(pool) = common::try_test_pool().await else { return };
    let fx = setup_fixture(&pool, "lg-gate-001").await;

    let june = common::setup_period(
        &pool,
        &fx.tenant,
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        true,
    )
    .await;
    let _ = june;

    // Range reaching past the closed catalog is refused.
    let err = ledger_service::get_ledger(
        &pool,
        &fx.tenant,
        &LedgerQuery {
            account_id: fx.expense,
            period_id: None,
            start_date: Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()),
            end_date: Some(NaiveDate::from_ymd_opt(2025, 7, 15).unwrap()),
            limit: 50,
            offset: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::ClosedPeriodRequired));

    // A sub-range fully inside the closed period is fine.
    let page = ledger_service::get_ledger(
        &pool,
        &fx.tenant,
        &LedgerQuery {
            account_id: fx.expense,
            period_id: None,
            start_date: Some(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()),
            end_date: Some(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()),
            limit: 50,
            offset: 0,
        },
    )
    .await
    .unwrap();
    assert!(page.rows.is_empty());

    common::cleanup_tenant(&pool, &fx.tenant).await;
}

#[tokio::test]
#[serial]
async fn test_pagination_validation() {
    let Some(pool) = common::try_test_pool().await else { return };
    let fx = setup_fixture(&pool, "lg-paging-001").await;
    let june = common::setup_period(
        &pool,
        &fx.tenant,
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        true,
    )
    .await;

    let base = LedgerQuery {
        account_id: fx.expense,
        period_id: Some(june),
        start_date: None,
        end_date: None,
        limit: 50,
        offset: 0,
    };

    let err = ledger_service::get_ledger(&pool, &fx.tenant, &LedgerQuery { limit: 0, ..base.clone() })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = ledger_service::get_ledger(
        &pool,
        &fx.tenant,
        &LedgerQuery {
            offset: MAX_LEDGER_OFFSET + 1,
            ..base.clone()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    common::cleanup_tenant(&pool, &fx.tenant).await;
}
