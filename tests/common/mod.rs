//! Common test utilities
//!
//! ## Singleton Pool Pattern
//! All integration tests share a single database connection pool per test
//! binary, initialized lazily and migrated once.
//!
//! ## Opt-in Database Tests
//! Database tests run only when `DATABASE_URL` is set; without it every test
//! returns early so the suite stays green on machines without Postgres.
//!
//! ## Usage
//! ```rust
//! let Some(pool) = common::try_test_pool().await else { return };
//! ```

#![allow(dead_code)]

use chrono::NaiveDate;
use ledger_rs::db::init_pool;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Singleton pool instance shared across all tests in this binary
static TEST_POOL: OnceCell<Option<PgPool>> = OnceCell::const_new();

/// Get the shared test pool, or None when `DATABASE_URL` is unset.
///
/// Caps connections (DB_MAX_CONNECTIONS=5) and stretches the acquire timeout
/// so serial tests with nested service calls do not starve each other.
pub async fn try_test_pool() -> Option<PgPool> {
    if std::env::var("DB_MAX_CONNECTIONS").is_err() {
        std::env::set_var("DB_MAX_CONNECTIONS", "5");
    }
    if std::env::var("DB_ACQUIRE_TIMEOUT_SECS").is_err() {
        std::env::set_var("DB_ACQUIRE_TIMEOUT_SECS", "10");
    }

    TEST_POOL
        .get_or_init(|| async {
            let database_url = std::env::var("DATABASE_URL").ok()?;

            let pool = init_pool(&database_url)
                .await
                .expect("Failed to initialize test pool");

            sqlx::migrate!("./db/migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            Some(pool)
        })
        .await
        .clone()
}

/// Create tenant settings with the given cutover date.
pub async fn setup_tenant(pool: &PgPool, tenant_id: &str, cutover_date: NaiveDate) {
    sqlx::query(
        r#"
        INSERT INTO tenant_settings (tenant_id, cutover_date, high_value_threshold_minor)
        VALUES ($1, $2, 1000000)
        ON CONFLICT (tenant_id) DO UPDATE SET cutover_date = EXCLUDED.cutover_date
        "#,
    )
    .bind(tenant_id)
    .bind(cutover_date)
    .execute(pool)
    .await
    .expect("Failed to create tenant settings");
}

/// Create a test accounting period
pub async fn setup_period(
    pool: &PgPool,
    tenant_id: &str,
    period_start: NaiveDate,
    period_end: NaiveDate,
    is_closed: bool,
) -> Uuid {
    let period_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO accounting_periods (id, tenant_id, period_start, period_end, is_closed)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(period_id)
    .bind(tenant_id)
    .bind(period_start)
    .bind(period_end)
    .bind(is_closed)
    .execute(pool)
    .await
    .expect("Failed to create test period");

    period_id
}

pub async fn close_period(pool: &PgPool, period_id: Uuid) {
    sqlx::query("UPDATE accounting_periods SET is_closed = TRUE WHERE id = $1")
        .bind(period_id)
        .execute(pool)
        .await
        .expect("Failed to close test period");
}

/// Create a test account
#[allow(clippy::too_many_arguments)]
pub async fn setup_account(
    pool: &PgPool,
    tenant_id: &str,
    code: &str,
    name: &str,
    account_type: &str,
    normal_balance: &str,
    department_requirement: &str,
) -> Uuid {
    let account_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO accounts
            (id, tenant_id, code, name, account_type, normal_balance, is_active,
             department_requirement, requires_project, requires_fund)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, FALSE, FALSE)
        "#,
    )
    .bind(account_id)
    .bind(tenant_id)
    .bind(code)
    .bind(name)
    .bind(account_type)
    .bind(normal_balance)
    .bind(department_requirement)
    .execute(pool)
    .await
    .expect("Failed to create test account");

    account_id
}

pub async fn setup_project(pool: &PgPool, tenant_id: &str, is_restricted: bool) -> Uuid {
    let project_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO projects (id, tenant_id, name, is_restricted) VALUES ($1, $2, $3, $4)",
    )
    .bind(project_id)
    .bind(tenant_id)
    .bind("Test Project")
    .bind(is_restricted)
    .execute(pool)
    .await
    .expect("Failed to create test project");

    project_id
}

pub async fn setup_fund(pool: &PgPool, tenant_id: &str, project_id: Uuid) -> Uuid {
    let fund_id = Uuid::new_v4();
    sqlx::query("INSERT INTO funds (id, tenant_id, project_id, name) VALUES ($1, $2, $3, $4)")
        .bind(fund_id)
        .bind(tenant_id)
        .bind(project_id)
        .bind("Test Fund")
        .execute(pool)
        .await
        .expect("Failed to create test fund");

    fund_id
}

pub async fn setup_budget_line(
    pool: &PgPool,
    tenant_id: &str,
    account_id: Uuid,
    period_id: Uuid,
    department_id: Option<Uuid>,
    approved_minor: i64,
) -> Uuid {
    let budget_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO budget_lines (id, tenant_id, account_id, period_id, department_id, approved_minor)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(budget_id)
    .bind(tenant_id)
    .bind(account_id)
    .bind(period_id)
    .bind(department_id)
    .bind(approved_minor)
    .execute(pool)
    .await
    .expect("Failed to create test budget line");

    budget_id
}

/// Cleanup test data for a tenant (delete all journals and related data)
///
/// Deletes in reverse FK order to avoid constraint violations.
pub async fn cleanup_tenant(pool: &PgPool, tenant_id: &str) {
    sqlx::query(
        "DELETE FROM journal_lines WHERE journal_id IN (SELECT id FROM journal_entries WHERE tenant_id = $1)"
    )
    .bind(tenant_id)
    .execute(pool)
    .await
    .ok();

    // Self-referencing FKs: clear links before deleting headers.
    sqlx::query(
        "UPDATE journal_entries SET corrects_journal_id = NULL, reversal_of_id = NULL, reversed_by_id = NULL WHERE tenant_id = $1"
    )
    .bind(tenant_id)
    .execute(pool)
    .await
    .ok();

    sqlx::query("DELETE FROM journal_entries WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM budget_lines WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM funds WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM projects WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM accounts WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM accounting_periods WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM journal_number_sequences WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();

    sqlx::query("DELETE FROM tenant_settings WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await
        .ok();
}
