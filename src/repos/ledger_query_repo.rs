//! Bounded, ordered queries for ledger drill-downs
//!
//! Only POSTED journals are visible here; drafts and every other status never
//! reach these queries. Ordering is (journal date, journal number, line
//! number) ascending, which is total for posted journals since every posted
//! journal carries a unique number.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

/// One posted movement against an account.
#[derive(Debug, Clone)]
pub struct PostedLineRow {
    pub journal_id: Uuid,
    pub journal_no: i64,
    pub journal_date: NaiveDate,
    pub reference: String,
    pub line_no: i32,
    pub description: Option<String>,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

/// Total posted debits and credits against the account strictly before
/// `before`, for the opening balance.
pub async fn opening_sums(
    pool: &PgPool,
    tenant_id: &str,
    account_id: Uuid,
    before: NaiveDate,
) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COALESCE(SUM(l.debit_minor), 0)::BIGINT, COALESCE(SUM(l.credit_minor), 0)::BIGINT
         FROM journal_lines l
         JOIN journal_entries j ON j.id = l.journal_id
         WHERE j.tenant_id = $1
           AND j.status = 'POSTED'
           AND l.account_id = $2
           AND j.journal_date < $3",
    )
    .bind(tenant_id)
    .bind(account_id)
    .bind(before)
    .fetch_one(pool)
    .await
}

/// Debit/credit sums of the first `offset` rows of the ordered range, so a
/// later page can continue its running balance from where the prior page
/// ended.
pub async fn prefix_sums(
    pool: &PgPool,
    tenant_id: &str,
    account_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    offset: i64,
) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COALESCE(SUM(sub.debit_minor), 0)::BIGINT, COALESCE(SUM(sub.credit_minor), 0)::BIGINT
         FROM (
             SELECT l.debit_minor, l.credit_minor
             FROM journal_lines l
             JOIN journal_entries j ON j.id = l.journal_id
             WHERE j.tenant_id = $1
               AND j.status = 'POSTED'
               AND l.account_id = $2
               AND j.journal_date BETWEEN $3 AND $4
             ORDER BY j.journal_date, j.journal_no, l.line_no
             LIMIT $5
         ) sub",
    )
    .bind(tenant_id)
    .bind(account_id)
    .bind(start)
    .bind(end)
    .bind(offset)
    .fetch_one(pool)
    .await
}

pub async fn query_page(
    pool: &PgPool,
    tenant_id: &str,
    account_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostedLineRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, i64, NaiveDate, String, i32, Option<String>, i64, i64)>(
        "SELECT j.id, j.journal_no, j.journal_date, j.reference, l.line_no,
                l.description, l.debit_minor, l.credit_minor
         FROM journal_lines l
         JOIN journal_entries j ON j.id = l.journal_id
         WHERE j.tenant_id = $1
           AND j.status = 'POSTED'
           AND l.account_id = $2
           AND j.journal_date BETWEEN $3 AND $4
         ORDER BY j.journal_date, j.journal_no, l.line_no
         LIMIT $5 OFFSET $6",
    )
    .bind(tenant_id)
    .bind(account_id)
    .bind(start)
    .bind(end)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PostedLineRow {
            journal_id: row.0,
            journal_no: row.1,
            journal_date: row.2,
            reference: row.3,
            line_no: row.4,
            description: row.5,
            debit_minor: row.6,
            credit_minor: row.7,
        })
        .collect())
}

pub async fn count_range(
    pool: &PgPool,
    tenant_id: &str,
    account_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM journal_lines l
         JOIN journal_entries j ON j.id = l.journal_id
         WHERE j.tenant_id = $1
           AND j.status = 'POSTED'
           AND l.account_id = $2
           AND j.journal_date BETWEEN $3 AND $4",
    )
    .bind(tenant_id)
    .bind(account_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
}
