//! Repository and resolver for accounting periods
//!
//! The period resolver maps a journal date to its covering period and gates
//! write operations: the date must not precede tenant cutover, a covering
//! period must exist, and that period must be open. The three failure reasons
//! are preserved end-to-end so callers can render precise remediation.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, JournalDateReason};

/// A non-overlapping, contiguous fiscal date range.
#[derive(Debug, Clone, FromRow)]
pub struct AccountingPeriod {
    pub id: Uuid,
    pub tenant_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub is_closed: bool,
    pub created_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str =
    "id, tenant_id, period_start, period_end, is_closed, created_at";

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: &str,
    period_id: Uuid,
) -> Result<Option<AccountingPeriod>, sqlx::Error> {
    sqlx::query_as::<_, AccountingPeriod>(&format!(
        "SELECT {SELECT_COLUMNS} FROM accounting_periods WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(period_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_date_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<Option<AccountingPeriod>, sqlx::Error> {
    sqlx::query_as::<_, AccountingPeriod>(&format!(
        "SELECT {SELECT_COLUMNS}
         FROM accounting_periods
         WHERE tenant_id = $1 AND period_start <= $2 AND period_end >= $2
         LIMIT 1"
    ))
    .bind(tenant_id)
    .bind(date)
    .fetch_optional(&mut **tx)
    .await
}

/// All periods overlapping `[start, end]`, ordered by start date. Used by the
/// ledger read gate to verify closed coverage.
pub async fn find_overlapping(
    pool: &PgPool,
    tenant_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<AccountingPeriod>, sqlx::Error> {
    sqlx::query_as::<_, AccountingPeriod>(&format!(
        "SELECT {SELECT_COLUMNS}
         FROM accounting_periods
         WHERE tenant_id = $1 AND period_start <= $3 AND period_end >= $2
         ORDER BY period_start"
    ))
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Resolve a journal date to an open period, or fail with the precise reason.
///
/// Checked at Submit and re-checked inside the Post transaction, since the
/// period may have closed between the two.
pub async fn resolve_open_period_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    date: NaiveDate,
    cutover_date: NaiveDate,
) -> EngineResult<AccountingPeriod> {
    if date < cutover_date {
        return Err(EngineError::InvalidJournalDate {
            reason: JournalDateReason::CutoverViolation,
            date,
        });
    }

    let period = find_by_date_tx(tx, tenant_id, date).await?;
    match period {
        None => Err(EngineError::InvalidJournalDate {
            reason: JournalDateReason::NoPeriod,
            date,
        }),
        Some(p) if p.is_closed => Err(EngineError::InvalidJournalDate {
            reason: JournalDateReason::PeriodClosed,
            date,
        }),
        Some(p) => Ok(p),
    }
}
