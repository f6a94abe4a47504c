//! Ledger balance computation
//!
//! Answers "what is the running balance of account X between two points":
//! an opening balance plus a paginated, chronologically ordered list of
//! posted movements with a running balance per row. Page N+1 opens where
//! page N ended; callers must not mix pages from different refresh cycles.
//!
//! Read-consistency policy: drill-downs are only served when every period
//! covering the requested range is CLOSED, so the figures match what was
//! already reported. Only POSTED journals contribute.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{format_journal_no, NormalBalance};
use crate::errors::{EngineError, EngineResult};
use crate::repos::ledger_query_repo::{self, PostedLineRow};
use crate::repos::{account_repo, period_repo};

/// Hard cap on the total offset a caller may page to.
pub const MAX_LEDGER_OFFSET: i64 = 10_000;

/// Range selector: an explicit date range or an accounting period.
#[derive(Debug, Clone)]
pub struct LedgerQuery {
    pub account_id: Uuid,
    pub period_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: i64,
    pub offset: i64,
}

/// One ledger row with its accumulated running balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRow {
    pub journal_id: Uuid,
    pub journal_no: String,
    pub journal_date: NaiveDate,
    pub reference: String,
    pub line_no: i32,
    pub description: Option<String>,
    pub debit_minor: i64,
    pub credit_minor: i64,
    pub running_balance_minor: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMetadata {
    pub limit: i64,
    pub offset: i64,
    pub total_count: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPage {
    pub account_id: Uuid,
    pub account_code: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    /// Signed balance before the range start, oriented by the account's
    /// normal balance side.
    pub opening_balance_minor: i64,
    /// Balance immediately before the first row of this page (equals the
    /// running balance after the last row of the previous page).
    pub page_opening_minor: i64,
    pub rows: Vec<LedgerRow>,
    pub pagination: PaginationMetadata,
}

/// Walk ordered rows accumulating the running balance from `opening`.
fn accumulate(opening: i64, side: NormalBalance, rows: Vec<PostedLineRow>) -> Vec<LedgerRow> {
    let mut balance = opening;
    rows.into_iter()
        .map(|row| {
            balance += side.signed(row.debit_minor, row.credit_minor);
            LedgerRow {
                journal_id: row.journal_id,
                journal_no: format_journal_no(row.journal_no),
                journal_date: row.journal_date,
                reference: row.reference,
                line_no: row.line_no,
                description: row.description,
                debit_minor: row.debit_minor,
                credit_minor: row.credit_minor,
                running_balance_minor: balance,
            }
        })
        .collect()
}

fn validate_pagination(limit: i64, offset: i64) -> EngineResult<()> {
    if !(1..=100).contains(&limit) {
        return Err(EngineError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    if offset < 0 {
        return Err(EngineError::Validation("offset must be >= 0".to_string()));
    }
    if offset > MAX_LEDGER_OFFSET {
        return Err(EngineError::Validation(format!(
            "offset must not exceed {MAX_LEDGER_OFFSET}"
        )));
    }
    Ok(())
}

/// Resolve the query's range and enforce the closed-period read gate.
async fn resolve_closed_range(
    pool: &PgPool,
    tenant_id: &str,
    query: &LedgerQuery,
) -> EngineResult<(NaiveDate, NaiveDate)> {
    if let Some(period_id) = query.period_id {
        let period = period_repo::find_by_id(pool, tenant_id, period_id)
            .await?
            .ok_or(EngineError::NotFound("accounting period"))?;
        if !period.is_closed {
            return Err(EngineError::ClosedPeriodRequired);
        }
        return Ok((period.period_start, period.period_end));
    }

    let (Some(start), Some(end)) = (query.start_date, query.end_date) else {
        return Err(EngineError::Validation(
            "either period_id or start_date and end_date are required".to_string(),
        ));
    };
    if start > end {
        return Err(EngineError::Validation(format!(
            "start_date {start} is after end_date {end}"
        )));
    }

    let periods = period_repo::find_overlapping(pool, tenant_id, start, end).await?;
    if periods.is_empty() {
        return Err(EngineError::ClosedPeriodRequired);
    }
    if periods.iter().any(|p| !p.is_closed) {
        return Err(EngineError::ClosedPeriodRequired);
    }
    // Periods are contiguous; uncovered edges mean the range reaches outside
    // the closed catalog and could still change.
    let covered_start = periods.iter().map(|p| p.period_start).min();
    let covered_end = periods.iter().map(|p| p.period_end).max();
    if covered_start.is_some_and(|s| s > start) || covered_end.is_some_and(|e| e < end) {
        return Err(EngineError::ClosedPeriodRequired);
    }

    Ok((start, end))
}

pub async fn get_ledger(
    pool: &PgPool,
    tenant_id: &str,
    query: &LedgerQuery,
) -> EngineResult<LedgerPage> {
    validate_pagination(query.limit, query.offset)?;

    let (start, end) = resolve_closed_range(pool, tenant_id, query).await?;

    let account = account_repo::find_by_id(pool, tenant_id, query.account_id)
        .await?
        .ok_or(EngineError::NotFound("account"))?;

    let (open_debit, open_credit) =
        ledger_query_repo::opening_sums(pool, tenant_id, account.id, start).await?;
    let opening = account.normal_balance.signed(open_debit, open_credit);

    // The page continues the running balance from where the prior page ended:
    // add the signed sum of the rows skipped by the offset.
    let page_opening = if query.offset > 0 {
        let (skip_debit, skip_credit) = ledger_query_repo::prefix_sums(
            pool,
            tenant_id,
            account.id,
            start,
            end,
            query.offset,
        )
        .await?;
        opening + account.normal_balance.signed(skip_debit, skip_credit)
    } else {
        opening
    };

    let page_rows = ledger_query_repo::query_page(
        pool,
        tenant_id,
        account.id,
        start,
        end,
        query.limit,
        query.offset,
    )
    .await?;
    let total_count = ledger_query_repo::count_range(pool, tenant_id, account.id, start, end).await?;

    let rows = accumulate(page_opening, account.normal_balance, page_rows);
    let has_more = query.offset + (rows.len() as i64) < total_count;

    Ok(LedgerPage {
        account_id: account.id,
        account_code: account.code,
        range_start: start,
        range_end: end,
        opening_balance_minor: opening,
        page_opening_minor: page_opening,
        rows,
        pagination: PaginationMetadata {
            limit: query.limit,
            offset: query.offset,
            total_count,
            has_more,
        },
    })
}
