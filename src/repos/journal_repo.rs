//! Repository for journal entries and lines
//!
//! Every status transition is written with a status-guarded UPDATE
//! (`WHERE status = ANY(expected)`), so two concurrent transitions from the
//! same status race to exactly one winner; the loser sees zero rows affected
//! and reports InvalidState.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use crate::domain::{BudgetStatus, JournalStatus, JournalType};
use crate::validation::LineView;

/// Journal entry header as stored.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub journal_no: Option<i64>,
    pub journal_type: JournalType,
    pub status: JournalStatus,
    pub journal_date: NaiveDate,
    pub reference: String,
    pub description: String,
    pub period_id: Option<Uuid>,
    pub risk_score: Option<i32>,
    pub risk_flags: Vec<String>,
    pub risk_computed_at: Option<DateTime<Utc>>,
    pub budget_status: Option<BudgetStatus>,
    pub budget_flags: Option<String>,
    pub budget_checked_at: Option<DateTime<Utc>>,
    pub budget_override_justification: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub submitted_by: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTime<Utc>>,
    pub returned_by: Option<Uuid>,
    pub returned_at: Option<DateTime<Utc>>,
    pub returned_reason: Option<String>,
    pub reversal_initiated_by: Option<Uuid>,
    pub reversal_initiated_at: Option<DateTime<Utc>>,
    pub corrects_journal_id: Option<Uuid>,
    pub reversal_of_id: Option<Uuid>,
    pub reversed_by_id: Option<Uuid>,
}

/// Journal line as stored.
#[derive(Debug, Clone)]
pub struct JournalLine {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub line_no: i32,
    pub account_id: Option<Uuid>,
    pub legal_entity_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub fund_id: Option<Uuid>,
    pub description: Option<String>,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

impl JournalLine {
    pub fn view(&self) -> LineView {
        LineView {
            line_no: self.line_no,
            has_account: self.account_id.is_some(),
            debit_minor: self.debit_minor,
            credit_minor: self.credit_minor,
        }
    }

    pub fn is_non_empty(&self) -> bool {
        self.view().is_non_empty()
    }
}

/// Line payload for insertion.
#[derive(Debug, Clone)]
pub struct JournalLineInsert {
    pub line_no: i32,
    pub account_id: Option<Uuid>,
    pub legal_entity_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub fund_id: Option<Uuid>,
    pub description: Option<String>,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

impl JournalLineInsert {
    pub fn view(&self) -> LineView {
        LineView {
            line_no: self.line_no,
            has_account: self.account_id.is_some(),
            debit_minor: self.debit_minor,
            credit_minor: self.credit_minor,
        }
    }
}

/// Header payload for a new draft journal.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub journal_type: JournalType,
    pub journal_date: NaiveDate,
    pub reference: String,
    pub description: String,
    pub budget_override_justification: Option<String>,
    pub created_by: Uuid,
    pub corrects_journal_id: Option<Uuid>,
    pub reversal_of_id: Option<Uuid>,
}

/// Fields stamped by a successful Submit, all written in one statement.
#[derive(Debug, Clone)]
pub struct SubmitStamp {
    pub period_id: Uuid,
    pub submitted_by: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub risk_score: i32,
    pub risk_flags: Vec<String>,
    pub risk_computed_at: DateTime<Utc>,
    pub budget_status: BudgetStatus,
    pub budget_flags: Option<String>,
    pub budget_checked_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, tenant_id, journal_no, journal_type, status, journal_date, reference, \
     description, period_id, risk_score, risk_flags, risk_computed_at, budget_status, \
     budget_flags, budget_checked_at, budget_override_justification, created_by, created_at, \
     submitted_by, submitted_at, reviewed_by, reviewed_at, rejected_by, rejected_at, \
     rejected_reason, posted_by, posted_at, returned_by, returned_at, returned_reason, \
     reversal_initiated_by, reversal_initiated_at, corrects_journal_id, reversal_of_id, \
     reversed_by_id";

fn decode_err(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown {column} value: {value}").into())
}

fn map_entry(row: &PgRow) -> Result<JournalEntry, sqlx::Error> {
    let journal_type: String = row.try_get("journal_type")?;
    let status: String = row.try_get("status")?;
    let budget_status: Option<String> = row.try_get("budget_status")?;
    let risk_flags: Option<String> = row.try_get("risk_flags")?;

    Ok(JournalEntry {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        journal_no: row.try_get("journal_no")?,
        journal_type: JournalType::parse(&journal_type)
            .ok_or_else(|| decode_err("journal_type", &journal_type))?,
        status: JournalStatus::parse(&status).ok_or_else(|| decode_err("status", &status))?,
        journal_date: row.try_get("journal_date")?,
        reference: row.try_get("reference")?,
        description: row.try_get("description")?,
        period_id: row.try_get("period_id")?,
        risk_score: row.try_get("risk_score")?,
        risk_flags: risk_flags
            .map(|s| {
                s.split(',')
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        risk_computed_at: row.try_get("risk_computed_at")?,
        budget_status: match budget_status {
            Some(s) => Some(BudgetStatus::parse(&s).ok_or_else(|| decode_err("budget_status", &s))?),
            None => None,
        },
        budget_flags: row.try_get("budget_flags")?,
        budget_checked_at: row.try_get("budget_checked_at")?,
        budget_override_justification: row.try_get("budget_override_justification")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        submitted_by: row.try_get("submitted_by")?,
        submitted_at: row.try_get("submitted_at")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        rejected_by: row.try_get("rejected_by")?,
        rejected_at: row.try_get("rejected_at")?,
        rejected_reason: row.try_get("rejected_reason")?,
        posted_by: row.try_get("posted_by")?,
        posted_at: row.try_get("posted_at")?,
        returned_by: row.try_get("returned_by")?,
        returned_at: row.try_get("returned_at")?,
        returned_reason: row.try_get("returned_reason")?,
        reversal_initiated_by: row.try_get("reversal_initiated_by")?,
        reversal_initiated_at: row.try_get("reversal_initiated_at")?,
        corrects_journal_id: row.try_get("corrects_journal_id")?,
        reversal_of_id: row.try_get("reversal_of_id")?,
        reversed_by_id: row.try_get("reversed_by_id")?,
    })
}

pub async fn insert_draft(
    tx: &mut Transaction<'_, Postgres>,
    entry: &NewJournalEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO journal_entries
             (id, tenant_id, journal_type, status, journal_date, reference, description,
              budget_override_justification, created_by, corrects_journal_id, reversal_of_id)
         VALUES ($1, $2, $3, 'DRAFT', $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(entry.id)
    .bind(&entry.tenant_id)
    .bind(entry.journal_type.as_str())
    .bind(entry.journal_date)
    .bind(&entry.reference)
    .bind(&entry.description)
    .bind(&entry.budget_override_justification)
    .bind(entry.created_by)
    .bind(entry.corrects_journal_id)
    .bind(entry.reversal_of_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn bulk_insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    journal_id: Uuid,
    lines: &[JournalLineInsert],
) -> Result<(), sqlx::Error> {
    for line in lines {
        sqlx::query(
            "INSERT INTO journal_lines
                 (id, journal_id, line_no, account_id, legal_entity_id, department_id,
                  project_id, fund_id, description, debit_minor, credit_minor)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::new_v4())
        .bind(journal_id)
        .bind(line.line_no)
        .bind(line.account_id)
        .bind(line.legal_entity_id)
        .bind(line.department_id)
        .bind(line.project_id)
        .bind(line.fund_id)
        .bind(&line.description)
        .bind(line.debit_minor)
        .bind(line.credit_minor)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

pub async fn delete_lines(
    tx: &mut Transaction<'_, Postgres>,
    journal_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM journal_lines WHERE journal_id = $1")
        .bind(journal_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn fetch_entry(
    pool: &PgPool,
    tenant_id: &str,
    journal_id: Uuid,
) -> Result<Option<JournalEntry>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM journal_entries WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(journal_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_entry).transpose()
}

/// Fetch a header inside a transaction with a row lock, serializing
/// concurrent transitions on the same journal.
pub async fn fetch_entry_for_update(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
) -> Result<Option<JournalEntry>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM journal_entries
         WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
    ))
    .bind(tenant_id)
    .bind(journal_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(map_entry).transpose()
}

pub async fn fetch_lines(
    pool: &PgPool,
    journal_id: Uuid,
) -> Result<Vec<JournalLine>, sqlx::Error> {
    let rows = sqlx::query_as::<
        _,
        (
            Uuid,
            Uuid,
            i32,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<String>,
            i64,
            i64,
        ),
    >(
        "SELECT id, journal_id, line_no, account_id, legal_entity_id, department_id,
                project_id, fund_id, description, debit_minor, credit_minor
         FROM journal_lines
         WHERE journal_id = $1
         ORDER BY line_no",
    )
    .bind(journal_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(line_from_row).collect())
}

pub async fn fetch_lines_tx(
    tx: &mut Transaction<'_, Postgres>,
    journal_id: Uuid,
) -> Result<Vec<JournalLine>, sqlx::Error> {
    let rows = sqlx::query_as::<
        _,
        (
            Uuid,
            Uuid,
            i32,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<String>,
            i64,
            i64,
        ),
    >(
        "SELECT id, journal_id, line_no, account_id, legal_entity_id, department_id,
                project_id, fund_id, description, debit_minor, credit_minor
         FROM journal_lines
         WHERE journal_id = $1
         ORDER BY line_no",
    )
    .bind(journal_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(line_from_row).collect())
}

#[allow(clippy::type_complexity)]
fn line_from_row(
    row: (
        Uuid,
        Uuid,
        i32,
        Option<Uuid>,
        Option<Uuid>,
        Option<Uuid>,
        Option<Uuid>,
        Option<Uuid>,
        Option<String>,
        i64,
        i64,
    ),
) -> JournalLine {
    JournalLine {
        id: row.0,
        journal_id: row.1,
        line_no: row.2,
        account_id: row.3,
        legal_entity_id: row.4,
        department_id: row.5,
        project_id: row.6,
        fund_id: row.7,
        description: row.8,
        debit_minor: row.9,
        credit_minor: row.10,
    }
}

/// Update header fields while the journal is editable. Returns false when the
/// status guard did not match.
pub async fn update_editable_header(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    journal_date: NaiveDate,
    description: &str,
    budget_override_justification: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET journal_date = $3, description = $4, budget_override_justification = $5
         WHERE tenant_id = $1 AND id = $2 AND status IN ('DRAFT', 'REJECTED')",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(journal_date)
    .bind(description)
    .bind(budget_override_justification)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_submitted(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    stamp: &SubmitStamp,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET status = 'SUBMITTED',
             period_id = $3,
             submitted_by = $4,
             submitted_at = $5,
             risk_score = $6,
             risk_flags = $7,
             risk_computed_at = $8,
             budget_status = $9,
             budget_flags = $10,
             budget_checked_at = $11
         WHERE tenant_id = $1 AND id = $2 AND status IN ('DRAFT', 'REJECTED')",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(stamp.period_id)
    .bind(stamp.submitted_by)
    .bind(stamp.submitted_at)
    .bind(stamp.risk_score)
    .bind(stamp.risk_flags.join(","))
    .bind(stamp.risk_computed_at)
    .bind(stamp.budget_status.as_str())
    .bind(&stamp.budget_flags)
    .bind(stamp.budget_checked_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_reviewed(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    reviewed_by: Uuid,
    reviewed_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET status = 'REVIEWED', reviewed_by = $3, reviewed_at = $4
         WHERE tenant_id = $1 AND id = $2 AND status IN ('SUBMITTED', 'PARKED')",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(reviewed_by)
    .bind(reviewed_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_rejected(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    rejected_by: Uuid,
    rejected_at: DateTime<Utc>,
    reason: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET status = 'REJECTED', rejected_by = $3, rejected_at = $4, rejected_reason = $5
         WHERE tenant_id = $1 AND id = $2 AND status IN ('SUBMITTED', 'PARKED')",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(rejected_by)
    .bind(rejected_at)
    .bind(reason)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_returned_to_review(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    returned_by: Uuid,
    returned_at: DateTime<Utc>,
    reason: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET status = 'SUBMITTED', returned_by = $3, returned_at = $4, returned_reason = $5
         WHERE tenant_id = $1 AND id = $2 AND status = 'REVIEWED'",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(returned_by)
    .bind(returned_at)
    .bind(reason)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_posted(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    journal_no: i64,
    posted_by: Uuid,
    posted_at: DateTime<Utc>,
    budget_status: BudgetStatus,
    budget_flags: Option<&str>,
    budget_checked_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET status = 'POSTED',
             journal_no = $3,
             posted_by = $4,
             posted_at = $5,
             budget_status = $6,
             budget_flags = $7,
             budget_checked_at = $8
         WHERE tenant_id = $1 AND id = $2 AND status = 'REVIEWED'",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(journal_no)
    .bind(posted_by)
    .bind(posted_at)
    .bind(budget_status.as_str())
    .bind(budget_flags)
    .bind(budget_checked_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_reversal_initiated(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    journal_id: Uuid,
    initiated_by: Uuid,
    initiated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE journal_entries
         SET reversal_initiated_by = $3, reversal_initiated_at = $4
         WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(journal_id)
    .bind(initiated_by)
    .bind(initiated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Whether any reversal journal, in any status, already links to this
/// original.
pub async fn reversal_exists_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    original_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM journal_entries
         WHERE tenant_id = $1 AND reversal_of_id = $2",
    )
    .bind(tenant_id)
    .bind(original_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

/// Stamp the original journal with its posted reversal. Guarded so the link
/// is only written once.
pub async fn set_reversed_by(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    original_id: Uuid,
    reversing_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE journal_entries
         SET reversed_by_id = $3
         WHERE tenant_id = $1 AND id = $2 AND reversed_by_id IS NULL",
    )
    .bind(tenant_id)
    .bind(original_id)
    .bind(reversing_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Listing filters for review queues and search.
#[derive(Debug, Clone, Default)]
pub struct JournalFilters {
    pub status: Option<JournalStatus>,
    pub journal_type: Option<JournalType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
}

pub async fn list(
    pool: &PgPool,
    tenant_id: &str,
    filters: &JournalFilters,
    limit: i64,
    offset: i64,
) -> Result<Vec<JournalEntry>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {SELECT_COLUMNS} FROM journal_entries WHERE tenant_id = "
    ));
    qb.push_bind(tenant_id);
    push_filters(&mut qb, filters);
    qb.push(" ORDER BY created_at DESC, id");
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(map_entry).collect()
}

pub async fn count(
    pool: &PgPool,
    tenant_id: &str,
    filters: &JournalFilters,
) -> Result<i64, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM journal_entries WHERE tenant_id = ");
    qb.push_bind(tenant_id);
    push_filters(&mut qb, filters);

    let row = qb.build().fetch_one(pool).await?;
    row.try_get::<i64, _>(0)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &JournalFilters) {
    if let Some(status) = filters.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(journal_type) = filters.journal_type {
        qb.push(" AND journal_type = ").push_bind(journal_type.as_str());
    }
    if let Some(from) = filters.date_from {
        qb.push(" AND journal_date >= ").push_bind(from);
    }
    if let Some(to) = filters.date_to {
        qb.push(" AND journal_date <= ").push_bind(to);
    }
    if let Some(created_by) = filters.created_by {
        qb.push(" AND created_by = ").push_bind(created_by);
    }
}
