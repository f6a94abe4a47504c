//! Reversal and correction protocol
//!
//! A posted journal is never mutated; its effect is undone by a new REVERSING
//! journal with every line mirrored, which then flows through the full
//! Submit → Review → Post cycle. Posted journals whose lines predate
//! dimensional controls cannot be mirrored (the mirror would fail submission
//! validation it is exempt from earning), so the protocol redirects those to
//! the correcting-journal path instead.

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Actor, DepartmentRequirement, JournalStatus, JournalType, Permission};
use crate::errors::{EngineError, EngineResult};
use crate::repos::account_repo;
use crate::repos::journal_repo::{self, JournalEntry, JournalLine, JournalLineInsert, NewJournalEntry};

fn generate_reference() -> String {
    format!("JE-{}", Uuid::new_v4().simple())
}

/// Mirror a posted journal's lines: debit and credit swap, dimensions and
/// ordering carry over 1:1.
fn mirror_lines(lines: &[JournalLine]) -> Vec<JournalLineInsert> {
    lines
        .iter()
        .map(|line| JournalLineInsert {
            line_no: line.line_no,
            account_id: line.account_id,
            legal_entity_id: line.legal_entity_id,
            department_id: line.department_id,
            project_id: line.project_id,
            fund_id: line.fund_id,
            description: line.description.clone(),
            debit_minor: line.credit_minor,
            credit_minor: line.debit_minor,
        })
        .collect()
}

/// Copy a posted journal's lines for a correcting journal: accounts and
/// amounts only, dimensions blanked for re-entry under current controls.
fn correction_lines(lines: &[JournalLine]) -> Vec<JournalLineInsert> {
    lines
        .iter()
        .filter(|l| l.is_non_empty())
        .map(|line| JournalLineInsert {
            line_no: line.line_no,
            account_id: line.account_id,
            legal_entity_id: None,
            department_id: None,
            project_id: None,
            fund_id: None,
            description: line.description.clone(),
            debit_minor: line.debit_minor,
            credit_minor: line.credit_minor,
        })
        .collect()
}

/// Initiate a reversal of a posted journal.
///
/// Creates a new DRAFT journal of type REVERSING, dated at the actor's choice
/// (default today), linked via `reversal_of_id`. It is not auto-posted: it
/// follows the standard cycle like any other journal.
pub async fn reverse_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
    reason: &str,
    reversal_date: Option<NaiveDate>,
) -> EngineResult<JournalEntry> {
    if reason.trim().is_empty() {
        return Err(EngineError::Validation(
            "a reversal reason is required".to_string(),
        ));
    }
    if !actor.has(Permission::Post) {
        return Err(EngineError::Forbidden(
            "posting permission required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let source = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if source.status != JournalStatus::Posted {
        return Err(EngineError::InvalidState {
            current: source.status,
            action: "reverse",
        });
    }
    if actor.user_id == source.created_by {
        return Err(EngineError::Forbidden(
            "the original creator cannot initiate the reversal".to_string(),
        ));
    }
    if source.reversal_of_id.is_some() {
        return Err(EngineError::InvalidState {
            current: source.status,
            action: "reverse a reversal",
        });
    }
    if source.reversed_by_id.is_some() {
        return Err(EngineError::InvalidState {
            current: source.status,
            action: "reverse an already-reversed journal",
        });
    }
    // One reversal at a time: an unposted reversal in flight blocks a second
    // initiation, not just a posted one.
    if journal_repo::reversal_exists_tx(&mut tx, tenant_id, source.id).await? {
        return Err(EngineError::InvalidState {
            current: source.status,
            action: "reverse a journal with a reversal outstanding",
        });
    }

    let lines = journal_repo::fetch_lines_tx(&mut tx, journal_id).await?;

    // Legacy data predating dimensional controls cannot be mirrored; the
    // mirror would carry the same gaps into a journal exempt from dimension
    // checks. Redirect to the correcting-journal path.
    for line in lines.iter().filter(|l| l.is_non_empty()) {
        if line.legal_entity_id.is_none() {
            return Err(EngineError::LegacyJournalMissingDimensions { journal_id });
        }
        if line.department_id.is_none() {
            if let Some(account_id) = line.account_id {
                let account = account_repo::find_by_id_tx(&mut tx, tenant_id, account_id)
                    .await?
                    .ok_or(EngineError::NotFound("account"))?;
                if account.department_requirement == DepartmentRequirement::Required {
                    return Err(EngineError::LegacyJournalMissingDimensions { journal_id });
                }
            }
        }
    }

    let reversal = NewJournalEntry {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        journal_type: JournalType::Reversing,
        journal_date: reversal_date.unwrap_or_else(|| Utc::now().date_naive()),
        reference: generate_reference(),
        description: format!("Reversal of {}: {}", source.reference, reason.trim()),
        budget_override_justification: None,
        created_by: actor.user_id,
        corrects_journal_id: None,
        reversal_of_id: Some(source.id),
    };

    journal_repo::insert_draft(&mut tx, &reversal).await?;
    journal_repo::bulk_insert_lines(&mut tx, reversal.id, &mirror_lines(&lines)).await?;
    journal_repo::set_reversal_initiated(&mut tx, tenant_id, source.id, actor.user_id, Utc::now())
        .await?;
    tx.commit().await?;

    tracing::info!(
        reversal_id = %reversal.id,
        original_id = %source.id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        "reversal journal created"
    );

    journal_repo::fetch_entry(pool, tenant_id, reversal.id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Create a correcting journal for a posted entry, typically after the
/// reversal path signalled `LegacyJournalMissingDimensions`.
///
/// A normal STANDARD journal pre-populated from the source (accounts and
/// amounts only, dimensions blanked), linked via `corrects_journal_id`, and
/// entered through the standard cycle. Preparing it needs no special
/// permission.
pub async fn create_correcting_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
) -> EngineResult<JournalEntry> {
    let mut tx = pool.begin().await?;

    let source = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if source.status != JournalStatus::Posted {
        return Err(EngineError::InvalidState {
            current: source.status,
            action: "correct",
        });
    }

    let lines = journal_repo::fetch_lines_tx(&mut tx, journal_id).await?;

    let correction = NewJournalEntry {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        journal_type: JournalType::Standard,
        journal_date: Utc::now().date_naive(),
        reference: generate_reference(),
        description: format!("Correction: {}", source.description),
        budget_override_justification: None,
        created_by: actor.user_id,
        corrects_journal_id: Some(source.id),
        reversal_of_id: None,
    };

    journal_repo::insert_draft(&mut tx, &correction).await?;
    journal_repo::bulk_insert_lines(&mut tx, correction.id, &correction_lines(&lines)).await?;
    tx.commit().await?;

    tracing::info!(
        correction_id = %correction.id,
        original_id = %source.id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        "correcting journal created"
    );

    journal_repo::fetch_entry(pool, tenant_id, correction.id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}
