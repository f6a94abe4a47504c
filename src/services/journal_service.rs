//! Journal lifecycle engine
//!
//! Owns the DRAFT → SUBMITTED → REVIEWED → POSTED state machine, enforces
//! segregation of duties, and runs the validators and evaluators at each
//! transition. Every transition executes in a single transaction: read the
//! current status under a row lock, re-validate, write the new status through
//! a status-guarded UPDATE. Posting is the one irreversible operation and is
//! all-or-nothing; a failure after number assignment rolls the number back
//! with the transaction.

use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dimensions::{self, LineDimensions};
use crate::domain::{Actor, BudgetStatus, JournalStatus, JournalType, Permission};
use crate::errors::{EngineError, EngineResult};
use crate::repos::account_repo::{self, GlAccount};
use crate::repos::journal_repo::{
    self, JournalEntry, JournalFilters, JournalLine, JournalLineInsert, NewJournalEntry,
    SubmitStamp,
};
use crate::repos::{dimension_repo, period_repo, sequence_repo, tenant_repo};
use crate::services::{budget_service, risk_service};
use crate::validation::{self, LineView};

/// Input for creating a journal.
#[derive(Debug, Clone)]
pub struct NewJournal {
    pub journal_type: JournalType,
    pub journal_date: NaiveDate,
    pub description: String,
    pub budget_override_justification: Option<String>,
    pub lines: Vec<JournalLineInsert>,
}

/// Input for updating an editable journal. The journal type is immutable and
/// deliberately absent.
#[derive(Debug, Clone)]
pub struct JournalUpdate {
    pub journal_date: NaiveDate,
    pub description: String,
    pub budget_override_justification: Option<String>,
    pub lines: Vec<JournalLineInsert>,
}

/// Page of journal headers plus total count for pagination.
#[derive(Debug)]
pub struct JournalPage {
    pub entries: Vec<JournalEntry>,
    pub total_count: i64,
}

fn line_views(lines: &[JournalLineInsert]) -> Vec<LineView> {
    lines.iter().map(JournalLineInsert::view).collect()
}

fn stored_line_views(lines: &[JournalLine]) -> Vec<LineView> {
    lines.iter().map(JournalLine::view).collect()
}

fn validate_line_numbers(lines: &[JournalLineInsert]) -> EngineResult<()> {
    let mut seen = std::collections::HashSet::new();
    for line in lines {
        if line.line_no <= 0 {
            return Err(EngineError::Validation(format!(
                "line number {} must be positive",
                line.line_no
            )));
        }
        if !seen.insert(line.line_no) {
            return Err(EngineError::Validation(format!(
                "duplicate line number {}",
                line.line_no
            )));
        }
    }
    Ok(())
}

fn generate_reference() -> String {
    format!("JE-{}", Uuid::new_v4().simple())
}

/// Create a new DRAFT journal. Structural line rules are enforced here;
/// balance, dimension, and budget rules are enforced at Submit.
pub async fn create_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    new: NewJournal,
) -> EngineResult<JournalEntry> {
    validate_line_numbers(&new.lines)?;
    validation::validate_structure(&new.description, &line_views(&new.lines))?;

    let entry = NewJournalEntry {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        journal_type: new.journal_type,
        journal_date: new.journal_date,
        reference: generate_reference(),
        description: new.description,
        budget_override_justification: new.budget_override_justification,
        created_by: actor.user_id,
        corrects_journal_id: None,
        reversal_of_id: None,
    };

    let mut tx = pool.begin().await?;
    journal_repo::insert_draft(&mut tx, &entry).await?;
    journal_repo::bulk_insert_lines(&mut tx, entry.id, &new.lines).await?;
    tx.commit().await?;

    tracing::info!(
        journal_id = %entry.id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        journal_type = %entry.journal_type,
        "journal created"
    );

    journal_repo::fetch_entry(pool, tenant_id, entry.id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Replace header fields and lines of an editable (DRAFT/REJECTED) journal.
pub async fn update_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
    update: JournalUpdate,
) -> EngineResult<JournalEntry> {
    validate_line_numbers(&update.lines)?;
    validation::validate_structure(&update.description, &line_views(&update.lines))?;

    let mut tx = pool.begin().await?;

    let entry = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if entry.created_by != actor.user_id {
        return Err(EngineError::Forbidden(
            "only the creator may edit a journal".to_string(),
        ));
    }
    // A reversing journal must stay a 1:1 mirror of its posted source;
    // editing its lines would bypass the dimension checks it is exempt from.
    if entry.journal_type == JournalType::Reversing {
        return Err(EngineError::Validation(
            "a reversing journal mirrors its source and cannot be edited".to_string(),
        ));
    }
    if !entry.status.is_editable() {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "update",
        });
    }

    let updated = journal_repo::update_editable_header(
        &mut tx,
        tenant_id,
        journal_id,
        update.journal_date,
        &update.description,
        update.budget_override_justification.as_deref(),
    )
    .await?;
    if !updated {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "update",
        });
    }

    journal_repo::delete_lines(&mut tx, journal_id).await?;
    journal_repo::bulk_insert_lines(&mut tx, journal_id, &update.lines).await?;
    tx.commit().await?;

    tracing::info!(
        journal_id = %journal_id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        "journal updated"
    );

    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Resolve and require an active account for each non-empty line.
async fn resolve_line_accounts(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    lines: &[JournalLine],
) -> EngineResult<Vec<(JournalLine, GlAccount)>> {
    let mut resolved = Vec::new();
    for line in lines.iter().filter(|l| l.is_non_empty()) {
        let account_id = line.account_id.ok_or_else(|| {
            EngineError::Validation(format!("line {}: account is required", line.line_no))
        })?;
        let account = account_repo::find_by_id_tx(tx, tenant_id, account_id)
            .await?
            .ok_or_else(|| {
                EngineError::Validation(format!("line {}: account not found", line.line_no))
            })?;
        if !account.is_active {
            return Err(EngineError::Validation(format!(
                "line {}: account {} is inactive",
                line.line_no, account.code
            )));
        }
        resolved.push((line.clone(), account));
    }
    Ok(resolved)
}

/// Dimension policy enforcement for one line, including project/fund
/// consistency lookups. Skipped for REVERSING journals.
async fn enforce_line_dimensions(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    line: &JournalLine,
    account: &GlAccount,
) -> EngineResult<()> {
    let mut project_restricted = false;
    if let Some(project_id) = line.project_id {
        let project = dimension_repo::find_project_tx(tx, tenant_id, project_id)
            .await?
            .ok_or_else(|| {
                EngineError::Validation(format!("line {}: project not found", line.line_no))
            })?;
        project_restricted = project.is_restricted;
    }
    if let Some(fund_id) = line.fund_id {
        let fund = dimension_repo::find_fund_tx(tx, tenant_id, fund_id)
            .await?
            .ok_or_else(|| {
                EngineError::Validation(format!("line {}: fund not found", line.line_no))
            })?;
        if line.project_id != Some(fund.project_id) {
            return Err(EngineError::Validation(format!(
                "line {}: fund does not belong to the selected project",
                line.line_no
            )));
        }
    }

    let dims = LineDimensions {
        legal_entity_id: line.legal_entity_id,
        department_id: line.department_id,
        project_id: line.project_id,
        fund_id: line.fund_id,
    };
    let violations = dimensions::check_line_dimensions(&dims, &account.policy(), project_restricted);
    if !violations.is_empty() {
        return Err(EngineError::DimensionRequired {
            line_no: line.line_no,
            violations,
        });
    }
    Ok(())
}

/// Submit a DRAFT or REJECTED journal for review.
///
/// Gate order is deterministic: structure/balance, period and cutover,
/// dimensions, budget, then risk scoring (which never blocks).
pub async fn submit_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
) -> EngineResult<JournalEntry> {
    let mut tx = pool.begin().await?;

    let entry = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if entry.created_by != actor.user_id {
        return Err(EngineError::Forbidden(
            "only the creator may submit a journal".to_string(),
        ));
    }
    if !entry.status.is_editable() {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "submit",
        });
    }

    let lines = journal_repo::fetch_lines_tx(&mut tx, journal_id).await?;
    let views = stored_line_views(&lines);
    validation::validate_structure(&entry.description, &views)?;
    validation::validate_balance(&views)?;

    let settings = tenant_repo::find_settings_tx(&mut tx, tenant_id)
        .await?
        .ok_or(EngineError::NotFound("tenant settings"))?;

    let period = period_repo::resolve_open_period_tx(
        &mut tx,
        tenant_id,
        entry.journal_date,
        settings.cutover_date,
    )
    .await?;

    let resolved = resolve_line_accounts(&mut tx, tenant_id, &lines).await?;

    // Reversing journals are system-generated from an already-posted source
    // and trusted: their dimensions mirror the original.
    if entry.journal_type != JournalType::Reversing {
        for (line, account) in &resolved {
            enforce_line_dimensions(&mut tx, tenant_id, line, account).await?;
        }
    }

    let budget_inputs: Vec<budget_service::BudgetLineInput<'_>> = resolved
        .iter()
        .map(|(line, account)| budget_service::BudgetLineInput {
            line_no: line.line_no,
            account,
            department_id: line.department_id,
            debit_minor: line.debit_minor,
            credit_minor: line.credit_minor,
        })
        .collect();
    let budget = budget_service::evaluate_tx(&mut tx, tenant_id, period.id, &budget_inputs).await?;

    let has_override = entry
        .budget_override_justification
        .as_deref()
        .is_some_and(|j| !j.trim().is_empty());
    match budget.status {
        BudgetStatus::Block => return Err(EngineError::BudgetBlocked),
        BudgetStatus::Warn if !has_override => {
            return Err(EngineError::BudgetJustificationRequired);
        }
        _ => {}
    }

    let totals = validation::totals(&views);
    let account_ids: Vec<Uuid> = {
        let mut ids: Vec<Uuid> = resolved.iter().map(|(_, a)| a.id).collect();
        ids.sort();
        ids.dedup();
        ids
    };
    let unusual =
        risk_service::has_unusual_account_tx(&mut tx, tenant_id, entry.created_by, &account_ids)
            .await?;
    let now = Utc::now();
    let risk = risk_service::score(&risk_service::RiskInputs {
        journal_type: entry.journal_type,
        journal_date: entry.journal_date,
        submitted_on: now.date_naive(),
        has_budget_override: has_override,
        total_debit_minor: totals.debit_minor,
        high_value_threshold_minor: settings.high_value_threshold_minor,
        has_unusual_account: unusual,
    });

    let stamp = SubmitStamp {
        period_id: period.id,
        submitted_by: actor.user_id,
        submitted_at: now,
        risk_score: risk.score,
        risk_flags: risk.flag_codes(),
        risk_computed_at: now,
        budget_status: budget.status,
        budget_flags: budget.flags_json(),
        budget_checked_at: now,
    };
    let updated = journal_repo::set_submitted(&mut tx, tenant_id, journal_id, &stamp).await?;
    if !updated {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "submit",
        });
    }
    tx.commit().await?;

    tracing::info!(
        journal_id = %journal_id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        risk_score = risk.score,
        budget_status = %budget.status.as_str(),
        "journal submitted"
    );

    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Segregation-of-duties check for Review/Reject: the approver must hold the
/// approval permission and be neither the creator nor the submitter.
fn check_review_gate(actor: &Actor, entry: &JournalEntry) -> EngineResult<()> {
    if !actor.has(Permission::Approve) {
        return Err(EngineError::Forbidden(
            "approval permission required".to_string(),
        ));
    }
    if actor.user_id == entry.created_by || entry.submitted_by == Some(actor.user_id) {
        return Err(EngineError::SelfApprovalForbidden);
    }
    Ok(())
}

/// Approve a submitted journal (SUBMITTED/PARKED → REVIEWED).
pub async fn review_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
) -> EngineResult<JournalEntry> {
    let mut tx = pool.begin().await?;

    let entry = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if !entry.status.awaits_review() {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "review",
        });
    }
    check_review_gate(actor, &entry)?;

    let updated =
        journal_repo::set_reviewed(&mut tx, tenant_id, journal_id, actor.user_id, Utc::now())
            .await?;
    if !updated {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "review",
        });
    }
    tx.commit().await?;

    tracing::info!(
        journal_id = %journal_id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        "journal reviewed"
    );

    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Reject a submitted journal back to an editable state. Requires a reason.
pub async fn reject_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
    reason: &str,
) -> EngineResult<JournalEntry> {
    if reason.trim().is_empty() {
        return Err(EngineError::Validation(
            "a rejection reason is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let entry = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if !entry.status.awaits_review() {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "reject",
        });
    }
    check_review_gate(actor, &entry)?;

    let updated = journal_repo::set_rejected(
        &mut tx,
        tenant_id,
        journal_id,
        actor.user_id,
        Utc::now(),
        reason,
    )
    .await?;
    if !updated {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "reject",
        });
    }
    tx.commit().await?;

    tracing::info!(
        journal_id = %journal_id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        "journal rejected"
    );

    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Poster-initiated REVIEWED → SUBMITTED, used when an issue is found after
/// review but before posting. Requires a reason; the creator does not need to
/// resubmit.
pub async fn return_journal_to_review(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
    reason: &str,
) -> EngineResult<JournalEntry> {
    if reason.trim().is_empty() {
        return Err(EngineError::Validation(
            "a return reason is required".to_string(),
        ));
    }
    if !actor.has(Permission::Post) {
        return Err(EngineError::Forbidden(
            "posting permission required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let entry = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if entry.status != JournalStatus::Reviewed {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "return_to_review",
        });
    }

    let updated = journal_repo::set_returned_to_review(
        &mut tx,
        tenant_id,
        journal_id,
        actor.user_id,
        Utc::now(),
        reason,
    )
    .await?;
    if !updated {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "return_to_review",
        });
    }
    tx.commit().await?;

    tracing::info!(
        journal_id = %journal_id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        "journal returned to review"
    );

    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

/// Post a reviewed journal to the permanent ledger.
///
/// The single irreversible operation: period and budget are re-checked (state
/// may have drifted since review), the per-tenant journal number is assigned,
/// and the status flips to POSTED, all inside one transaction. Concurrent
/// posts of the same journal race on the row lock; the loser sees a status
/// that is no longer REVIEWED and fails with InvalidState.
pub async fn post_journal(
    pool: &PgPool,
    actor: &Actor,
    tenant_id: &str,
    journal_id: Uuid,
) -> EngineResult<JournalEntry> {
    if !actor.has(Permission::Post) {
        return Err(EngineError::Forbidden(
            "posting permission required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let entry = journal_repo::fetch_entry_for_update(&mut tx, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))?;

    if entry.status != JournalStatus::Reviewed {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "post",
        });
    }
    if actor.user_id == entry.created_by || entry.reviewed_by == Some(actor.user_id) {
        return Err(EngineError::SelfApprovalForbidden);
    }

    let lines = journal_repo::fetch_lines_tx(&mut tx, journal_id).await?;
    let views = stored_line_views(&lines);
    validation::validate_structure(&entry.description, &views)?;
    validation::validate_balance(&views)?;

    let settings = tenant_repo::find_settings_tx(&mut tx, tenant_id)
        .await?
        .ok_or(EngineError::NotFound("tenant settings"))?;
    let period = period_repo::resolve_open_period_tx(
        &mut tx,
        tenant_id,
        entry.journal_date,
        settings.cutover_date,
    )
    .await?;

    let resolved = resolve_line_accounts(&mut tx, tenant_id, &lines).await?;
    let budget_inputs: Vec<budget_service::BudgetLineInput<'_>> = resolved
        .iter()
        .map(|(line, account)| budget_service::BudgetLineInput {
            line_no: line.line_no,
            account,
            department_id: line.department_id,
            debit_minor: line.debit_minor,
            credit_minor: line.credit_minor,
        })
        .collect();
    let budget = budget_service::evaluate_tx(&mut tx, tenant_id, period.id, &budget_inputs).await?;
    if budget.status == BudgetStatus::Block {
        return Err(EngineError::BudgetBlocked);
    }

    let journal_no = sequence_repo::next_journal_no(&mut tx, tenant_id).await?;
    let now = Utc::now();
    let updated = journal_repo::set_posted(
        &mut tx,
        tenant_id,
        journal_id,
        journal_no,
        actor.user_id,
        now,
        budget.status,
        budget.flags_json().as_deref(),
        now,
    )
    .await?;
    if !updated {
        return Err(EngineError::InvalidState {
            current: entry.status,
            action: "post",
        });
    }

    // A posted reversal offsets its original; link them in the same
    // transaction so the link exists exactly when the offset is in the ledger.
    // If the original is already linked to another reversal, posting this one
    // would offset it twice; the whole transaction fails instead.
    if let Some(original_id) = entry.reversal_of_id {
        let linked =
            journal_repo::set_reversed_by(&mut tx, tenant_id, original_id, journal_id).await?;
        if !linked {
            return Err(EngineError::InvalidState {
                current: JournalStatus::Posted,
                action: "post a second reversal of the same journal",
            });
        }
    }

    tx.commit().await?;

    tracing::info!(
        journal_id = %journal_id,
        tenant_id = %tenant_id,
        actor_id = %actor.user_id,
        journal_no = journal_no,
        "journal posted"
    );

    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

pub async fn get_journal(
    pool: &PgPool,
    tenant_id: &str,
    journal_id: Uuid,
) -> EngineResult<JournalEntry> {
    journal_repo::fetch_entry(pool, tenant_id, journal_id)
        .await?
        .ok_or(EngineError::NotFound("journal"))
}

pub async fn get_journal_detail(
    pool: &PgPool,
    tenant_id: &str,
    journal_id: Uuid,
) -> EngineResult<(JournalEntry, Vec<JournalLine>)> {
    let entry = get_journal(pool, tenant_id, journal_id).await?;
    let lines = journal_repo::fetch_lines(pool, journal_id).await?;
    Ok((entry, lines))
}

pub async fn list_journals(
    pool: &PgPool,
    tenant_id: &str,
    filters: &JournalFilters,
    limit: i64,
    offset: i64,
) -> EngineResult<JournalPage> {
    if !(1..=100).contains(&limit) {
        return Err(EngineError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    if offset < 0 {
        return Err(EngineError::Validation("offset must be >= 0".to_string()));
    }

    let entries = journal_repo::list(pool, tenant_id, filters, limit, offset).await?;
    let total_count = journal_repo::count(pool, tenant_id, filters).await?;
    Ok(JournalPage {
        entries,
        total_count,
    })
}
