//! Budget evaluator
//!
//! Computes a journal-level budget status by evaluating every non-empty line
//! against the approved budget snapshot. Advisory at Submit (WARN requires an
//! override justification, BLOCK refuses) and authoritative at Post (BLOCK
//! always refuses). The evaluator only reads budgets, never mutates them.

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::BudgetStatus;
use crate::repos::account_repo::GlAccount;
use crate::repos::budget_repo;

/// Flags are evaluated over all lines but capped here for display payloads.
pub const DISPLAY_FLAG_CAP: usize = 20;

/// Over-budget tolerance: a line overrunning by at most this share of the
/// approved amount is a WARN; beyond it, BLOCK.
const WARN_TOLERANCE_DIVISOR: i64 = 10;

/// Itemized per-line budget outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetFlag {
    pub line_no: i32,
    pub account_code: String,
    pub status: BudgetStatus,
    pub amount_minor: i64,
    pub available_minor: i64,
    pub variance_minor: i64,
}

/// Journal-level outcome: worst-of line statuses plus itemized flags.
#[derive(Debug, Clone)]
pub struct BudgetAssessment {
    pub status: BudgetStatus,
    pub flags: Vec<BudgetFlag>,
}

impl BudgetAssessment {
    /// Serialized flags for persistence on the journal; None when no line
    /// matched a budget.
    pub fn flags_json(&self) -> Option<String> {
        if self.flags.is_empty() {
            None
        } else {
            serde_json::to_string(&self.flags).ok()
        }
    }
}

/// One line as seen by the evaluator; callers resolve accounts first.
#[derive(Debug)]
pub struct BudgetLineInput<'a> {
    pub line_no: i32,
    pub account: &'a GlAccount,
    pub department_id: Option<Uuid>,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

/// Classify one line's spend against its matched budget.
pub fn classify_line(amount_minor: i64, approved_minor: i64, available_minor: i64) -> BudgetStatus {
    let variance = amount_minor - available_minor;
    if variance <= 0 {
        BudgetStatus::Ok
    } else if variance <= approved_minor / WARN_TOLERANCE_DIVISOR {
        BudgetStatus::Warn
    } else {
        BudgetStatus::Block
    }
}

/// Evaluate all lines against the budget snapshot for the journal's period.
///
/// Credit lines relieve budget rather than consume it and never raise a flag;
/// lines with no matching budget are unbudgeted and OK.
pub async fn evaluate_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    period_id: Uuid,
    lines: &[BudgetLineInput<'_>],
) -> Result<BudgetAssessment, sqlx::Error> {
    let mut status = BudgetStatus::Ok;
    let mut flags = Vec::new();

    for line in lines {
        if line.debit_minor <= 0 {
            continue;
        }

        let availability = budget_repo::availability_tx(
            tx,
            tenant_id,
            line.account.id,
            period_id,
            line.department_id,
        )
        .await?;

        let Some(availability) = availability else {
            continue;
        };

        let available = availability.available_minor();
        let line_status = classify_line(line.debit_minor, availability.approved_minor, available);
        status = status.worst(line_status);

        if flags.len() < DISPLAY_FLAG_CAP {
            flags.push(BudgetFlag {
                line_no: line.line_no,
                account_code: line.account.code.clone(),
                status: line_status,
                amount_minor: line.debit_minor,
                available_minor: available,
                variance_minor: line.debit_minor - available,
            });
        }
    }

    Ok(BudgetAssessment { status, flags })
}
