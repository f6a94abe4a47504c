//! Error taxonomy shared by every lifecycle operation
//!
//! All variants are local, recoverable, caller-facing errors; each carries a
//! stable reason code so callers can render a precise remediation message
//! instead of a generic failure.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::JournalStatus;

/// Why a journal date was refused by the period resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalDateReason {
    CutoverViolation,
    NoPeriod,
    PeriodClosed,
}

impl JournalDateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CutoverViolation => "CUTOVER_VIOLATION",
            Self::NoPeriod => "NO_PERIOD",
            Self::PeriodClosed => "PERIOD_CLOSED",
        }
    }
}

/// Organizational dimension on a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    LegalEntity,
    Department,
    Project,
    Fund,
}

/// A single dimension-policy violation on a line, keyed by dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "dimension", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionViolation {
    /// Required dimension not supplied.
    Missing(Dimension),
    /// Dimension supplied where the account forbids it.
    Forbidden(Dimension),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("journal date {date} rejected: {}", reason.as_str())]
    InvalidJournalDate {
        reason: JournalDateReason,
        date: NaiveDate,
    },

    #[error("line {line_no} violates dimension policy")]
    DimensionRequired {
        line_no: i32,
        violations: Vec<DimensionViolation>,
    },

    #[error("budget warning requires a non-empty override justification")]
    BudgetJustificationRequired,

    #[error("budget status is BLOCK; the journal cannot proceed")]
    BudgetBlocked,

    #[error("the same user cannot both prepare and approve a journal")]
    SelfApprovalForbidden,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("action '{action}' is not allowed from status {current}")]
    InvalidState {
        current: JournalStatus,
        action: &'static str,
    },

    #[error("journal {journal_id} predates dimensional controls; use a correcting journal")]
    LegacyJournalMissingDimensions { journal_id: Uuid },

    #[error("ledger drill-down requires the covering period(s) to be closed")]
    ClosedPeriodRequired,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable machine-readable code surfaced in error payloads.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::InvalidJournalDate { reason, .. } => reason.as_str(),
            Self::DimensionRequired { .. } => "DIMENSION_REQUIRED",
            Self::BudgetJustificationRequired => "BUDGET_JUSTIFICATION_REQUIRED",
            Self::BudgetBlocked => "BUDGET_BLOCKED",
            Self::SelfApprovalForbidden => "SELF_APPROVAL_FORBIDDEN",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::LegacyJournalMissingDimensions { .. } => "LEGACY_JOURNAL_MISSING_DIMENSIONS",
            Self::ClosedPeriodRequired => "CLOSED_PERIOD_REQUIRED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        let err = EngineError::InvalidJournalDate {
            reason: JournalDateReason::CutoverViolation,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(err.reason_code(), "CUTOVER_VIOLATION");
        assert_eq!(EngineError::BudgetBlocked.reason_code(), "BUDGET_BLOCKED");
        assert_eq!(
            EngineError::LegacyJournalMissingDimensions {
                journal_id: Uuid::new_v4()
            }
            .reason_code(),
            "LEGACY_JOURNAL_MISSING_DIMENSIONS"
        );
    }

    #[test]
    fn test_invalid_state_message_names_action() {
        let err = EngineError::InvalidState {
            current: JournalStatus::Posted,
            action: "submit",
        };
        assert!(err.to_string().contains("submit"));
        assert!(err.to_string().contains("POSTED"));
    }
}
