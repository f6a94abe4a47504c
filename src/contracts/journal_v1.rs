//! Journal HTTP API contract types (v1)
//!
//! Wire amounts are decimal major units (e.g. 105.50) and are converted to
//! integer minor units at the boundary; everything past this module computes
//! in minor units only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::format_journal_no;
use crate::errors::{EngineError, EngineResult};
use crate::repos::journal_repo::{JournalEntry, JournalLine, JournalLineInsert};

/// A single journal line on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLineV1 {
    pub line_no: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_entity_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fund_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Debit amount in major units (must be >= 0)
    #[serde(default)]
    pub debit: f64,

    /// Credit amount in major units (must be >= 0)
    #[serde(default)]
    pub credit: f64,
}

/// Convert a major-unit wire amount to minor units, refusing negatives.
fn to_minor(line_no: i32, side: &str, amount: f64) -> EngineResult<i64> {
    if amount < 0.0 || !amount.is_finite() {
        return Err(EngineError::Validation(format!(
            "line {line_no}: {side} must be a non-negative amount"
        )));
    }
    Ok((amount * 100.0).round() as i64)
}

impl JournalLineV1 {
    pub fn into_insert(self) -> EngineResult<JournalLineInsert> {
        Ok(JournalLineInsert {
            line_no: self.line_no,
            account_id: self.account_id,
            legal_entity_id: self.legal_entity_id,
            department_id: self.department_id,
            project_id: self.project_id,
            fund_id: self.fund_id,
            description: self.description,
            debit_minor: to_minor(self.line_no, "debit", self.debit)?,
            credit_minor: to_minor(self.line_no, "credit", self.credit)?,
        })
    }
}

pub fn lines_into_inserts(lines: Vec<JournalLineV1>) -> EngineResult<Vec<JournalLineInsert>> {
    lines.into_iter().map(JournalLineV1::into_insert).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJournalRequestV1 {
    /// STANDARD, ADJUSTING or ACCRUAL; REVERSING is system-created
    #[serde(default = "default_journal_type")]
    pub journal_type: String,
    pub journal_date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub budget_override_justification: Option<String>,
    pub lines: Vec<JournalLineV1>,
}

fn default_journal_type() -> String {
    "STANDARD".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJournalRequestV1 {
    pub journal_date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub budget_override_justification: Option<String>,
    pub lines: Vec<JournalLineV1>,
}

/// Body for transitions that require a stated reason (reject, return).
#[derive(Debug, Clone, Deserialize)]
pub struct ReasonRequestV1 {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReverseJournalRequestV1 {
    pub reason: String,
    /// Defaults to today when omitted.
    #[serde(default)]
    pub reversal_date: Option<NaiveDate>,
}

/// Journal header on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct JournalResponseV1 {
    pub id: Uuid,
    pub tenant_id: String,
    /// Zero-padded display number, assigned at posting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_no: Option<String>,
    pub journal_type: String,
    pub status: String,
    pub journal_date: NaiveDate,
    pub reference: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<i32>,
    pub risk_flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_flags: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_override_justification: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrects_journal_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversal_of_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversed_by_id: Option<Uuid>,
}

impl From<JournalEntry> for JournalResponseV1 {
    fn from(entry: JournalEntry) -> Self {
        Self {
            id: entry.id,
            tenant_id: entry.tenant_id,
            journal_no: entry.journal_no.map(format_journal_no),
            journal_type: entry.journal_type.as_str().to_string(),
            status: entry.status.as_str().to_string(),
            journal_date: entry.journal_date,
            reference: entry.reference,
            description: entry.description,
            period_id: entry.period_id,
            risk_score: entry.risk_score,
            risk_flags: entry.risk_flags,
            budget_status: entry.budget_status.map(|s| s.as_str().to_string()),
            budget_flags: entry
                .budget_flags
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            budget_override_justification: entry.budget_override_justification,
            created_by: entry.created_by,
            created_at: entry.created_at,
            submitted_by: entry.submitted_by,
            submitted_at: entry.submitted_at,
            reviewed_by: entry.reviewed_by,
            reviewed_at: entry.reviewed_at,
            rejected_reason: entry.rejected_reason,
            posted_by: entry.posted_by,
            posted_at: entry.posted_at,
            returned_reason: entry.returned_reason,
            corrects_journal_id: entry.corrects_journal_id,
            reversal_of_id: entry.reversal_of_id,
            reversed_by_id: entry.reversed_by_id,
        }
    }
}

/// Stored journal line on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct JournalLineResponseV1 {
    pub line_no: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fund_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub debit: f64,
    pub credit: f64,
}

impl From<JournalLine> for JournalLineResponseV1 {
    fn from(line: JournalLine) -> Self {
        Self {
            line_no: line.line_no,
            account_id: line.account_id,
            legal_entity_id: line.legal_entity_id,
            department_id: line.department_id,
            project_id: line.project_id,
            fund_id: line.fund_id,
            description: line.description,
            debit: line.debit_minor as f64 / 100.0,
            credit: line.credit_minor as f64 / 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalDetailResponseV1 {
    #[serde(flatten)]
    pub journal: JournalResponseV1,
    pub lines: Vec<JournalLineResponseV1>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalListResponseV1 {
    pub journals: Vec<JournalResponseV1>,
    pub pagination: PaginationV1,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationV1 {
    pub limit: i64,
    pub offset: i64,
    pub total_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_create_request() {
        let json = r#"{
            "journal_date": "2025-06-10",
            "description": "Monthly rent accrual",
            "lines": [
                {"line_no": 1, "account_id": "7f2c6a1e-9b4d-4c3a-8e5f-1a2b3c4d5e6f", "debit": 2599.00, "credit": 0},
                {"line_no": 2, "account_id": "8a3d7b2f-0c5e-4d4b-9f6a-2b3c4d5e6f7a", "debit": 0, "credit": 2599.00}
            ]
        }"#;

        let request: CreateJournalRequestV1 = serde_json::from_str(json).unwrap();
        assert_eq!(request.journal_type, "STANDARD");
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.lines[0].debit, 2599.00);
        assert_eq!(request.lines[1].credit, 2599.00);
    }

    #[test]
    fn test_amount_conversion_to_minor_units() {
        let line = JournalLineV1 {
            line_no: 1,
            account_id: Some(Uuid::new_v4()),
            legal_entity_id: None,
            department_id: None,
            project_id: None,
            fund_id: None,
            description: None,
            debit: 105.55,
            credit: 0.0,
        };
        let insert = line.into_insert().unwrap();
        assert_eq!(insert.debit_minor, 10_555);
        assert_eq!(insert.credit_minor, 0);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let line = JournalLineV1 {
            line_no: 3,
            account_id: None,
            legal_entity_id: None,
            department_id: None,
            project_id: None,
            fund_id: None,
            description: None,
            debit: -1.0,
            credit: 0.0,
        };
        assert!(matches!(
            line.into_insert(),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_line_response_converts_back_to_major_units() {
        let line = JournalLine {
            id: Uuid::new_v4(),
            journal_id: Uuid::new_v4(),
            line_no: 1,
            account_id: None,
            legal_entity_id: None,
            department_id: None,
            project_id: None,
            fund_id: None,
            description: None,
            debit_minor: 10_000,
            credit_minor: 0,
        };
        let response = JournalLineResponseV1::from(line);
        assert_eq!(response.debit, 100.0);
        assert_eq!(response.credit, 0.0);
    }
}
