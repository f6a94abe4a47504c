//! Risk scorer
//!
//! Computes an additive anomaly score and qualitative flags from journal
//! metadata and preparer history. Informational only: scoring never blocks a
//! transition. Results are stamped on the journal at Submit so audit
//! oversight views can aggregate them without re-deriving anything.

use chrono::NaiveDate;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{JournalType, RiskBand};
use crate::repos::dimension_repo;

/// Journal date more than this many days before submission raises LATE_POSTING.
pub const LATE_POSTING_DAYS: i64 = 30;

/// Fewer prior posted uses of an account by the same preparer than this
/// raises UNUSUAL_ACCOUNT.
pub const UNUSUAL_ACCOUNT_MIN_USES: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskFlag {
    LatePosting,
    Reversal,
    BudgetOverride,
    HighValue,
    UnusualAccount,
}

impl RiskFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LatePosting => "LATE_POSTING",
            Self::Reversal => "REVERSAL",
            Self::BudgetOverride => "BUDGET_OVERRIDE",
            Self::HighValue => "HIGH_VALUE",
            Self::UnusualAccount => "UNUSUAL_ACCOUNT",
        }
    }

    fn weight(&self) -> i32 {
        match self {
            Self::LatePosting => 15,
            Self::Reversal => 20,
            Self::BudgetOverride => 15,
            Self::HighValue => 25,
            Self::UnusualAccount => 20,
        }
    }
}

/// Everything the pure scorer looks at.
#[derive(Debug, Clone)]
pub struct RiskInputs {
    pub journal_type: JournalType,
    pub journal_date: NaiveDate,
    pub submitted_on: NaiveDate,
    pub has_budget_override: bool,
    pub total_debit_minor: i64,
    pub high_value_threshold_minor: i64,
    pub has_unusual_account: bool,
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub score: i32,
    pub flags: Vec<RiskFlag>,
    pub band: RiskBand,
}

impl RiskAssessment {
    pub fn flag_codes(&self) -> Vec<String> {
        self.flags.iter().map(|f| f.as_str().to_string()).collect()
    }
}

pub fn score(inputs: &RiskInputs) -> RiskAssessment {
    let mut flags = Vec::new();

    let lag_days = (inputs.submitted_on - inputs.journal_date).num_days();
    if lag_days > LATE_POSTING_DAYS {
        flags.push(RiskFlag::LatePosting);
    }
    if inputs.journal_type == JournalType::Reversing {
        flags.push(RiskFlag::Reversal);
    }
    if inputs.has_budget_override {
        flags.push(RiskFlag::BudgetOverride);
    }
    if inputs.total_debit_minor >= inputs.high_value_threshold_minor {
        flags.push(RiskFlag::HighValue);
    }
    if inputs.has_unusual_account {
        flags.push(RiskFlag::UnusualAccount);
    }

    let score = flags.iter().map(RiskFlag::weight).sum();
    RiskAssessment {
        score,
        flags,
        band: RiskBand::from_score(score),
    }
}

/// Whether any of the journal's accounts is rarely used by this preparer.
pub async fn has_unusual_account_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    created_by: Uuid,
    account_ids: &[Uuid],
) -> Result<bool, sqlx::Error> {
    for account_id in account_ids {
        let uses =
            dimension_repo::account_usage_count_tx(tx, tenant_id, created_by, *account_id).await?;
        if uses < UNUSUAL_ACCOUNT_MIN_USES {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> RiskInputs {
        RiskInputs {
            journal_type: JournalType::Standard,
            journal_date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            submitted_on: NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
            has_budget_override: false,
            total_debit_minor: 10_000,
            high_value_threshold_minor: 1_000_000,
            has_unusual_account: false,
        }
    }

    #[test]
    fn test_quiet_journal_scores_low() {
        let assessment = score(&base_inputs());
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.band, RiskBand::Low);
        assert!(assessment.flags.is_empty());
    }

    #[test]
    fn test_late_posting_flag() {
        let mut inputs = base_inputs();
        inputs.submitted_on = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let assessment = score(&inputs);
        assert!(assessment.flags.contains(&RiskFlag::LatePosting));
        assert_eq!(assessment.score, 15);
    }

    #[test]
    fn test_reversal_plus_override_is_medium() {
        let mut inputs = base_inputs();
        inputs.journal_type = JournalType::Reversing;
        inputs.has_budget_override = true;
        let assessment = score(&inputs);
        assert_eq!(assessment.score, 35);
        assert_eq!(assessment.band, RiskBand::Medium);
    }

    #[test]
    fn test_high_value_unusual_account_is_high() {
        let mut inputs = base_inputs();
        inputs.total_debit_minor = 2_000_000;
        inputs.has_unusual_account = true;
        let assessment = score(&inputs);
        assert_eq!(assessment.score, 45);
        assert_eq!(assessment.band, RiskBand::High);
        assert_eq!(
            assessment.flag_codes(),
            vec!["HIGH_VALUE".to_string(), "UNUSUAL_ACCOUNT".to_string()]
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut inputs = base_inputs();
        inputs.total_debit_minor = 1_000_000;
        assert!(score(&inputs).flags.contains(&RiskFlag::HighValue));
    }
}
