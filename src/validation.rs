//! Balance rule engine
//!
//! Structural and balance invariants for journal entries, evaluated over a
//! minimal line view so both wire payloads and stored lines can be checked
//! with the same rules. Structure is enforced at Create/Update; structure
//! plus balance are enforced at Submit and re-enforced inside the Post
//! transaction. Totals are always recomputed from lines, never read from a
//! cached field.

use crate::errors::{EngineError, EngineResult};

/// Minimal view of a journal line for invariant checks.
#[derive(Debug, Clone, Copy)]
pub struct LineView {
    pub line_no: i32,
    pub has_account: bool,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

impl LineView {
    /// A line counts as non-empty once it names an account or carries an
    /// amount; fully blank filler rows are ignored by every rule.
    pub fn is_non_empty(&self) -> bool {
        self.has_account || self.debit_minor != 0 || self.credit_minor != 0
    }
}

/// Recomputed debit/credit totals over non-empty lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalTotals {
    pub debit_minor: i64,
    pub credit_minor: i64,
}

pub fn totals(lines: &[LineView]) -> JournalTotals {
    let mut t = JournalTotals {
        debit_minor: 0,
        credit_minor: 0,
    };
    for line in lines.iter().filter(|l| l.is_non_empty()) {
        t.debit_minor += line.debit_minor;
        t.credit_minor += line.credit_minor;
    }
    t
}

/// Structural rules, enforced from Create onward: header description present,
/// at least two non-empty lines, every non-empty line names an account and has
/// exactly one strictly positive side.
pub fn validate_structure(description: &str, lines: &[LineView]) -> EngineResult<()> {
    if description.trim().is_empty() {
        return Err(EngineError::Validation(
            "journal description is required".to_string(),
        ));
    }

    let non_empty: Vec<&LineView> = lines.iter().filter(|l| l.is_non_empty()).collect();
    if non_empty.len() < 2 {
        return Err(EngineError::Validation(format!(
            "journal requires at least 2 non-empty lines, got {}",
            non_empty.len()
        )));
    }

    for line in non_empty {
        if line.debit_minor < 0 || line.credit_minor < 0 {
            return Err(EngineError::Validation(format!(
                "line {}: amounts must be non-negative",
                line.line_no
            )));
        }
        if !line.has_account {
            return Err(EngineError::Validation(format!(
                "line {}: account is required",
                line.line_no
            )));
        }
        match (line.debit_minor > 0, line.credit_minor > 0) {
            (true, true) => {
                return Err(EngineError::Validation(format!(
                    "line {}: a line cannot carry both a debit and a credit",
                    line.line_no
                )));
            }
            (false, false) => {
                return Err(EngineError::Validation(format!(
                    "line {}: exactly one of debit or credit must be positive",
                    line.line_no
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Balance rules, enforced at Submit and re-enforced at Post:
/// sum(debit) == sum(credit) and sum(debit) > 0 over non-empty lines.
/// Amounts are integer minor units so equality is exact.
pub fn validate_balance(lines: &[LineView]) -> EngineResult<()> {
    let t = totals(lines);
    if t.debit_minor != t.credit_minor {
        return Err(EngineError::Validation(format!(
            "journal is not balanced: debits {} != credits {}",
            t.debit_minor, t.credit_minor
        )));
    }
    if t.debit_minor <= 0 {
        return Err(EngineError::Validation(
            "journal total must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
