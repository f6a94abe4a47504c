//! Dimension validator
//!
//! The single authoritative implementation of the dimension requirement rules.
//! Both the submission path and any client-side advisory validation go through
//! this function so the rules cannot diverge.
//!
//! Rules, per non-empty line:
//! - legal entity is always required;
//! - department follows the account's requirement policy, and supplying one
//!   when the account forbids it is itself a violation;
//! - project is required if the account requires it or a fund is selected
//!   (a fund cannot be chosen before its project);
//! - fund is required if the account requires it or the selected project is
//!   restricted.

use uuid::Uuid;

use crate::domain::DepartmentRequirement;
use crate::errors::{Dimension, DimensionViolation};

/// Dimension ids carried by a journal line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDimensions {
    pub legal_entity_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub fund_id: Option<Uuid>,
}

/// The slice of account policy the validator needs.
#[derive(Debug, Clone, Copy)]
pub struct AccountPolicy {
    pub department_requirement: DepartmentRequirement,
    pub requires_project: bool,
    pub requires_fund: bool,
}

/// Evaluate one line against its account policy. `project_restricted` is the
/// restricted flag of the line's selected project (false when none selected).
/// Returns every violation, keyed by dimension, in a fixed order.
pub fn check_line_dimensions(
    dims: &LineDimensions,
    policy: &AccountPolicy,
    project_restricted: bool,
) -> Vec<DimensionViolation> {
    let mut violations = Vec::new();

    if dims.legal_entity_id.is_none() {
        violations.push(DimensionViolation::Missing(Dimension::LegalEntity));
    }

    match (policy.department_requirement, dims.department_id) {
        (DepartmentRequirement::Required, None) => {
            violations.push(DimensionViolation::Missing(Dimension::Department));
        }
        (DepartmentRequirement::Forbidden, Some(_)) => {
            violations.push(DimensionViolation::Forbidden(Dimension::Department));
        }
        _ => {}
    }

    let project_needed = policy.requires_project || dims.fund_id.is_some();
    if project_needed && dims.project_id.is_none() {
        violations.push(DimensionViolation::Missing(Dimension::Project));
    }

    let fund_needed = policy.requires_fund || project_restricted;
    if fund_needed && dims.fund_id.is_none() {
        violations.push(DimensionViolation::Missing(Dimension::Fund));
    }

    violations
}
