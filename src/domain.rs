//! Core domain types for the journal engine
//!
//! Status and type values are closed enums with exhaustive matches at every
//! transition so adding a variant forces every consumer to be revisited.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Lifecycle status of a journal entry.
///
/// `Parked` is a legacy synonym for `Submitted` and is treated identically for
/// every permission and transition decision; the engine never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    Draft,
    Submitted,
    Reviewed,
    Posted,
    Rejected,
    Parked,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Reviewed => "REVIEWED",
            Self::Posted => "POSTED",
            Self::Rejected => "REJECTED",
            Self::Parked => "PARKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "SUBMITTED" => Some(Self::Submitted),
            "REVIEWED" => Some(Self::Reviewed),
            "POSTED" => Some(Self::Posted),
            "REJECTED" => Some(Self::Rejected),
            "PARKED" => Some(Self::Parked),
            _ => None,
        }
    }

    /// Lines and header are mutable only in these states.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    /// States from which Review/Reject are legal.
    pub fn awaits_review(&self) -> bool {
        matches!(self, Self::Submitted | Self::Parked)
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journal type, immutable once set at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalType {
    Standard,
    Adjusting,
    Accrual,
    Reversing,
}

impl JournalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Adjusting => "ADJUSTING",
            Self::Accrual => "ACCRUAL",
            Self::Reversing => "REVERSING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STANDARD" => Some(Self::Standard),
            "ADJUSTING" => Some(Self::Adjusting),
            "ACCRUAL" => Some(Self::Accrual),
            "REVERSING" => Some(Self::Reversing),
            _ => None,
        }
    }
}

impl std::fmt::Display for JournalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budget evaluation outcome, aggregated worst-of across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Ok,
    Warn,
    Block,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Block => "BLOCK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(Self::Ok),
            "WARN" => Some(Self::Warn),
            "BLOCK" => Some(Self::Block),
            _ => None,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warn => 1,
            Self::Block => 2,
        }
    }

    /// Worst-of aggregation: any BLOCK wins, else any WARN, else OK.
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Department requirement policy on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepartmentRequirement {
    Required,
    Optional,
    Forbidden,
}

impl DepartmentRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::Optional => "OPTIONAL",
            Self::Forbidden => "FORBIDDEN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REQUIRED" => Some(Self::Required),
            "OPTIONAL" => Some(Self::Optional),
            "FORBIDDEN" => Some(Self::Forbidden),
            _ => None,
        }
    }
}

/// Chart-of-accounts classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ASSET" => Some(Self::Asset),
            "LIABILITY" => Some(Self::Liability),
            "EQUITY" => Some(Self::Equity),
            "INCOME" => Some(Self::Income),
            "EXPENSE" => Some(Self::Expense),
            _ => None,
        }
    }
}

/// Which side increases an account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl NormalBalance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEBIT" => Some(Self::Debit),
            "CREDIT" => Some(Self::Credit),
            _ => None,
        }
    }

    /// Signed movement of a line as seen from this balance side.
    pub fn signed(&self, debit_minor: i64, credit_minor: i64) -> i64 {
        match self {
            Self::Debit => debit_minor - credit_minor,
            Self::Credit => credit_minor - debit_minor,
        }
    }
}

/// Qualitative risk band derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: i32) -> Self {
        if score >= 40 {
            Self::High
        } else if score >= 20 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Entitlements a caller may hold. Preparing a journal needs no explicit
/// permission; approving and posting do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Approve,
    Post,
}

impl Permission {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "post" => Some(Self::Post),
            _ => None,
        }
    }
}

/// The acting identity, passed explicitly into every lifecycle operation.
/// No ambient session state: this keeps the engine testable in isolation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub permissions: HashSet<Permission>,
}

impl Actor {
    pub fn new(user_id: Uuid, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            user_id,
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Zero-padded display form of an assigned journal number.
pub fn format_journal_no(journal_no: i64) -> String {
    format!("{journal_no:08}")
}
