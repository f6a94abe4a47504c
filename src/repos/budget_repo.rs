//! Repository for the budget snapshot the evaluator reads
//!
//! Budget lines are owned by an external budgeting module; this engine only
//! reads them, never mutates them. Matching prefers the department-scoped
//! budget line and falls back to the unscoped (account, period) line.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Approved amount and the consumption already committed to the ledger for
/// one matched budget line.
#[derive(Debug, Clone, Copy)]
pub struct BudgetAvailability {
    pub approved_minor: i64,
    pub consumed_minor: i64,
}

impl BudgetAvailability {
    pub fn available_minor(&self) -> i64 {
        self.approved_minor - self.consumed_minor
    }
}

/// Find the budget line matching (account, period, department-scope) and
/// compute its posted consumption. Returns None when the pair is unbudgeted.
pub async fn availability_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    account_id: Uuid,
    period_id: Uuid,
    department_id: Option<Uuid>,
) -> Result<Option<BudgetAvailability>, sqlx::Error> {
    // Most specific scope first: department match sorts before the NULL scope.
    let budget = sqlx::query_as::<_, (i64, Option<Uuid>)>(
        "SELECT approved_minor, department_id
         FROM budget_lines
         WHERE tenant_id = $1
           AND account_id = $2
           AND period_id = $3
           AND (department_id = $4 OR department_id IS NULL)
         ORDER BY department_id NULLS LAST
         LIMIT 1",
    )
    .bind(tenant_id)
    .bind(account_id)
    .bind(period_id)
    .bind(department_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some((approved_minor, scope_department)) = budget else {
        return Ok(None);
    };

    // Consumption: net posted debits against the same scope within the period.
    let consumed_minor = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(l.debit_minor - l.credit_minor), 0)::BIGINT
         FROM journal_lines l
         JOIN journal_entries j ON j.id = l.journal_id
         WHERE j.tenant_id = $1
           AND j.status = 'POSTED'
           AND j.period_id = $2
           AND l.account_id = $3
           AND ($4::uuid IS NULL OR l.department_id = $4)",
    )
    .bind(tenant_id)
    .bind(period_id)
    .bind(account_id)
    .bind(scope_department)
    .fetch_one(&mut **tx)
    .await?;

    Ok(Some(BudgetAvailability {
        approved_minor,
        consumed_minor,
    }))
}
