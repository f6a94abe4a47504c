//! Lookups for dimensional entities and preparer history
//!
//! Legal entities and departments live in an external effective-dated lookup
//! service, so only the entities whose policy the engine evaluates directly
//! (projects, funds) are read here, plus the preparer/account usage history
//! the risk scorer consumes.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ProjectRef {
    pub id: Uuid,
    pub is_restricted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FundRef {
    pub id: Uuid,
    pub project_id: Uuid,
}

pub async fn find_project_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    project_id: Uuid,
) -> Result<Option<ProjectRef>, sqlx::Error> {
    let row = sqlx::query_as::<_, (Uuid, bool)>(
        "SELECT id, is_restricted FROM projects WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(project_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(id, is_restricted)| ProjectRef { id, is_restricted }))
}

pub async fn find_fund_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    fund_id: Uuid,
) -> Result<Option<FundRef>, sqlx::Error> {
    let row = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT id, project_id FROM funds WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(fund_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(id, project_id)| FundRef { id, project_id }))
}

/// How many posted journals by this preparer touch the account. Feeds the
/// unusual-account risk flag.
pub async fn account_usage_count_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    created_by: Uuid,
    account_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT j.id)
         FROM journal_entries j
         JOIN journal_lines l ON l.journal_id = j.id
         WHERE j.tenant_id = $1
           AND j.status = 'POSTED'
           AND j.created_by = $2
           AND l.account_id = $3",
    )
    .bind(tenant_id)
    .bind(created_by)
    .bind(account_id)
    .fetch_one(&mut **tx)
    .await
}
