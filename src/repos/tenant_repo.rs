//! Repository for per-tenant engine settings

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};

/// Tenant-level knobs the engine consults at Submit/Post: the cutover date
/// (boundary of the opening-balances period) and the high-value risk
/// threshold.
#[derive(Debug, Clone)]
pub struct TenantSettings {
    pub tenant_id: String,
    pub cutover_date: NaiveDate,
    pub high_value_threshold_minor: i64,
}

pub async fn find_settings(
    pool: &PgPool,
    tenant_id: &str,
) -> Result<Option<TenantSettings>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, NaiveDate, i64)>(
        "SELECT tenant_id, cutover_date, high_value_threshold_minor
         FROM tenant_settings WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(tenant_id, cutover_date, high_value_threshold_minor)| TenantSettings {
        tenant_id,
        cutover_date,
        high_value_threshold_minor,
    }))
}

pub async fn find_settings_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
) -> Result<Option<TenantSettings>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, NaiveDate, i64)>(
        "SELECT tenant_id, cutover_date, high_value_threshold_minor
         FROM tenant_settings WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(tenant_id, cutover_date, high_value_threshold_minor)| TenantSettings {
        tenant_id,
        cutover_date,
        high_value_threshold_minor,
    }))
}
