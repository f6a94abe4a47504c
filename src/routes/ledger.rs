//! Ledger drill-down API route
//!
//! Paginated running-balance view of one account over a closed range.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::routes::{tenant_from_headers, ApiError};
use crate::services::ledger_service::{self, LedgerPage, LedgerQuery};

/// Query parameters for the ledger endpoint
#[derive(Debug, Deserialize)]
pub struct LedgerQueryParams {
    /// Accounting period UUID (mutually exclusive with the date range)
    pub period_id: Option<Uuid>,
    /// Range start (inclusive, required if period_id not provided)
    pub start_date: Option<NaiveDate>,
    /// Range end (inclusive, required if period_id not provided)
    pub end_date: Option<NaiveDate>,
    /// Page size (1-100, default 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Pagination offset (default 0)
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Handler for GET /api/ledger/accounts/{account_id}
pub async fn get_account_ledger(
    State(pool): State<Arc<PgPool>>,
    headers: axum::http::HeaderMap,
    Path(account_id): Path<Uuid>,
    Query(params): Query<LedgerQueryParams>,
) -> Result<Json<LedgerPage>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;

    let page = ledger_service::get_ledger(
        &pool,
        &tenant_id,
        &LedgerQuery {
            account_id,
            period_id: params.period_id,
            start_date: params.start_date,
            end_date: params.end_date,
            limit: params.limit,
            offset: params.offset,
        },
    )
    .await?;

    Ok(Json(page))
}
