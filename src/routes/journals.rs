//! Journal lifecycle API routes
//!
//! CRUD plus the lifecycle transitions. Every handler resolves the tenant and
//! actor from headers and delegates to the service layer.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::journal_v1::{
    lines_into_inserts, CreateJournalRequestV1, JournalDetailResponseV1, JournalLineResponseV1,
    JournalListResponseV1, JournalResponseV1, PaginationV1, ReasonRequestV1,
    ReverseJournalRequestV1, UpdateJournalRequestV1,
};
use crate::domain::{JournalStatus, JournalType};
use crate::repos::journal_repo::JournalFilters;
use crate::routes::{actor_from_headers, tenant_from_headers, ApiError};
use crate::services::{journal_service, reversal_service};

fn parse_creatable_type(raw: &str) -> Result<JournalType, ApiError> {
    let journal_type = JournalType::parse(raw).ok_or_else(|| ApiError {
        status: StatusCode::BAD_REQUEST,
        reason_code: "VALIDATION",
        message: format!("unknown journal type: {raw}"),
    })?;
    // Reversing journals come only from the reversal endpoint.
    if journal_type == JournalType::Reversing {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            reason_code: "VALIDATION",
            message: "REVERSING journals are created by reversing a posted journal".to_string(),
        });
    }
    Ok(journal_type)
}

/// Handler for POST /api/journals
pub async fn create_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Json(request): Json<CreateJournalRequestV1>,
) -> Result<(StatusCode, Json<JournalResponseV1>), ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;
    let journal_type = parse_creatable_type(&request.journal_type)?;

    let entry = journal_service::create_journal(
        &pool,
        &actor,
        &tenant_id,
        journal_service::NewJournal {
            journal_type,
            journal_date: request.journal_date,
            description: request.description,
            budget_override_justification: request.budget_override_justification,
            lines: lines_into_inserts(request.lines)?,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// Handler for PUT /api/journals/{journal_id}
pub async fn update_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
    Json(request): Json<UpdateJournalRequestV1>,
) -> Result<Json<JournalResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry = journal_service::update_journal(
        &pool,
        &actor,
        &tenant_id,
        journal_id,
        journal_service::JournalUpdate {
            journal_date: request.journal_date,
            description: request.description,
            budget_override_justification: request.budget_override_justification,
            lines: lines_into_inserts(request.lines)?,
        },
    )
    .await?;

    Ok(Json(entry.into()))
}

/// Handler for GET /api/journals/{journal_id}
pub async fn get_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
) -> Result<Json<JournalDetailResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;

    let (entry, lines) = journal_service::get_journal_detail(&pool, &tenant_id, journal_id).await?;

    Ok(Json(JournalDetailResponseV1 {
        journal: entry.into(),
        lines: lines.into_iter().map(JournalLineResponseV1::from).collect(),
    }))
}

/// Query parameters for the journal list endpoint
#[derive(Debug, Deserialize)]
pub struct ListJournalsQuery {
    pub status: Option<String>,
    pub journal_type: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Handler for GET /api/journals
pub async fn list_journals(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Query(params): Query<ListJournalsQuery>,
) -> Result<Json<JournalListResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;

    let status = match params.status.as_deref() {
        Some(raw) => Some(JournalStatus::parse(raw).ok_or_else(|| ApiError {
            status: StatusCode::BAD_REQUEST,
            reason_code: "VALIDATION",
            message: format!("unknown status: {raw}"),
        })?),
        None => None,
    };
    let journal_type = match params.journal_type.as_deref() {
        Some(raw) => Some(JournalType::parse(raw).ok_or_else(|| ApiError {
            status: StatusCode::BAD_REQUEST,
            reason_code: "VALIDATION",
            message: format!("unknown journal type: {raw}"),
        })?),
        None => None,
    };

    let filters = JournalFilters {
        status,
        journal_type,
        date_from: params.date_from,
        date_to: params.date_to,
        created_by: params.created_by,
    };
    let page =
        journal_service::list_journals(&pool, &tenant_id, &filters, params.limit, params.offset)
            .await?;

    Ok(Json(JournalListResponseV1 {
        journals: page.entries.into_iter().map(JournalResponseV1::from).collect(),
        pagination: PaginationV1 {
            limit: params.limit,
            offset: params.offset,
            total_count: page.total_count,
        },
    }))
}

/// Handler for POST /api/journals/{journal_id}/submit
pub async fn submit_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
) -> Result<Json<JournalResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry = journal_service::submit_journal(&pool, &actor, &tenant_id, journal_id).await?;
    Ok(Json(entry.into()))
}

/// Handler for POST /api/journals/{journal_id}/review
pub async fn review_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
) -> Result<Json<JournalResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry = journal_service::review_journal(&pool, &actor, &tenant_id, journal_id).await?;
    Ok(Json(entry.into()))
}

/// Handler for POST /api/journals/{journal_id}/reject
pub async fn reject_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
    Json(request): Json<ReasonRequestV1>,
) -> Result<Json<JournalResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry =
        journal_service::reject_journal(&pool, &actor, &tenant_id, journal_id, &request.reason)
            .await?;
    Ok(Json(entry.into()))
}

/// Handler for POST /api/journals/{journal_id}/return-to-review
pub async fn return_journal_to_review(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
    Json(request): Json<ReasonRequestV1>,
) -> Result<Json<JournalResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry = journal_service::return_journal_to_review(
        &pool,
        &actor,
        &tenant_id,
        journal_id,
        &request.reason,
    )
    .await?;
    Ok(Json(entry.into()))
}

/// Handler for POST /api/journals/{journal_id}/post
pub async fn post_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
) -> Result<Json<JournalResponseV1>, ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry = journal_service::post_journal(&pool, &actor, &tenant_id, journal_id).await?;
    Ok(Json(entry.into()))
}

/// Handler for POST /api/journals/{journal_id}/reverse
pub async fn reverse_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
    Json(request): Json<ReverseJournalRequestV1>,
) -> Result<(StatusCode, Json<JournalResponseV1>), ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry = reversal_service::reverse_journal(
        &pool,
        &actor,
        &tenant_id,
        journal_id,
        &request.reason,
        request.reversal_date,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// Handler for POST /api/journals/{journal_id}/correct
pub async fn correct_journal(
    State(pool): State<Arc<PgPool>>,
    headers: HeaderMap,
    Path(journal_id): Path<Uuid>,
) -> Result<(StatusCode, Json<JournalResponseV1>), ApiError> {
    let tenant_id = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers)?;

    let entry =
        reversal_service::create_correcting_journal(&pool, &actor, &tenant_id, journal_id).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}
