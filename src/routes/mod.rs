//! HTTP API routes
//!
//! Handlers stay thin: extract the tenant and actor from headers, parse the
//! contract types, call the service layer, and map `EngineError` onto HTTP
//! statuses with a stable machine-readable reason code.

pub mod journals;
pub mod ledger;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::domain::{Actor, Permission};
use crate::errors::EngineError;

/// Error payload returned for every failed request.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub reason_code: &'static str,
}

/// Error response wrapper for proper HTTP error handling
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub reason_code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            reason_code: self.reason_code,
        });
        (self.status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidJournalDate { .. }
            | EngineError::DimensionRequired { .. }
            | EngineError::BudgetJustificationRequired
            | EngineError::BudgetBlocked => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::SelfApprovalForbidden | EngineError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            EngineError::InvalidState { .. }
            | EngineError::LegacyJournalMissingDimensions { .. }
            | EngineError::ClosedPeriodRequired => StatusCode::CONFLICT,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Database(inner) => {
                tracing::error!(error = %inner, "database error");
                return ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    reason_code: err.reason_code(),
                    message: "internal server error".to_string(),
                };
            }
        };
        ApiError {
            status,
            reason_code: err.reason_code(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        reason_code: "VALIDATION",
        message: message.into(),
    }
}

/// Tenant identifier from the `x-tenant-id` header.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    let tenant_id = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request("x-tenant-id header is required"))?;
    Ok(tenant_id.to_string())
}

/// Acting identity from the `x-user-id` and `x-permissions` headers.
///
/// `x-permissions` is a comma-separated list (e.g. "approve,post"); unknown
/// entries are rejected rather than ignored so typos fail loudly.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| bad_request("x-user-id header is required"))?;
    let user_id = Uuid::parse_str(user_id.trim())
        .map_err(|_| bad_request("x-user-id must be a valid UUID"))?;

    let mut permissions = Vec::new();
    if let Some(raw) = headers.get("x-permissions").and_then(|v| v.to_str().ok()) {
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let permission = Permission::parse(entry)
                .ok_or_else(|| bad_request(format!("unknown permission: {entry}")))?;
            permissions.push(permission);
        }
    }

    Ok(Actor::new(user_id, permissions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(user: &str, perms: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("x-user-id", HeaderValue::from_str(user).unwrap());
        if let Some(perms) = perms {
            map.insert("x-permissions", HeaderValue::from_str(perms).unwrap());
        }
        map
    }

    #[test]
    fn test_actor_with_permissions() {
        let id = Uuid::new_v4();
        let actor = actor_from_headers(&headers(&id.to_string(), Some("approve, post"))).unwrap();
        assert_eq!(actor.user_id, id);
        assert!(actor.has(Permission::Approve));
        assert!(actor.has(Permission::Post));
    }

    #[test]
    fn test_actor_without_permissions_header() {
        let id = Uuid::new_v4();
        let actor = actor_from_headers(&headers(&id.to_string(), None)).unwrap();
        assert!(!actor.has(Permission::Approve));
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let id = Uuid::new_v4();
        assert!(actor_from_headers(&headers(&id.to_string(), Some("admin"))).is_err());
    }

    #[test]
    fn test_missing_user_id_rejected() {
        let map = HeaderMap::new();
        assert!(actor_from_headers(&map).is_err());
        assert!(tenant_from_headers(&map).is_err());
    }
}
