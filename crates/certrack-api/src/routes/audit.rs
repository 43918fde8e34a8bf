//! # Audit Trail API
//!
//! Read access to the hash-chained assignment log.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use certrack_core::UserId;
use certrack_engine::{ChainVerification, ComplianceAuditEntry};

use crate::error::AppError;
use crate::extractors::extract_path;
use crate::state::AppState;

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users/{user_id}/audit", get(user_audit_log))
        .route("/v1/audit/verify", get(verify_audit_chain))
}

/// GET /v1/users/{user_id}/audit: a user's assignments in append order.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/audit",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Audit entries, oldest first"),
    ),
    tag = "audit"
)]
async fn user_audit_log(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<ComplianceAuditEntry>>, AppError> {
    let user_id = UserId::from(extract_path(path)?);
    Ok(Json(state.service.audit_log(user_id).await?))
}

/// GET /v1/audit/verify: walk the whole chain and report breaks.
#[utoipa::path(
    get,
    path = "/v1/audit/verify",
    responses(
        (status = 200, description = "Chain verification report"),
    ),
    tag = "audit"
)]
async fn verify_audit_chain(
    State(state): State<AppState>,
) -> Result<Json<ChainVerification>, AppError> {
    Ok(Json(state.service.verify_audit_chain().await?))
}
