//! # Tier API
//!
//! Tier information, administrative direct assignment, and switch preview
//! for a single user.
//!
//! ## Endpoints
//!
//! - `GET /v1/users/{user_id}/tier`: profile, progress, checklist, pending request
//! - `PUT /v1/users/{user_id}/tier`: assign role and tier (onboarding, admin override)
//! - `GET /v1/users/{user_id}/tier/preview?target_tier=`: eligibility and impact

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use certrack_core::{Role, Tier, UserId};
use certrack_engine::{AssignmentResult, SwitchPreview, TierInfo};

use crate::error::AppError;
use crate::extractors::{extract_path, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

// ── Request DTOs ────────────────────────────────────────────────────

/// Request to assign a role and tier directly.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignTierRequest {
    /// Role, e.g. "IT" or "FINANCE".
    #[schema(value_type = String)]
    pub role: Role,
    /// Target tier: "basic" or "robust".
    #[schema(value_type = String)]
    pub tier: Tier,
    /// Administrator performing the assignment.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub performed_by: Option<UserId>,
}

impl Validate for AssignTierRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Query for a switch preview.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    /// Tier to evaluate: "basic" or "robust".
    #[param(value_type = String)]
    pub target_tier: Tier,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the tier router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/users/{user_id}/tier",
            get(get_tier_info).put(assign_tier),
        )
        .route("/v1/users/{user_id}/tier/preview", get(preview_switch))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /v1/users/{user_id}/tier: current tier, progress, and checklist.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/tier",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Tier information"),
        (status = 404, description = "User has no tier profile", body = crate::error::ErrorBody),
    ),
    tag = "tiers"
)]
async fn get_tier_info(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TierInfo>, AppError> {
    let user_id = UserId::from(extract_path(path)?);
    let info = state.service.get_tier_info(user_id).await?;
    Ok(Json(info))
}

/// PUT /v1/users/{user_id}/tier: assign role and tier, reconciling requirements.
#[utoipa::path(
    put,
    path = "/v1/users/{user_id}/tier",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = AssignTierRequest,
    responses(
        (status = 200, description = "Assignment applied"),
        (status = 400, description = "Malformed request", body = crate::error::ErrorBody),
        (status = 500, description = "No template for role and tier", body = crate::error::ErrorBody),
    ),
    tag = "tiers"
)]
async fn assign_tier(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AssignTierRequest>, JsonRejection>,
) -> Result<Json<AssignmentResult>, AppError> {
    let user_id = UserId::from(extract_path(path)?);
    let req = extract_validated_json(body)?;
    let result = state
        .service
        .assign_tier(user_id, req.role, req.tier, req.performed_by)
        .await?;
    Ok(Json(result))
}

/// GET /v1/users/{user_id}/tier/preview: evaluate a switch without applying it.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/tier/preview",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        PreviewQuery,
    ),
    responses(
        (status = 200, description = "Eligibility and impact; `allowed: false` is not an error"),
        (status = 404, description = "User has no tier profile", body = crate::error::ErrorBody),
    ),
    tag = "tiers"
)]
async fn preview_switch(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<SwitchPreview>, AppError> {
    let user_id = UserId::from(extract_path(path)?);
    let query = extract_query(query)?;
    let preview = state
        .service
        .preview_switch(user_id, query.target_tier)
        .await?;
    Ok(Json(preview))
}
