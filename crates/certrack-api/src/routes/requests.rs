//! # Tier-Switch Request API
//!
//! Users submit requests to change tier; reviewers work the pending queue.
//!
//! ## Endpoints
//!
//! - `POST /v1/switch-requests`: submit a request
//! - `GET /v1/switch-requests/pending`: review queue, oldest first
//! - `GET /v1/switch-requests/{request_id}`: one request
//! - `POST /v1/switch-requests/{request_id}/review`: approve or reject
//! - `DELETE /v1/switch-requests/{request_id}?user_id=`: owner withdraws
//! - `GET /v1/users/{user_id}/switch-requests`: a user's history, newest first
//!
//! Duplicate, ineligible, and already-resolved requests (including
//! approvals refused because the user's profile moved) are expected
//! outcomes and map to 409 with a typed error code. Non-owner cancellation
//! and self-review map to 403.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use certrack_core::{RequestId, Tier, UserId};
use certrack_engine::{
    AssignmentResult, CancelOutcome, CreateOutcome, PendingRequestView, ReviewOutcome,
};
use certrack_state::{ReviewDecision, TierSwitchRequest};

use crate::error::AppError;
use crate::extractors::{extract_path, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to switch tier.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateSwitchRequest {
    /// Requesting user.
    #[schema(value_type = String)]
    pub user_id: UserId,
    /// The tier the caller believes the user holds.
    #[schema(value_type = String)]
    pub current_tier: Tier,
    /// The tier being requested.
    #[schema(value_type = String)]
    pub requested_tier: Tier,
    /// Why the switch is needed.
    pub justification: String,
}

impl Validate for CreateSwitchRequest {
    fn validate(&self) -> Result<(), String> {
        if self.current_tier == self.requested_tier {
            return Err(format!("already on requested tier {}", self.requested_tier));
        }
        if self.justification.trim().is_empty() {
            return Err("justification must not be empty".to_string());
        }
        Ok(())
    }
}

/// A reviewer's decision on a pending request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReviewRequest {
    /// "approve" or "reject".
    #[schema(value_type = String)]
    pub decision: ReviewDecision,
    /// Reviewing administrator.
    #[schema(value_type = String)]
    pub reviewer_id: UserId,
    /// Notes shown to the requester.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for ReviewRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Query identifying the caller withdrawing a request.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CancelQuery {
    /// Owner of the request.
    pub user_id: Uuid,
}

/// A resolved request and, on approval, the assignment it applied.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub request: TierSwitchRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<AssignmentResult>,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the switch-request router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/switch-requests", post(create_switch_request))
        .route("/v1/switch-requests/pending", get(list_pending_requests))
        .route(
            "/v1/switch-requests/{request_id}",
            get(get_switch_request).delete(cancel_switch_request),
        )
        .route(
            "/v1/switch-requests/{request_id}/review",
            post(review_switch_request),
        )
        .route(
            "/v1/users/{user_id}/switch-requests",
            get(list_user_requests),
        )
}

fn to_details<T: Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/switch-requests: submit a tier-switch request.
#[utoipa::path(
    post,
    path = "/v1/switch-requests",
    request_body = CreateSwitchRequest,
    responses(
        (status = 201, description = "Request created and pending review"),
        (status = 404, description = "User has no tier profile", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate pending request or eligibility denied", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error or stale current tier", body = crate::error::ErrorBody),
    ),
    tag = "switch_requests"
)]
async fn create_switch_request(
    State(state): State<AppState>,
    body: Result<Json<CreateSwitchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TierSwitchRequest>), AppError> {
    let req = extract_validated_json(body)?;
    let outcome = state
        .service
        .create_switch_request(
            req.user_id,
            req.current_tier,
            req.requested_tier,
            &req.justification,
        )
        .await?;

    match outcome {
        CreateOutcome::Created(request) => Ok((StatusCode::CREATED, Json(request))),
        CreateOutcome::DuplicatePending { existing } => Err(AppError::DuplicatePending {
            message: format!(
                "user {} already has pending switch request {}",
                existing.user_id, existing.id
            ),
            details: serde_json::json!({ "existing_request": to_details(&existing)? }),
        }),
        CreateOutcome::EligibilityDenied { preview } => Err(AppError::EligibilityDenied {
            message: preview
                .reason
                .clone()
                .unwrap_or_else(|| "switch not allowed".to_string()),
            details: to_details(&preview)?,
        }),
    }
}

/// GET /v1/switch-requests/pending: the review queue.
#[utoipa::path(
    get,
    path = "/v1/switch-requests/pending",
    responses(
        (status = 200, description = "Pending requests, oldest first, with staleness flags"),
    ),
    tag = "switch_requests"
)]
async fn list_pending_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingRequestView>>, AppError> {
    Ok(Json(state.service.list_pending_requests().await?))
}

/// GET /v1/switch-requests/{request_id}: one request in any state.
#[utoipa::path(
    get,
    path = "/v1/switch-requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Switch request ID")),
    responses(
        (status = 200, description = "Switch request"),
        (status = 404, description = "Switch request not found", body = crate::error::ErrorBody),
    ),
    tag = "switch_requests"
)]
async fn get_switch_request(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TierSwitchRequest>, AppError> {
    let request_id = RequestId::from(extract_path(path)?);
    state
        .service
        .get_request(request_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("switch request {request_id} not found")))
}

/// POST /v1/switch-requests/{request_id}/review: approve or reject.
#[utoipa::path(
    post,
    path = "/v1/switch-requests/{request_id}/review",
    params(("request_id" = Uuid, Path, description = "Switch request ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Request resolved; approval applies the tier"),
        (status = 403, description = "Reviewer owns the request", body = crate::error::ErrorBody),
        (status = 404, description = "Switch request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request already resolved, or the user is no longer eligible", body = crate::error::ErrorBody),
        (status = 503, description = "Storage unavailable; request left pending", body = crate::error::ErrorBody),
    ),
    tag = "switch_requests"
)]
async fn review_switch_request(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewResponse>, AppError> {
    let request_id = RequestId::from(extract_path(path)?);
    let req = extract_validated_json(body)?;
    let outcome = state
        .service
        .review_request(request_id, req.decision, req.reviewer_id, req.notes)
        .await?;

    match outcome {
        ReviewOutcome::Reviewed {
            request,
            assignment,
        } => Ok(Json(ReviewResponse {
            request,
            assignment,
        })),
        ReviewOutcome::NotFound => Err(AppError::NotFound(format!(
            "switch request {request_id} not found"
        ))),
        ReviewOutcome::InvalidState { request } => Err(AppError::Conflict(format!(
            "switch request {} is already {}",
            request.id, request.status
        ))),
        ReviewOutcome::SelfReview => Err(AppError::Forbidden(
            "reviewers may not review their own switch requests".to_string(),
        )),
        ReviewOutcome::NoLongerEligible { request, preview } => {
            Err(AppError::EligibilityDenied {
                message: format!(
                    "switch request {} can no longer be approved: {}",
                    request.id,
                    preview
                        .reason
                        .as_deref()
                        .unwrap_or("user profile changed since submission")
                ),
                details: to_details(&preview)?,
            })
        }
    }
}

/// DELETE /v1/switch-requests/{request_id}?user_id=: withdraw a pending request.
#[utoipa::path(
    delete,
    path = "/v1/switch-requests/{request_id}",
    params(
        ("request_id" = Uuid, Path, description = "Switch request ID"),
        CancelQuery,
    ),
    responses(
        (status = 200, description = "The withdrawn request"),
        (status = 403, description = "Caller does not own the request", body = crate::error::ErrorBody),
        (status = 404, description = "Switch request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request already resolved", body = crate::error::ErrorBody),
    ),
    tag = "switch_requests"
)]
async fn cancel_switch_request(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<CancelQuery>, QueryRejection>,
) -> Result<Json<TierSwitchRequest>, AppError> {
    let request_id = RequestId::from(extract_path(path)?);
    let user_id = UserId::from(extract_query(query)?.user_id);
    let outcome = state.service.cancel_request(request_id, user_id).await?;

    match outcome {
        CancelOutcome::Cancelled(request) => Ok(Json(request)),
        CancelOutcome::NotFound => Err(AppError::NotFound(format!(
            "switch request {request_id} not found"
        ))),
        CancelOutcome::NotOwner => Err(AppError::Forbidden(format!(
            "switch request {request_id} belongs to another user"
        ))),
        CancelOutcome::InvalidState { request } => Err(AppError::Conflict(format!(
            "switch request {} is already {}",
            request.id, request.status
        ))),
    }
}

/// GET /v1/users/{user_id}/switch-requests: a user's request history.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/switch-requests",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Requests, newest first"),
    ),
    tag = "switch_requests"
)]
async fn list_user_requests(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<TierSwitchRequest>>, AppError> {
    let user_id = UserId::from(extract_path(path)?);
    Ok(Json(state.service.requests_for_user(user_id).await?))
}
