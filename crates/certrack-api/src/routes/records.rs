//! # Requirement Outcome API
//!
//! `PUT /v1/users/{user_id}/requirements/{requirement_id}` records an
//! outcome against one of the user's active requirements. Submission and
//! approval flows call this once they have decided the status.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::put;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use certrack_core::{ComplianceStatus, RequirementId, UserId};
use certrack_state::UserComplianceRecord;

use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, Validate};
use crate::state::AppState;

const MAX_VALUE_LEN: usize = 4096;

/// Request to record a requirement outcome.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordOutcomeRequest {
    /// "compliant", "non_compliant", "warning", or "pending".
    #[schema(value_type = String)]
    pub status: ComplianceStatus,
    /// Submitted value, e.g. a certificate number or document reference.
    #[serde(default)]
    pub value: Option<String>,
    /// Who verified the outcome.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub verified_by: Option<UserId>,
    /// Verification notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for RecordOutcomeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.value.as_ref().is_some_and(|v| v.len() > MAX_VALUE_LEN) {
            return Err(format!("value must be at most {MAX_VALUE_LEN} bytes"));
        }
        Ok(())
    }
}

/// Build the requirement outcome router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/users/{user_id}/requirements/{requirement_id}",
        put(record_outcome),
    )
}

/// PUT /v1/users/{user_id}/requirements/{requirement_id}: record an outcome.
#[utoipa::path(
    put,
    path = "/v1/users/{user_id}/requirements/{requirement_id}",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("requirement_id" = String, Path, description = "Requirement ID"),
    ),
    request_body = RecordOutcomeRequest,
    responses(
        (status = 200, description = "Updated record"),
        (status = 404, description = "No profile or no record for the requirement", body = crate::error::ErrorBody),
        (status = 422, description = "Requirement is retired for this user", body = crate::error::ErrorBody),
    ),
    tag = "records"
)]
async fn record_outcome(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, String)>, PathRejection>,
    body: Result<Json<RecordOutcomeRequest>, JsonRejection>,
) -> Result<Json<UserComplianceRecord>, AppError> {
    let (user_id, requirement_id) = extract_path(path)?;
    let user_id = UserId::from(user_id);
    let requirement_id = RequirementId::new(requirement_id)?;
    let req = extract_validated_json(body)?;

    let record = state
        .service
        .record_outcome(
            user_id,
            &requirement_id,
            req.status,
            req.value,
            req.verified_by,
            req.notes,
        )
        .await?;
    Ok(Json(record))
}
