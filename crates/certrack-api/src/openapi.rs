//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "certrack API",
        version = "0.1.0",
        description = "Compliance-tier management: requirement templates by role and tier, reconciliation on tier change, reviewed tier-switch requests, and a hash-chained audit trail.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Tiers
        crate::routes::tiers::get_tier_info,
        crate::routes::tiers::assign_tier,
        crate::routes::tiers::preview_switch,
        // Records
        crate::routes::records::record_outcome,
        // Switch requests
        crate::routes::requests::create_switch_request,
        crate::routes::requests::list_pending_requests,
        crate::routes::requests::get_switch_request,
        crate::routes::requests::review_switch_request,
        crate::routes::requests::cancel_switch_request,
        crate::routes::requests::list_user_requests,
        // Audit
        crate::routes::audit::user_audit_log,
        crate::routes::audit::verify_audit_chain,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::tiers::AssignTierRequest,
        crate::routes::records::RecordOutcomeRequest,
        crate::routes::requests::CreateSwitchRequest,
        crate::routes::requests::ReviewRequest,
    )),
    tags(
        (name = "tiers", description = "Tier information, assignment, and switch preview"),
        (name = "records", description = "Requirement outcome recording"),
        (name = "switch_requests", description = "Tier-switch request workflow"),
        (name = "audit", description = "Assignment audit trail"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
