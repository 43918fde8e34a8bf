//! # certrack-api: Axum API for Compliance Tiers
//!
//! HTTP surface over [`certrack_engine::TierService`]. Callers identify
//! users, reviewers, and administrators by explicit ids; authentication
//! is handled upstream.
//!
//! ## API Surface
//!
//! | Prefix                                | Module                | Domain                      |
//! |---------------------------------------|-----------------------|-----------------------------|
//! | `/v1/users/{id}/tier*`                | [`routes::tiers`]     | Tier info, assign, preview  |
//! | `/v1/users/{id}/requirements/*`       | [`routes::records`]   | Outcome recording           |
//! | `/v1/switch-requests/*`               | [`routes::requests`]  | Switch-request workflow     |
//! | `/v1/users/{id}/audit`, `/v1/audit/*` | [`routes::audit`]     | Audit trail                 |
//!
//! ## Storage
//!
//! [`db::PgStore`] when `DATABASE_URL` is set, otherwise the engine's
//! in-memory store.
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod db;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::tiers::router())
        .merge(routes::records::router())
        .merge(routes::requests::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the store answers queries.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.service.is_ready().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
