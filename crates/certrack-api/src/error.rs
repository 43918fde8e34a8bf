//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps engine errors and workflow outcomes to HTTP status codes with a
//! JSON body carrying a machine-readable code, a message, and optional
//! details. Internal and storage failures never leak their messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use certrack_engine::{EngineError, StoreError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "ELIGIBILITY_DENIED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Caller may not perform this action on the resource (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The user already has a request awaiting review (409).
    #[error("{message}")]
    DuplicatePending {
        message: String,
        details: serde_json::Value,
    },

    /// The requested switch fails the eligibility rule (409).
    #[error("{message}")]
    EligibilityDenied {
        message: String,
        details: serde_json::Value,
    },

    /// Storage is temporarily unreachable (503). Safe to retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::DuplicatePending { .. } => (StatusCode::CONFLICT, "DUPLICATE_PENDING_REQUEST"),
            Self::EligibilityDenied { .. } => (StatusCode::CONFLICT, "ELIGIBILITY_DENIED"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal or storage error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::ServiceUnavailable(_) => "Temporarily unavailable, try again".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "storage unavailable"),
            _ => {}
        }

        let details = match self {
            Self::DuplicatePending { details, .. } | Self::EligibilityDenied { details, .. } => {
                Some(details)
            }
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert engine errors to API errors.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::ProfileNotFound(_) | EngineError::RecordNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            EngineError::StaleTier { .. }
            | EngineError::InvalidRequest(_)
            | EngineError::Record(_) => Self::Validation(err.to_string()),
            EngineError::TemplateMissing { .. }
            | EngineError::Persistence(StoreError::Corrupt(_)) => Self::Internal(err.to_string()),
            EngineError::Persistence(_) => Self::ServiceUnavailable(err.to_string()),
        }
    }
}

/// Convert identifier and enum parse failures to API errors.
impl From<certrack_core::ValidationError> for AppError {
    fn from(err: certrack_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
