//! # Error Types
//!
//! Base error hierarchy shared by the certrack crates. Higher layers wrap
//! these in their own `thiserror` enums.

use thiserror::Error;

/// Top-level error type for certrack-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A value failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Validation failures for domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Requirement identifiers must be non-empty slugs.
    #[error("invalid requirement id {0:?}: expected 1-128 chars of [a-z0-9._-]")]
    InvalidRequirementId(String),

    /// Unknown role name.
    #[error("unknown role {0:?}")]
    UnknownRole(String),

    /// Unknown tier name.
    #[error("unknown tier {0:?}")]
    UnknownTier(String),

    /// Unknown requirement status.
    #[error("unknown compliance status {0:?}")]
    UnknownStatus(String),

    /// A UUID-backed identifier failed to parse.
    #[error("invalid {kind} identifier {value:?}")]
    InvalidUuid {
        /// Identifier namespace (e.g. "user").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
