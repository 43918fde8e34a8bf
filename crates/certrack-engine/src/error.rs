//! # Engine Errors
//!
//! Only conditions that abort an operation are errors. Expected business
//! outcomes (duplicate pending request, eligibility denied, wrong state,
//! wrong owner) are returned as typed variants of the workflow outcome
//! enums instead.

use thiserror::Error;

use certrack_core::{RequirementId, Role, Tier, UserId};
use certrack_state::{RecordError, SwitchRequestError};

use crate::store::StoreError;

/// Errors raised by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No template is configured for the pair. The operation made no writes.
    #[error("no requirement template configured for role {role} at tier {tier}")]
    TemplateMissing {
        /// Role looked up.
        role: Role,
        /// Tier looked up.
        tier: Tier,
    },

    /// The user has no profile.
    #[error("user {0} has no tier profile")]
    ProfileNotFound(UserId),

    /// The user has no record for the requirement.
    #[error("user {user_id} has no record for requirement {requirement_id}")]
    RecordNotFound {
        /// Record owner.
        user_id: UserId,
        /// Requested requirement.
        requirement_id: RequirementId,
    },

    /// The caller's view of the current tier is out of date.
    #[error("current tier is {actual}, not {expected}")]
    StaleTier {
        /// Tier the caller asserted.
        expected: Tier,
        /// Tier actually held.
        actual: Tier,
    },

    /// The switch request failed construction-time validation.
    #[error(transparent)]
    InvalidRequest(#[from] SwitchRequestError),

    /// A record mutation was rejected.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The store failed. The operation's writes were rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_transient())
    }

    /// Operational faults, as opposed to rejected input.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::TemplateMissing { .. } | Self::Persistence(_))
    }

    /// Log a fault at `error` with the operation's context. Returns whether
    /// anything was logged. `TemplateMissing` supplies its own role and tier
    /// when the operation had not resolved them.
    pub fn log_fault(&self, ctx: &FaultContext) -> bool {
        let (role, tier) = match self {
            Self::TemplateMissing { role, tier } => {
                (ctx.role.or(Some(*role)), ctx.tier.or(Some(*tier)))
            }
            Self::Persistence(_) => (ctx.role, ctx.tier),
            _ => return false,
        };
        tracing::error!(
            user_id = %ctx.user_id.map_or_else(|| "unknown".to_string(), |u| u.to_string()),
            role = %role.map_or("unknown", |r| r.as_str()),
            tier = %tier.map_or("unknown", |t| t.as_str()),
            operation = %ctx.operation,
            error = %self,
            "compliance operation failed"
        );
        true
    }
}

/// What an operation knew about its subject when it failed.
#[derive(Debug, Clone, Copy)]
pub struct FaultContext {
    /// Operation name.
    pub operation: &'static str,
    /// Subject user.
    pub user_id: Option<UserId>,
    /// Role held, once the profile has been read.
    pub role: Option<Role>,
    /// Tier the operation was acting on.
    pub tier: Option<Tier>,
}

impl FaultContext {
    /// Start a context for `operation` on `user_id`.
    pub fn new(operation: &'static str, user_id: Option<UserId>, tier: Option<Tier>) -> Self {
        Self {
            operation,
            user_id,
            role: None,
            tier,
        }
    }

    /// Log `err` if it is a fault and hand it back.
    pub fn fail(&self, err: EngineError) -> EngineError {
        err.log_fault(self);
        err
    }
}

impl From<certrack_catalog::CatalogError> for EngineError {
    fn from(err: certrack_catalog::CatalogError) -> Self {
        match err {
            certrack_catalog::CatalogError::TemplateNotFound { role, tier } => {
                Self::TemplateMissing { role, tier }
            }
            // Only lookups reach the engine; load-time errors are caught at startup.
            other => Self::Persistence(StoreError::Corrupt(other.to_string())),
        }
    }
}
