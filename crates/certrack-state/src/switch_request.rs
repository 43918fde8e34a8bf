//! # Tier-Switch Request State Machine
//!
//! A user-initiated, admin-reviewed proposal to move from one tier to
//! another.
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Approved (terminal)
//!    │
//!    └──────▶ Rejected (terminal)
//! ```
//!
//! A pending request may also be withdrawn by its owner. Withdrawal deletes
//! the request outright since it never took effect; that is a storage
//! operation, not a state, and is handled by the workflow.
//!
//! Resolved requests are immutable. Re-submitting means creating a new
//! request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use certrack_core::{RequestId, Tier, UserId};

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle state of a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchRequestStatus {
    /// Awaiting review.
    Pending,
    /// Approved and applied (terminal).
    Approved,
    /// Rejected (terminal).
    Rejected,
}

impl SwitchRequestStatus {
    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for SwitchRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SwitchRequestStatus {
    type Err = SwitchRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(SwitchRequestError::UnknownStatus(other.to_string())),
        }
    }
}

/// A reviewer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Apply the requested tier.
    Approve,
    /// Decline the request.
    Reject,
}

impl ReviewDecision {
    /// The status a pending request moves to under this decision.
    pub fn target_status(&self) -> SwitchRequestStatus {
        match self {
            Self::Approve => SwitchRequestStatus::Approved,
            Self::Reject => SwitchRequestStatus::Rejected,
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by switch-request construction and transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchRequestError {
    /// Attempted transition is not valid from the current state.
    #[error("invalid switch request transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: SwitchRequestStatus,
        /// Attempted target state.
        to: SwitchRequestStatus,
    },

    /// The requested tier equals the current tier.
    #[error("already on requested tier {0}")]
    SameTier(Tier),

    /// Justification is blank.
    #[error("justification must not be empty")]
    EmptyJustification,

    /// Justification exceeds the configured limit.
    #[error("justification is {len} characters; at most {max} allowed")]
    JustificationTooLong {
        /// Configured maximum.
        max: usize,
        /// Actual length.
        len: usize,
    },

    /// Unrecognized persisted status string.
    #[error("unknown switch request status {0:?}")]
    UnknownStatus(String),
}

// ─── Request ─────────────────────────────────────────────────────────

/// A tier-switch request and its review outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSwitchRequest {
    /// Request identifier.
    pub id: RequestId,
    /// Requesting user.
    pub user_id: UserId,
    /// Tier the user held when requesting.
    pub current_tier: Tier,
    /// Tier the user asked for.
    pub requested_tier: Tier,
    /// Free-text reason supplied by the user.
    pub justification: String,
    /// Lifecycle state.
    pub status: SwitchRequestStatus,
    /// Creation instant.
    pub requested_at: DateTime<Utc>,
    /// Review instant, once resolved.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer, once resolved.
    pub reviewed_by: Option<UserId>,
    /// Reviewer notes.
    pub admin_notes: Option<String>,
}

impl TierSwitchRequest {
    /// Open a new pending request.
    ///
    /// The justification is trimmed; blank or over-long justifications
    /// and same-tier requests are rejected.
    pub fn open(
        user_id: UserId,
        current_tier: Tier,
        requested_tier: Tier,
        justification: &str,
        max_justification_len: usize,
        at: DateTime<Utc>,
    ) -> Result<Self, SwitchRequestError> {
        if current_tier == requested_tier {
            return Err(SwitchRequestError::SameTier(current_tier));
        }
        let justification = justification.trim();
        if justification.is_empty() {
            return Err(SwitchRequestError::EmptyJustification);
        }
        let len = justification.chars().count();
        if len > max_justification_len {
            return Err(SwitchRequestError::JustificationTooLong {
                max: max_justification_len,
                len,
            });
        }
        Ok(Self {
            id: RequestId::new(),
            user_id,
            current_tier,
            requested_tier,
            justification: justification.to_string(),
            status: SwitchRequestStatus::Pending,
            requested_at: at,
            reviewed_at: None,
            reviewed_by: None,
            admin_notes: None,
        })
    }

    /// Resolve a pending request (PENDING → APPROVED | REJECTED).
    pub fn resolve(
        &mut self,
        decision: ReviewDecision,
        reviewer: UserId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), SwitchRequestError> {
        let to = decision.target_status();
        if self.status != SwitchRequestStatus::Pending {
            return Err(SwitchRequestError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.reviewed_at = Some(at);
        self.reviewed_by = Some(reviewer);
        self.admin_notes = notes.filter(|n| !n.trim().is_empty());
        Ok(())
    }

    /// Whether the request is awaiting review.
    pub fn is_pending(&self) -> bool {
        self.status == SwitchRequestStatus::Pending
    }

    /// Whether the request asks for a stricter tier.
    pub fn is_upgrade(&self) -> bool {
        self.current_tier.is_upgrade_to(self.requested_tier)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
