//! # User Compliance Records
//!
//! One record exists per `(user, requirement)` pair the user has ever been
//! assigned. The record is the unit of completion evidence.
//!
//! ## Lifecycle
//!
//! ```text
//! (created, pending) ──▶ active ◀──▶ retired
//!                          │
//!                          └── status updates (submission / approval flows)
//! ```
//!
//! Retiring a record only clears its `active` flag. Reactivating it
//! restores the flag without touching `status`, so a requirement completed
//! on one tier still reads `compliant` after a round trip through another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use certrack_core::{ComplianceStatus, RecordId, RequirementId, UserId};

/// Errors from record mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Outcomes may only be recorded against active records.
    #[error("requirement {requirement_id} is not active for user {user_id}")]
    Inactive {
        /// Owner of the record.
        user_id: UserId,
        /// The retired requirement.
        requirement_id: RequirementId,
    },
}

/// Optional verification metadata attached when an outcome is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Who verified the outcome, if someone other than the system.
    pub verified_by: Option<UserId>,
    /// When the outcome was verified.
    pub verified_at: DateTime<Utc>,
    /// Reviewer notes.
    pub notes: Option<String>,
}

/// A user's instance of one requirement definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserComplianceRecord {
    /// Row identifier.
    pub id: RecordId,
    /// Owner.
    pub user_id: UserId,
    /// The catalog requirement this record instantiates.
    pub requirement_id: RequirementId,
    /// Current outcome.
    pub status: ComplianceStatus,
    /// Submitted value (certificate number, document reference, score).
    pub value: Option<String>,
    /// Whether the requirement applies to the user's current tier.
    pub active: bool,
    /// Verification metadata, if the outcome was verified.
    pub verification: Option<Verification>,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
    /// Last mutation.
    pub updated_at: DateTime<Utc>,
}

impl UserComplianceRecord {
    /// A fresh, active record in `pending` status.
    pub fn new_pending(user_id: UserId, requirement_id: RequirementId, at: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            requirement_id,
            status: ComplianceStatus::Pending,
            value: None,
            active: true,
            verification: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Mark the record active again. Status is left untouched.
    ///
    /// Returns `true` if the flag changed.
    pub fn reactivate(&mut self, at: DateTime<Utc>) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.updated_at = at;
        true
    }

    /// Retire the record. Status is left untouched.
    ///
    /// Returns `true` if the flag changed.
    pub fn retire(&mut self, at: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.updated_at = at;
        true
    }

    /// Record a new outcome for an active requirement.
    pub fn record_outcome(
        &mut self,
        status: ComplianceStatus,
        value: Option<String>,
        verification: Option<Verification>,
        at: DateTime<Utc>,
    ) -> Result<(), RecordError> {
        if !self.active {
            return Err(RecordError::Inactive {
                user_id: self.user_id,
                requirement_id: self.requirement_id.clone(),
            });
        }
        self.status = status;
        if value.is_some() {
            self.value = value;
        }
        if verification.is_some() {
            self.verification = verification;
        }
        self.updated_at = at;
        Ok(())
    }

    /// Whether the record counts as completed.
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}
