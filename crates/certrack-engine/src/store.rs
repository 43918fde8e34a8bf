//! # Persistence Boundary
//!
//! The engine never talks to a database directly. Every mutating operation
//! opens a [`StoreTx`] via [`ComplianceStore::begin`], performs its reads
//! and writes through it, and calls [`StoreTx::commit`]. Dropping a
//! transaction without committing discards every write it made.
//!
//! ## Locking
//!
//! `lock_profile` and `lock_request` take row-level exclusive locks for the
//! remainder of the transaction. Callers acquire the profile lock before
//! the request lock so concurrent operations on the same user queue in a
//! single order.
//!
//! ## Uniqueness
//!
//! Implementations must enforce:
//!
//! - one record per `(user, requirement)` pair (`upsert_record`),
//! - at most one pending switch request per user (`insert_request`
//!   returns [`StoreError::Conflict`] on violation).

use async_trait::async_trait;
use thiserror::Error;

use certrack_core::{RequestId, UserId};
use certrack_state::{TierSwitchRequest, UserComplianceRecord, UserProfile};

use crate::audit::ComplianceAuditEntry;

/// Persistence-layer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend could not be reached or the transaction aborted.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded into domain types.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

/// An open unit of work.
#[async_trait]
pub trait StoreTx: Send {
    /// Read a profile and lock it until commit or rollback.
    async fn lock_profile(&mut self, user_id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Insert or replace a profile.
    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Every record of the user, active and retired, ordered by requirement id.
    async fn records_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError>;

    /// Write a record keyed by `(user_id, requirement_id)`.
    async fn upsert_record(&mut self, record: &UserComplianceRecord) -> Result<(), StoreError>;

    /// Hash of the most recent audit entry, across all users.
    async fn last_audit_hash(&mut self) -> Result<Option<String>, StoreError>;

    /// Append an audit entry. Entries are never updated or deleted.
    async fn append_audit(&mut self, entry: &ComplianceAuditEntry) -> Result<(), StoreError>;

    /// Read a switch request and lock it until commit or rollback.
    async fn lock_request(
        &mut self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError>;

    /// The user's pending request, if any.
    async fn pending_request_for(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TierSwitchRequest>, StoreError>;

    /// Insert a new request.
    async fn insert_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError>;

    /// Overwrite an existing request.
    async fn update_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError>;

    /// Delete a request. Returns `false` if it did not exist.
    async fn delete_request(&mut self, request_id: RequestId) -> Result<bool, StoreError>;

    /// Make every write visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A transactional store for profiles, records, requests, and audit entries.
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    /// Read a profile without locking.
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Every record of the user, ordered by requirement id.
    async fn records_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError>;

    /// Read a switch request without locking.
    async fn get_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError>;

    /// All pending requests, oldest first.
    async fn pending_requests(&self) -> Result<Vec<TierSwitchRequest>, StoreError>;

    /// The user's requests in every state, newest first.
    async fn requests_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TierSwitchRequest>, StoreError>;

    /// Audit entries in append order. `None` returns the whole log.
    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<ComplianceAuditEntry>, StoreError>;
}
