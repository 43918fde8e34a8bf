//! # In-Memory Store
//!
//! A [`ComplianceStore`] backed by process memory. Used when no database
//! is configured and throughout the test suites.
//!
//! A single async mutex guards all tables. A transaction holds the lock
//! for its whole lifetime and mutates a private copy; `commit` publishes
//! the copy, and dropping the transaction discards it. Transactions are
//! therefore fully serialized, which satisfies every locking guarantee the
//! trait documents.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use certrack_core::{RequestId, RequirementId, UserId};
use certrack_state::{TierSwitchRequest, UserComplianceRecord, UserProfile};

use crate::audit::ComplianceAuditEntry;
use crate::store::{ComplianceStore, StoreError, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    profiles: HashMap<UserId, UserProfile>,
    records: BTreeMap<(UserId, RequirementId), UserComplianceRecord>,
    requests: HashMap<RequestId, TierSwitchRequest>,
    audit: Vec<ComplianceAuditEntry>,
}

impl Tables {
    fn records_for_user(&self, user_id: UserId) -> Vec<UserComplianceRecord> {
        self.records
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn pending_request_for(&self, user_id: UserId) -> Option<&TierSwitchRequest> {
        self.requests
            .values()
            .find(|r| r.user_id == user_id && r.is_pending())
    }
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_profile(&mut self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.working.profiles.get(&user_id).copied())
    }

    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        self.working.profiles.insert(profile.user_id, *profile);
        Ok(())
    }

    async fn records_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError> {
        Ok(self.working.records_for_user(user_id))
    }

    async fn upsert_record(&mut self, record: &UserComplianceRecord) -> Result<(), StoreError> {
        let key = (record.user_id, record.requirement_id.clone());
        match self.working.records.get_mut(&key) {
            Some(existing) => {
                let id = existing.id;
                let created_at = existing.created_at;
                *existing = record.clone();
                existing.id = id;
                existing.created_at = created_at;
            }
            None => {
                self.working.records.insert(key, record.clone());
            }
        }
        Ok(())
    }

    async fn last_audit_hash(&mut self) -> Result<Option<String>, StoreError> {
        Ok(self.working.audit.last().map(|e| e.entry_hash.clone()))
    }

    async fn append_audit(&mut self, entry: &ComplianceAuditEntry) -> Result<(), StoreError> {
        self.working.audit.push(entry.clone());
        Ok(())
    }

    async fn lock_request(
        &mut self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        Ok(self.working.requests.get(&request_id).cloned())
    }

    async fn pending_request_for(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        Ok(self.working.pending_request_for(user_id).cloned())
    }

    async fn insert_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError> {
        if self.working.requests.contains_key(&request.id) {
            return Err(StoreError::Conflict(format!(
                "switch request {} already exists",
                request.id
            )));
        }
        if request.is_pending() && self.working.pending_request_for(request.user_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "user {} already has a pending switch request",
                request.user_id
            )));
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError> {
        match self.working.requests.get_mut(&request.id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!(
                "switch request {} vanished mid-transaction",
                request.id
            ))),
        }
    }

    async fn delete_request(&mut self, request_id: RequestId) -> Result<bool, StoreError> {
        Ok(self.working.requests.remove(&request_id).is_some())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl ComplianceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.tables.lock().await.profiles.get(&user_id).copied())
    }

    async fn records_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError> {
        Ok(self.tables.lock().await.records_for_user(user_id))
    }

    async fn get_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        Ok(self.tables.lock().await.requests.get(&request_id).cloned())
    }

    async fn pending_requests(&self) -> Result<Vec<TierSwitchRequest>, StoreError> {
        let tables = self.tables.lock().await;
        let mut pending: Vec<_> = tables
            .requests
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.requested_at, r.id));
        Ok(pending)
    }

    async fn requests_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TierSwitchRequest>, StoreError> {
        let tables = self.tables.lock().await;
        let mut requests: Vec<_> = tables
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<ComplianceAuditEntry>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .audit
            .iter()
            .filter(|e| user_id.map_or(true, |u| e.user_id == u))
            .cloned()
            .collect())
    }
}
