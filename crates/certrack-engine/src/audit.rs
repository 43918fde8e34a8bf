//! # Audit Recorder
//!
//! Every tier assignment appends one [`ComplianceAuditEntry`] inside the
//! same transaction as the assignment itself. Entries are immutable and
//! form a single SHA-256 hash chain across all users: each entry hashes
//! its own fields together with the previous entry's hash, so an edited,
//! deleted, or reordered entry breaks verification of everything after it.
//!
//! The first entry chains to [`GENESIS_HASH`]. Timestamps enter the hash
//! at second precision so an entry round-trips through any backend that
//! stores at least that much.

use chrono::{DateTime, Utc};
use serde::Serialize;

use certrack_core::{AuditEntryId, RequestId, Role, Tier, UserId};

use crate::store::{StoreError, StoreTx};

/// Previous-hash value of the first entry in the chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One tier assignment, as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceAuditEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Affected user.
    pub user_id: UserId,
    /// Role before the assignment. `None` at onboarding.
    pub from_role: Option<Role>,
    /// Role after the assignment.
    pub to_role: Role,
    /// Tier before the assignment. `None` at onboarding.
    pub from_tier: Option<Tier>,
    /// Tier after the assignment.
    pub to_tier: Tier,
    /// Requirements added.
    pub requirements_added: u32,
    /// Requirements retired.
    pub requirements_removed: u32,
    /// Requirements carried over.
    pub requirements_preserved: u32,
    /// Reviewer or administrator who caused the change.
    pub performed_by: Option<UserId>,
    /// Switch request that caused the change, if any.
    pub switch_request_id: Option<RequestId>,
    /// When the assignment happened.
    pub performed_at: DateTime<Utc>,
    /// Hash of the preceding entry.
    pub previous_hash: String,
    /// Hash of this entry.
    pub entry_hash: String,
}

/// The fields of an entry before it is chained.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    /// Affected user.
    pub user_id: UserId,
    /// Role before.
    pub from_role: Option<Role>,
    /// Role after.
    pub to_role: Role,
    /// Tier before.
    pub from_tier: Option<Tier>,
    /// Tier after.
    pub to_tier: Tier,
    /// Requirements added.
    pub requirements_added: u32,
    /// Requirements retired.
    pub requirements_removed: u32,
    /// Requirements carried over.
    pub requirements_preserved: u32,
    /// Actor.
    pub performed_by: Option<UserId>,
    /// Originating request.
    pub switch_request_id: Option<RequestId>,
    /// Instant of the change.
    pub performed_at: DateTime<Utc>,
}

impl ComplianceAuditEntry {
    /// Chain `draft` onto `previous_hash`.
    pub fn chain(draft: AuditDraft, previous_hash: &str) -> Self {
        let mut entry = Self {
            id: AuditEntryId::new(),
            user_id: draft.user_id,
            from_role: draft.from_role,
            to_role: draft.to_role,
            from_tier: draft.from_tier,
            to_tier: draft.to_tier,
            requirements_added: draft.requirements_added,
            requirements_removed: draft.requirements_removed,
            requirements_preserved: draft.requirements_preserved,
            performed_by: draft.performed_by,
            switch_request_id: draft.switch_request_id,
            performed_at: draft.performed_at,
            previous_hash: previous_hash.to_string(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Recompute this entry's hash from its fields.
    pub fn compute_hash(&self) -> String {
        fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_default()
        }
        let input = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.previous_hash,
            self.id,
            self.user_id,
            opt(&self.from_role),
            self.to_role,
            opt(&self.from_tier),
            self.to_tier,
            self.requirements_added,
            self.requirements_removed,
            self.requirements_preserved,
            opt(&self.performed_by),
            opt(&self.switch_request_id),
            self.performed_at.format("%Y-%m-%dT%H:%M:%SZ"),
        );
        sha256_hex(&input)
    }

    /// Whether the stored hash matches the entry's fields.
    pub fn is_intact(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }
}

/// Result of walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    /// Entries examined.
    pub total_entries: usize,
    /// Entries whose `previous_hash` does not match their predecessor.
    pub broken_links: Vec<AuditEntryId>,
    /// Entries whose `entry_hash` does not match their fields.
    pub tampered: Vec<AuditEntryId>,
    /// Whether the chain verified cleanly.
    pub chain_valid: bool,
}

/// Verify a contiguous run of the log in append order, starting at genesis.
pub fn verify_chain(entries: &[ComplianceAuditEntry]) -> ChainVerification {
    let mut broken_links = Vec::new();
    let mut tampered = Vec::new();
    let mut expected_prev = GENESIS_HASH;

    for entry in entries {
        if entry.previous_hash != expected_prev {
            broken_links.push(entry.id);
        }
        if !entry.is_intact() {
            tampered.push(entry.id);
        }
        expected_prev = &entry.entry_hash;
    }

    ChainVerification {
        total_entries: entries.len(),
        chain_valid: broken_links.is_empty() && tampered.is_empty(),
        broken_links,
        tampered,
    }
}

/// Appends chained entries through an open transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    /// Chain `draft` onto the current head and append it.
    pub async fn record(
        tx: &mut dyn StoreTx,
        draft: AuditDraft,
    ) -> Result<ComplianceAuditEntry, StoreError> {
        let head = tx.last_audit_hash().await?;
        let entry = ComplianceAuditEntry::chain(draft, head.as_deref().unwrap_or(GENESIS_HASH));
        tx.append_audit(&entry).await?;
        Ok(entry)
    }
}

/// Compute SHA-256 hex digest of input string.
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(from: Option<Tier>, to: Tier) -> AuditDraft {
        AuditDraft {
            user_id: UserId::new(),
            from_role: from.map(|_| Role::It),
            to_role: Role::It,
            from_tier: from,
            to_tier: to,
            requirements_added: 3,
            requirements_removed: 1,
            requirements_preserved: 2,
            performed_by: Some(UserId::new()),
            switch_request_id: None,
            performed_at: Utc::now(),
        }
    }

    fn chain_of(n: usize) -> Vec<ComplianceAuditEntry> {
        let mut out: Vec<ComplianceAuditEntry> = Vec::new();
        for _ in 0..n {
            let prev = out.last().map(|e| e.entry_hash.as_str()).unwrap_or(GENESIS_HASH);
            let entry = ComplianceAuditEntry::chain(draft(Some(Tier::Basic), Tier::Robust), prev);
            out.push(entry);
        }
        out
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let e = ComplianceAuditEntry::chain(draft(None, Tier::Basic), GENESIS_HASH);
        assert_eq!(e.entry_hash.len(), 64);
        assert!(e.entry_hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(e.is_intact());
    }

    #[test]
    fn intact_chain_verifies() {
        let chain = chain_of(5);
        let v = verify_chain(&chain);
        assert_eq!(v.total_entries, 5);
        assert!(v.chain_valid);
    }

    #[test]
    fn edited_entry_is_detected() {
        let mut chain = chain_of(3);
        chain[1].requirements_added = 0;
        let v = verify_chain(&chain);
        assert!(!v.chain_valid);
        assert_eq!(v.tampered, vec![chain[1].id]);
        assert!(v.broken_links.is_empty());
    }

    #[test]
    fn deleted_entry_breaks_link() {
        let mut chain = chain_of(3);
        let removed = chain.remove(1);
        let v = verify_chain(&chain);
        assert!(!v.chain_valid);
        assert_eq!(v.broken_links, vec![chain[1].id]);
        assert_ne!(removed.id, chain[1].id);
    }

    #[test]
    fn sub_second_precision_does_not_affect_hash() {
        use chrono::Timelike;
        let mut e = ComplianceAuditEntry::chain(draft(None, Tier::Basic), GENESIS_HASH);
        e.performed_at = e.performed_at.with_nanosecond(0).unwrap();
        assert!(e.is_intact());
    }
}
