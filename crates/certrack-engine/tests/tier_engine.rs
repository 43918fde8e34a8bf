//! End-to-end behavior of the tier engine over the in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use certrack_catalog::{RequirementDefinition, RequirementKind, RequirementTemplate, TemplateCatalog};
use certrack_core::{ComplianceStatus, RequestId, RequirementId, Role, Tier, UserId};
use certrack_engine::assignment::AssignCommand;
use certrack_engine::audit::verify_chain;
use certrack_engine::{
    CancelOutcome, ComplianceAuditEntry, ComplianceStore, CreateOutcome, EligibilityValidator,
    EngineConfig, EngineError, MemoryStore, ReviewOutcome, StoreError, StoreTx,
    TierAssignmentEngine, TierService, TierSwitchWorkflow,
};
use certrack_state::{
    ReviewDecision, SwitchRequestStatus, TierSwitchRequest, UserComplianceRecord, UserProfile,
};

// ── Fixtures ────────────────────────────────────────────────────────

fn def(id: &str) -> RequirementDefinition {
    RequirementDefinition {
        id: RequirementId::new(id).unwrap(),
        name: id.to_string(),
        category: "security".into(),
        kind: RequirementKind::Training,
        mandatory: true,
        description: None,
    }
}

/// IT basic has 100 requirements so completion lands on exact percentages.
/// IT robust keeps all of them and adds five more.
fn hundred_requirement_catalog() -> TemplateCatalog {
    let basic: Vec<_> = (0..100).map(|i| def(&format!("req-{i:03}"))).collect();
    let mut robust = basic.clone();
    robust.extend((0..5).map(|i| def(&format!("extra-{i}"))));
    TemplateCatalog::from_templates([
        RequirementTemplate {
            role: Role::It,
            tier: Tier::Basic,
            requirements: basic,
        },
        RequirementTemplate {
            role: Role::It,
            tier: Tier::Robust,
            requirements: robust,
        },
    ])
    .unwrap()
}

fn service(store: Arc<dyn ComplianceStore>, catalog: TemplateCatalog) -> TierService {
    TierService::new(store, Arc::new(catalog), EngineConfig::default())
}

fn builtin_service() -> (TierService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone(), TemplateCatalog::builtin().unwrap());
    (svc, store)
}

fn rid(id: &str) -> RequirementId {
    RequirementId::new(id).unwrap()
}

async fn complete(svc: &TierService, user: UserId, ids: impl IntoIterator<Item = String>) {
    for id in ids {
        svc.record_outcome(user, &rid(&id), ComplianceStatus::Compliant, None, None, None)
            .await
            .unwrap();
    }
}

async fn onboard_hundred(svc: &TierService, completed: usize) -> UserId {
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();
    complete(svc, user, (0..completed).map(|i| format!("req-{i:03}"))).await;
    user
}

fn created(outcome: CreateOutcome) -> TierSwitchRequest {
    match outcome {
        CreateOutcome::Created(request) => request,
        other => panic!("expected Created, got {other:?}"),
    }
}

// ── Failure injection ───────────────────────────────────────────────

/// Delegates to a `MemoryStore` but fails audit appends while armed.
struct FlakyStore {
    inner: MemoryStore,
    fail_audit: Arc<AtomicBool>,
}

struct FlakyTx {
    inner: Box<dyn StoreTx>,
    fail_audit: bool,
}

#[async_trait]
impl StoreTx for FlakyTx {
    async fn lock_profile(&mut self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        self.inner.lock_profile(user_id).await
    }
    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        self.inner.put_profile(profile).await
    }
    async fn records_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError> {
        self.inner.records_for_user(user_id).await
    }
    async fn upsert_record(&mut self, record: &UserComplianceRecord) -> Result<(), StoreError> {
        self.inner.upsert_record(record).await
    }
    async fn last_audit_hash(&mut self) -> Result<Option<String>, StoreError> {
        self.inner.last_audit_hash().await
    }
    async fn append_audit(&mut self, entry: &ComplianceAuditEntry) -> Result<(), StoreError> {
        if self.fail_audit {
            return Err(StoreError::Unavailable("audit table offline".into()));
        }
        self.inner.append_audit(entry).await
    }
    async fn lock_request(
        &mut self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        self.inner.lock_request(request_id).await
    }
    async fn pending_request_for(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        self.inner.pending_request_for(user_id).await
    }
    async fn insert_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError> {
        self.inner.insert_request(request).await
    }
    async fn update_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError> {
        self.inner.update_request(request).await
    }
    async fn delete_request(&mut self, request_id: RequestId) -> Result<bool, StoreError> {
        self.inner.delete_request(request_id).await
    }
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }
}

#[async_trait]
impl ComplianceStore for FlakyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(FlakyTx {
            inner: self.inner.begin().await?,
            fail_audit: self.fail_audit.load(Ordering::SeqCst),
        }))
    }
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        self.inner.get_profile(user_id).await
    }
    async fn records_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError> {
        self.inner.records_for_user(user_id).await
    }
    async fn get_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        self.inner.get_request(request_id).await
    }
    async fn pending_requests(&self) -> Result<Vec<TierSwitchRequest>, StoreError> {
        self.inner.pending_requests().await
    }
    async fn requests_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TierSwitchRequest>, StoreError> {
        self.inner.requests_for_user(user_id).await
    }
    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<ComplianceAuditEntry>, StoreError> {
        self.inner.audit_entries(user_id).await
    }
}

// ── Eligibility scenarios ───────────────────────────────────────────

#[tokio::test]
async fn upgrade_at_exact_threshold_is_allowed() {
    let svc = service(Arc::new(MemoryStore::new()), hundred_requirement_catalog());
    let user = onboard_hundred(&svc, 75).await;

    let preview = svc.preview_switch(user, Tier::Robust).await.unwrap();
    assert!(preview.allowed);
    assert_eq!(preview.current_progress.percentage, 75);
    assert!(preview.reason.is_none());
}

#[tokio::test]
async fn upgrade_below_threshold_is_denied_with_impact() {
    let svc = service(Arc::new(MemoryStore::new()), hundred_requirement_catalog());
    let user = onboard_hundred(&svc, 74).await;

    let preview = svc.preview_switch(user, Tier::Robust).await.unwrap();
    assert!(!preview.allowed);
    assert_eq!(preview.current_progress.percentage, 74);
    assert!(preview.reason.as_deref().unwrap().contains("75%"));
    let impact = preview.impact.expect("impact is computed for denied upgrades");
    assert_eq!(impact.requirements_to_add, 5);
    assert_eq!(impact.requirements_to_preserve, 100);
}

#[tokio::test]
async fn downgrade_is_always_allowed() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::Finance, Tier::Robust, None)
        .await
        .unwrap();

    let preview = svc.preview_switch(user, Tier::Basic).await.unwrap();
    assert_eq!(preview.current_progress.percentage, 0);
    assert!(preview.allowed);
    assert!(preview.impact.unwrap().requirements_to_remove > 0);
}

#[tokio::test]
async fn preview_for_unknown_user_is_profile_not_found() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    assert_eq!(
        svc.preview_switch(user, Tier::Robust).await.unwrap_err(),
        EngineError::ProfileNotFound(user)
    );
}

// ── Assignment ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_template_leaves_profile_unchanged() {
    let basic_only = TemplateCatalog::from_templates([RequirementTemplate {
        role: Role::It,
        tier: Tier::Basic,
        requirements: vec![def("code-of-conduct")],
    }])
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone(), basic_only);
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();

    let err = svc
        .assign_tier(user, Role::It, Tier::Robust, None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::TemplateMissing {
            role: Role::It,
            tier: Tier::Robust
        }
    );
    let profile = store.get_profile(user).await.unwrap().unwrap();
    assert_eq!(profile.tier, Tier::Basic);
    assert_eq!(store.audit_entries(Some(user)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn onboarding_creates_profile_and_pending_records() {
    let (svc, store) = builtin_service();
    let user = UserId::new();
    let result = svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();

    assert!(result.success);
    assert!(result.previous.is_none());
    assert!(result.requirements_removed.is_empty());
    let records = store.records_for_user(user).await.unwrap();
    assert_eq!(records.len(), result.requirements_added.len());
    assert!(records
        .iter()
        .all(|r| r.active && r.status == ComplianceStatus::Pending));

    let audit = svc.audit_log(user).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(audit[0].from_tier.is_none());
    assert_eq!(audit[0].to_tier, Tier::Basic);
}

#[tokio::test]
async fn reassigning_same_tier_is_idempotent() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::Hr, Tier::Robust, None).await.unwrap();
    let again = svc.assign_tier(user, Role::Hr, Tier::Robust, None).await.unwrap();
    assert!(again.requirements_added.is_empty());
    assert!(again.requirements_removed.is_empty());
    assert!(!again.requirements_preserved.is_empty());
}

#[tokio::test]
async fn completed_work_survives_tier_round_trip() {
    let (svc, store) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();
    complete(
        &svc,
        user,
        ["code-of-conduct".to_string(), "it-mfa-enrollment".to_string()],
    )
    .await;

    let up = svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    assert!(up.requirements_removed.contains(&rid("it-mfa-enrollment")));
    assert!(up.requirements_preserved.contains(&rid("code-of-conduct")));

    let down = svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();
    assert!(down.requirements_added.is_empty());

    let records = store.records_for_user(user).await.unwrap();
    for id in ["code-of-conduct", "it-mfa-enrollment"] {
        let r = records.iter().find(|r| r.requirement_id.as_str() == id).unwrap();
        assert!(r.active, "{id} should be active again");
        assert_eq!(r.status, ComplianceStatus::Compliant, "{id} lost its status");
    }
    assert!(records
        .iter()
        .filter(|r| r.requirement_id.as_str() == "it-hardware-key-mfa")
        .all(|r| !r.active));
}

#[tokio::test]
async fn outcome_on_retired_requirement_is_rejected() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();

    let err = svc
        .record_outcome(
            user,
            &rid("it-mfa-enrollment"),
            ComplianceStatus::Compliant,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Record(_)));

    let err = svc
        .record_outcome(user, &rid("never-assigned"), ComplianceStatus::Compliant, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RecordNotFound { .. }));
}

#[tokio::test]
async fn tier_info_lists_template_requirements_with_status() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::Sales, Tier::Basic, None).await.unwrap();
    let reviewer = UserId::new();
    svc.record_outcome(
        user,
        &rid("code-of-conduct"),
        ComplianceStatus::Compliant,
        Some("signed 2026-01-04".into()),
        Some(reviewer),
        None,
    )
    .await
    .unwrap();

    let info = svc.get_tier_info(user).await.unwrap();
    assert_eq!(info.profile.tier, Tier::Basic);
    assert_eq!(info.progress.completed, 1);
    assert_eq!(info.requirements.len(), info.progress.total);
    let conduct = info
        .requirements
        .iter()
        .find(|r| r.definition.id.as_str() == "code-of-conduct")
        .unwrap();
    assert_eq!(conduct.status, ComplianceStatus::Compliant);
    assert_eq!(conduct.value.as_deref(), Some("signed 2026-01-04"));
    assert!(info.pending_request.is_none());
}

// ── Switch-request workflow ─────────────────────────────────────────

#[tokio::test]
async fn second_create_is_duplicate_pending() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();

    let first = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "moving to contractor role")
            .await
            .unwrap(),
    );
    match svc
        .create_switch_request(user, Tier::Robust, Tier::Basic, "again")
        .await
        .unwrap()
    {
        CreateOutcome::DuplicatePending { existing } => assert_eq!(existing.id, first.id),
        other => panic!("expected DuplicatePending, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_yield_one_request() {
    let (svc, store) = builtin_service();
    let svc = Arc::new(svc);
    let user = UserId::new();
    svc.assign_tier(user, Role::Operations, Tier::Robust, None)
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                svc.create_switch_request(user, Tier::Robust, Tier::Basic, &format!("attempt {i}"))
                    .await
            })
        })
        .collect();

    let mut created_count = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CreateOutcome::Created(_) => created_count += 1,
            CreateOutcome::DuplicatePending { .. } => duplicates += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(created_count, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(store.pending_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn ineligible_upgrade_is_denied_and_not_stored() {
    let (svc, store) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();

    match svc
        .create_switch_request(user, Tier::Basic, Tier::Robust, "need admin access")
        .await
        .unwrap()
    {
        CreateOutcome::EligibilityDenied { preview } => {
            assert!(!preview.allowed);
            assert!(preview.impact.is_some());
        }
        other => panic!("expected EligibilityDenied, got {other:?}"),
    }
    assert!(store.requests_for_user(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_current_tier_is_rejected() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    let err = svc
        .create_switch_request(user, Tier::Basic, Tier::Robust, "x")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::StaleTier {
            expected: Tier::Basic,
            actual: Tier::Robust
        }
    );
}

#[tokio::test]
async fn blank_justification_is_invalid() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    let err = svc
        .create_switch_request(user, Tier::Robust, Tier::Basic, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[tokio::test]
async fn approval_applies_tier_and_audits_request() {
    let (svc, store) = builtin_service();
    let user = UserId::new();
    let reviewer = UserId::new();
    svc.assign_tier(user, Role::Hr, Tier::Robust, None).await.unwrap();
    let request = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "role change")
            .await
            .unwrap(),
    );

    let outcome = svc
        .review_request(request.id, ReviewDecision::Approve, reviewer, Some("ok".into()))
        .await
        .unwrap();
    let ReviewOutcome::Reviewed {
        request: reviewed,
        assignment,
    } = outcome
    else {
        panic!("expected Reviewed");
    };
    assert_eq!(reviewed.status, SwitchRequestStatus::Approved);
    assert_eq!(reviewed.reviewed_by, Some(reviewer));
    assert_eq!(assignment.unwrap().tier, Tier::Basic);
    assert_eq!(store.get_profile(user).await.unwrap().unwrap().tier, Tier::Basic);

    let audit = svc.audit_log(user).await.unwrap();
    let last = audit.last().unwrap();
    assert_eq!(last.switch_request_id, Some(request.id));
    assert_eq!(last.performed_by, Some(reviewer));
    assert_eq!(last.from_tier, Some(Tier::Robust));

    let again = svc
        .review_request(request.id, ReviewDecision::Reject, reviewer, None)
        .await
        .unwrap();
    assert!(matches!(again, ReviewOutcome::InvalidState { .. }));
}

#[tokio::test]
async fn rejection_leaves_tier_unchanged() {
    let (svc, store) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::Hr, Tier::Robust, None).await.unwrap();
    let request = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "role change")
            .await
            .unwrap(),
    );
    let outcome = svc
        .review_request(request.id, ReviewDecision::Reject, UserId::new(), None)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ReviewOutcome::Reviewed {
            assignment: None,
            ..
        }
    ));
    assert_eq!(store.get_profile(user).await.unwrap().unwrap().tier, Tier::Robust);
    assert_eq!(svc.audit_log(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn approval_failure_keeps_request_pending() {
    let fail_audit = Arc::new(AtomicBool::new(false));
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        fail_audit: Arc::clone(&fail_audit),
    });
    let svc = service(store.clone(), TemplateCatalog::builtin().unwrap());
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    let request = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "leaving on-call rotation")
            .await
            .unwrap(),
    );
    let records_before = store.records_for_user(user).await.unwrap();

    fail_audit.store(true, Ordering::SeqCst);
    let err = svc
        .review_request(request.id, ReviewDecision::Approve, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let stored = store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SwitchRequestStatus::Pending);
    assert_eq!(store.get_profile(user).await.unwrap().unwrap().tier, Tier::Robust);
    assert_eq!(store.records_for_user(user).await.unwrap(), records_before);

    fail_audit.store(false, Ordering::SeqCst);
    let outcome = svc
        .review_request(request.id, ReviewDecision::Approve, UserId::new(), None)
        .await
        .unwrap();
    assert!(matches!(outcome, ReviewOutcome::Reviewed { .. }));
}

async fn eligible_it_upgrade(svc: &TierService) -> (UserId, TierSwitchRequest) {
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Basic, None).await.unwrap();
    let ids: Vec<String> = svc
        .catalog()
        .template_for(Role::It, Tier::Basic)
        .unwrap()
        .requirements
        .iter()
        .map(|d| d.id.as_str().to_string())
        .collect();
    complete(svc, user, ids).await;
    let request = created(
        svc.create_switch_request(user, Tier::Basic, Tier::Robust, "joining incident response")
            .await
            .unwrap(),
    );
    (user, request)
}

#[tokio::test]
async fn approval_rechecks_eligibility_after_role_change() {
    let (svc, store) = builtin_service();
    let (user, request) = eligible_it_upgrade(&svc).await;

    svc.assign_tier(user, Role::Finance, Tier::Basic, Some(UserId::new()))
        .await
        .unwrap();
    assert!(!svc.preview_switch(user, Tier::Robust).await.unwrap().allowed);

    let outcome = svc
        .review_request(request.id, ReviewDecision::Approve, UserId::new(), None)
        .await
        .unwrap();
    let ReviewOutcome::NoLongerEligible {
        request: unchanged,
        preview,
    } = outcome
    else {
        panic!("expected NoLongerEligible, got {outcome:?}");
    };
    assert!(unchanged.is_pending());
    assert!(!preview.allowed);

    let profile = store.get_profile(user).await.unwrap().unwrap();
    assert_eq!((profile.role, profile.tier), (Role::Finance, Tier::Basic));
    let stored = store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SwitchRequestStatus::Pending);

    let outcome = svc
        .review_request(request.id, ReviewDecision::Reject, UserId::new(), None)
        .await
        .unwrap();
    assert!(matches!(outcome, ReviewOutcome::Reviewed { assignment: None, .. }));
}

#[tokio::test]
async fn approval_refused_when_tier_already_moved() {
    let (svc, store) = builtin_service();
    let (user, request) = eligible_it_upgrade(&svc).await;
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    let audit_len = svc.audit_log(user).await.unwrap().len();

    let outcome = svc
        .review_request(request.id, ReviewDecision::Approve, UserId::new(), None)
        .await
        .unwrap();
    assert!(matches!(outcome, ReviewOutcome::NoLongerEligible { .. }));
    assert_eq!(svc.audit_log(user).await.unwrap().len(), audit_len);
    assert_eq!(
        store.get_request(request.id).await.unwrap().unwrap().status,
        SwitchRequestStatus::Pending
    );
}

#[tokio::test]
async fn reviewer_cannot_review_own_request() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    let request = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "x")
            .await
            .unwrap(),
    );
    let outcome = svc
        .review_request(request.id, ReviewDecision::Approve, user, None)
        .await
        .unwrap();
    assert_eq!(outcome, ReviewOutcome::SelfReview);
}

#[tokio::test]
async fn review_of_unknown_request_is_not_found() {
    let (svc, _) = builtin_service();
    let outcome = svc
        .review_request(RequestId::new(), ReviewDecision::Approve, UserId::new(), None)
        .await
        .unwrap();
    assert_eq!(outcome, ReviewOutcome::NotFound);
}

#[tokio::test]
async fn only_owner_can_cancel_pending_request() {
    let (svc, store) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::Executive, Tier::Robust, None)
        .await
        .unwrap();
    let request = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "x")
            .await
            .unwrap(),
    );

    assert_eq!(
        svc.cancel_request(request.id, UserId::new()).await.unwrap(),
        CancelOutcome::NotOwner
    );
    assert!(matches!(
        svc.cancel_request(request.id, user).await.unwrap(),
        CancelOutcome::Cancelled(_)
    ));
    assert!(store.get_request(request.id).await.unwrap().is_none());
    assert_eq!(
        svc.cancel_request(request.id, user).await.unwrap(),
        CancelOutcome::NotFound
    );

    // A fresh request may be submitted once the old one is gone.
    created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "second try")
            .await
            .unwrap(),
    );
}

#[tokio::test]
async fn resolved_request_cannot_be_cancelled() {
    let (svc, _) = builtin_service();
    let user = UserId::new();
    svc.assign_tier(user, Role::It, Tier::Robust, None).await.unwrap();
    let request = created(
        svc.create_switch_request(user, Tier::Robust, Tier::Basic, "x")
            .await
            .unwrap(),
    );
    svc.review_request(request.id, ReviewDecision::Reject, UserId::new(), None)
        .await
        .unwrap();
    assert!(matches!(
        svc.cancel_request(request.id, user).await.unwrap(),
        CancelOutcome::InvalidState { .. }
    ));
}

#[tokio::test]
async fn pending_queue_flags_stale_requests() {
    let catalog = Arc::new(TemplateCatalog::builtin().unwrap());
    let config = EngineConfig {
        pending_stale_after: Some(Duration::days(7)),
        ..EngineConfig::default()
    };
    let engine = TierAssignmentEngine::new(Arc::clone(&catalog));
    let workflow = TierSwitchWorkflow::new(
        engine.clone(),
        EligibilityValidator::new(Arc::clone(&catalog), config.clone()),
        config,
    );
    let store = MemoryStore::new();
    let user = UserId::new();
    let now = Utc::now();
    engine
        .assign(
            &store,
            AssignCommand {
                user_id: user,
                role: Role::It,
                tier: Tier::Robust,
                performed_by: None,
                switch_request_id: None,
            },
            now,
        )
        .await
        .unwrap();
    workflow
        .create(&store, user, Tier::Robust, Tier::Basic, "x", now - Duration::days(10))
        .await
        .unwrap();

    let queue = workflow.list_pending(&store, now).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert!(queue[0].stale);
    assert_eq!(queue[0].request.status, SwitchRequestStatus::Pending);

    let fresh = workflow
        .list_pending(&store, now - Duration::days(9))
        .await
        .unwrap();
    assert!(!fresh[0].stale);
}

// ── Audit chain ─────────────────────────────────────────────────────

#[tokio::test]
async fn audit_chain_spans_users_and_verifies() {
    let (svc, store) = builtin_service();
    for role in [Role::It, Role::Hr, Role::Finance] {
        let user = UserId::new();
        svc.assign_tier(user, role, Tier::Basic, None).await.unwrap();
        svc.assign_tier(user, role, Tier::Robust, None).await.unwrap();
    }

    let verification = svc.verify_audit_chain().await.unwrap();
    assert_eq!(verification.total_entries, 6);
    assert!(verification.chain_valid);

    let mut entries = store.audit_entries(None).await.unwrap();
    entries[3].to_tier = Tier::Basic;
    assert!(!verify_chain(&entries).chain_valid);
}
