//! # Tier Service
//!
//! The facade the API layer talks to. Owns the store handle, the catalog,
//! and the configured components, and stamps each operation with the
//! current time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use certrack_catalog::{RequirementDefinition, TemplateCatalog};
use certrack_core::{ComplianceStatus, RequestId, RequirementId, Role, Tier, UserId};
use certrack_state::{
    ReviewDecision, TierSwitchRequest, UserComplianceRecord, UserProfile, Verification,
};

use crate::assignment::{AssignCommand, AssignmentResult, TierAssignmentEngine};
use crate::audit::{verify_chain, ChainVerification, ComplianceAuditEntry};
use crate::config::EngineConfig;
use crate::eligibility::{EligibilityValidator, SwitchPreview};
use crate::error::{EngineError, FaultContext};
use crate::progress::Progress;
use crate::store::ComplianceStore;
use crate::workflow::{
    CancelOutcome, CreateOutcome, PendingRequestView, ReviewOutcome, TierSwitchWorkflow,
};

/// One requirement of the user's current template with its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementProgress {
    /// Catalog definition.
    #[serde(flatten)]
    pub definition: RequirementDefinition,
    /// Current outcome. `pending` if no record exists yet.
    pub status: ComplianceStatus,
    /// Submitted value.
    pub value: Option<String>,
    /// Last change to the record.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A user's tier, progress, and requirement checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    /// Role and tier.
    pub profile: UserProfile,
    /// Completion on the current template.
    pub progress: Progress,
    /// Template requirements in display order.
    pub requirements: Vec<RequirementProgress>,
    /// The request awaiting review, if any.
    pub pending_request: Option<TierSwitchRequest>,
}

/// Compliance-tier operations over one store.
#[derive(Clone)]
pub struct TierService {
    store: Arc<dyn ComplianceStore>,
    catalog: Arc<TemplateCatalog>,
    config: EngineConfig,
    workflow: TierSwitchWorkflow,
}

impl std::fmt::Debug for TierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierService")
            .field("templates", &self.catalog.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TierService {
    /// Wire the components over `store` and `catalog`.
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        catalog: Arc<TemplateCatalog>,
        config: EngineConfig,
    ) -> Self {
        let engine = TierAssignmentEngine::new(Arc::clone(&catalog));
        let validator = EligibilityValidator::new(Arc::clone(&catalog), config.clone());
        let workflow = TierSwitchWorkflow::new(engine, validator, config.clone());
        Self {
            store,
            catalog,
            config,
            workflow,
        }
    }

    /// The loaded catalog.
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate a switch to `target_tier` without writing anything.
    pub async fn preview_switch(
        &self,
        user_id: UserId,
        target_tier: Tier,
    ) -> Result<SwitchPreview, EngineError> {
        self.workflow
            .validator()
            .preview(self.store.as_ref(), user_id, target_tier)
            .await
    }

    /// Submit a switch request.
    pub async fn create_switch_request(
        &self,
        user_id: UserId,
        current_tier: Tier,
        requested_tier: Tier,
        justification: &str,
    ) -> Result<CreateOutcome, EngineError> {
        self.workflow
            .create(
                self.store.as_ref(),
                user_id,
                current_tier,
                requested_tier,
                justification,
                Utc::now(),
            )
            .await
    }

    /// The review queue, oldest first.
    pub async fn list_pending_requests(&self) -> Result<Vec<PendingRequestView>, EngineError> {
        self.workflow
            .list_pending(self.store.as_ref(), Utc::now())
            .await
            .map_err(|e| FaultContext::new("list_pending_requests", None, None).fail(e))
    }

    /// Approve or reject a pending request.
    pub async fn review_request(
        &self,
        request_id: RequestId,
        decision: ReviewDecision,
        reviewer: UserId,
        notes: Option<String>,
    ) -> Result<ReviewOutcome, EngineError> {
        self.workflow
            .review(
                self.store.as_ref(),
                request_id,
                decision,
                reviewer,
                notes,
                Utc::now(),
            )
            .await
    }

    /// Withdraw a pending request.
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
        user_id: UserId,
    ) -> Result<CancelOutcome, EngineError> {
        self.workflow
            .cancel(self.store.as_ref(), request_id, user_id)
            .await
    }

    /// A single request in any state.
    pub async fn get_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, EngineError> {
        self.store
            .get_request(request_id)
            .await
            .map_err(|e| FaultContext::new("get_switch_request", None, None).fail(e.into()))
    }

    /// The user's requests, newest first.
    pub async fn requests_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TierSwitchRequest>, EngineError> {
        self.store
            .requests_for_user(user_id)
            .await
            .map_err(|e| {
                FaultContext::new("list_user_requests", Some(user_id), None).fail(e.into())
            })
    }

    /// Assign a role and tier directly. Creates the profile at onboarding.
    pub async fn assign_tier(
        &self,
        user_id: UserId,
        role: Role,
        tier: Tier,
        performed_by: Option<UserId>,
    ) -> Result<AssignmentResult, EngineError> {
        let cmd = AssignCommand {
            user_id,
            role,
            tier,
            performed_by,
            switch_request_id: None,
        };
        self.workflow
            .engine()
            .assign(self.store.as_ref(), cmd, Utc::now())
            .await
    }

    /// The user's tier, progress, checklist, and pending request.
    pub async fn get_tier_info(&self, user_id: UserId) -> Result<TierInfo, EngineError> {
        let mut ctx = FaultContext::new("get_tier_info", Some(user_id), None);
        self.load_tier_info(user_id, &mut ctx)
            .await
            .map_err(|e| ctx.fail(e))
    }

    async fn load_tier_info(
        &self,
        user_id: UserId,
        ctx: &mut FaultContext,
    ) -> Result<TierInfo, EngineError> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or(EngineError::ProfileNotFound(user_id))?;
        ctx.role = Some(profile.role);
        ctx.tier = Some(profile.tier);
        let template = self.catalog.template_for(profile.role, profile.tier)?;
        let records = self.store.records_for_user(user_id).await?;
        let progress = Progress::for_template(&records, template);

        let requirements = template
            .requirements
            .iter()
            .map(|definition| {
                let record = records
                    .iter()
                    .find(|r| r.active && r.requirement_id == definition.id);
                RequirementProgress {
                    definition: definition.clone(),
                    status: record.map_or(ComplianceStatus::Pending, |r| r.status),
                    value: record.and_then(|r| r.value.clone()),
                    updated_at: record.map(|r| r.updated_at),
                }
            })
            .collect();

        let pending_request = self
            .store
            .requests_for_user(user_id)
            .await?
            .into_iter()
            .find(|r| r.is_pending());

        Ok(TierInfo {
            profile,
            progress,
            requirements,
            pending_request,
        })
    }

    /// Record an outcome against one of the user's active requirements.
    pub async fn record_outcome(
        &self,
        user_id: UserId,
        requirement_id: &RequirementId,
        status: ComplianceStatus,
        value: Option<String>,
        verified_by: Option<UserId>,
        notes: Option<String>,
    ) -> Result<UserComplianceRecord, EngineError> {
        let mut ctx = FaultContext::new("record_outcome", Some(user_id), None);
        self.try_record_outcome(
            user_id,
            requirement_id,
            status,
            value,
            verified_by,
            notes,
            &mut ctx,
        )
        .await
        .map_err(|e| ctx.fail(e))
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_record_outcome(
        &self,
        user_id: UserId,
        requirement_id: &RequirementId,
        status: ComplianceStatus,
        value: Option<String>,
        verified_by: Option<UserId>,
        notes: Option<String>,
        ctx: &mut FaultContext,
    ) -> Result<UserComplianceRecord, EngineError> {
        let at = Utc::now();
        let mut tx = self.store.begin().await?;
        let profile = tx
            .lock_profile(user_id)
            .await?
            .ok_or(EngineError::ProfileNotFound(user_id))?;
        ctx.role = Some(profile.role);
        ctx.tier = Some(profile.tier);

        let mut record = tx
            .records_for_user(user_id)
            .await?
            .into_iter()
            .find(|r| &r.requirement_id == requirement_id)
            .ok_or_else(|| EngineError::RecordNotFound {
                user_id,
                requirement_id: requirement_id.clone(),
            })?;

        let verification = (verified_by.is_some() || notes.is_some()).then(|| Verification {
            verified_by,
            verified_at: at,
            notes,
        });
        record.record_outcome(status, value, verification, at)?;
        tx.upsert_record(&record).await?;
        tx.commit().await?;

        tracing::info!(
            %user_id,
            requirement_id = %requirement_id,
            status = %status,
            "compliance outcome recorded"
        );
        Ok(record)
    }

    /// The user's audit trail in append order.
    pub async fn audit_log(&self, user_id: UserId) -> Result<Vec<ComplianceAuditEntry>, EngineError> {
        self.store
            .audit_entries(Some(user_id))
            .await
            .map_err(|e| FaultContext::new("audit_log", Some(user_id), None).fail(e.into()))
    }

    /// Walk the whole audit chain.
    pub async fn verify_audit_chain(&self) -> Result<ChainVerification, EngineError> {
        let entries = self
            .store
            .audit_entries(None)
            .await
            .map_err(|e| FaultContext::new("verify_audit_chain", None, None).fail(e.into()))?;
        let verification = verify_chain(&entries);
        if !verification.chain_valid {
            tracing::error!(
                broken_links = verification.broken_links.len(),
                tampered = verification.tampered.len(),
                "audit chain verification failed"
            );
        }
        Ok(verification)
    }

    /// Whether the backing store answers queries.
    pub async fn is_ready(&self) -> bool {
        self.store.pending_requests().await.is_ok()
    }
}
