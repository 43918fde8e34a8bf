//! # Tier-Switch Workflow
//!
//! Users ask to change tier; reviewers approve or reject; owners may
//! withdraw a request while it is pending.
//!
//! ## Guarantees
//!
//! - At most one pending request per user. The check runs under the
//!   profile lock and the store backs it with a uniqueness constraint, so
//!   concurrent submissions yield one `Created` and the rest
//!   `DuplicatePending`.
//! - Approval applies the tier and resolves the request in one commit.
//!   If the assignment fails, nothing is written and the request stays
//!   pending.
//! - Approval re-evaluates eligibility against the current profile, so a
//!   request overtaken by a direct assignment cannot be applied.
//! - Only pending requests can be reviewed or cancelled.
//!
//! Lock order is profile, then request, for every operation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use certrack_core::{RequestId, Tier, UserId};
use certrack_state::{ReviewDecision, TierSwitchRequest};

use crate::assignment::{AssignCommand, AssignmentResult, TierAssignmentEngine};
use crate::config::EngineConfig;
use crate::eligibility::{EligibilityValidator, SwitchPreview};
use crate::error::{EngineError, FaultContext};
use crate::store::{ComplianceStore, StoreError};

/// Result of submitting a switch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The request was stored as pending.
    Created(TierSwitchRequest),
    /// The user already has a pending request.
    DuplicatePending {
        /// The request already awaiting review.
        existing: TierSwitchRequest,
    },
    /// The switch fails the eligibility rule.
    EligibilityDenied {
        /// The evaluation, including the reason and impact.
        preview: SwitchPreview,
    },
}

/// Result of reviewing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The request was resolved. `assignment` is set on approval.
    Reviewed {
        /// The resolved request.
        request: TierSwitchRequest,
        /// The applied assignment, on approval.
        assignment: Option<AssignmentResult>,
    },
    /// No such request.
    NotFound,
    /// The request was already resolved.
    InvalidState {
        /// The request as stored.
        request: TierSwitchRequest,
    },
    /// Reviewers may not resolve their own requests.
    SelfReview,
    /// Approval refused: the user's tier changed after submission, or the
    /// switch fails the eligibility rule as things stand. The request is
    /// still pending.
    NoLongerEligible {
        /// The request, unchanged.
        request: TierSwitchRequest,
        /// The evaluation against the current profile.
        preview: SwitchPreview,
    },
}

/// Result of withdrawing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The request was deleted.
    Cancelled(TierSwitchRequest),
    /// No such request.
    NotFound,
    /// The caller does not own the request.
    NotOwner,
    /// The request was already resolved.
    InvalidState {
        /// The request as stored.
        request: TierSwitchRequest,
    },
}

/// A pending request as shown in the review queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequestView {
    /// The request.
    #[serde(flatten)]
    pub request: TierSwitchRequest,
    /// Whether the request has waited longer than the staleness window.
    pub stale: bool,
}

/// Switch-request operations.
#[derive(Debug, Clone)]
pub struct TierSwitchWorkflow {
    engine: TierAssignmentEngine,
    validator: EligibilityValidator,
    config: EngineConfig,
}

impl TierSwitchWorkflow {
    /// Create a workflow.
    pub fn new(
        engine: TierAssignmentEngine,
        validator: EligibilityValidator,
        config: EngineConfig,
    ) -> Self {
        Self {
            engine,
            validator,
            config,
        }
    }

    /// Submit a request to move `user_id` from `current_tier` to
    /// `requested_tier`.
    pub async fn create(
        &self,
        store: &dyn ComplianceStore,
        user_id: UserId,
        current_tier: Tier,
        requested_tier: Tier,
        justification: &str,
        at: DateTime<Utc>,
    ) -> Result<CreateOutcome, EngineError> {
        let mut ctx =
            FaultContext::new("create_switch_request", Some(user_id), Some(requested_tier));
        self.try_create(
            store,
            user_id,
            current_tier,
            requested_tier,
            justification,
            at,
            &mut ctx,
        )
        .await
        .map_err(|e| ctx.fail(e))
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_create(
        &self,
        store: &dyn ComplianceStore,
        user_id: UserId,
        current_tier: Tier,
        requested_tier: Tier,
        justification: &str,
        at: DateTime<Utc>,
        ctx: &mut FaultContext,
    ) -> Result<CreateOutcome, EngineError> {
        let mut tx = store.begin().await?;

        let profile = tx
            .lock_profile(user_id)
            .await?
            .ok_or(EngineError::ProfileNotFound(user_id))?;
        ctx.role = Some(profile.role);
        if profile.tier != current_tier {
            return Err(EngineError::StaleTier {
                expected: current_tier,
                actual: profile.tier,
            });
        }

        if let Some(existing) = tx.pending_request_for(user_id).await? {
            tracing::warn!(%user_id, existing = %existing.id, "duplicate pending switch request");
            return Ok(CreateOutcome::DuplicatePending { existing });
        }

        let records = tx.records_for_user(user_id).await?;
        let preview = self.validator.evaluate(&profile, &records, requested_tier)?;
        if !preview.allowed {
            tracing::warn!(
                %user_id,
                %current_tier,
                %requested_tier,
                percentage = preview.current_progress.percentage,
                "switch request denied by eligibility rule"
            );
            return Ok(CreateOutcome::EligibilityDenied { preview });
        }

        let request = TierSwitchRequest::open(
            user_id,
            current_tier,
            requested_tier,
            justification,
            self.config.max_justification_len,
            at,
        )?;

        match tx.insert_request(&request).await {
            Ok(()) => {}
            Err(StoreError::Conflict(detail)) => {
                drop(tx);
                return self.duplicate_after_conflict(store, user_id, detail).await;
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        tracing::info!(
            %user_id,
            request_id = %request.id,
            %current_tier,
            %requested_tier,
            "switch request created"
        );
        Ok(CreateOutcome::Created(request))
    }

    /// A concurrent submission won the uniqueness race. Report the winner.
    async fn duplicate_after_conflict(
        &self,
        store: &dyn ComplianceStore,
        user_id: UserId,
        detail: String,
    ) -> Result<CreateOutcome, EngineError> {
        let winner = store
            .requests_for_user(user_id)
            .await?
            .into_iter()
            .find(|r| r.is_pending());
        match winner {
            Some(existing) => Ok(CreateOutcome::DuplicatePending { existing }),
            // The competing request was resolved before we could read it.
            None => Err(StoreError::Conflict(detail).into()),
        }
    }

    /// Approve or reject a pending request.
    ///
    /// Approval re-checks eligibility against the user's profile as it
    /// stands now. If the tier has moved since submission, or the switch
    /// no longer passes the rule, the request stays pending and
    /// [`ReviewOutcome::NoLongerEligible`] is returned.
    pub async fn review(
        &self,
        store: &dyn ComplianceStore,
        request_id: RequestId,
        decision: ReviewDecision,
        reviewer: UserId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ReviewOutcome, EngineError> {
        let mut ctx = FaultContext::new("review", None, None);
        self.try_review(store, request_id, decision, reviewer, notes, at, &mut ctx)
            .await
            .map_err(|e| ctx.fail(e))
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_review(
        &self,
        store: &dyn ComplianceStore,
        request_id: RequestId,
        decision: ReviewDecision,
        reviewer: UserId,
        notes: Option<String>,
        at: DateTime<Utc>,
        ctx: &mut FaultContext,
    ) -> Result<ReviewOutcome, EngineError> {
        let Some(snapshot) = store.get_request(request_id).await? else {
            return Ok(ReviewOutcome::NotFound);
        };
        ctx.user_id = Some(snapshot.user_id);
        ctx.tier = Some(snapshot.requested_tier);

        let mut tx = store.begin().await?;
        let profile = tx.lock_profile(snapshot.user_id).await?;
        ctx.role = profile.map(|p| p.role);
        let Some(mut request) = tx.lock_request(request_id).await? else {
            return Ok(ReviewOutcome::NotFound);
        };
        if !request.is_pending() {
            tracing::warn!(%request_id, status = %request.status, "review of resolved request");
            return Ok(ReviewOutcome::InvalidState { request });
        }
        if request.user_id == reviewer {
            tracing::warn!(%request_id, %reviewer, "self-review rejected");
            return Ok(ReviewOutcome::SelfReview);
        }

        let assignment = match decision {
            ReviewDecision::Approve => {
                let profile = profile.ok_or(EngineError::ProfileNotFound(request.user_id))?;
                let records = tx.records_for_user(request.user_id).await?;
                let preview = self
                    .validator
                    .evaluate(&profile, &records, request.requested_tier)?;
                if profile.tier != request.current_tier || !preview.allowed {
                    tracing::warn!(
                        %request_id,
                        user_id = %request.user_id,
                        submitted_from = %request.current_tier,
                        current_tier = %profile.tier,
                        requested_tier = %request.requested_tier,
                        percentage = preview.current_progress.percentage,
                        "approval refused; user no longer eligible"
                    );
                    return Ok(ReviewOutcome::NoLongerEligible { request, preview });
                }

                let cmd = AssignCommand {
                    user_id: request.user_id,
                    role: profile.role,
                    tier: request.requested_tier,
                    performed_by: Some(reviewer),
                    switch_request_id: Some(request.id),
                };
                match self.engine.assign_in_tx(tx.as_mut(), cmd, at).await {
                    Ok(result) => Some(result),
                    Err(err) => {
                        tracing::warn!(%request_id, "approval failed; request left pending");
                        return Err(err);
                    }
                }
            }
            ReviewDecision::Reject => None,
        };

        if request.resolve(decision, reviewer, notes, at).is_err() {
            return Ok(ReviewOutcome::InvalidState { request });
        }
        tx.update_request(&request).await?;
        tx.commit().await?;

        tracing::info!(
            %request_id,
            user_id = %request.user_id,
            %reviewer,
            status = %request.status,
            "switch request reviewed"
        );
        Ok(ReviewOutcome::Reviewed {
            request,
            assignment,
        })
    }

    /// Withdraw a pending request owned by `user_id`.
    pub async fn cancel(
        &self,
        store: &dyn ComplianceStore,
        request_id: RequestId,
        user_id: UserId,
    ) -> Result<CancelOutcome, EngineError> {
        let mut ctx = FaultContext::new("cancel_switch_request", Some(user_id), None);
        self.try_cancel(store, request_id, user_id, &mut ctx)
            .await
            .map_err(|e| ctx.fail(e))
    }

    async fn try_cancel(
        &self,
        store: &dyn ComplianceStore,
        request_id: RequestId,
        user_id: UserId,
        ctx: &mut FaultContext,
    ) -> Result<CancelOutcome, EngineError> {
        let mut tx = store.begin().await?;
        ctx.role = tx.lock_profile(user_id).await?.map(|p| p.role);
        let Some(request) = tx.lock_request(request_id).await? else {
            return Ok(CancelOutcome::NotFound);
        };
        if request.user_id != user_id {
            tracing::warn!(%request_id, %user_id, "cancel by non-owner");
            return Ok(CancelOutcome::NotOwner);
        }
        ctx.tier = Some(request.requested_tier);
        if !request.is_pending() {
            tracing::warn!(%request_id, status = %request.status, "cancel of resolved request");
            return Ok(CancelOutcome::InvalidState { request });
        }
        tx.delete_request(request_id).await?;
        tx.commit().await?;

        tracing::info!(%request_id, %user_id, "switch request cancelled");
        Ok(CancelOutcome::Cancelled(request))
    }

    /// The review queue, oldest first, with staleness flags.
    pub async fn list_pending(
        &self,
        store: &dyn ComplianceStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingRequestView>, EngineError> {
        let pending = store.pending_requests().await?;
        Ok(pending
            .into_iter()
            .map(|request| {
                let stale = self
                    .config
                    .pending_stale_after
                    .is_some_and(|window| now - request.requested_at > window);
                PendingRequestView { request, stale }
            })
            .collect())
    }

    /// The eligibility validator in use.
    pub fn validator(&self) -> &EligibilityValidator {
        &self.validator
    }

    /// The assignment engine in use.
    pub fn engine(&self) -> &TierAssignmentEngine {
        &self.engine
    }
}
