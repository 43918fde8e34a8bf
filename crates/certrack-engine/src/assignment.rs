//! # Tier Assignment Engine
//!
//! Applies a `(role, tier)` to a user as one unit of work:
//!
//! 1. resolve the target template (fail closed before any write),
//! 2. lock the profile,
//! 3. reconcile the user's records against the template,
//! 4. write the new profile,
//! 5. append the audit entry.
//!
//! [`TierAssignmentEngine::assign_in_tx`] runs the steps inside a caller's
//! transaction so the switch-request workflow can resolve a request in the
//! same commit. [`TierAssignmentEngine::assign`] opens and commits its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use certrack_catalog::TemplateCatalog;
use certrack_core::{AuditEntryId, RequestId, RequirementId, Role, Tier, UserId};
use certrack_state::UserProfile;

use crate::audit::{AuditDraft, AuditRecorder};
use crate::error::EngineError;
use crate::reconcile::RequirementReconciler;
use crate::store::{ComplianceStore, StoreTx};

/// Input to an assignment.
#[derive(Debug, Clone, Copy)]
pub struct AssignCommand {
    /// User to assign.
    pub user_id: UserId,
    /// Role to assign.
    pub role: Role,
    /// Tier to assign.
    pub tier: Tier,
    /// Administrator or reviewer responsible.
    pub performed_by: Option<UserId>,
    /// Switch request being applied, if any.
    pub switch_request_id: Option<RequestId>,
}

/// What an assignment changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentResult {
    /// Always `true`; failures are returned as errors.
    pub success: bool,
    /// Assigned user.
    pub user_id: UserId,
    /// Profile before the assignment. `None` at onboarding.
    pub previous: Option<UserProfile>,
    /// Role now held.
    pub role: Role,
    /// Tier now held.
    pub tier: Tier,
    /// Newly created pending requirements.
    pub requirements_added: Vec<RequirementId>,
    /// Requirements carried over with their status intact.
    pub requirements_preserved: Vec<RequirementId>,
    /// Requirements retired.
    pub requirements_removed: Vec<RequirementId>,
    /// Audit entry written for the change.
    pub audit_entry_id: AuditEntryId,
    /// Human-readable summary.
    pub message: String,
}

/// Applies tier assignments.
#[derive(Debug, Clone)]
pub struct TierAssignmentEngine {
    catalog: Arc<TemplateCatalog>,
}

impl TierAssignmentEngine {
    /// Create an engine over `catalog`.
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        Self { catalog }
    }

    /// Assign in a fresh transaction and commit.
    pub async fn assign(
        &self,
        store: &dyn ComplianceStore,
        cmd: AssignCommand,
        at: DateTime<Utc>,
    ) -> Result<AssignmentResult, EngineError> {
        let mut tx = store.begin().await?;
        let outcome = self.assign_in_tx(tx.as_mut(), cmd, at).await;
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                drop(tx);
                tracing::error!(
                    user_id = %cmd.user_id,
                    role = %cmd.role,
                    tier = %cmd.tier,
                    operation = "assign",
                    error = %err,
                    "tier assignment failed; rolled back"
                );
                return Err(err);
            }
        };
        tx.commit().await?;
        tracing::info!(
            user_id = %result.user_id,
            role = %result.role,
            tier = %result.tier,
            added = result.requirements_added.len(),
            preserved = result.requirements_preserved.len(),
            removed = result.requirements_removed.len(),
            "tier assigned"
        );
        Ok(result)
    }

    /// Assign inside `tx` without committing.
    pub async fn assign_in_tx(
        &self,
        tx: &mut dyn StoreTx,
        cmd: AssignCommand,
        at: DateTime<Utc>,
    ) -> Result<AssignmentResult, EngineError> {
        let template = self.catalog.template_for(cmd.role, cmd.tier)?;

        let previous = tx.lock_profile(cmd.user_id).await?;
        let plan = RequirementReconciler::reconcile(tx, cmd.user_id, template, at).await?;

        let profile = UserProfile::new(cmd.user_id, cmd.role, cmd.tier);
        tx.put_profile(&profile).await?;

        let entry = AuditRecorder::record(
            tx,
            AuditDraft {
                user_id: cmd.user_id,
                from_role: previous.map(|p| p.role),
                to_role: cmd.role,
                from_tier: previous.map(|p| p.tier),
                to_tier: cmd.tier,
                requirements_added: count(plan.added.len()),
                requirements_removed: count(plan.retired.len()),
                requirements_preserved: count(plan.preserved.len()),
                performed_by: cmd.performed_by,
                switch_request_id: cmd.switch_request_id,
                performed_at: at,
            },
        )
        .await?;

        let message = match previous {
            Some(p) => format!(
                "moved from {}/{} to {}/{}: {} added, {} preserved, {} removed",
                p.role,
                p.tier,
                cmd.role,
                cmd.tier,
                plan.added.len(),
                plan.preserved.len(),
                plan.retired.len()
            ),
            None => format!(
                "assigned {}/{}: {} requirements",
                cmd.role,
                cmd.tier,
                plan.added.len() + plan.preserved.len()
            ),
        };

        Ok(AssignmentResult {
            success: true,
            user_id: cmd.user_id,
            previous,
            role: cmd.role,
            tier: cmd.tier,
            requirements_added: plan.added,
            requirements_preserved: plan.preserved,
            requirements_removed: plan.retired,
            audit_entry_id: entry.id,
            message,
        })
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
