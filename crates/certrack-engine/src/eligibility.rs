//! # Eligibility Validator
//!
//! Decides whether a user may switch to a target tier and previews the
//! impact on their requirement set.
//!
//! | Direction  | Rule                                                  |
//! |------------|-------------------------------------------------------|
//! | same tier  | never allowed, no impact                              |
//! | upgrade    | allowed iff current-tier completion >= threshold      |
//! | downgrade  | always allowed                                        |
//!
//! Completion is measured against the current tier's template only. The
//! impact is computed for every non-same-tier preview, including denied
//! upgrades, so the user can see what the switch would involve.

use std::sync::Arc;

use serde::Serialize;

use certrack_catalog::TemplateCatalog;
use certrack_core::{RequirementId, Tier, UserId};
use certrack_state::{UserComplianceRecord, UserProfile};

use crate::config::{EffortEstimate, EngineConfig};
use crate::error::{EngineError, FaultContext};
use crate::progress::Progress;
use crate::reconcile::RequirementReconciler;
use crate::store::ComplianceStore;

/// What a switch would do to the user's requirement set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchImpact {
    /// New requirements the user would have to complete.
    pub requirements_to_add: usize,
    /// Requirements that would be retired.
    pub requirements_to_remove: usize,
    /// Requirements carried over with their status intact.
    pub requirements_to_preserve: usize,
    /// Banded effort for the additions.
    pub estimated_effort: EffortEstimate,
    /// Ids that would be added.
    pub added: Vec<RequirementId>,
    /// Ids that would be retired.
    pub removed: Vec<RequirementId>,
    /// Ids that would be carried over.
    pub preserved: Vec<RequirementId>,
}

/// The answer to "may this user switch to `target_tier`?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchPreview {
    /// User evaluated.
    pub user_id: UserId,
    /// Tier currently held.
    pub current_tier: Tier,
    /// Tier asked about.
    pub target_tier: Tier,
    /// Whether a request for this switch would be accepted.
    pub allowed: bool,
    /// Why the switch is not allowed.
    pub reason: Option<String>,
    /// Completion on the current tier.
    pub current_progress: Progress,
    /// Impact of the switch. Absent for same-tier previews.
    pub impact: Option<SwitchImpact>,
}

/// Applies the threshold rule.
#[derive(Debug, Clone)]
pub struct EligibilityValidator {
    catalog: Arc<TemplateCatalog>,
    config: EngineConfig,
}

impl EligibilityValidator {
    /// Create a validator.
    pub fn new(catalog: Arc<TemplateCatalog>, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Evaluate a switch for `profile` given all of the user's records.
    pub fn evaluate(
        &self,
        profile: &UserProfile,
        records: &[UserComplianceRecord],
        target_tier: Tier,
    ) -> Result<SwitchPreview, EngineError> {
        let current = self.catalog.template_for(profile.role, profile.tier)?;
        let current_progress = Progress::for_template(records, current);

        if target_tier == profile.tier {
            return Ok(SwitchPreview {
                user_id: profile.user_id,
                current_tier: profile.tier,
                target_tier,
                allowed: false,
                reason: Some(format!("already on the {target_tier} tier")),
                current_progress,
                impact: None,
            });
        }

        let target = self.catalog.template_for(profile.role, target_tier)?;
        let plan = RequirementReconciler::plan(records, target);
        let impact = SwitchImpact {
            requirements_to_add: plan.added.len(),
            requirements_to_remove: plan.retired.len(),
            requirements_to_preserve: plan.preserved.len(),
            estimated_effort: self.config.effort_bands.classify(plan.added.len()),
            added: plan.added,
            removed: plan.retired,
            preserved: plan.preserved,
        };

        let threshold = self.config.upgrade_threshold_percent;
        let (allowed, reason) =
            if profile.tier.is_upgrade_to(target_tier) && !current_progress.meets(threshold) {
                (
                    false,
                    Some(format!(
                        "{}% of {} requirements complete; at least {}% is required to upgrade to {}",
                        current_progress.percentage, profile.tier, threshold, target_tier
                    )),
                )
            } else {
                (true, None)
            };

        Ok(SwitchPreview {
            user_id: profile.user_id,
            current_tier: profile.tier,
            target_tier,
            allowed,
            reason,
            current_progress,
            impact: Some(impact),
        })
    }

    /// Read the user's state and evaluate. Makes no writes.
    pub async fn preview(
        &self,
        store: &dyn ComplianceStore,
        user_id: UserId,
        target_tier: Tier,
    ) -> Result<SwitchPreview, EngineError> {
        let mut ctx = FaultContext::new("preview", Some(user_id), Some(target_tier));
        let preview = self
            .load_and_evaluate(store, user_id, target_tier, &mut ctx)
            .await
            .map_err(|e| ctx.fail(e))?;
        tracing::debug!(
            %user_id,
            current_tier = %preview.current_tier,
            target_tier = %target_tier,
            allowed = preview.allowed,
            percentage = preview.current_progress.percentage,
            "evaluated tier switch"
        );
        Ok(preview)
    }

    async fn load_and_evaluate(
        &self,
        store: &dyn ComplianceStore,
        user_id: UserId,
        target_tier: Tier,
        ctx: &mut FaultContext,
    ) -> Result<SwitchPreview, EngineError> {
        let profile = store
            .get_profile(user_id)
            .await?
            .ok_or(EngineError::ProfileNotFound(user_id))?;
        ctx.role = Some(profile.role);
        let records = store.records_for_user(user_id).await?;
        self.evaluate(&profile, &records, target_tier)
    }
}
