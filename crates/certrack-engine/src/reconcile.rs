//! # Requirement Reconciler
//!
//! Diffs a user's records against a target template:
//!
//! | Target has id | User has record | Action                             |
//! |---------------|-----------------|------------------------------------|
//! | yes           | yes             | preserve (reactivate if retired)   |
//! | yes           | no              | add a new `pending` record         |
//! | no            | yes, active     | retire                             |
//! | no            | yes, retired    | nothing                            |
//!
//! Preserved records keep their status, value, and verification. Nothing
//! is ever hard-deleted, so completion evidence survives any sequence of
//! tier changes.
//!
//! [`RequirementReconciler::plan`] is pure and backs the impact preview.
//! [`RequirementReconciler::apply`] writes a plan through an open
//! transaction. Applying the plan for the same target twice is a no-op the
//! second time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use certrack_catalog::RequirementTemplate;
use certrack_core::{RequirementId, UserId};
use certrack_state::UserComplianceRecord;

use crate::store::{StoreError, StoreTx};

/// The outcome of diffing records against a template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconcilePlan {
    /// Target requirements with no existing record, in template order.
    pub added: Vec<RequirementId>,
    /// Target requirements with an existing record, in template order.
    pub preserved: Vec<RequirementId>,
    /// Subset of `preserved` whose record is currently retired.
    pub reactivated: Vec<RequirementId>,
    /// Active records outside the target, sorted by id.
    pub retired: Vec<RequirementId>,
}

impl ReconcilePlan {
    /// Whether applying the plan would write nothing.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.reactivated.is_empty() && self.retired.is_empty()
    }
}

/// Computes and applies [`ReconcilePlan`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementReconciler;

impl RequirementReconciler {
    /// Diff `records` (all of one user's records, active and retired)
    /// against `target`.
    pub fn plan(records: &[UserComplianceRecord], target: &RequirementTemplate) -> ReconcilePlan {
        let by_id: HashMap<&RequirementId, &UserComplianceRecord> =
            records.iter().map(|r| (&r.requirement_id, r)).collect();

        let mut plan = ReconcilePlan::default();
        for id in target.ids() {
            match by_id.get(id) {
                Some(record) => {
                    plan.preserved.push(id.clone());
                    if !record.active {
                        plan.reactivated.push(id.clone());
                    }
                }
                None => plan.added.push(id.clone()),
            }
        }

        plan.retired = records
            .iter()
            .filter(|r| r.active && !target.contains(&r.requirement_id))
            .map(|r| r.requirement_id.clone())
            .collect();
        plan.retired.sort();
        plan.retired.dedup();
        plan
    }

    /// Write `plan` for `user_id` through `tx`. `records` must be the
    /// snapshot the plan was computed from.
    pub async fn apply(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        records: &[UserComplianceRecord],
        plan: &ReconcilePlan,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let by_id: HashMap<&RequirementId, &UserComplianceRecord> =
            records.iter().map(|r| (&r.requirement_id, r)).collect();

        for id in &plan.added {
            let record = UserComplianceRecord::new_pending(user_id, id.clone(), at);
            tx.upsert_record(&record).await?;
        }
        for id in &plan.reactivated {
            if let Some(existing) = by_id.get(id) {
                let mut record = (*existing).clone();
                if record.reactivate(at) {
                    tx.upsert_record(&record).await?;
                }
            }
        }
        for id in &plan.retired {
            if let Some(existing) = by_id.get(id) {
                let mut record = (*existing).clone();
                if record.retire(at) {
                    tx.upsert_record(&record).await?;
                }
            }
        }
        Ok(())
    }

    /// Read the user's records, plan against `target`, and apply.
    pub async fn reconcile(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        target: &RequirementTemplate,
        at: DateTime<Utc>,
    ) -> Result<ReconcilePlan, StoreError> {
        let records = tx.records_for_user(user_id).await?;
        let plan = Self::plan(&records, target);
        Self::apply(tx, user_id, &records, &plan, at).await?;
        tracing::debug!(
            %user_id,
            role = %target.role,
            tier = %target.tier,
            added = plan.added.len(),
            preserved = plan.preserved.len(),
            retired = plan.retired.len(),
            "reconciled requirements"
        );
        Ok(plan)
    }
}
