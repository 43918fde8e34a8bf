//! # Progress Calculator
//!
//! Completion counts over a user's active records. Only `compliant`
//! counts as completed; `warning`, `non_compliant`, and `pending` do not.
//!
//! The percentage is `round(100 * completed / total)` with halves rounded
//! up, and `0` when there are no active records.

use serde::Serialize;

use certrack_catalog::RequirementTemplate;
use certrack_core::ComplianceStatus;
use certrack_state::UserComplianceRecord;

/// Completion summary for a set of active records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    /// Active records considered.
    pub total: usize,
    /// Records in `compliant` status.
    pub completed: usize,
    /// `round(100 * completed / total)`, or 0 when `total` is 0.
    pub percentage: u8,
    /// Records awaiting an outcome.
    pub pending: usize,
    /// Records flagged `warning`.
    pub warning: usize,
    /// Records flagged `non_compliant`.
    pub non_compliant: usize,
}

impl Progress {
    /// Summarize every active record in `records`. Retired records are ignored.
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a UserComplianceRecord>) -> Self {
        let mut progress = Self::default();
        for record in records.into_iter().filter(|r| r.active) {
            progress.total += 1;
            match record.status {
                ComplianceStatus::Compliant => progress.completed += 1,
                ComplianceStatus::Pending => progress.pending += 1,
                ComplianceStatus::Warning => progress.warning += 1,
                ComplianceStatus::NonCompliant => progress.non_compliant += 1,
            }
        }
        progress.percentage = percentage(progress.completed, progress.total);
        progress
    }

    /// Summarize the active records that belong to `template`.
    ///
    /// Guards against stray active records left behind by an interrupted
    /// assignment in an external system.
    pub fn for_template(records: &[UserComplianceRecord], template: &RequirementTemplate) -> Self {
        Self::compute(records.iter().filter(|r| template.contains(&r.requirement_id)))
    }

    /// Whether completion meets `threshold` percent.
    pub fn meets(&self, threshold: u8) -> bool {
        self.percentage >= threshold
    }
}

/// Half-up rounded integer percentage.
fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let (c, t) = (completed.min(total) as u64, total as u64);
    ((200 * c + t) / (2 * t)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use certrack_core::{RequirementId, UserId};
    use chrono::Utc;
    use proptest::prelude::*;

    fn records(statuses: &[(ComplianceStatus, bool)]) -> Vec<UserComplianceRecord> {
        let user = UserId::new();
        statuses
            .iter()
            .enumerate()
            .map(|(i, (status, active))| {
                let mut r = UserComplianceRecord::new_pending(
                    user,
                    RequirementId::new(format!("req-{i}")).unwrap(),
                    Utc::now(),
                );
                r.status = *status;
                r.active = *active;
                r
            })
            .collect()
    }

    #[test]
    fn no_records_is_zero_percent() {
        let p = Progress::compute(&Vec::<UserComplianceRecord>::new());
        assert_eq!(p.total, 0);
        assert_eq!(p.percentage, 0);
    }

    #[test]
    fn only_compliant_counts_as_completed() {
        use ComplianceStatus::*;
        let recs = records(&[
            (Compliant, true),
            (Warning, true),
            (NonCompliant, true),
            (Pending, true),
        ]);
        let p = Progress::compute(&recs);
        assert_eq!(p.total, 4);
        assert_eq!(p.completed, 1);
        assert_eq!(p.percentage, 25);
        assert_eq!((p.pending, p.warning, p.non_compliant), (1, 1, 1));
    }

    #[test]
    fn retired_records_are_ignored() {
        use ComplianceStatus::*;
        let recs = records(&[(Compliant, false), (Compliant, true), (Pending, true)]);
        let p = Progress::compute(&recs);
        assert_eq!(p.total, 2);
        assert_eq!(p.completed, 1);
        assert_eq!(p.percentage, 50);
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(3, 8), 38); // 37.5
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(3, 4), 75);
    }

    #[test]
    fn meets_is_inclusive() {
        use ComplianceStatus::*;
        let recs = records(&[(Compliant, true), (Compliant, true), (Compliant, true), (Pending, true)]);
        let p = Progress::compute(&recs);
        assert!(p.meets(75));
        assert!(!p.meets(76));
    }

    proptest! {
        #[test]
        fn percentage_stays_in_bounds(completed in 0usize..500, extra in 0usize..500) {
            let total = completed + extra;
            let pct = percentage(completed, total);
            prop_assert!(pct <= 100);
            if total > 0 && completed == total {
                prop_assert_eq!(pct, 100);
            }
            if completed == 0 {
                prop_assert_eq!(pct, 0);
            }
        }
    }
}
