//! # certrack-engine: Compliance-Tier Engine
//!
//! Assigns requirement sets to users by `(role, tier)`, reconciles those
//! sets when a tier changes without discarding completed work, and governs
//! tier changes through a reviewed switch-request workflow.
//!
//! ## Components
//!
//! | Module          | Responsibility                                             |
//! |-----------------|------------------------------------------------------------|
//! | [`store`]       | Persistence boundary: `ComplianceStore` / `StoreTx`        |
//! | [`memory`]      | In-memory store (development, tests)                       |
//! | [`progress`]    | Completion counts and percentage                           |
//! | [`reconcile`]   | Add / preserve / retire diff against a target template     |
//! | [`assignment`]  | Profile write + reconciliation + audit as one unit of work |
//! | [`eligibility`] | Threshold rule and impact preview                          |
//! | [`workflow`]    | Switch-request create / review / cancel                    |
//! | [`audit`]       | Append-only, hash-chained audit entries                    |
//! | [`service`]     | `TierService` facade used by the API layer                 |
//!
//! ## Control Flow
//!
//! ```text
//! create ─▶ EligibilityValidator ─▶ (pending) ─▶ review(approve)
//!                                                   │
//!                          TierAssignmentEngine ◀───┘
//!                                   │
//!              RequirementReconciler + AuditRecorder ─▶ commit
//! ```
//!
//! Every public operation runs as one store transaction. Validation
//! outcomes (duplicate pending request, eligibility denied, invalid state)
//! are typed results; only missing templates and persistence failures are
//! errors.

pub mod assignment;
pub mod audit;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod memory;
pub mod progress;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod workflow;

pub use assignment::{AssignCommand, AssignmentResult, TierAssignmentEngine};
pub use audit::{AuditRecorder, ChainVerification, ComplianceAuditEntry};
pub use config::{ConfigError, EffortBands, EffortEstimate, EngineConfig};
pub use eligibility::{EligibilityValidator, SwitchImpact, SwitchPreview};
pub use error::{EngineError, FaultContext};
pub use memory::MemoryStore;
pub use progress::Progress;
pub use reconcile::{ReconcilePlan, RequirementReconciler};
pub use service::{RequirementProgress, TierInfo, TierService};
pub use store::{ComplianceStore, StoreError, StoreTx};
pub use workflow::{
    CancelOutcome, CreateOutcome, PendingRequestView, ReviewOutcome, TierSwitchWorkflow,
};
