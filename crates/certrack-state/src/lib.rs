//! # certrack-state: Entity Lifecycles
//!
//! The persistent entities of the compliance-tier core and the transitions
//! they are allowed to make.
//!
//! ## Entities
//!
//! - **Profile** (`profile.rs`): the `(role, tier)` pair the core reads and
//!   writes on a user's identity record.
//!
//! - **Record** (`record.rs`): one `UserComplianceRecord` per
//!   `(user, requirement)` ever assigned. Records are retired by flag,
//!   never deleted, so completion evidence survives tier churn.
//!
//! - **Switch request** (`switch_request.rs`): `Pending → Approved` or
//!   `Pending → Rejected`. Resolved requests are frozen; a new request is
//!   appended instead of editing an old one.
//!
//! ## Design
//!
//! Transition methods validate the current state and return a structured
//! error rather than silently ignoring an illegal move. Each method takes
//! the transition instant explicitly so that every write in one unit of
//! work carries the same timestamp.

pub mod profile;
pub mod record;
pub mod switch_request;

pub use profile::UserProfile;
pub use record::{RecordError, UserComplianceRecord, Verification};
pub use switch_request::{
    ReviewDecision, SwitchRequestError, SwitchRequestStatus, TierSwitchRequest,
};
