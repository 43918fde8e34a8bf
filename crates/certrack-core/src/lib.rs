//! # certrack-core: Foundational Types
//!
//! The leaf of the certrack dependency DAG. Defines the identifiers and
//! enumerations that every other crate speaks in, so that a `UserId` can
//! never be passed where a `RequestId` is expected and a tier can never be
//! an arbitrary string.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `UserId`, `RequestId`,
//!    `RecordId`, `AuditEntryId` wrap UUIDs; `RequirementId` wraps a
//!    validated slug.
//!
//! 2. **Closed enumerations.** `Role`, `Tier` and `ComplianceStatus` are
//!    exhaustive enums. Adding a tier forces every `match` to handle it.
//!
//! 3. **Ordered tiers.** `Tier` derives `Ord` (`Basic < Robust`) so that
//!    "upgrade" and "downgrade" are comparisons, not string checks.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `certrack-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod domain;
pub mod error;
pub mod identity;

pub use domain::{ComplianceStatus, Role, Tier};
pub use error::{CoreError, ValidationError};
pub use identity::{AuditEntryId, RecordId, RequestId, RequirementId, UserId};
