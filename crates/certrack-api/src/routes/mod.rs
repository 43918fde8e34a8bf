//! # API Route Modules
//!
//! - `tiers`: tier info, direct assignment, switch preview.
//! - `records`: requirement outcome recording.
//! - `requests`: switch-request submission, review queue, cancellation, history.
//! - `audit`: per-user audit trail and chain verification.

pub mod audit;
pub mod records;
pub mod requests;
pub mod tiers;
