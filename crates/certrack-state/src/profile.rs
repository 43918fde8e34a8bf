//! # User Profile
//!
//! The slice of the identity record that the compliance-tier core owns.

use serde::{Deserialize, Serialize};

use certrack_core::{Role, Tier, UserId};

/// The `(role, tier)` assignment of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user.
    pub user_id: UserId,
    /// Organizational role.
    pub role: Role,
    /// Current compliance tier.
    pub tier: Tier,
}

impl UserProfile {
    /// Create a profile.
    pub fn new(user_id: UserId, role: Role, tier: Tier) -> Self {
        Self {
            user_id,
            role,
            tier,
        }
    }
}
