//! # Domain Enumerations
//!
//! The closed sets the compliance-tier core is keyed on:
//!
//! - [`Role`]: the organizational role of a user. Together with a
//!   [`Tier`] it selects exactly one requirement template.
//! - [`Tier`]: compliance strictness level, ordered `Basic < Robust`.
//! - [`ComplianceStatus`]: outcome of a single requirement instance.
//!
//! String forms are stable and shared by the YAML catalog, the JSON API
//! and the database columns.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ─── Role ────────────────────────────────────────────────────────────

/// Organizational role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Information technology staff.
    It,
    /// Human resources staff.
    Hr,
    /// Finance and accounting staff.
    Finance,
    /// Operations staff.
    Operations,
    /// Sales and account management.
    Sales,
    /// Executive leadership.
    Executive,
}

impl Role {
    /// Every role, in declaration order.
    pub fn all() -> &'static [Role] {
        &[
            Self::It,
            Self::Hr,
            Self::Finance,
            Self::Operations,
            Self::Sales,
            Self::Executive,
        ]
    }

    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::It => "IT",
            Self::Hr => "HR",
            Self::Finance => "FINANCE",
            Self::Operations => "OPERATIONS",
            Self::Sales => "SALES",
            Self::Executive => "EXECUTIVE",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownRole(s.to_string()))
    }
}

// ─── Tier ────────────────────────────────────────────────────────────

/// Compliance strictness level.
///
/// Derives `Ord` in declaration order, so `Tier::Basic < Tier::Robust`
/// and a move to a greater tier is an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Baseline requirement set.
    Basic,
    /// Extended requirement set.
    Robust,
}

impl Tier {
    /// Every tier, lowest first.
    pub fn all() -> &'static [Tier] {
        &[Self::Basic, Self::Robust]
    }

    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Robust => "robust",
        }
    }

    /// Whether moving from `self` to `target` raises strictness.
    pub fn is_upgrade_to(&self, target: Tier) -> bool {
        target > *self
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "robust" => Ok(Self::Robust),
            _ => Err(ValidationError::UnknownTier(s.to_string())),
        }
    }
}

// ─── Compliance Status ───────────────────────────────────────────────

/// Outcome of a single requirement instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Requirement satisfied.
    Compliant,
    /// Requirement evaluated and failed.
    NonCompliant,
    /// Satisfied but approaching expiry or flagged for attention.
    Warning,
    /// Not yet submitted or evaluated.
    Pending,
}

impl ComplianceStatus {
    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Warning => "warning",
            Self::Pending => "pending",
        }
    }

    /// Whether this status counts as completed for progress purposes.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Compliant)
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compliant" => Ok(Self::Compliant),
            "non_compliant" => Ok(Self::NonCompliant),
            "warning" => Ok(Self::Warning),
            "pending" => Ok(Self::Pending),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_defines_upgrade() {
        assert!(Tier::Basic < Tier::Robust);
        assert!(Tier::Basic.is_upgrade_to(Tier::Robust));
        assert!(!Tier::Robust.is_upgrade_to(Tier::Basic));
        assert!(!Tier::Basic.is_upgrade_to(Tier::Basic));
    }

    #[test]
    fn role_serde_matches_as_str() {
        for role in Role::all() {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!("it".parse::<Role>().unwrap(), Role::It);
        assert_eq!("Finance".parse::<Role>().unwrap(), Role::Finance);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn tier_parse() {
        assert_eq!("ROBUST".parse::<Tier>().unwrap(), Tier::Robust);
        assert!(matches!(
            "gold".parse::<Tier>(),
            Err(ValidationError::UnknownTier(_))
        ));
    }

    #[test]
    fn only_compliant_is_complete() {
        assert!(ComplianceStatus::Compliant.is_complete());
        assert!(!ComplianceStatus::Warning.is_complete());
        assert!(!ComplianceStatus::NonCompliant.is_complete());
        assert!(!ComplianceStatus::Pending.is_complete());
    }

    #[test]
    fn status_display_matches_serde() {
        let s = ComplianceStatus::NonCompliant;
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"non_compliant\"");
        assert_eq!(s.to_string(), "non_compliant");
        assert_eq!("non_compliant".parse::<ComplianceStatus>().unwrap(), s);
    }
}
