//! # Requirement Templates
//!
//! A [`RequirementTemplate`] is the ordered set of
//! [`RequirementDefinition`]s attached to one `(Role, Tier)` pair. Templates
//! are immutable configuration: nothing at runtime creates or edits them.

use serde::{Deserialize, Serialize};

use certrack_core::{RequirementId, Role, Tier};

/// The kind of evidence a requirement asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// An uploaded document (policy acknowledgement, contract).
    Document,
    /// An external certification with an issuer and expiry.
    Certification,
    /// Completion of an internal training course.
    Training,
    /// A signed self-attestation.
    Attestation,
    /// A check performed by a third party (background, device scan).
    Check,
}

impl RequirementKind {
    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Certification => "certification",
            Self::Training => "training",
            Self::Attestation => "attestation",
            Self::Check => "check",
        }
    }
}

/// One requirement within a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDefinition {
    /// Stable identifier. Reconciliation matches user records on this.
    pub id: RequirementId,
    /// Display name.
    pub name: String,
    /// Free-form grouping label (e.g. "security", "training").
    pub category: String,
    /// Kind of evidence.
    pub kind: RequirementKind,
    /// Whether the requirement is mandatory for the pair.
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_mandatory() -> bool {
    true
}

/// The ordered requirement set for one `(Role, Tier)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementTemplate {
    /// Role the template applies to.
    pub role: Role,
    /// Tier the template applies to.
    pub tier: Tier,
    /// Requirement definitions in display order.
    pub requirements: Vec<RequirementDefinition>,
}

impl RequirementTemplate {
    /// Requirement ids in template order.
    pub fn ids(&self) -> impl Iterator<Item = &RequirementId> + '_ {
        self.requirements.iter().map(|r| &r.id)
    }

    /// Whether the template contains a requirement with the given id.
    pub fn contains(&self, id: &RequirementId) -> bool {
        self.requirements.iter().any(|r| &r.id == id)
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &RequirementId) -> Option<&RequirementDefinition> {
        self.requirements.iter().find(|r| &r.id == id)
    }

    /// Number of requirements.
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Whether the template has no requirements.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Number of mandatory requirements.
    pub fn mandatory_count(&self) -> usize {
        self.requirements.iter().filter(|r| r.mandatory).count()
    }
}
