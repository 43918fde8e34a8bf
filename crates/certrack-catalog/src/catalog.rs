//! # Template Catalog
//!
//! Loads requirement templates from YAML and answers `template_for(role,
//! tier)` lookups.
//!
//! ## YAML Format
//!
//! ```yaml
//! templates:
//!   - role: IT
//!     tier: basic
//!     requirements:
//!       - id: it-security-awareness
//!         name: Security Awareness Training
//!         category: training
//!         kind: training
//!         mandatory: true
//! ```
//!
//! Load-time validation rejects duplicate `(role, tier)` pairs and
//! duplicate requirement ids within a single template.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use certrack_core::{Role, Tier};

use crate::template::RequirementTemplate;

/// The catalog shipped with the crate.
const DEFAULT_CATALOG_YAML: &str = include_str!("../catalog/default.yaml");

/// Errors raised while loading or querying the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No template exists for the requested pair.
    #[error("no requirement template for role {role} at tier {tier}")]
    TemplateNotFound {
        /// Requested role.
        role: Role,
        /// Requested tier.
        tier: Tier,
    },

    /// The catalog document could not be parsed.
    #[error("failed to parse catalog: {0}")]
    Parse(String),

    /// Two templates declare the same pair.
    #[error("duplicate template for role {role} at tier {tier}")]
    DuplicateTemplate {
        /// Duplicated role.
        role: Role,
        /// Duplicated tier.
        tier: Tier,
    },

    /// A template lists the same requirement id twice.
    #[error("template {role}/{tier} lists requirement {id} more than once")]
    DuplicateRequirement {
        /// Template role.
        role: Role,
        /// Template tier.
        tier: Tier,
        /// Repeated requirement id.
        id: String,
    },

    /// The catalog file could not be read.
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[derive(Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    templates: Vec<RequirementTemplate>,
}

/// Immutable `(Role, Tier)` → [`RequirementTemplate`] lookup.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<(Role, Tier), RequirementTemplate>,
}

impl TemplateCatalog {
    /// Build a catalog from already-parsed templates, validating uniqueness.
    pub fn from_templates(
        templates: impl IntoIterator<Item = RequirementTemplate>,
    ) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for template in templates {
            let mut seen = HashSet::new();
            for req in &template.requirements {
                if !seen.insert(req.id.clone()) {
                    return Err(CatalogError::DuplicateRequirement {
                        role: template.role,
                        tier: template.tier,
                        id: req.id.to_string(),
                    });
                }
            }
            let key = (template.role, template.tier);
            if map.insert(key, template).is_some() {
                return Err(CatalogError::DuplicateTemplate {
                    role: key.0,
                    tier: key.1,
                });
            }
        }
        Ok(Self { templates: map })
    }

    /// Parse a catalog from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_templates(doc.templates)
    }

    /// Read and parse a catalog YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            templates = catalog.len(),
            "loaded requirement catalog"
        );
        Ok(catalog)
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(DEFAULT_CATALOG_YAML)
    }

    /// Look up the template for a pair. Fails closed when absent.
    pub fn template_for(&self, role: Role, tier: Tier) -> Result<&RequirementTemplate, CatalogError> {
        self.templates
            .get(&(role, tier))
            .ok_or(CatalogError::TemplateNotFound { role, tier })
    }

    /// Whether a template exists for the pair.
    pub fn contains(&self, role: Role, tier: Tier) -> bool {
        self.templates.contains_key(&(role, tier))
    }

    /// All configured pairs, sorted by role then tier.
    pub fn pairs(&self) -> Vec<(Role, Tier)> {
        let mut pairs: Vec<_> = self.templates.keys().copied().collect();
        pairs.sort();
        pairs
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
