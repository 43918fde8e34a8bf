//! # certrack-catalog: Requirement Template Catalog
//!
//! Maps a `(Role, Tier)` pair to the ordered list of requirement
//! definitions a user holding that pair must satisfy.
//!
//! The catalog is data, not code: templates are loaded from YAML (either
//! the built-in `catalog/default.yaml` or an operator-supplied file), so
//! adding a role/tier pair never introduces a new code path.
//!
//! Lookups for a pair with no template return
//! [`CatalogError::TemplateNotFound`]. Callers must fail closed on it
//! rather than treat the user as having zero requirements.

pub mod catalog;
pub mod template;

pub use catalog::{CatalogError, TemplateCatalog};
pub use template::{RequirementDefinition, RequirementKind, RequirementTemplate};
