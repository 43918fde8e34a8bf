//! # Application State
//!
//! Shared state for the Axum application: the tier service and the
//! configuration it was built from.
//!
//! ## Environment
//!
//! | Variable                      | Default   | Meaning                                  |
//! |-------------------------------|-----------|------------------------------------------|
//! | `PORT`                        | `8080`    | Listen port                              |
//! | `DATABASE_URL`                | unset     | Postgres URL; in-memory store when unset |
//! | `CERTRACK_DB_MAX_CONNECTIONS` | `20`      | Postgres pool size                       |
//! | `CERTRACK_CATALOG`            | built-in  | Path to a YAML template catalog          |
//! | `CERTRACK_UPGRADE_THRESHOLD`  | `75`      | Minimum completion % to upgrade          |
//! | `CERTRACK_EFFORT_SHORT_MAX`   | `3`       | Upper bound of the "short" effort band   |
//! | `CERTRACK_EFFORT_MEDIUM_MAX`  | `8`       | Upper bound of the "medium" effort band  |
//! | `CERTRACK_PENDING_STALE_DAYS` | unset     | Flag pending requests older than this    |

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use certrack_catalog::{CatalogError, TemplateCatalog};
use certrack_engine::{ComplianceStore, ConfigError, EngineConfig, MemoryStore, TierService};

/// Configuration rejected at startup.
#[derive(Error, Debug)]
pub enum StartupError {
    /// An environment variable failed to parse.
    #[error("invalid {var}={value:?}: {reason}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// Engine settings are inconsistent.
    #[error(transparent)]
    Engine(#[from] ConfigError),

    /// Pool size of zero.
    #[error("CERTRACK_DB_MAX_CONNECTIONS must be at least 1")]
    ZeroConnections,

    /// The template catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind.
    pub port: u16,
    /// Postgres URL. The in-memory store is used when `None`.
    pub database_url: Option<String>,
    /// Postgres pool size.
    pub db_max_connections: u32,
    /// Catalog file. The built-in catalog is used when `None`.
    pub catalog_path: Option<PathBuf>,
    /// Engine thresholds.
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            db_max_connections: 20,
            catalog_path: None,
            engine: EngineConfig::default(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_max_connections", &self.db_max_connections)
            .field("catalog_path", &self.catalog_path)
            .field("engine", &self.engine)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, validating the result.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }
        config.database_url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());
        if let Some(max) = parse_var(&lookup, "CERTRACK_DB_MAX_CONNECTIONS")? {
            config.db_max_connections = max;
        }
        if config.db_max_connections == 0 {
            return Err(StartupError::ZeroConnections);
        }
        config.catalog_path = lookup("CERTRACK_CATALOG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        if let Some(threshold) = parse_var(&lookup, "CERTRACK_UPGRADE_THRESHOLD")? {
            config.engine.upgrade_threshold_percent = threshold;
        }
        if let Some(short_max) = parse_var(&lookup, "CERTRACK_EFFORT_SHORT_MAX")? {
            config.engine.effort_bands.short_max = short_max;
        }
        if let Some(medium_max) = parse_var(&lookup, "CERTRACK_EFFORT_MEDIUM_MAX")? {
            config.engine.effort_bands.medium_max = medium_max;
        }
        if let Some(days) = parse_var::<i64>(&lookup, "CERTRACK_PENDING_STALE_DAYS")? {
            let window = chrono::Duration::try_days(days)
                .filter(|_| days >= 0)
                .ok_or_else(|| StartupError::InvalidVar {
                    var: "CERTRACK_PENDING_STALE_DAYS",
                    value: days.to_string(),
                    reason: "must be a non-negative number of days within range".to_string(),
                })?;
            config.engine.pending_stale_after = Some(window);
        }

        config.engine.validate()?;
        Ok(config)
    }

    /// Load the configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<TemplateCatalog, StartupError> {
        let catalog = match &self.catalog_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading template catalog");
                TemplateCatalog::from_file(path)?
            }
            None => TemplateCatalog::builtin()?,
        };
        tracing::info!(templates = catalog.len(), "template catalog loaded");
        Ok(catalog)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, StartupError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| StartupError::InvalidVar {
            var,
            value,
            reason: e.to_string(),
        })
}

/// Shared application state passed to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Compliance-tier operations.
    pub service: TierService,
    /// Configuration the state was built from.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build state over an arbitrary store.
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        catalog: TemplateCatalog,
        config: AppConfig,
    ) -> Self {
        let service = TierService::new(store, Arc::new(catalog), config.engine.clone());
        Self {
            service,
            config: Arc::new(config),
        }
    }

    /// Build state over a fresh in-memory store.
    pub fn in_memory(config: AppConfig) -> Result<Self, StartupError> {
        let catalog = config.load_catalog()?;
        Ok(Self::new(Arc::new(MemoryStore::new()), catalog, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.catalog_path.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.engine.upgrade_threshold_percent, 75);
        assert!(config.engine.pending_stale_after.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9090"),
            ("CERTRACK_UPGRADE_THRESHOLD", "60"),
            ("CERTRACK_EFFORT_SHORT_MAX", "2"),
            ("CERTRACK_EFFORT_MEDIUM_MAX", "5"),
            ("CERTRACK_PENDING_STALE_DAYS", "14"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.engine.upgrade_threshold_percent, 60);
        assert_eq!(config.engine.effort_bands.short_max, 2);
        assert_eq!(config.engine.effort_bands.medium_max, 5);
        assert_eq!(
            config.engine.pending_stale_after,
            Some(chrono::Duration::days(14))
        );
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let err = AppConfig::from_lookup(lookup_from(&[("CERTRACK_UPGRADE_THRESHOLD", "most")]))
            .unwrap_err();
        assert!(err.to_string().contains("CERTRACK_UPGRADE_THRESHOLD"));
    }

    #[test]
    fn oversized_stale_window_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "CERTRACK_PENDING_STALE_DAYS",
            "999999999999",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            StartupError::InvalidVar {
                var: "CERTRACK_PENDING_STALE_DAYS",
                ..
            }
        ));
    }

    #[test]
    fn negative_stale_window_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("CERTRACK_PENDING_STALE_DAYS", "-3")]))
            .unwrap_err();
        assert!(err.to_string().contains("CERTRACK_PENDING_STALE_DAYS"));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("CERTRACK_UPGRADE_THRESHOLD", "120")]))
            .unwrap_err();
        assert!(matches!(
            err,
            StartupError::Engine(ConfigError::ThresholdOutOfRange(120))
        ));
    }

    #[test]
    fn debug_redacts_database_url() {
        let config = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://certrack:hunter2@db/certrack",
        )]))
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn zero_pool_size_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("CERTRACK_DB_MAX_CONNECTIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, StartupError::ZeroConnections));
    }

    #[test]
    fn in_memory_state_uses_builtin_catalog() {
        let state = AppState::in_memory(AppConfig::default()).unwrap();
        assert_eq!(state.service.catalog().len(), 12);
    }
}
