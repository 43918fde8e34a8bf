//! # Engine Configuration
//!
//! Business thresholds that product owners tune without a code change:
//!
//! - the minimum completion percentage on the current tier before an
//!   upgrade is allowed (default 75%),
//! - the effort banding reported in impact previews,
//! - the age after which a pending switch request is flagged as stale,
//! - the maximum justification length.
//!
//! Stale requests are only flagged. They are never auto-expired or
//! auto-resolved.

use chrono::Duration;
use serde::Serialize;
use thiserror::Error;

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Threshold outside 0..=100.
    #[error("upgrade threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(u8),

    /// Effort bands out of order.
    #[error("effort bands must satisfy short_max <= medium_max (got {short_max} > {medium_max})")]
    BandsOutOfOrder {
        /// Upper bound of the short band.
        short_max: usize,
        /// Upper bound of the medium band.
        medium_max: usize,
    },

    /// Non-positive staleness window.
    #[error("pending staleness window must be positive")]
    NonPositiveStaleness,

    /// Zero-length justification limit.
    #[error("maximum justification length must be positive")]
    ZeroJustificationLimit,
}

/// Coarse estimate of the work a tier switch creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortEstimate {
    /// Nothing new to complete.
    None,
    /// A handful of requirements.
    Short,
    /// A moderate batch.
    Medium,
    /// A large batch.
    Long,
}

impl EffortEstimate {
    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl std::fmt::Display for EffortEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bounds (inclusive) on requirements-to-add for each band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffortBands {
    /// Additions up to this count are `Short`.
    pub short_max: usize,
    /// Additions up to this count are `Medium`; above it, `Long`.
    pub medium_max: usize,
}

impl Default for EffortBands {
    fn default() -> Self {
        Self {
            short_max: 3,
            medium_max: 8,
        }
    }
}

impl EffortBands {
    /// Band a count of requirements to add.
    pub fn classify(&self, additions: usize) -> EffortEstimate {
        if additions == 0 {
            EffortEstimate::None
        } else if additions <= self.short_max {
            EffortEstimate::Short
        } else if additions <= self.medium_max {
            EffortEstimate::Medium
        } else {
            EffortEstimate::Long
        }
    }
}

/// Tunable engine behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum current-tier completion (percent) required to upgrade.
    pub upgrade_threshold_percent: u8,
    /// Effort banding for impact previews.
    pub effort_bands: EffortBands,
    /// Pending requests older than this are flagged stale. `None` disables.
    pub pending_stale_after: Option<Duration>,
    /// Maximum justification length in characters.
    pub max_justification_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            upgrade_threshold_percent: 75,
            effort_bands: EffortBands::default(),
            pending_stale_after: None,
            max_justification_len: 2000,
        }
    }
}

impl EngineConfig {
    /// Check every field for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upgrade_threshold_percent > 100 {
            return Err(ConfigError::ThresholdOutOfRange(
                self.upgrade_threshold_percent,
            ));
        }
        if self.effort_bands.short_max > self.effort_bands.medium_max {
            return Err(ConfigError::BandsOutOfOrder {
                short_max: self.effort_bands.short_max,
                medium_max: self.effort_bands.medium_max,
            });
        }
        if let Some(window) = self.pending_stale_after {
            if window <= Duration::zero() {
                return Err(ConfigError::NonPositiveStaleness);
            }
        }
        if self.max_justification_len == 0 {
            return Err(ConfigError::ZeroJustificationLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.upgrade_threshold_percent, 75);
        assert!(config.pending_stale_after.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn bands_classify_by_inclusive_upper_bound() {
        let bands = EffortBands::default();
        assert_eq!(bands.classify(0), EffortEstimate::None);
        assert_eq!(bands.classify(1), EffortEstimate::Short);
        assert_eq!(bands.classify(3), EffortEstimate::Short);
        assert_eq!(bands.classify(4), EffortEstimate::Medium);
        assert_eq!(bands.classify(8), EffortEstimate::Medium);
        assert_eq!(bands.classify(9), EffortEstimate::Long);
    }

    #[test]
    fn rejects_threshold_over_100() {
        let config = EngineConfig {
            upgrade_threshold_percent: 101,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOutOfRange(101)));
    }

    #[test]
    fn rejects_inverted_bands() {
        let config = EngineConfig {
            effort_bands: EffortBands {
                short_max: 5,
                medium_max: 2,
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BandsOutOfOrder { .. })
        ));
    }

    #[test]
    fn rejects_zero_staleness_window() {
        let config = EngineConfig {
            pending_stale_after: Some(Duration::zero()),
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveStaleness));
    }
}
