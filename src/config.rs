//! Analytics configuration.
//!
//! Configuration is stored in TOML format at
//! `~/.config/bike-sales-analytics/analytics.toml` (or XDG equivalent). Every
//! field is optional; a missing file yields the defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! as_of = "2014-01-01"
//! unknown_gender_labels = ["n/a", "unknown"]
//! top_limit = 10
//!
//! [[age_bands]]
//! label = "under 30"
//! min = 0
//! max = 29
//!
//! [[age_bands]]
//! label = "30+"
//! min = 30
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::bucketing::{self, AgeBand};

const APP_DIR: &str = "bike-sales-analytics";
const CONFIG_FILE: &str = "analytics.toml";

/// Errors that can occur when loading or saving analytics configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Reference date for age calculations. When unset, callers must supply
    /// one; the library never reads the clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,

    /// Gender labels treated as unknown (matched case-insensitively).
    pub unknown_gender_labels: Vec<String>,

    /// Default row limit for product rankings.
    pub top_limit: usize,

    /// Age bands for demographic breakdowns.
    pub age_bands: Vec<AgeBand>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            as_of: None,
            unknown_gender_labels: vec!["n/a".into()],
            top_limit: 10,
            age_bands: bucketing::default_age_bands(),
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from the default location.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded analytics config");
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// Uses XDG conventions:
    /// - Primary: `$XDG_CONFIG_HOME/bike-sales-analytics/analytics.toml`
    /// - Fallback: platform-specific config dir
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
        }

        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_limit == 0 {
            return Err(ConfigError::Validation(
                "top_limit must be greater than zero".into(),
            ));
        }
        if self.age_bands.is_empty() {
            return Err(ConfigError::Validation(
                "at least one age band is required".into(),
            ));
        }
        bucketing::check_age_bands(&self.age_bands).map_err(ConfigError::Validation)
    }

    /// The pinned `as_of` date, or `fallback` when none is configured.
    pub fn resolve_as_of(&self, fallback: NaiveDate) -> NaiveDate {
        self.as_of.unwrap_or(fallback)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_limit, 10);
        assert_eq!(config.age_bands.len(), 4);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AnalyticsConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analytics.toml");
        std::fs::write(&path, "as_of = \"2014-01-01\"\ntop_limit = 3\n").unwrap();

        let config = AnalyticsConfig::load_from(&path).unwrap();
        assert_eq!(config.as_of, Some(date(2014, 1, 1)));
        assert_eq!(config.top_limit, 3);
        assert_eq!(config.unknown_gender_labels, vec!["n/a".to_string()]);
    }

    #[test]
    fn age_bands_parse_with_open_upper_bound() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analytics.toml");
        std::fs::write(
            &path,
            r#"
[[age_bands]]
label = "under 30"
min = 0
max = 29

[[age_bands]]
label = "30+"
min = 30
"#,
        )
        .unwrap();

        let config = AnalyticsConfig::load_from(&path).unwrap();
        assert_eq!(config.age_bands.len(), 2);
        assert_eq!(config.age_bands[1].max, None);
    }

    #[test]
    fn overlapping_bands_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analytics.toml");
        std::fs::write(
            &path,
            r#"
[[age_bands]]
label = "a"
min = 0
max = 30

[[age_bands]]
label = "b"
min = 30
"#,
        )
        .unwrap();

        match AnalyticsConfig::load_from(&path) {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("overlap"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn zero_top_limit_rejected() {
        let config = AnalyticsConfig {
            top_limit: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analytics.toml");
        std::fs::write(&path, "top_limit = \"ten\"").unwrap();
        assert!(matches!(
            AnalyticsConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("analytics.toml");
        let config = AnalyticsConfig {
            as_of: Some(date(2013, 12, 31)),
            unknown_gender_labels: vec!["n/a".into(), "unknown".into()],
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AnalyticsConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn resolve_as_of_prefers_pinned_date() {
        let fallback = date(2020, 1, 1);
        assert_eq!(AnalyticsConfig::default().resolve_as_of(fallback), fallback);
        let pinned = AnalyticsConfig {
            as_of: Some(date(2014, 1, 1)),
            ..Default::default()
        };
        assert_eq!(pinned.resolve_as_of(fallback), date(2014, 1, 1));
    }

    #[test]
    #[serial]
    fn config_path_respects_xdg_config_home() {
        let dir = TempDir::new().unwrap();
        let previous = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", dir.path());
        }

        let path = AnalyticsConfig::config_path();
        let loaded = AnalyticsConfig::load();

        unsafe {
            match previous {
                Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(
            path.unwrap(),
            dir.path().join("bike-sales-analytics").join("analytics.toml")
        );
        assert_eq!(loaded.unwrap(), AnalyticsConfig::default());
    }
}
