//! Scan configuration.
//!
//! Defaults are embedded from `config/defaults.toml` at compile time. A
//! user file only needs the keys it changes; its top-level keys replace
//! the defaults one for one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use route_safety_corridor::scan::ScanOptions;
use route_safety_source::FetchOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULTS_TOML: &str = include_str!("../config/defaults.toml");

/// Longest accepted lookback window, about a century.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The user file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file was not valid TOML or did not match the schema.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are unusable.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Which value is wrong and why.
        message: String,
    },
}

/// Everything a route analysis needs besides credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Corridor half-width in decimal degrees.
    ///
    /// The same number is used for both axes, so the corridor is narrower
    /// east-west than north-south away from the equator.
    pub tolerance: f64,
    /// Days of complaints to fetch, `1..=MAX_LOOKBACK_DAYS`.
    pub lookback_days: u32,
    /// Maximum complaints fetched per request.
    pub limit: u32,
    /// Classifications in flight at once.
    pub concurrency: usize,
    /// Time limit for one classification, in seconds.
    pub classify_timeout_secs: u64,
    /// SODA endpoint of the complaint dataset.
    pub dataset_url: String,
    /// Complaint types to fetch.
    pub complaint_types: Vec<String>,
    /// Categories counted toward the score when the caller gives none.
    pub unsafe_categories: BTreeSet<String>,
}

impl ScanConfig {
    /// The embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded file is malformed.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_tables(parse_table(DEFAULTS_TOML)?, toml::Table::new())
    }

    /// The defaults overlaid with `path`, if given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// TOML, contains unknown keys, or yields invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::defaults();
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loading configuration overrides from {}", path.display());
        Self::from_overrides(&text)
    }

    /// The defaults overlaid with the TOML document `text`.
    ///
    /// # Errors
    ///
    /// Same as [`ScanConfig::load`], minus I/O.
    pub fn from_overrides(text: &str) -> Result<Self, ConfigError> {
        Self::from_tables(parse_table(DEFAULTS_TOML)?, parse_table(text)?)
    }

    fn from_tables(mut base: toml::Table, overrides: toml::Table) -> Result<Self, ConfigError> {
        base.extend(overrides);
        let config: Self = toml::Value::Table(base).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return invalid(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            ));
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if self.classify_timeout_secs == 0 {
            return invalid("classify_timeout_secs must be at least 1".to_string());
        }
        if self.lookback_days == 0 || self.lookback_days > MAX_LOOKBACK_DAYS {
            return invalid(format!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            ));
        }
        if self.limit == 0 {
            return invalid("limit must be at least 1".to_string());
        }
        if self.dataset_url.trim().is_empty() {
            return invalid("dataset_url must not be empty".to_string());
        }
        Ok(())
    }

    /// Time limit for one classification.
    #[must_use]
    pub const fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }

    /// Scan parameters counting `unsafe_categories`, or the configured
    /// set when `None`.
    #[must_use]
    pub fn scan_options(&self, unsafe_categories: Option<&BTreeSet<String>>) -> ScanOptions {
        ScanOptions {
            tolerance: self.tolerance,
            unsafe_categories: unsafe_categories
                .unwrap_or(&self.unsafe_categories)
                .clone(),
            concurrency: self.concurrency,
            classify_timeout: self.classify_timeout(),
        }
    }

    /// Fetch parameters for the lookback window ending now.
    #[must_use]
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::lookback(
            self.lookback_days,
            self.limit,
            self.complaint_types.clone(),
        )
    }
}

fn parse_table(text: &str) -> Result<toml::Table, ConfigError> {
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = ScanConfig::defaults().unwrap();
        assert!((config.tolerance - 0.0005).abs() < f64::EPSILON);
        assert_eq!(config.lookback_days, 3);
        assert_eq!(config.limit, 5000);
        assert_eq!(config.classify_timeout(), Duration::from_secs(30));
        assert!(config.dataset_url.ends_with("erm2-nwe9.json"));
        assert_eq!(config.complaint_types.len(), 8);
        assert!(config.unsafe_categories.contains("Road Hazard"));
    }

    #[test]
    fn overrides_replace_only_given_keys() {
        let config = ScanConfig::from_overrides(
            "tolerance = 0.001\nunsafe_categories = [\"Noise\"]\n",
        )
        .unwrap();
        let defaults = ScanConfig::defaults().unwrap();

        assert!((config.tolerance - 0.001).abs() < f64::EPSILON);
        assert_eq!(config.unsafe_categories.len(), 1);
        assert_eq!(config.limit, defaults.limit);
        assert_eq!(config.complaint_types, defaults.complaint_types);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            ScanConfig::from_overrides("tolerence = 0.001"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "tolerance = -0.1",
            "concurrency = 0",
            "classify_timeout_secs = 0",
            "limit = 0",
            "lookback_days = 0",
            "lookback_days = 4000000000",
            "dataset_url = \" \"",
        ] {
            assert!(
                matches!(
                    ScanConfig::from_overrides(text),
                    Err(ConfigError::Invalid { .. })
                ),
                "{text} should be invalid"
            );
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = ScanConfig::load(Some(Path::new("/nonexistent/route-safety.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn scan_options_prefer_caller_categories() {
        let config = ScanConfig::defaults().unwrap();
        let own: BTreeSet<String> = ["Noise".to_string()].into();

        assert_eq!(config.scan_options(Some(&own)).unsafe_categories, own);
        assert_eq!(
            config.scan_options(None).unsafe_categories,
            config.unsafe_categories
        );
        assert_eq!(config.scan_options(None).concurrency, config.concurrency);
    }
}
