//! Runtime configuration: TOML file, then environment, then flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use district_stats_resilience::{CircuitBreakerConfig, RetryOptions};
use serde::Deserialize;

/// Config file read when `--config` is not given. Optional.
pub const DEFAULT_CONFIG_FILE: &str = "district_stats.toml";

pub const CACHE_DIR_ENV: &str = "DISTRICT_STATS_CACHE_DIR";
pub const BASE_URL_ENV: &str = "DISTRICT_STATS_BASE_URL";
/// Comma-separated unit IDs.
pub const UNITS_ENV: &str = "DISTRICT_STATS_UNITS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetryOptions::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: u64::try_from(defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
            max_delay_ms: u64::try_from(defaults.max_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_multiplier: defaults.backoff_multiplier,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            cooldown_secs: defaults.cooldown.as_secs(),
        }
    }
}

impl BreakerConfig {
    #[must_use]
    pub const fn config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

/// Everything the subcommands need.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub cache_dir: PathBuf,
    /// Dashboard CSV export endpoint.
    pub base_url: String,
    /// `units.toml`; the bundled list when unset.
    pub units_file: Option<PathBuf>,
    /// Restricts every command to these units.
    pub units: Option<Vec<String>>,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            base_url: "http://localhost:8080/export".to_string(),
            units_file: None,
            units: None,
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Splits a comma-separated unit list, dropping blanks.
#[must_use]
pub fn parse_unit_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl Config {
    /// Parses a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed.
    pub fn from_toml_str(s: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Toml {
            path: origin.to_owned(),
            source,
        })
    }

    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] if it exists, or the
    /// defaults. An explicitly named file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    log::debug!("No {DEFAULT_CONFIG_FILE}, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let origin = path.display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        log::debug!("Loaded config from {origin}");
        Self::from_toml_str(&content, &origin)
    }

    /// Applies environment overrides read through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(units) = lookup(UNITS_ENV) {
            let units = parse_unit_list(&units);
            if !units.is_empty() {
                self.units = Some(units);
            }
        }
        self
    }

    /// Applies the process environment.
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }
}
