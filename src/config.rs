//! Configuration for the federated querier
//!
//! TOML file support, environment variable overrides and defaults.
//!
//! ```toml
//! replica_label = "replica"
//! query_timeout_ms = 30000
//! max_concurrent_stores = 32
//! log_level = "debug"
//! ```

use crate::error::{Error, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Querier configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuerierConfig {
    /// Label distinguishing replicas of the same series; unset disables dedup
    #[serde(default)]
    pub replica_label: Option<String>,

    /// Deadline for a whole query in milliseconds, 0 for none
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Maximum store RPCs in flight per query
    #[serde(default = "default_max_concurrent_stores")]
    pub max_concurrent_stores: usize,

    /// Log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_query_timeout_ms() -> u64 { 120_000 }
fn default_max_concurrent_stores() -> usize { 64 }
fn default_log_level() -> String { "info".to_string() }

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            replica_label: None,
            query_timeout_ms: default_query_timeout_ms(),
            max_concurrent_stores: default_max_concurrent_stores(),
            log_level: default_log_level(),
        }
    }
}

impl QuerierConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read config file {}: {}", path, e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file {}: {}", path, e)))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(label) = std::env::var("QUERIER_REPLICA_LABEL") {
            self.replica_label = if label.is_empty() { None } else { Some(label) };
        }
        if let Ok(timeout) = std::env::var("QUERIER_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.query_timeout_ms = t;
            }
        }
        if let Ok(max) = std::env::var("QUERIER_MAX_CONCURRENT_STORES") {
            if let Ok(m) = max.parse() {
                self.max_concurrent_stores = m;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.replica_label.as_deref() == Some("") {
            return Err(ValidationError::InvalidFormat {
                field: "replica_label".to_string(),
                message: "must not be empty".to_string(),
            }
            .into());
        }
        if self.max_concurrent_stores == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_concurrent_stores".to_string(),
                value: self.max_concurrent_stores.to_string(),
                min: "1".to_string(),
                max: usize::MAX.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Query deadline, `None` when disabled
    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }
}
