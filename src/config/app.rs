//! Debugger configuration structures.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::collector::CollectorsConfig;
use super::validation::{ConfigError, compile_patterns, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default number of flushed sessions kept by durable storages.
pub const DEFAULT_HISTORY_SIZE: usize = 50;

fn default_enabled() -> bool {
    true
}

fn default_history_size() -> usize {
    DEFAULT_HISTORY_SIZE
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Storage driver type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageDriver {
    /// Process memory; nothing survives a restart.
    #[default]
    Memory,
    /// JSON files under `path`.
    File,
    /// DuckDB database at `path`.
    Duckdb,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage driver (default: memory).
    #[serde(default)]
    pub driver: StorageDriver,

    /// Directory (file) or database file (duckdb). Supports `${VAR}` expansion.
    #[serde(default)]
    pub path: Option<String>,

    /// Flushed sessions kept by durable drivers (default: 50).
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::Memory,
            path: None,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

impl StorageConfig {
    /// `path` with environment variables expanded.
    pub fn resolved_path(&self) -> Option<String> {
        self.path.as_deref().map(expand_env_vars)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size == 0 {
            return Err(ConfigError::ValidationError(
                "storage history_size must be positive".to_string(),
            ));
        }

        if self.driver != StorageDriver::Memory
            && self.resolved_path().is_none_or(|path| path.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "storage driver '{}' requires a path",
                self.driver
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Debugger Configuration
// =============================================================================

/// Top-level debugger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Master switch; a disabled debugger leaves every collector inactive.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Request URI patterns whose lifecycles are not collected.
    #[serde(default)]
    pub ignored_requests: Vec<String>,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Collector configuration.
    #[serde(default)]
    pub collectors: CollectorsConfig,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignored_requests: Vec::new(),
            storage: StorageConfig::default(),
            collectors: CollectorsConfig::default(),
        }
    }
}

impl DebugConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ignored_request_patterns()?;
        self.storage.validate()?;
        self.collectors.validate()?;
        Ok(())
    }

    /// Compiled `ignored_requests` patterns.
    pub fn ignored_request_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        compile_patterns("ignored_requests", &self.ignored_requests)
    }
}
