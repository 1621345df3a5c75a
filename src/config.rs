//! Configuration module for Lookout.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Debugger settings (master switch, ignored request patterns)
//! - Storage settings (driver, path, history size)
//! - Collector settings (disabled collectors, stream exclusion rules)

mod app;
mod collector;
mod validation;

pub use app::{DEFAULT_HISTORY_SIZE, DebugConfig, StorageConfig, StorageDriver};
pub use collector::{CollectorsConfig, StreamConfig};
pub use validation::{ConfigError, compile_patterns, expand_env_vars};
