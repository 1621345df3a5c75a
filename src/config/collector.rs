//! Collector configuration structures.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::collector::stream::{StreamCollectorConfig, StreamFilters, StreamKind, StreamOperation};

use super::validation::ConfigError;

/// Settings of one stream collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Regexes matched against the target URI and the caller's source file.
    pub ignored_path_patterns: Vec<String>,

    /// Caller type names (full path or trailing segments).
    pub ignored_classes: Vec<String>,

    /// URI substrings.
    pub ignored_urls: Vec<String>,

    /// Recorded operation kinds (default depends on the collector).
    pub operations: Option<Vec<StreamOperation>>,

    /// Intercepted protocols (default depends on the collector).
    pub protocols: Option<Vec<String>>,
}

impl StreamConfig {
    /// Build the collector settings for `kind`, applying its defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` for an invalid path pattern.
    pub fn to_collector_config(&self, kind: StreamKind) -> Result<StreamCollectorConfig, ConfigError> {
        let filters = StreamFilters::new()
            .with_ignored_path_patterns(&self.ignored_path_patterns)
            .map_err(|e| {
                ConfigError::ValidationError(format!(
                    "collectors.{}.ignored_path_patterns: {}",
                    kind.name(),
                    e
                ))
            })?
            .with_ignored_classes(self.ignored_classes.iter().cloned())
            .with_ignored_urls(self.ignored_urls.iter().cloned());

        let mut config = StreamCollectorConfig::for_kind(kind).with_filters(filters);
        if let Some(operations) = &self.operations {
            config = config.with_operations(operations.iter().copied());
        }
        if let Some(protocols) = &self.protocols {
            config = config.with_protocols(protocols.iter().cloned());
        }
        Ok(config)
    }
}

/// Collectors configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    /// Names of collectors that stay inactive in every lifecycle.
    pub disabled: Vec<String>,

    /// HTTP stream collector.
    pub http_stream: StreamConfig,

    /// Filesystem stream collector.
    pub fs_stream: StreamConfig,
}

impl CollectorsConfig {
    /// Validate all collector configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_names = HashSet::new();
        for name in &self.disabled {
            if name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "disabled collector name cannot be empty".to_string(),
                ));
            }
            if !seen_names.insert(name) {
                return Err(ConfigError::ValidationError(format!(
                    "collector '{}' is disabled twice",
                    name
                )));
            }
        }

        for (kind, stream) in [
            (StreamKind::Http, &self.http_stream),
            (StreamKind::Filesystem, &self.fs_stream),
        ] {
            if let Some(protocols) = &stream.protocols
                && protocols.iter().any(|protocol| protocol.is_empty())
            {
                return Err(ConfigError::ValidationError(format!(
                    "collectors.{}: protocol name cannot be empty",
                    kind.name()
                )));
            }
            stream.to_collector_config(kind)?;
        }

        Ok(())
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|disabled| disabled == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_defaults() {
        let config: StreamConfig = serde_yaml::from_str("{}").unwrap();
        let collector = config.to_collector_config(StreamKind::Http).unwrap();
        assert_eq!(collector.protocols, vec!["http".to_string(), "https".to_string()]);
        assert_eq!(collector.operations, StreamKind::Http.default_operations());
        assert!(collector.filters.is_empty());
    }

    #[test]
    fn test_stream_config_overrides() {
        let yaml = r#"
ignored_urls: ["metrics.internal"]
operations: [open, read]
protocols: [mem]
"#;
        let config: StreamConfig = serde_yaml::from_str(yaml).unwrap();
        let collector = config.to_collector_config(StreamKind::Filesystem).unwrap();
        assert_eq!(collector.protocols, vec!["mem".to_string()]);
        assert!(collector.operations.contains(&StreamOperation::Open));
        assert!(!collector.operations.contains(&StreamOperation::Unlink));
        assert!(!collector.filters.is_empty());
    }

    #[test]
    fn test_unknown_operation_fails_to_parse() {
        assert!(serde_yaml::from_str::<StreamConfig>("operations: [truncate]").is_err());
    }

    #[test]
    fn test_collectors_config_validate_invalid_pattern() {
        let config = CollectorsConfig {
            fs_stream: StreamConfig {
                ignored_path_patterns: vec!["[".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fs_stream"));
    }

    #[test]
    fn test_collectors_config_validate_disabled_names() {
        let empty = CollectorsConfig {
            disabled: vec![String::new()],
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let duplicate = CollectorsConfig {
            disabled: vec!["log".to_string(), "log".to_string()],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let valid = CollectorsConfig {
            disabled: vec!["log".to_string()],
            ..Default::default()
        };
        valid.validate().unwrap();
        assert!(valid.is_disabled("log"));
        assert!(!valid.is_disabled("event"));
    }
}
