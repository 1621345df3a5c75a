//! Lifecycle-scoped collector registry.
//!
//! A [`Debugger`] is built once per lifecycle (request, job, CLI run). It
//! owns the lifecycle's [`Storage`] and shares its collectors with the
//! producers that feed them:
//!
//! 1. [`startup`](Debugger::startup) starts every collector, unless the
//!    configuration filters the lifecycle out.
//! 2. Producers call the collectors' `collect` entry points.
//! 3. [`shutdown`](Debugger::shutdown) snapshots every collector into storage,
//!    flushes it under the lifecycle's debugger id and stops the collectors.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use crate::collector::{Collector, CollectorError};
use crate::config::{CollectorsConfig, ConfigError, DebugConfig};
use crate::storage::Storage;

/// Collectors and storage of one lifecycle.
pub struct Debugger {
    storage: Box<dyn Storage>,
    collectors: Vec<Arc<dyn Collector>>,
    enabled: bool,
    ignored_requests: Vec<Regex>,
    collectors_config: CollectorsConfig,
    /// Indices of collectors started by the current lifecycle.
    started: Vec<usize>,
}

impl Debugger {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            collectors: Vec::new(),
            enabled: true,
            ignored_requests: Vec::new(),
            collectors_config: CollectorsConfig::default(),
            started: Vec::new(),
        }
    }

    /// Apply the master switch, request filters and disabled collectors.
    pub fn with_config(mut self, config: &DebugConfig) -> Result<Self, ConfigError> {
        self.enabled = config.enabled;
        self.ignored_requests = config.ignored_request_patterns()?;
        self.collectors_config = config.collectors.clone();
        Ok(self)
    }

    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_ignored_requests(mut self, patterns: Vec<Regex>) -> Self {
        self.ignored_requests = patterns;
        self
    }

    /// Debugger id of this lifecycle.
    pub fn id(&self) -> &str {
        self.storage.debugger_id()
    }

    pub fn collectors(&self) -> &[Arc<dyn Collector>] {
        &self.collectors
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Whether collectors were started for the current lifecycle.
    pub fn is_running(&self) -> bool {
        !self.started.is_empty()
    }

    /// Whether a lifecycle for `request` is filtered out by configuration.
    pub fn is_ignored(&self, request: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        request.is_some_and(|uri| self.ignored_requests.iter().any(|pattern| pattern.is_match(uri)))
    }

    /// Start the lifecycle for `request` (its URI, if any).
    ///
    /// Returns `false` when configuration filters the lifecycle out; all
    /// collectors are then left inactive and nothing will be stored.
    ///
    /// # Errors
    /// `CollectorError::DuplicateName` if two collectors share a name, or the
    /// first collector startup failure. Collectors started before the failure
    /// are shut down again.
    pub fn startup(&mut self, request: Option<&str>) -> Result<bool, CollectorError> {
        let mut names = HashSet::new();
        for collector in &self.collectors {
            if !names.insert(collector.name()) {
                return Err(CollectorError::DuplicateName(collector.name().to_owned()));
            }
        }

        if self.is_ignored(request) {
            for collector in &self.collectors {
                collector.set_active(false);
            }
            tracing::debug!(debugger_id = %self.id(), request = ?request, "Lifecycle not collected");
            return Ok(false);
        }

        for index in 0..self.collectors.len() {
            let collector = Arc::clone(&self.collectors[index]);
            if self.collectors_config.is_disabled(collector.name()) {
                collector.reset();
                collector.set_active(false);
                continue;
            }
            if let Err(e) = collector.startup() {
                tracing::warn!(collector = collector.name(), error = %e, "Collector failed to start");
                let _ = self.stop_started();
                return Err(e);
            }
            self.started.push(index);
        }

        tracing::info!(
            debugger_id = %self.id(),
            collectors = self.started.len(),
            "Lifecycle started"
        );
        Ok(true)
    }

    /// End the lifecycle: store, flush, then stop every started collector.
    ///
    /// Collectors are stopped even if the flush fails. A no-op when the
    /// lifecycle was not started.
    ///
    /// # Errors
    /// The flush error if any, otherwise the first collector shutdown error.
    pub fn shutdown(&mut self) -> Result<(), CollectorError> {
        if self.started.is_empty() {
            return Ok(());
        }

        for &index in &self.started {
            self.storage.add_collector(self.collectors[index].as_ref());
        }
        let flushed = self.storage.flush();
        if let Err(e) = &flushed {
            tracing::warn!(debugger_id = %self.id(), error = %e, "Failed to flush session");
        }

        let stopped = self.stop_started();
        tracing::info!(debugger_id = %self.id(), "Lifecycle finished");
        flushed?;
        stopped
    }

    /// Clear every collector's buffers without ending the lifecycle.
    pub fn reset(&self) {
        for collector in &self.collectors {
            collector.reset();
        }
    }

    fn stop_started(&mut self) -> Result<(), CollectorError> {
        let mut first_error = None;
        for index in std::mem::take(&mut self.started) {
            let collector = &self.collectors[index];
            if let Err(e) = collector.shutdown() {
                tracing::warn!(collector = collector.name(), error = %e, "Collector failed to stop");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        if self.is_running() {
            tracing::warn!(
                debugger_id = %self.id(),
                "Debugger dropped without shutdown, session discarded"
            );
            let _ = self.stop_started();
        }
    }
}

impl std::fmt::Debug for Debugger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("id", &self.id())
            .field(
                "collectors",
                &self.collectors.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("enabled", &self.enabled)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{IdentityCollector, LogCollector};
    use crate::id::DebuggerIdGenerator;
    use crate::storage::{Archive, MemoryArchive, MemoryStorage, RecordKind};
    use serde_json::json;

    fn debugger(archive: &MemoryArchive, id: &str) -> Debugger {
        Debugger::new(Box::new(MemoryStorage::with_archive(
            DebuggerIdGenerator::from_id(id),
            archive.clone(),
        )))
    }

    #[test]
    fn test_lifecycle_flushes_collected_data() {
        let archive = MemoryArchive::new();
        let log = Arc::new(LogCollector::new());
        let mut debugger = debugger(&archive, "s1").with_collector(log.clone());

        assert!(debugger.startup(Some("/orders")).unwrap());
        log.log("info", "created", json!({"order": 1}));
        debugger.shutdown().unwrap();

        let data = archive.read(RecordKind::Data).unwrap();
        assert_eq!(data["s1"]["log"][0]["message"], json!("created"));
        assert!(!log.is_active());
        assert!(!debugger.is_running());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let archive = MemoryArchive::new();
        let mut debugger = debugger(&archive, "s1")
            .with_collector(Arc::new(LogCollector::new()))
            .with_collector(Arc::new(LogCollector::new()));

        assert!(matches!(
            debugger.startup(None),
            Err(CollectorError::DuplicateName(name)) if name == "log"
        ));
    }

    #[test]
    fn test_ignored_request_leaves_collectors_inactive() {
        let archive = MemoryArchive::new();
        let log = Arc::new(LogCollector::new());
        let mut debugger = debugger(&archive, "s1")
            .with_collector(log.clone())
            .with_ignored_requests(vec![Regex::new("^/health").unwrap()]);

        assert!(!debugger.startup(Some("/health/live")).unwrap());
        log.log("info", "probe", json!({}));
        debugger.shutdown().unwrap();

        assert!(log.messages().is_empty());
        assert!(archive.is_empty());
    }

    #[test]
    fn test_disabled_debugger_collects_nothing() {
        let archive = MemoryArchive::new();
        let log = Arc::new(LogCollector::new());
        let mut debugger = debugger(&archive, "s1")
            .with_collector(log.clone())
            .with_enabled(false);

        assert!(!debugger.startup(None).unwrap());
        assert!(!log.is_active());
    }

    #[test]
    fn test_disabled_collector_is_skipped() {
        let archive = MemoryArchive::new();
        let log = Arc::new(LogCollector::new());
        let identity = Arc::new(IdentityCollector::new());
        let mut config = DebugConfig::default();
        config.collectors.disabled = vec!["identity".to_string()];

        let mut debugger = debugger(&archive, "s1")
            .with_config(&config)
            .unwrap()
            .with_collector(log.clone())
            .with_collector(identity.clone());

        debugger.startup(None).unwrap();
        assert!(log.is_active());
        assert!(!identity.is_active());
        debugger.shutdown().unwrap();

        let data = archive.read(RecordKind::Data).unwrap();
        let names: Vec<_> = data["s1"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["log".to_string()]);
    }

    #[test]
    fn test_reset_clears_collectors() {
        let archive = MemoryArchive::new();
        let log = Arc::new(LogCollector::new());
        let mut debugger = debugger(&archive, "s1").with_collector(log.clone());
        debugger.startup(None).unwrap();
        log.log("debug", "x", json!({}));

        debugger.reset();
        assert!(log.messages().is_empty());
        assert!(log.is_active());
        debugger.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_without_startup_is_noop() {
        let archive = MemoryArchive::new();
        let mut debugger = debugger(&archive, "s1").with_collector(Arc::new(LogCollector::new()));
        debugger.shutdown().unwrap();
        assert!(archive.is_empty());
    }
}
