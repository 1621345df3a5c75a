//! Stream collectors.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::collector::stream::intercept::{
    ArgsBuilder, InterceptingTransport, OperationDetail, StreamCore,
};
use crate::collector::stream::{
    StreamFilters, StreamLog, StreamOperation, StreamTransport, TransportRegistry,
};
use crate::collector::{Collector, CollectorError, IndexCollector};

/// Which family of protocols a [`StreamCollector`] observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `http` and `https`; collector name `http_stream`.
    Http,
    /// `file`; collector name `fs_stream`.
    Filesystem,
}

impl StreamKind {
    /// Collector name, also the key of its index data.
    pub fn name(self) -> &'static str {
        match self {
            Self::Http => "http_stream",
            Self::Filesystem => "fs_stream",
        }
    }

    pub fn default_protocols(self) -> &'static [&'static str] {
        match self {
            Self::Http => &["http", "https"],
            Self::Filesystem => &["file"],
        }
    }

    pub fn default_operations(self) -> BTreeSet<StreamOperation> {
        use StreamOperation::*;
        match self {
            Self::Http => BTreeSet::from([Read, Write]),
            Self::Filesystem => BTreeSet::from([Read, Write, Mkdir, Rename, Rmdir, Unlink]),
        }
    }

    fn args_builder(self) -> ArgsBuilder {
        match self {
            Self::Http => http_args,
            Self::Filesystem => fs_args,
        }
    }
}

/// `{ method, request_headers, response_headers }` of the underlying exchange.
fn http_args(detail: &OperationDetail<'_>) -> Map<String, Value> {
    let exchange = detail.exchange.clone().unwrap_or_default();
    let mut args = Map::new();
    args.insert("method".into(), json!(exchange.method));
    args.insert("request_headers".into(), json!(exchange.request_headers));
    args.insert("response_headers".into(), json!(exchange.response_headers));
    args
}

fn fs_args(detail: &OperationDetail<'_>) -> Map<String, Value> {
    let mut args = Map::new();
    if let Some(mode) = detail.mode {
        args.insert("mode".into(), json!(mode));
    }
    if let Some(bytes) = detail.bytes {
        args.insert("bytes".into(), json!(bytes));
    }
    if let Some(target) = detail.target {
        args.insert("target".into(), json!(target));
    }
    args
}

/// Settings of a [`StreamCollector`].
#[derive(Debug, Clone)]
pub struct StreamCollectorConfig {
    pub filters: StreamFilters,
    /// Operation kinds that produce records; all others are only forwarded.
    pub operations: BTreeSet<StreamOperation>,
    /// Protocols intercepted between startup and shutdown.
    pub protocols: Vec<String>,
}

impl StreamCollectorConfig {
    /// Defaults for `kind`: no filters, its default operations and protocols.
    pub fn for_kind(kind: StreamKind) -> Self {
        Self {
            filters: StreamFilters::new(),
            operations: kind.default_operations(),
            protocols: kind
                .default_protocols()
                .iter()
                .map(|protocol| (*protocol).to_owned())
                .collect(),
        }
    }

    pub fn with_filters(mut self, filters: StreamFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_operations(mut self, operations: impl IntoIterator<Item = StreamOperation>) -> Self {
        self.operations = operations.into_iter().collect();
        self
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }
}

/// Records stream operations performed through a [`TransportRegistry`].
///
/// `startup()` installs an interceptor for each configured protocol and
/// `shutdown()` removes them again, even when an earlier restore failed.
/// Dropping a started collector also removes its interceptors.
pub struct StreamCollector {
    kind: StreamKind,
    registry: TransportRegistry,
    protocols: Vec<String>,
    core: Arc<StreamCore>,
    installed: Mutex<Vec<String>>,
}

impl StreamCollector {
    pub fn new(kind: StreamKind, registry: TransportRegistry) -> Self {
        Self::with_config(kind, registry, StreamCollectorConfig::for_kind(kind))
    }

    pub fn with_config(
        kind: StreamKind,
        registry: TransportRegistry,
        config: StreamCollectorConfig,
    ) -> Self {
        let core = StreamCore::new(
            kind.name(),
            config.filters,
            config.operations,
            kind.args_builder(),
        );
        Self {
            kind,
            registry,
            protocols: config.protocols,
            core: Arc::new(core),
            installed: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Record an operation directly, bypassing filters and the operation set.
    pub fn collect(&self, operation: StreamOperation, uri: &str, args: Map<String, Value>) {
        if !self.core.state.is_active() {
            return;
        }
        self.core.log.lock().push(operation, uri, args);
    }

    /// Copy of the records gathered so far.
    pub fn log(&self) -> StreamLog {
        self.core.log.lock().clone()
    }

    /// Whether this collector's interceptors are currently installed.
    pub fn is_intercepting(&self) -> bool {
        !self.installed.lock().is_empty()
    }

    fn uninstall(&self) -> Result<(), CollectorError> {
        let installed = std::mem::take(&mut *self.installed.lock());
        let mut first_error = None;
        for protocol in installed {
            if let Err(e) = self.registry.restore(&protocol) {
                tracing::warn!(
                    collector = self.kind.name(),
                    protocol = %protocol,
                    error = %e,
                    "Failed to restore stream handler"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Collector for StreamCollector {
    fn name(&self) -> &str {
        self.core.state.name()
    }

    fn collected(&self) -> Value {
        self.core.log.lock().to_value()
    }

    fn reset(&self) {
        self.core.log.lock().clear();
    }

    fn is_active(&self) -> bool {
        self.core.state.is_active()
    }

    fn set_active(&self, active: bool) {
        self.core.state.set_active(active);
    }

    fn startup(&self) -> Result<(), CollectorError> {
        self.reset();
        self.set_active(true);

        for protocol in &self.protocols {
            let core = Arc::clone(&self.core);
            let result = self.registry.install(protocol, move |original| {
                Arc::new(InterceptingTransport::new(original, core)) as Arc<dyn StreamTransport>
            });
            if let Err(e) = result {
                let _ = self.uninstall();
                self.set_active(false);
                return Err(e.into());
            }
            self.installed.lock().push(protocol.clone());
        }

        tracing::debug!(
            collector = self.kind.name(),
            protocols = ?self.protocols,
            "Stream collector started"
        );
        Ok(())
    }

    fn shutdown(&self) -> Result<(), CollectorError> {
        let restored = self.uninstall();
        self.reset();
        self.set_active(false);
        restored
    }

    fn as_index(&self) -> Option<&dyn IndexCollector> {
        Some(self)
    }
}

impl IndexCollector for StreamCollector {
    fn index_data(&self) -> Value {
        let mut index = Map::new();
        index.insert(self.kind.name().to_owned(), json!(self.core.log.lock().counts()));
        Value::Object(index)
    }
}

impl Drop for StreamCollector {
    fn drop(&mut self) {
        if self.is_intercepting() {
            tracing::warn!(
                collector = self.kind.name(),
                "Stream collector dropped while intercepting, restoring handlers"
            );
            let _ = self.uninstall();
        }
    }
}

impl std::fmt::Debug for StreamCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCollector")
            .field("kind", &self.kind)
            .field("protocols", &self.protocols)
            .field("installed", &*self.installed.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::stream::{
        HttpExchange, InterceptError, MemoryTransport, OpenMode, protocol_of,
    };
    use std::io::Read;

    fn registry_with(protocols: &[&str]) -> (TransportRegistry, MemoryTransport) {
        let registry = TransportRegistry::new();
        let memory = MemoryTransport::new();
        for protocol in protocols {
            registry
                .register(*protocol, Arc::new(memory.clone()))
                .unwrap();
        }
        (registry, memory)
    }

    fn mem_collector(registry: &TransportRegistry, operations: &[StreamOperation]) -> StreamCollector {
        let config = StreamCollectorConfig::for_kind(StreamKind::Filesystem)
            .with_protocols(["mem"])
            .with_operations(operations.iter().copied());
        StreamCollector::with_config(StreamKind::Filesystem, registry.clone(), config)
    }

    #[test]
    fn test_kind_defaults() {
        assert_eq!(StreamKind::Http.name(), "http_stream");
        assert_eq!(StreamKind::Filesystem.name(), "fs_stream");
        assert_eq!(StreamKind::Http.default_protocols(), &["http", "https"]);
        assert!(
            StreamKind::Filesystem
                .default_operations()
                .contains(&StreamOperation::Unlink)
        );
        assert!(
            !StreamKind::Http
                .default_operations()
                .contains(&StreamOperation::Open)
        );
    }

    #[test]
    fn test_http_args_shape() {
        let detail = OperationDetail {
            exchange: Some(HttpExchange {
                method: "GET".into(),
                request_headers: vec![],
                response_headers: vec!["HTTP/1.1 200 OK".into()],
            }),
            ..OperationDetail::new(StreamOperation::Read, "http://example.com")
        };
        assert_eq!(
            Value::Object(http_args(&detail)),
            json!({
                "method": "GET",
                "request_headers": [],
                "response_headers": ["HTTP/1.1 200 OK"],
            })
        );
    }

    #[test]
    fn test_startup_installs_and_shutdown_restores() {
        let (registry, memory) = registry_with(&["mem"]);
        memory.insert("mem://a", b"abc".to_vec());
        let collector = mem_collector(&registry, &[StreamOperation::Read]);

        collector.startup().unwrap();
        assert!(registry.is_intercepted("mem"));

        let mut stream = registry.open("mem://a", OpenMode::Read).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        drop(stream);

        let collected = collector.collected();
        assert_eq!(collected["read"][0]["uri"], json!("mem://a"));
        assert_eq!(collected["read"][0]["args"]["bytes"], json!(3));
        assert_eq!(collector.index_data(), json!({"fs_stream": {"read": 1}}));

        collector.shutdown().unwrap();
        assert!(!registry.is_intercepted("mem"));
        assert!(!collector.is_active());
        assert_eq!(collector.collected(), json!({}));
    }

    #[test]
    fn test_operations_after_shutdown_are_not_recorded() {
        let (registry, memory) = registry_with(&["mem"]);
        memory.insert("mem://a", b"abc".to_vec());
        let collector = mem_collector(&registry, &[StreamOperation::Read]);
        collector.startup().unwrap();
        collector.shutdown().unwrap();

        let mut body = String::new();
        registry
            .open("mem://a", OpenMode::Read)
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "abc");
        assert_eq!(collector.collected(), json!({}));
    }

    #[test]
    fn test_second_collector_cannot_stack() {
        let (registry, _memory) = registry_with(&["mem"]);
        let first = mem_collector(&registry, &[StreamOperation::Read]);
        let second = mem_collector(&registry, &[StreamOperation::Read]);

        first.startup().unwrap();
        let err = second.startup().unwrap_err();
        assert!(matches!(
            err,
            CollectorError::Intercept(InterceptError::AlreadyIntercepted(_))
        ));
        assert!(!second.is_active());
        assert!(registry.is_intercepted("mem"));

        first.shutdown().unwrap();
        second.startup().unwrap();
        second.shutdown().unwrap();
    }

    #[test]
    fn test_failed_startup_rolls_back() {
        let (registry, _memory) = registry_with(&["mem"]);
        let config = StreamCollectorConfig::for_kind(StreamKind::Filesystem)
            .with_protocols(["mem", "missing"]);
        let collector = StreamCollector::with_config(StreamKind::Filesystem, registry.clone(), config);

        let err = collector.startup().unwrap_err();
        assert!(matches!(
            err,
            CollectorError::Intercept(InterceptError::ProtocolNotRegistered(_))
        ));
        assert!(!registry.is_intercepted("mem"));
        assert!(!collector.is_intercepting());
    }

    #[test]
    fn test_drop_restores_handlers() {
        let (registry, _memory) = registry_with(&["mem"]);
        {
            let collector = mem_collector(&registry, &[StreamOperation::Read]);
            collector.startup().unwrap();
            assert!(registry.is_intercepted("mem"));
        }
        assert!(!registry.is_intercepted("mem"));
    }

    #[test]
    fn test_direct_collect_respects_active_flag() {
        let (registry, _memory) = registry_with(&["mem"]);
        let collector = mem_collector(&registry, &[]);

        collector.collect(StreamOperation::Stat, "mem://a", Map::new());
        collector.set_active(false);
        collector.collect(StreamOperation::Stat, "mem://b", Map::new());

        let log = collector.log();
        assert_eq!(log.records(StreamOperation::Stat).len(), 1);
        assert_eq!(log.records(StreamOperation::Stat)[0].uri, "mem://a");
    }

    #[test]
    fn test_http_collector_covers_both_schemes() {
        let (registry, _memory) = registry_with(&["http", "https"]);
        let collector = StreamCollector::new(StreamKind::Http, registry.clone());
        collector.startup().unwrap();
        assert!(registry.is_intercepted(&protocol_of("http://a")));
        assert!(registry.is_intercepted(&protocol_of("https://a")));
        collector.shutdown().unwrap();
        assert!(registry.protocols().iter().all(|p| !registry.is_intercepted(p)));
    }
}
