//! Recording decorator around a protocol handler.
//!
//! [`InterceptingTransport`] forwards every call to the handler it replaced.
//! Only after a call succeeds does it offer a record to the owning
//! collector's [`StreamCore`], which applies the activation flag, the
//! recorded-operation set and the exclusion filters. Failed calls are never
//! recorded and their errors are returned untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, SeekFrom};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collector::CollectorState;
use crate::collector::stream::{
    CallSite, HttpExchange, OpenMode, StreamFilters, StreamHandle, StreamOperation, StreamStat,
    StreamTransport,
};

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub uri: String,
    pub args: Map<String, Value>,
}

/// Records grouped by operation kind, each group in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamLog {
    groups: BTreeMap<StreamOperation, Vec<StreamRecord>>,
}

impl StreamLog {
    pub fn push(&mut self, operation: StreamOperation, uri: impl Into<String>, args: Map<String, Value>) {
        self.groups.entry(operation).or_default().push(StreamRecord {
            uri: uri.into(),
            args,
        });
    }

    pub fn records(&self, operation: StreamOperation) -> &[StreamRecord] {
        self.groups.get(&operation).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of records per operation kind.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|(operation, records)| (operation.to_string(), records.len()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// `{ "<operation>": [{ "uri": ..., "args": {...} }, ...] }`
    pub fn to_value(&self) -> Value {
        let groups = self
            .groups
            .iter()
            .map(|(operation, records)| {
                (
                    operation.to_string(),
                    serde_json::to_value(records).unwrap_or(Value::Null),
                )
            })
            .collect();
        Value::Object(groups)
    }
}

/// What a successful operation did, handed to the args builder.
#[derive(Debug, Clone)]
pub struct OperationDetail<'a> {
    pub operation: StreamOperation,
    pub uri: &'a str,
    pub mode: Option<OpenMode>,
    /// Bytes transferred by `read`/`write`.
    pub bytes: Option<usize>,
    /// Destination of `rename`.
    pub target: Option<&'a str>,
    pub exchange: Option<HttpExchange>,
}

impl<'a> OperationDetail<'a> {
    pub fn new(operation: StreamOperation, uri: &'a str) -> Self {
        Self {
            operation,
            uri,
            mode: None,
            bytes: None,
            target: None,
            exchange: None,
        }
    }
}

/// Builds the `args` mapping of a record.
pub type ArgsBuilder = fn(&OperationDetail<'_>) -> Map<String, Value>;

/// Shared state of a stream collector and the interceptors it installs.
pub(crate) struct StreamCore {
    pub(crate) state: CollectorState,
    pub(crate) log: Mutex<StreamLog>,
    filters: StreamFilters,
    operations: BTreeSet<StreamOperation>,
    args: ArgsBuilder,
}

impl StreamCore {
    pub(crate) fn new(
        name: &str,
        filters: StreamFilters,
        operations: BTreeSet<StreamOperation>,
        args: ArgsBuilder,
    ) -> Self {
        Self {
            state: CollectorState::new(name),
            log: Mutex::new(StreamLog::default()),
            filters,
            operations,
            args,
        }
    }

    /// Record a successful intercepted operation, unless suppressed.
    fn observe(&self, detail: OperationDetail<'_>, caller: &CallSite) {
        if !self.state.is_active()
            || !self.operations.contains(&detail.operation)
            || self.filters.is_ignored(detail.uri, caller)
        {
            return;
        }
        let args = (self.args)(&detail);
        self.log.lock().push(detail.operation, detail.uri, args);
    }
}

/// Handler installed in place of a protocol's original handler.
pub(crate) struct InterceptingTransport {
    inner: Arc<dyn StreamTransport>,
    core: Arc<StreamCore>,
}

impl InterceptingTransport {
    pub(crate) fn new(inner: Arc<dyn StreamTransport>, core: Arc<StreamCore>) -> Self {
        Self { inner, core }
    }
}

impl StreamTransport for InterceptingTransport {
    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        caller: &CallSite,
    ) -> io::Result<Box<dyn StreamHandle>> {
        let inner = self.inner.open(uri, mode, caller)?;
        let exchange = inner.http_exchange();
        self.core.observe(
            OperationDetail {
                mode: Some(mode),
                exchange,
                ..OperationDetail::new(StreamOperation::Open, uri)
            },
            caller,
        );

        Ok(Box::new(InterceptedHandle {
            inner,
            uri: uri.to_owned(),
            mode,
            caller: caller.clone(),
            core: Arc::clone(&self.core),
        }))
    }

    fn url_stat(&self, uri: &str, caller: &CallSite) -> io::Result<StreamStat> {
        let stat = self.inner.url_stat(uri, caller)?;
        self.core
            .observe(OperationDetail::new(StreamOperation::Stat, uri), caller);
        Ok(stat)
    }

    fn mkdir(&self, uri: &str, recursive: bool, caller: &CallSite) -> io::Result<()> {
        self.inner.mkdir(uri, recursive, caller)?;
        self.core
            .observe(OperationDetail::new(StreamOperation::Mkdir, uri), caller);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str, caller: &CallSite) -> io::Result<()> {
        self.inner.rename(from, to, caller)?;
        self.core.observe(
            OperationDetail {
                target: Some(to),
                ..OperationDetail::new(StreamOperation::Rename, from)
            },
            caller,
        );
        Ok(())
    }

    fn rmdir(&self, uri: &str, caller: &CallSite) -> io::Result<()> {
        self.inner.rmdir(uri, caller)?;
        self.core
            .observe(OperationDetail::new(StreamOperation::Rmdir, uri), caller);
        Ok(())
    }

    fn unlink(&self, uri: &str, caller: &CallSite) -> io::Result<()> {
        self.inner.unlink(uri, caller)?;
        self.core
            .observe(OperationDetail::new(StreamOperation::Unlink, uri), caller);
        Ok(())
    }
}

/// Handle returned by [`InterceptingTransport::open`].
///
/// Keeps recording into the collector that opened it, even if the
/// interceptor has been uninstalled since; the activation flag still applies.
struct InterceptedHandle {
    inner: Box<dyn StreamHandle>,
    uri: String,
    mode: OpenMode,
    caller: CallSite,
    core: Arc<StreamCore>,
}

impl InterceptedHandle {
    fn detail(&self, operation: StreamOperation) -> OperationDetail<'_> {
        OperationDetail {
            mode: Some(self.mode),
            ..OperationDetail::new(operation, &self.uri)
        }
    }
}

impl StreamHandle for InterceptedHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        let detail = OperationDetail {
            bytes: Some(read),
            exchange: self.inner.http_exchange(),
            ..self.detail(StreamOperation::Read)
        };
        self.core.observe(detail, &self.caller);
        Ok(read)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        let detail = OperationDetail {
            bytes: Some(written),
            exchange: self.inner.http_exchange(),
            ..self.detail(StreamOperation::Write)
        };
        self.core.observe(detail, &self.caller);
        Ok(written)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.inner.seek(pos)?;
        self.core
            .observe(self.detail(StreamOperation::Seek), &self.caller);
        Ok(position)
    }

    fn tell(&mut self) -> io::Result<u64> {
        let position = self.inner.tell()?;
        self.core
            .observe(self.detail(StreamOperation::Tell), &self.caller);
        Ok(position)
    }

    fn eof(&mut self) -> io::Result<bool> {
        let eof = self.inner.eof()?;
        self.core
            .observe(self.detail(StreamOperation::Eof), &self.caller);
        Ok(eof)
    }

    fn stat(&mut self) -> io::Result<StreamStat> {
        let stat = self.inner.stat()?;
        self.core
            .observe(self.detail(StreamOperation::Stat), &self.caller);
        Ok(stat)
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.close()?;
        self.core
            .observe(self.detail(StreamOperation::Close), &self.caller);
        Ok(())
    }

    fn http_exchange(&self) -> Option<HttpExchange> {
        self.inner.http_exchange()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::stream::MemoryTransport;

    fn no_args(_: &OperationDetail<'_>) -> Map<String, Value> {
        Map::new()
    }

    fn core(operations: &[StreamOperation]) -> Arc<StreamCore> {
        Arc::new(StreamCore::new(
            "test_stream",
            StreamFilters::new(),
            operations.iter().copied().collect(),
            no_args,
        ))
    }

    #[test]
    fn test_stream_log_groups_in_order() {
        let mut log = StreamLog::default();
        log.push(StreamOperation::Read, "a", Map::new());
        log.push(StreamOperation::Write, "b", Map::new());
        log.push(StreamOperation::Read, "c", Map::new());

        assert_eq!(log.records(StreamOperation::Read).len(), 2);
        assert_eq!(log.records(StreamOperation::Read)[1].uri, "c");
        assert!(log.records(StreamOperation::Open).is_empty());
        assert_eq!(log.counts().get("read"), Some(&2));
        assert_eq!(
            log.to_value(),
            serde_json::json!({
                "read": [{"uri": "a", "args": {}}, {"uri": "c", "args": {}}],
                "write": [{"uri": "b", "args": {}}],
            })
        );
    }

    #[test]
    fn test_only_selected_operations_are_recorded() {
        let memory = MemoryTransport::new();
        memory.insert("mem://a", b"abc".to_vec());
        let core = core(&[StreamOperation::Read]);
        let transport = InterceptingTransport::new(Arc::new(memory), Arc::clone(&core));

        let mut handle = transport
            .open("mem://a", OpenMode::Read, &CallSite::unknown())
            .unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(handle.read(&mut buf).unwrap(), 2);
        handle.tell().unwrap();
        handle.eof().unwrap();
        handle.close().unwrap();

        let log = core.log.lock();
        assert_eq!(log.counts().len(), 1);
        assert_eq!(log.records(StreamOperation::Read).len(), 1);
    }

    #[test]
    fn test_failed_operation_is_not_recorded() {
        let core = core(&[StreamOperation::Open, StreamOperation::Unlink]);
        let transport =
            InterceptingTransport::new(Arc::new(MemoryTransport::new()), Arc::clone(&core));

        let err = transport
            .open("mem://missing", OpenMode::Read, &CallSite::unknown())
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        let err = transport
            .unlink("mem://missing", &CallSite::unknown())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        assert!(core.log.lock().is_empty());
    }

    #[test]
    fn test_inactive_core_records_nothing() {
        let memory = MemoryTransport::new();
        memory.insert("mem://a", b"abc".to_vec());
        let core = core(&[StreamOperation::Open, StreamOperation::Read]);
        core.state.set_active(false);
        let transport = InterceptingTransport::new(Arc::new(memory), Arc::clone(&core));

        let mut handle = transport
            .open("mem://a", OpenMode::Read, &CallSite::unknown())
            .unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).unwrap(), 3);

        assert!(core.log.lock().is_empty());
    }
}
