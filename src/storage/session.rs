//! Per-lifecycle session storage.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::collector::Collector;
use crate::id::DebuggerIdGenerator;
use crate::storage::{Archive, RecordKind, SessionRecord, Storage, StorageError};

/// The record being built during a live lifecycle.
#[derive(Debug, Default)]
struct CurrentSession {
    data: SessionRecord,
    index: SessionRecord,
}

impl CurrentSession {
    fn add(&mut self, collector: &dyn Collector) {
        self.data
            .insert(collector.name().to_owned(), collector.collected());

        if let Some(indexed) = collector.as_index() {
            match indexed.index_data() {
                Value::Object(entries) => self.index.extend(entries),
                Value::Null => {}
                other => {
                    self.index.insert(collector.name().to_owned(), other);
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `{ "id": ..., "collectors": [...], <index data...> }`
    fn summary(&self, id: &str) -> Value {
        let mut summary = self.index.clone();
        summary.insert("id".into(), json!(id));
        summary.insert(
            "collectors".into(),
            json!(self.data.keys().collect::<Vec<_>>()),
        );
        Value::Object(summary)
    }

    fn clear(&mut self) {
        self.data.clear();
        self.index.clear();
    }
}

/// [`Storage`] for one lifecycle, committing into a shared [`Archive`].
///
/// Each lifecycle owns its own instance, so concurrent lifecycles never share
/// a current record; they only meet in the archive, under distinct ids.
#[derive(Debug)]
pub struct ArchiveStorage<A> {
    id: DebuggerIdGenerator,
    current: CurrentSession,
    archive: A,
    history_size: Option<usize>,
}

impl<A: Archive> ArchiveStorage<A> {
    pub fn with_archive(id: DebuggerIdGenerator, archive: A) -> Self {
        Self {
            id,
            current: CurrentSession::default(),
            archive,
            history_size: None,
        }
    }

    /// Prune the archive to the newest `history_size` sessions after each flush.
    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = Some(history_size);
        self
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }
}

impl<A: Archive> Storage for ArchiveStorage<A> {
    fn debugger_id(&self) -> &str {
        self.id.id()
    }

    fn add_collector(&mut self, collector: &dyn Collector) {
        self.current.add(collector);
    }

    fn data(&self) -> SessionRecord {
        self.current.data.clone()
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if self.current.is_empty() {
            tracing::debug!(debugger_id = %self.id, "Nothing to flush");
            return Ok(());
        }

        // The current record survives a failed write; a summary is only
        // written once its data is stored.
        let id = self.id.id();
        let data = Value::Object(self.current.data.clone());
        self.archive.write(id, RecordKind::Data, &data)?;
        self.archive
            .write(id, RecordKind::Summary, &self.current.summary(id))?;
        self.current.clear();
        tracing::info!(debugger_id = %id, "Session flushed");

        if let Some(keep) = self.history_size {
            match self.archive.prune(keep) {
                Ok(0) => {}
                Ok(pruned) => tracing::debug!(pruned, keep, "Old sessions pruned"),
                Err(e) => tracing::warn!(keep, error = %e, "Failed to prune session history"),
            }
        }
        Ok(())
    }

    fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError> {
        self.archive.read(kind)
    }

    fn prune(&self, keep: usize) -> Result<usize, StorageError> {
        self.archive.prune(keep)
    }
}
