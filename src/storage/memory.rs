//! In-process archive.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::id::DebuggerIdGenerator;
use crate::storage::{Archive, ArchiveStorage, RecordKind, StorageError};

type Records = BTreeMap<String, BTreeMap<RecordKind, Value>>;

/// Flushed sessions kept for the lifetime of the process.
///
/// Clones share the same records, so every lifecycle's [`MemoryStorage`]
/// can flush into one archive.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    records: Arc<RwLock<Records>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flushed sessions.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Archive for MemoryArchive {
    fn write(&self, id: &str, kind: RecordKind, record: &Value) -> Result<(), StorageError> {
        self.records
            .write()
            .entry(id.to_owned())
            .or_default()
            .insert(kind, record.clone());
        Ok(())
    }

    fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter_map(|(id, kinds)| kinds.get(&kind).map(|record| (id.clone(), record.clone())))
            .collect())
    }

    fn prune(&self, keep: usize) -> Result<usize, StorageError> {
        let mut records = self.records.write();
        let excess = records.len().saturating_sub(keep);
        let oldest: Vec<String> = records.keys().take(excess).cloned().collect();
        for id in &oldest {
            records.remove(id);
        }
        Ok(oldest.len())
    }
}

/// Storage whose flushed sessions live in a [`MemoryArchive`].
pub type MemoryStorage = ArchiveStorage<MemoryArchive>;

impl ArchiveStorage<MemoryArchive> {
    /// Storage with a private archive.
    pub fn new(id: DebuggerIdGenerator) -> Self {
        Self::with_archive(id, MemoryArchive::new())
    }
}
