//! Storage Layer
//!
//! Collected data is built into a per-lifecycle "current" session record and
//! committed to an archive on flush, keyed by the lifecycle's debugger id.
//!
//! # Components
//!
//! - [`Storage`]: Per-lifecycle contract (add collector, current data, flush, read)
//! - [`Archive`]: Durable medium addressed by debugger id and [`RecordKind`]
//! - [`MemoryStorage`] / [`MemoryArchive`]: Process-lifetime archive
//! - [`FileStorage`] / [`FileArchive`]: JSON files, one directory per session
//! - [`DbStorage`] / [`DuckDbArchive`]: DuckDB `debug_records` table
//! - [`StorageBackend`]: Configured archive handing out one storage per lifecycle

mod backend;
mod database;
mod error;
mod file;
mod memory;
mod schema;
mod session;
mod types;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::collector::Collector;

pub use backend::StorageBackend;
pub use database::{DbStorage, DuckDbArchive};
pub use error::StorageError;
pub use file::{FileArchive, FileStorage};
pub use memory::{MemoryArchive, MemoryStorage};
pub use session::ArchiveStorage;
pub use types::{RecordKind, SessionRecord};

/// Session storage for one lifecycle.
///
/// # Contract
///
/// - [`add_collector`](Storage::add_collector) snapshots the collector's data
///   at call time; a second add under the same name overwrites it.
/// - [`flush`](Storage::flush) commits the current record under
///   [`debugger_id`](Storage::debugger_id) and leaves the current record
///   empty. Flushing an empty record writes nothing.
/// - [`read`](Storage::read) returns flushed records only; unknown ids are
///   simply absent.
pub trait Storage: Send {
    fn debugger_id(&self) -> &str;

    fn add_collector(&mut self, collector: &dyn Collector);

    /// The current, not yet flushed, session record.
    fn data(&self) -> SessionRecord;

    fn flush(&mut self) -> Result<(), StorageError>;

    /// Flushed records of `kind`, keyed by debugger id.
    fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError>;

    /// Drop all but the newest `keep` sessions; returns how many were removed.
    fn prune(&self, keep: usize) -> Result<usize, StorageError>;
}

/// Durable medium for flushed session records.
///
/// Debugger ids order by creation time, so "newest" means greatest id.
pub trait Archive: Send + Sync {
    fn write(&self, id: &str, kind: RecordKind, record: &Value) -> Result<(), StorageError>;

    fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError>;

    fn prune(&self, keep: usize) -> Result<usize, StorageError>;
}
