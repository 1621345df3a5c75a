//! Configured storage backend.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::config::{StorageConfig, StorageDriver};
use crate::id::DebuggerIdGenerator;
use crate::storage::{
    Archive, ArchiveStorage, DuckDbArchive, FileArchive, MemoryArchive, RecordKind, Storage,
    StorageError,
};

/// The archive a process flushes into, shared by all its lifecycles.
///
/// Build it once at startup and call [`session`](Self::session) at the start
/// of every lifecycle.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Memory(MemoryArchive),
    File {
        archive: FileArchive,
        history_size: usize,
    },
    DuckDb {
        archive: DuckDbArchive,
        history_size: usize,
    },
}

impl StorageBackend {
    /// Open the archive described by `config`.
    ///
    /// # Errors
    /// Returns `StorageError` if a durable driver has no path or its
    /// database cannot be opened.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let path = || {
            config
                .resolved_path()
                .map(PathBuf::from)
                .ok_or_else(|| {
                    StorageError::Internal(format!(
                        "storage driver '{}' requires a path",
                        config.driver
                    ))
                })
        };

        let backend = match config.driver {
            StorageDriver::Memory => Self::Memory(MemoryArchive::new()),
            StorageDriver::File => Self::File {
                archive: FileArchive::new(path()?),
                history_size: config.history_size,
            },
            StorageDriver::Duckdb => Self::DuckDb {
                archive: DuckDbArchive::open(path()?)?,
                history_size: config.history_size,
            },
        };
        tracing::info!(driver = %config.driver, "Storage backend ready");
        Ok(backend)
    }

    /// Storage for one lifecycle, identified by `id`.
    pub fn session(&self, id: DebuggerIdGenerator) -> Box<dyn Storage> {
        match self {
            Self::Memory(archive) => Box::new(ArchiveStorage::with_archive(id, archive.clone())),
            Self::File {
                archive,
                history_size,
            } => Box::new(
                ArchiveStorage::with_archive(id, archive.clone()).with_history_size(*history_size),
            ),
            Self::DuckDb {
                archive,
                history_size,
            } => Box::new(
                ArchiveStorage::with_archive(id, archive.clone()).with_history_size(*history_size),
            ),
        }
    }

    fn archive(&self) -> &dyn Archive {
        match self {
            Self::Memory(archive) => archive,
            Self::File { archive, .. } => archive,
            Self::DuckDb { archive, .. } => archive,
        }
    }

    /// Flushed records of `kind`, keyed by debugger id.
    pub fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError> {
        self.archive().read(kind)
    }

    /// Drop all but the newest `keep` sessions.
    pub fn prune(&self, keep: usize) -> Result<usize, StorageError> {
        self.archive().prune(keep)
    }
}
