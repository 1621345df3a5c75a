//! DuckDB archive.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use duckdb::Connection;
use parking_lot::Mutex;
use serde_json::Value;

use crate::id::DebuggerIdGenerator;
use crate::storage::schema::init_schema;
use crate::storage::{Archive, ArchiveStorage, RecordKind, StorageError};

/// Flushed sessions stored in the `debug_records` table.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct DuckDbArchive {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbArchive {
    /// Open (or create) the database file and initialize the schema.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl Archive for DuckDbArchive {
    fn write(&self, id: &str, kind: RecordKind, record: &Value) -> Result<(), StorageError> {
        let payload = serde_json::to_string(record)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO debug_records (debugger_id, kind, payload, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (debugger_id, kind) DO UPDATE SET payload = EXCLUDED.payload, created_at = EXCLUDED.created_at",
        )?;
        stmt.execute(duckdb::params![
            id,
            kind.as_ref(),
            payload,
            Utc::now().timestamp_micros(),
        ])?;
        Ok(())
    }

    fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT debugger_id, kind, payload FROM debug_records WHERE kind = ? ORDER BY debugger_id",
        )?;
        let rows = stmt.query_map([kind.as_ref()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = BTreeMap::new();
        for row in rows {
            let (id, stored_kind, payload) = row?;
            RecordKind::from_str(&stored_kind)
                .map_err(|_| StorageError::InvalidData(format!("unknown record kind '{stored_kind}'")))?;
            records.insert(id, serde_json::from_str(&payload)?);
        }
        Ok(records)
    }

    fn prune(&self, keep: usize) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT debugger_id FROM debug_records ORDER BY debugger_id DESC OFFSET {keep}"
        ))?;
        let stale = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for id in &stale {
            conn.execute("DELETE FROM debug_records WHERE debugger_id = ?", [id])?;
        }
        if !stale.is_empty() {
            tracing::info!(deleted = stale.len(), keep, "Debug records cleaned up");
        }
        Ok(stale.len())
    }
}

impl std::fmt::Debug for DuckDbArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbArchive").finish_non_exhaustive()
    }
}

/// Storage whose flushed sessions live in a DuckDB database.
pub type DbStorage = ArchiveStorage<DuckDbArchive>;

impl ArchiveStorage<DuckDbArchive> {
    pub fn open(id: DebuggerIdGenerator, db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self::with_archive(id, DuckDbArchive::open(db_path)?))
    }
}
