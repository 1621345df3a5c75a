//! JSON file archive.
//!
//! Layout: `<root>/<debugger id>/<kind>.json`. Files are written to a
//! temporary name first and renamed into place, so readers never see a
//! partially written record.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::id::DebuggerIdGenerator;
use crate::storage::{Archive, ArchiveStorage, RecordKind, StorageError};

/// Flushed sessions stored as JSON files, one directory per debugger id.
#[derive(Debug, Clone)]
pub struct FileArchive {
    root: PathBuf,
}

impl FileArchive {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str, kind: RecordKind) -> PathBuf {
        self.root.join(id).join(format!("{kind}.json"))
    }

    /// Session directory names, oldest first.
    fn session_ids(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                ids.push(name.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl Archive for FileArchive {
    fn write(&self, id: &str, kind: RecordKind, record: &Value) -> Result<(), StorageError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(StorageError::InvalidData(format!(
                "debugger id is not a valid directory name: '{id}'"
            )));
        }

        let dir = self.root.join(id);
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::Internal(format!(
                "Failed to create session directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let path = self.record_path(id, kind);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(&self, kind: RecordKind) -> Result<BTreeMap<String, Value>, StorageError> {
        let mut records = BTreeMap::new();
        for id in self.session_ids()? {
            let path = self.record_path(&id, kind);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice(&bytes) {
                Ok(record) => {
                    records.insert(id, record);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }
        Ok(records)
    }

    fn prune(&self, keep: usize) -> Result<usize, StorageError> {
        let ids = self.session_ids()?;
        let excess = ids.len().saturating_sub(keep);
        for id in &ids[..excess] {
            fs::remove_dir_all(self.root.join(id))?;
        }
        Ok(excess)
    }
}

/// Storage whose flushed sessions are JSON files under a root directory.
pub type FileStorage = ArchiveStorage<FileArchive>;

impl ArchiveStorage<FileArchive> {
    pub fn open(id: DebuggerIdGenerator, root: impl AsRef<Path>) -> Self {
        Self::with_archive(id, FileArchive::new(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let archive = FileArchive::new(dir.path());

        archive.write("s1", RecordKind::Data, &json!({"log": [1]})).unwrap();
        archive.write("s1", RecordKind::Summary, &json!({"id": "s1"})).unwrap();

        assert!(dir.path().join("s1/data.json").exists());
        assert!(!dir.path().join("s1/data.json.tmp").exists());
        let data = archive.read(RecordKind::Data).unwrap();
        assert_eq!(data["s1"], json!({"log": [1]}));
    }

    #[test]
    fn test_missing_root_reads_empty() {
        let dir = tempdir().unwrap();
        let archive = FileArchive::new(dir.path().join("never-created"));
        assert!(archive.read(RecordKind::Data).unwrap().is_empty());
        assert_eq!(archive.prune(1).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let dir = tempdir().unwrap();
        let archive = FileArchive::new(dir.path());
        archive.write("good", RecordKind::Data, &json!({})).unwrap();
        fs::create_dir_all(dir.path().join("bad")).unwrap();
        fs::write(dir.path().join("bad/data.json"), b"{not json").unwrap();

        let data = archive.read(RecordKind::Data).unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["good"]);
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = FileArchive::new(dir.path());
        assert!(matches!(
            archive.write("../escape", RecordKind::Data, &json!({})),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[test]
    fn test_prune_removes_oldest_directories() {
        let dir = tempdir().unwrap();
        let archive = FileArchive::new(dir.path());
        for id in ["01", "02", "03"] {
            archive.write(id, RecordKind::Data, &json!({})).unwrap();
        }

        assert_eq!(archive.prune(1).unwrap(), 2);
        assert!(!dir.path().join("01").exists());
        assert!(dir.path().join("03").exists());
    }
}
