//! In-memory transport.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collector::stream::{
    CallSite, HttpExchange, OpenMode, StreamHandle, StreamStat, StreamTransport,
};

#[derive(Debug, Clone, Default)]
struct Resource {
    data: Vec<u8>,
    /// Present for resources served as HTTP responses.
    response_headers: Option<Vec<String>>,
}

#[derive(Debug, Default)]
struct Store {
    resources: BTreeMap<String, Resource>,
    dirs: BTreeSet<String>,
}

/// Resources kept in process memory, keyed by their full URI.
///
/// Works for any scheme; register a clone under each protocol it should
/// serve. Clones share contents, so a test can seed and inspect the same
/// store the registry reads from.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    store: Arc<RwLock<Store>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` at `uri`, replacing any previous content.
    pub fn insert(&self, uri: impl Into<String>, data: Vec<u8>) {
        self.store.write().resources.insert(
            uri.into(),
            Resource {
                data,
                response_headers: None,
            },
        );
    }

    /// Store an HTTP response body with its status line and header lines.
    pub fn insert_http(&self, uri: impl Into<String>, body: Vec<u8>, response_headers: Vec<String>) {
        self.store.write().resources.insert(
            uri.into(),
            Resource {
                data: body,
                response_headers: Some(response_headers),
            },
        );
    }

    /// Current content at `uri`.
    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.store
            .read()
            .resources
            .get(uri)
            .map(|resource| resource.data.clone())
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.store.read().resources.contains_key(uri)
    }

    pub fn is_dir(&self, uri: &str) -> bool {
        self.store.read().dirs.contains(uri)
    }
}

fn not_found(uri: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such resource: {uri}"))
}

impl StreamTransport for MemoryTransport {
    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        _caller: &CallSite,
    ) -> io::Result<Box<dyn StreamHandle>> {
        let existing = self.store.read().resources.get(uri).cloned();
        let resource = match (mode, existing) {
            (OpenMode::Read | OpenMode::ReadWrite, None) => return Err(not_found(uri)),
            (OpenMode::Write, _) => {
                let resource = Resource::default();
                self.store
                    .write()
                    .resources
                    .insert(uri.to_owned(), resource.clone());
                resource
            }
            (_, Some(resource)) => resource,
            (OpenMode::Append, None) => Resource::default(),
        };

        let exchange = resource.response_headers.map(|response_headers| HttpExchange {
            method: "GET".to_owned(),
            request_headers: Vec::new(),
            response_headers,
        });
        let mut cursor = Cursor::new(resource.data);
        if mode == OpenMode::Append {
            cursor.seek(SeekFrom::End(0))?;
        }

        Ok(Box::new(MemoryHandle {
            store: Arc::clone(&self.store),
            uri: uri.to_owned(),
            mode,
            cursor,
            exchange,
        }))
    }

    fn url_stat(&self, uri: &str, _caller: &CallSite) -> io::Result<StreamStat> {
        let store = self.store.read();
        if let Some(resource) = store.resources.get(uri) {
            return Ok(StreamStat {
                size: resource.data.len() as u64,
                is_dir: false,
            });
        }
        if store.dirs.contains(uri) {
            return Ok(StreamStat {
                size: 0,
                is_dir: true,
            });
        }
        Err(not_found(uri))
    }

    fn mkdir(&self, uri: &str, _recursive: bool, _caller: &CallSite) -> io::Result<()> {
        if !self.store.write().dirs.insert(uri.to_owned()) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("directory exists: {uri}"),
            ));
        }
        Ok(())
    }

    fn rename(&self, from: &str, to: &str, _caller: &CallSite) -> io::Result<()> {
        let mut store = self.store.write();
        let resource = store.resources.remove(from).ok_or_else(|| not_found(from))?;
        store.resources.insert(to.to_owned(), resource);
        Ok(())
    }

    fn rmdir(&self, uri: &str, _caller: &CallSite) -> io::Result<()> {
        if !self.store.write().dirs.remove(uri) {
            return Err(not_found(uri));
        }
        Ok(())
    }

    fn unlink(&self, uri: &str, _caller: &CallSite) -> io::Result<()> {
        self.store
            .write()
            .resources
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| not_found(uri))
    }
}

/// Open in-memory resource. Writes go straight through to the store.
struct MemoryHandle {
    store: Arc<RwLock<Store>>,
    uri: String,
    mode: OpenMode,
    cursor: Cursor<Vec<u8>>,
    exchange: Option<HttpExchange>,
}

impl StreamHandle for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.mode.is_readable() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not open for reading", self.uri),
            ));
        }
        self.cursor.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.is_writable() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not open for writing", self.uri),
            ));
        }
        if self.mode == OpenMode::Append {
            self.cursor.seek(SeekFrom::End(0))?;
        }
        let written = self.cursor.write(buf)?;

        let mut store = self.store.write();
        let resource = store.resources.entry(self.uri.clone()).or_default();
        resource.data.clone_from(self.cursor.get_ref());
        Ok(written)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }

    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.cursor.position() >= self.cursor.get_ref().len() as u64)
    }

    fn stat(&mut self) -> io::Result<StreamStat> {
        Ok(StreamStat {
            size: self.cursor.get_ref().len() as u64,
            is_dir: false,
        })
    }

    fn http_exchange(&self) -> Option<HttpExchange> {
        self.exchange.clone()
    }
}
