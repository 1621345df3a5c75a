//! Protocol handler registry.
//!
//! [`TransportRegistry`] is the single registration point for stream
//! handlers. Application code opens resources through it, and stream
//! collectors install their interceptors into it for the duration of a
//! lifecycle. Clones share the same handler table.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::collector::stream::{
    CallSite, HttpExchange, OpenMode, StreamHandle, StreamStat, StreamTransport,
};

/// Protocol assumed for URIs without a scheme.
pub const DEFAULT_PROTOCOL: &str = "file";

/// Errors raised while installing or removing interceptors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterceptError {
    /// The protocol already has an interceptor installed.
    #[error("protocol '{0}' is already intercepted")]
    AlreadyIntercepted(String),

    /// No handler is registered for the protocol.
    #[error("no handler registered for protocol '{0}'")]
    ProtocolNotRegistered(String),

    /// Restore was requested for a protocol that is not intercepted.
    #[error("protocol '{0}' is not intercepted")]
    NotIntercepted(String),
}

struct Slot {
    active: Arc<dyn StreamTransport>,
    /// Handler replaced by an interceptor, restored on uninstall.
    original: Option<Arc<dyn StreamTransport>>,
}

/// Shared table of protocol handlers.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    slots: Arc<RwLock<BTreeMap<String, Slot>>>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a protocol.
    ///
    /// # Errors
    /// Returns `InterceptError::AlreadyIntercepted` while an interceptor is
    /// installed for the protocol.
    pub fn register(
        &self,
        protocol: impl Into<String>,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<(), InterceptError> {
        let protocol = protocol.into().to_ascii_lowercase();
        let mut slots = self.slots.write();
        if slots.get(&protocol).is_some_and(|slot| slot.original.is_some()) {
            return Err(InterceptError::AlreadyIntercepted(protocol));
        }
        slots.insert(
            protocol,
            Slot {
                active: transport,
                original: None,
            },
        );
        Ok(())
    }

    /// Registered protocol names.
    pub fn protocols(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    pub fn is_registered(&self, protocol: &str) -> bool {
        self.slots.read().contains_key(&protocol.to_ascii_lowercase())
    }

    pub fn is_intercepted(&self, protocol: &str) -> bool {
        self.slots
            .read()
            .get(&protocol.to_ascii_lowercase())
            .is_some_and(|slot| slot.original.is_some())
    }

    /// Replace the protocol's handler with `wrap(original)`.
    ///
    /// Interceptors do not stack: a second install for the same protocol is
    /// rejected until the first is restored.
    pub(crate) fn install<F>(&self, protocol: &str, wrap: F) -> Result<(), InterceptError>
    where
        F: FnOnce(Arc<dyn StreamTransport>) -> Arc<dyn StreamTransport>,
    {
        let protocol = protocol.to_ascii_lowercase();
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(&protocol)
            .ok_or_else(|| InterceptError::ProtocolNotRegistered(protocol.clone()))?;
        if slot.original.is_some() {
            return Err(InterceptError::AlreadyIntercepted(protocol));
        }

        let original = Arc::clone(&slot.active);
        slot.active = wrap(Arc::clone(&original));
        slot.original = Some(original);
        tracing::debug!(protocol = %protocol, "Stream interceptor installed");
        Ok(())
    }

    /// Put back the handler replaced by [`install`](Self::install).
    pub(crate) fn restore(&self, protocol: &str) -> Result<(), InterceptError> {
        let protocol = protocol.to_ascii_lowercase();
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(&protocol)
            .ok_or_else(|| InterceptError::ProtocolNotRegistered(protocol.clone()))?;
        let original = slot
            .original
            .take()
            .ok_or_else(|| InterceptError::NotIntercepted(protocol.clone()))?;

        slot.active = original;
        tracing::debug!(protocol = %protocol, "Stream interceptor removed");
        Ok(())
    }

    fn handler(&self, uri: &str) -> io::Result<Arc<dyn StreamTransport>> {
        let protocol = protocol_of(uri);
        self.slots
            .read()
            .get(&protocol)
            .map(|slot| Arc::clone(&slot.active))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no handler registered for protocol '{protocol}'"),
                )
            })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Open a resource; the caller's source location is the call site.
    #[track_caller]
    pub fn open(&self, uri: &str, mode: OpenMode) -> io::Result<Stream> {
        self.open_with(uri, mode, CallSite::here())
    }

    /// Open a resource on behalf of `T`.
    #[track_caller]
    pub fn open_as<T: ?Sized>(&self, uri: &str, mode: OpenMode) -> io::Result<Stream> {
        self.open_with(uri, mode, CallSite::of::<T>())
    }

    /// Open a resource with an explicit call site.
    pub fn open_with(&self, uri: &str, mode: OpenMode, caller: CallSite) -> io::Result<Stream> {
        let handle = self.handler(uri)?.open(uri, mode, &caller)?;
        Ok(Stream::new(handle))
    }

    #[track_caller]
    pub fn stat(&self, uri: &str) -> io::Result<StreamStat> {
        let caller = CallSite::here();
        self.handler(uri)?.url_stat(uri, &caller)
    }

    #[track_caller]
    pub fn mkdir(&self, uri: &str, recursive: bool) -> io::Result<()> {
        let caller = CallSite::here();
        self.handler(uri)?.mkdir(uri, recursive, &caller)
    }

    /// Rename within one protocol; the source URI selects the handler.
    #[track_caller]
    pub fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let caller = CallSite::here();
        self.handler(from)?.rename(from, to, &caller)
    }

    #[track_caller]
    pub fn rmdir(&self, uri: &str) -> io::Result<()> {
        let caller = CallSite::here();
        self.handler(uri)?.rmdir(uri, &caller)
    }

    #[track_caller]
    pub fn unlink(&self, uri: &str) -> io::Result<()> {
        let caller = CallSite::here();
        self.handler(uri)?.unlink(uri, &caller)
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read();
        let intercepted: Vec<_> = slots
            .iter()
            .filter(|(_, slot)| slot.original.is_some())
            .map(|(name, _)| name.as_str())
            .collect();
        f.debug_struct("TransportRegistry")
            .field("protocols", &slots.keys().collect::<Vec<_>>())
            .field("intercepted", &intercepted)
            .finish()
    }
}

/// Protocol (lowercase scheme) of a URI; plain paths map to `file`.
pub fn protocol_of(uri: &str) -> String {
    match url::Url::parse(uri) {
        // Single-letter schemes are Windows drive letters.
        Ok(url) if url.scheme().len() > 1 => url.scheme().to_owned(),
        _ => DEFAULT_PROTOCOL.to_owned(),
    }
}

// =============================================================================
// Stream
// =============================================================================

/// An open resource obtained from a [`TransportRegistry`].
///
/// Implements `Read`, `Write` and `Seek`. Dropping an unclosed stream closes
/// it and discards the close error; call [`close`](Stream::close) to see it.
pub struct Stream {
    handle: Box<dyn StreamHandle>,
    closed: bool,
}

impl Stream {
    pub(crate) fn new(handle: Box<dyn StreamHandle>) -> Self {
        Self {
            handle,
            closed: false,
        }
    }

    pub fn tell(&mut self) -> io::Result<u64> {
        self.handle.tell()
    }

    pub fn eof(&mut self) -> io::Result<bool> {
        self.handle.eof()
    }

    pub fn stat(&mut self) -> io::Result<StreamStat> {
        self.handle.stat()
    }

    pub fn http_exchange(&self) -> Option<HttpExchange> {
        self.handle.http_exchange()
    }

    pub fn close(mut self) -> io::Result<()> {
        self.closed = true;
        self.handle.close()
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.read(buf)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle.seek(pos)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.handle.close();
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
