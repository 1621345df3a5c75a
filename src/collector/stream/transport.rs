//! Transport capability interface.
//!
//! A [`StreamTransport`] is the handler registered for one protocol (`file`,
//! `http`, ...). Opening a resource yields a [`StreamHandle`] supporting the
//! usual `read/write/seek/tell/eof/stat/close` operations. Interception wraps
//! both layers without changing their results.

use std::io::{self, SeekFrom};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::collector::stream::CallSite;

/// Kind of stream operation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StreamOperation {
    Open,
    Read,
    Write,
    Seek,
    Tell,
    Eof,
    Stat,
    Close,
    Mkdir,
    Rename,
    Rmdir,
    Unlink,
}

/// How a resource is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OpenMode {
    /// Read only; the resource must exist.
    Read,
    /// Write only; creates or truncates.
    Write,
    /// Write only; creates or appends.
    Append,
    /// Read and write; the resource must exist.
    ReadWrite,
}

impl OpenMode {
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Resource metadata returned by `stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStat {
    pub size: u64,
    pub is_dir: bool,
}

/// Request/response metadata of an HTTP-backed stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpExchange {
    pub method: String,
    /// Request header lines (`Name: value`).
    pub request_headers: Vec<String>,
    /// Status line followed by response header lines.
    pub response_headers: Vec<String>,
}

/// An open resource.
pub trait StreamHandle: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    fn tell(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    fn eof(&mut self) -> io::Result<bool>;

    fn stat(&mut self) -> io::Result<StreamStat>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// HTTP request/response metadata, for HTTP-backed handles.
    fn http_exchange(&self) -> Option<HttpExchange> {
        None
    }
}

/// Protocol handler.
///
/// Every operation receives the [`CallSite`] of the code that triggered it;
/// plain transports ignore it, interceptors use it for exclusion rules.
pub trait StreamTransport: Send + Sync {
    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        caller: &CallSite,
    ) -> io::Result<Box<dyn StreamHandle>>;

    fn url_stat(&self, uri: &str, caller: &CallSite) -> io::Result<StreamStat>;

    fn mkdir(&self, uri: &str, recursive: bool, caller: &CallSite) -> io::Result<()> {
        let _ = (uri, recursive, caller);
        Err(unsupported(StreamOperation::Mkdir))
    }

    fn rename(&self, from: &str, to: &str, caller: &CallSite) -> io::Result<()> {
        let _ = (from, to, caller);
        Err(unsupported(StreamOperation::Rename))
    }

    fn rmdir(&self, uri: &str, caller: &CallSite) -> io::Result<()> {
        let _ = (uri, caller);
        Err(unsupported(StreamOperation::Rmdir))
    }

    fn unlink(&self, uri: &str, caller: &CallSite) -> io::Result<()> {
        let _ = (uri, caller);
        Err(unsupported(StreamOperation::Unlink))
    }
}

/// Error for an operation the transport does not implement.
pub fn unsupported(operation: StreamOperation) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{operation} is not supported by this transport"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_operation_from_str() {
        assert_eq!(StreamOperation::from_str("read").unwrap(), StreamOperation::Read);
        assert_eq!(StreamOperation::from_str("UNLINK").unwrap(), StreamOperation::Unlink);
        assert!(StreamOperation::from_str("truncate").is_err());
    }

    #[test]
    fn test_operation_as_str() {
        assert_eq!(StreamOperation::Read.as_ref(), "read");
        assert_eq!(StreamOperation::Mkdir.to_string(), "mkdir");
    }

    #[test]
    fn test_open_mode_capabilities() {
        assert!(OpenMode::Read.is_readable());
        assert!(!OpenMode::Read.is_writable());
        assert!(OpenMode::Append.is_writable());
        assert!(!OpenMode::Append.is_readable());
        assert!(OpenMode::ReadWrite.is_readable() && OpenMode::ReadWrite.is_writable());
    }

    #[test]
    fn test_unsupported_error() {
        let err = unsupported(StreamOperation::Rename);
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(err.to_string().contains("rename"));
    }
}
