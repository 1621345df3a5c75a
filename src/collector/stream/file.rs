//! Local filesystem transport.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::collector::stream::{CallSite, OpenMode, StreamHandle, StreamStat, StreamTransport};

/// Handler for `file://` URIs and plain paths, backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    pub fn new() -> Self {
        Self
    }
}

/// Filesystem path of a `file://` URI or plain path.
fn to_path(uri: &str) -> io::Result<PathBuf> {
    if !uri.starts_with("file:") {
        return Ok(PathBuf::from(uri));
    }
    url::Url::parse(uri)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a local file URI: {uri}"),
            )
        })
}

impl StreamTransport for FileTransport {
    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        _caller: &CallSite,
    ) -> io::Result<Box<dyn StreamHandle>> {
        let path = to_path(uri)?;
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true),
        };
        let file = options.open(path)?;
        Ok(Box::new(FileHandle { file }))
    }

    fn url_stat(&self, uri: &str, _caller: &CallSite) -> io::Result<StreamStat> {
        let metadata = fs::metadata(to_path(uri)?)?;
        Ok(StreamStat {
            size: metadata.len(),
            is_dir: metadata.is_dir(),
        })
    }

    fn mkdir(&self, uri: &str, recursive: bool, _caller: &CallSite) -> io::Result<()> {
        let path = to_path(uri)?;
        if recursive {
            fs::create_dir_all(path)
        } else {
            fs::create_dir(path)
        }
    }

    fn rename(&self, from: &str, to: &str, _caller: &CallSite) -> io::Result<()> {
        fs::rename(to_path(from)?, to_path(to)?)
    }

    fn rmdir(&self, uri: &str, _caller: &CallSite) -> io::Result<()> {
        fs::remove_dir(to_path(uri)?)
    }

    fn unlink(&self, uri: &str, _caller: &CallSite) -> io::Result<()> {
        fs::remove_file(to_path(uri)?)
    }
}

struct FileHandle {
    file: File,
}

impl StreamHandle for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn eof(&mut self) -> io::Result<bool> {
        let position = self.file.stream_position()?;
        Ok(position >= self.file.metadata()?.len())
    }

    fn stat(&mut self) -> io::Result<StreamStat> {
        let metadata = self.file.metadata()?;
        Ok(StreamStat {
            size: metadata.len(),
            is_dir: metadata.is_dir(),
        })
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
