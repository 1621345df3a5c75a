//! HTTP transport.
//!
//! Resources are fetched with a blocking GET when opened and served from the
//! buffered body afterwards. Only read access is supported.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::time::Duration;

use reqwest::blocking::{Client, Response};

use crate::collector::stream::{
    CallSite, HttpExchange, OpenMode, StreamHandle, StreamOperation, StreamStat,
    StreamTransport, unsupported,
};

/// Default request timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handler for `http://` and `https://` URIs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    headers: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    fn send(&self, method: reqwest::Method, uri: &str) -> io::Result<(Response, HttpExchange)> {
        let mut request = self
            .client
            .request(method.clone(), uri)
            .timeout(self.timeout);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().map_err(to_io_error)?;

        let mut response_headers = vec![format!("{:?} {}", response.version(), response.status())];
        response_headers.extend(response.headers().iter().map(|(name, value)| {
            format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()))
        }));
        let exchange = HttpExchange {
            method: method.to_string(),
            request_headers: self
                .headers
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect(),
            response_headers,
        };

        let response = response.error_for_status().map_err(to_io_error)?;
        Ok((response, exchange))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn to_io_error(e: reqwest::Error) -> io::Error {
    if e.is_timeout() {
        io::Error::new(io::ErrorKind::TimedOut, e)
    } else if let Some(status) = e.status() {
        let kind = match status.as_u16() {
            404 | 410 => io::ErrorKind::NotFound,
            401 | 403 => io::ErrorKind::PermissionDenied,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    } else {
        io::Error::other(e)
    }
}

impl StreamTransport for HttpTransport {
    fn open(
        &self,
        uri: &str,
        mode: OpenMode,
        _caller: &CallSite,
    ) -> io::Result<Box<dyn StreamHandle>> {
        if mode != OpenMode::Read {
            return Err(unsupported(StreamOperation::Write));
        }

        let (response, exchange) = self.send(reqwest::Method::GET, uri)?;
        let body = response.bytes().map_err(to_io_error)?;
        tracing::debug!(uri = %uri, bytes = body.len(), "Fetched HTTP resource");

        Ok(Box::new(HttpHandle {
            body: Cursor::new(body.to_vec()),
            exchange,
        }))
    }

    fn url_stat(&self, uri: &str, _caller: &CallSite) -> io::Result<StreamStat> {
        let (response, _) = self.send(reqwest::Method::HEAD, uri)?;
        Ok(StreamStat {
            size: response.content_length().unwrap_or(0),
            is_dir: false,
        })
    }
}

struct HttpHandle {
    body: Cursor<Vec<u8>>,
    exchange: HttpExchange,
}

impl StreamHandle for HttpHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(unsupported(StreamOperation::Write))
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.body.seek(pos)
    }

    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.body.position() >= self.body.get_ref().len() as u64)
    }

    fn stat(&mut self) -> io::Result<StreamStat> {
        Ok(StreamStat {
            size: self.body.get_ref().len() as u64,
            is_dir: false,
        })
    }

    fn http_exchange(&self) -> Option<HttpExchange> {
        Some(self.exchange.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned response on a local port and return its URL.
    fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf);
            socket.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/resource")
    }

    #[test]
    fn test_write_mode_is_unsupported() {
        let err = HttpTransport::new()
            .open("http://127.0.0.1:9/", OpenMode::Write, &CallSite::unknown())
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_get_captures_exchange() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        );
        let transport = HttpTransport::new().with_header("X-Trace", "1");

        let mut handle = transport.open(&url, OpenMode::Read, &CallSite::unknown()).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(handle.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert!(handle.eof().unwrap());

        let exchange = handle.http_exchange().unwrap();
        assert_eq!(exchange.method, "GET");
        assert_eq!(exchange.request_headers, vec!["X-Trace: 1".to_string()]);
        assert_eq!(exchange.response_headers[0], "HTTP/1.1 200 OK");
        assert!(
            exchange
                .response_headers
                .contains(&"content-type: text/plain".to_string())
        );
    }

    #[test]
    fn test_not_found_maps_error_kind() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let err = HttpTransport::new()
            .open(&url, OpenMode::Read, &CallSite::unknown())
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
