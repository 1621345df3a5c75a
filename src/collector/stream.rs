//! Stream interception.
//!
//! Protocol handlers live in a [`TransportRegistry`]. A [`StreamCollector`]
//! temporarily replaces the handlers of its protocols with recording
//! decorators while it is started, and puts the originals back on shutdown.
//!
//! Bundled transports:
//! - [`FileTransport`] - local filesystem (`file://` and plain paths)
//! - [`HttpTransport`] - blocking HTTP GET (`http://`, `https://`)
//! - [`MemoryTransport`] - in-memory resources, any scheme

mod call_site;
mod collector;
mod file;
mod filters;
mod http;
mod intercept;
mod memory;
mod registry;
mod transport;

pub use call_site::CallSite;
pub use collector::{StreamCollector, StreamCollectorConfig, StreamKind};
pub use file::FileTransport;
pub use filters::StreamFilters;
pub use http::HttpTransport;
pub use intercept::{ArgsBuilder, OperationDetail, StreamLog, StreamRecord};
pub use memory::MemoryTransport;
pub use registry::{DEFAULT_PROTOCOL, InterceptError, Stream, TransportRegistry, protocol_of};
pub use transport::{
    HttpExchange, OpenMode, StreamHandle, StreamOperation, StreamStat, StreamTransport,
    unsupported,
};
