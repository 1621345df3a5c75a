//! Lookout - Runtime Diagnostics Collector
//!
//! This crate provides passive, per-lifecycle diagnostics collection. It can
//! be embedded in a host application, or its `lookout` binary can be used to
//! inspect what earlier lifecycles persisted.
//!
//! # Architecture
//!
//! - **Collectors**: Passive observers (events, logs, identities, routing, I/O streams)
//! - **Stream interception**: Transparent transport decorators registered per protocol
//! - **Storage**: Session records keyed by debugger id (memory, JSON files, DuckDB)
//! - **Debugger**: Lifecycle-scoped registry that starts, stops and flushes collectors
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lookout::{Debugger, DebuggerIdGenerator, LogCollector, MemoryStorage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let log = Arc::new(LogCollector::new());
//! let storage = MemoryStorage::new(DebuggerIdGenerator::new());
//! let mut debugger = Debugger::new(Box::new(storage)).with_collector(log.clone());
//!
//! debugger.startup(Some("/index"))?;
//! log.log("info", "request handled", serde_json::json!({ "status": 200 }));
//! debugger.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod debugger;
pub mod id;
pub mod storage;

pub use collector::stream::{
    CallSite, FileTransport, HttpTransport, MemoryTransport, OpenMode, Stream, StreamCollector,
    StreamCollectorConfig, StreamFilters, StreamKind, StreamOperation, StreamTransport,
    TransportRegistry,
};
pub use collector::{
    Collector, CollectorError, EventCollector, EventDispatcher, Identity, IdentityCollector,
    IndexCollector, LogCollector, LogLayer, MatchedRoute, RouteInfo, RouteSource,
    RouterCollector,
};
pub use config::{ConfigError, DebugConfig};
pub use debugger::Debugger;
pub use id::DebuggerIdGenerator;
pub use storage::{
    Archive, ArchiveStorage, DbStorage, DuckDbArchive, FileArchive, FileStorage, MemoryArchive,
    MemoryStorage, RecordKind, SessionRecord, Storage, StorageBackend, StorageError,
};
