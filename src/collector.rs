//! Collector Layer
//!
//! Passive observers that accumulate one kind of runtime event each during a
//! lifecycle. Producers call a collector's variant-specific `collect` entry
//! point; at the end of the lifecycle the [`Debugger`](crate::Debugger) hands
//! every collector to storage.
//!
//! # Architecture
//!
//! - [`Collector`]: Shared contract (name, snapshot, reset, activation)
//! - [`IndexCollector`]: Optional summary projection
//! - [`EventCollector`]: Records dispatched events, then forwards to the real dispatcher
//! - [`LogCollector`] / [`LogLayer`]: Log messages, fed directly or from `tracing`
//! - [`IdentityCollector`]: Authenticated identities
//! - [`RouterCollector`]: Router output and the matched route
//! - [`stream::StreamCollector`]: HTTP and filesystem stream interception

mod event;
mod identity;
mod log;
mod router;
pub mod stream;
mod traits;

pub use event::{EventCollector, EventDispatcher, EventRecord};
pub use identity::{Identity, IdentityCollector};
pub use log::{LogCollector, LogLayer, LogMessage};
pub use router::{MatchedRoute, RouteInfo, RouteSource, RouterCollector};
pub use traits::{Collector, CollectorError, CollectorState, IndexCollector};

pub(crate) use traits::now_micros;
