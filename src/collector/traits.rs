//! Core collector traits and types.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use thiserror::Error;

use crate::collector::stream::InterceptError;
use crate::storage::StorageError;

/// Errors that can occur while collecting.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Collector input has the wrong shape (e.g. wrong arity).
    #[error("invalid argument: expected {expected}")]
    InvalidArgument {
        /// Description of the expected input shape.
        expected: &'static str,
    },

    /// Installing or removing a stream interceptor failed.
    #[error("interception error: {0}")]
    Intercept(#[from] InterceptError),

    /// Two collectors registered in one lifecycle share a name.
    #[error("duplicate collector name: '{0}'")]
    DuplicateName(String),

    /// Flushing collected data failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Current capture timestamp in microseconds since the Unix epoch.
pub(crate) fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Name and activation flag shared by every collector.
#[derive(Debug)]
pub struct CollectorState {
    name: String,
    active: AtomicBool,
}

impl CollectorState {
    /// Create an active collector state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

/// Core collector trait.
///
/// Collectors are shared between the lifecycle registry and the producers
/// that feed them, so every method takes `&self` and implementations keep
/// their buffers behind interior mutability.
///
/// # Contract
///
/// - While inactive, variant-specific `collect` calls record nothing.
/// - [`collected`](Collector::collected) returns an owned snapshot; later
///   collection never changes an already returned value.
/// - [`name`](Collector::name) is the storage key and must be unique within
///   one lifecycle.
pub trait Collector: Send + Sync {
    /// Stable collector name, used as the storage key.
    fn name(&self) -> &str;

    /// Snapshot of everything collected so far, in the variant's canonical shape.
    fn collected(&self) -> Value;

    /// Drop all accumulated state. Idempotent.
    fn reset(&self);

    fn is_active(&self) -> bool;

    fn set_active(&self, active: bool);

    /// Begin a lifecycle: clear buffers and activate.
    fn startup(&self) -> Result<(), CollectorError> {
        self.reset();
        self.set_active(true);
        Ok(())
    }

    /// End a lifecycle: clear buffers and deactivate.
    fn shutdown(&self) -> Result<(), CollectorError> {
        self.reset();
        self.set_active(false);
        Ok(())
    }

    /// Summary capability, if this collector provides one.
    fn as_index(&self) -> Option<&dyn IndexCollector> {
        None
    }
}

/// Collectors that contribute a cheap summary projection to the session index.
pub trait IndexCollector: Collector {
    /// Summary data, e.g. counts or the last seen id.
    fn index_data(&self) -> Value;
}
