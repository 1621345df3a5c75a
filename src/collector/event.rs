//! Event dispatch collector.
//!
//! [`EventCollector`] is itself an [`EventDispatcher`]: it wraps the host's
//! real dispatcher, records every event, and then forwards it. Forwarding
//! happens whether or not the collector is active, and the real dispatcher's
//! result (including its errors) is returned unchanged.

use std::panic::Location;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collector::{Collector, CollectorState, now_micros};

/// Collector name used as the storage key.
pub const EVENT_COLLECTOR_NAME: &str = "event";

/// Event dispatch capability of the host framework.
pub trait EventDispatcher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Dispatch an event to its listeners and return it (possibly modified).
    fn dispatch<E>(&self, event: E) -> Result<E, Self::Error>
    where
        E: Serialize + Send + 'static;
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Concrete event type.
    pub name: String,
    /// Serialized event payload (`null` if the event could not be serialized).
    pub event: Value,
    /// Source location that dispatched the event.
    pub file: String,
    /// Capture time (Unix micros).
    pub time: i64,
}

/// Records dispatched events, then forwards them to the real dispatcher.
pub struct EventCollector<D> {
    state: CollectorState,
    dispatcher: D,
    events: Mutex<Vec<EventRecord>>,
}

impl<D: EventDispatcher> EventCollector<D> {
    pub fn new(dispatcher: D) -> Self {
        Self {
            state: CollectorState::new(EVENT_COLLECTOR_NAME),
            dispatcher,
            events: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped dispatcher.
    pub fn inner(&self) -> &D {
        &self.dispatcher
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    fn record<E: Serialize + 'static>(&self, event: &E, location: &Location<'_>) {
        let name = std::any::type_name::<E>();
        let payload = serde_json::to_value(event).unwrap_or_else(|e| {
            tracing::warn!(event = name, error = %e, "Failed to serialize dispatched event");
            Value::Null
        });

        self.events.lock().push(EventRecord {
            name: name.to_owned(),
            event: payload,
            file: format!("{}:{}", location.file(), location.line()),
            time: now_micros(),
        });
    }
}

impl<D: EventDispatcher> EventDispatcher for EventCollector<D> {
    type Error = D::Error;

    #[track_caller]
    fn dispatch<E>(&self, event: E) -> Result<E, Self::Error>
    where
        E: Serialize + Send + 'static,
    {
        if self.state.is_active() {
            self.record(&event, Location::caller());
        }
        self.dispatcher.dispatch(event)
    }
}

impl<D: EventDispatcher> Collector for EventCollector<D> {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn collected(&self) -> Value {
        serde_json::to_value(&*self.events.lock()).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    fn reset(&self) {
        self.events.lock().clear();
    }

    fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn set_active(&self, active: bool) {
        self.state.set_active(active);
    }
}

impl<D> std::fmt::Debug for EventCollector<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCollector")
            .field("state", &self.state)
            .field("events", &self.events.lock().len())
            .finish_non_exhaustive()
    }
}
