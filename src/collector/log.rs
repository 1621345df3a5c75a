//! Log message collector.
//!
//! Messages arrive either through [`LogCollector::dispatch`] (positional
//! `[level, message, context]` payload) or from the host's `tracing` pipeline
//! via [`LogLayer`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::collector::{Collector, CollectorError, CollectorState, now_micros};

/// Collector name used as the storage key.
pub const LOG_COLLECTOR_NAME: &str = "log";

/// Shape of a dispatch payload, reported on arity errors.
const PAYLOAD_SHAPE: &str = "payload of exactly 3 values: [level, message, context]";

/// One recorded log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Capture time (Unix micros).
    pub time: i64,
    pub level: Value,
    pub message: Value,
    pub context: Value,
}

/// Collects log messages in arrival order.
#[derive(Debug)]
pub struct LogCollector {
    state: CollectorState,
    messages: Mutex<Vec<LogMessage>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self {
            state: CollectorState::new(LOG_COLLECTOR_NAME),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Record a positional `[level, message, context]` payload.
    ///
    /// # Errors
    /// Returns `CollectorError::InvalidArgument` unless the payload has
    /// exactly three values. The arity is checked even while inactive.
    pub fn dispatch(&self, payload: &[Value]) -> Result<(), CollectorError> {
        let [level, message, context] = payload else {
            return Err(CollectorError::InvalidArgument {
                expected: PAYLOAD_SHAPE,
            });
        };
        self.push(level.clone(), message.clone(), context.clone());
        Ok(())
    }

    /// Record a message with a string level.
    pub fn log(&self, level: &str, message: impl Into<String>, context: Value) {
        self.push(
            Value::String(level.to_owned()),
            Value::String(message.into()),
            context,
        );
    }

    /// Messages collected so far.
    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages.lock().clone()
    }

    fn push(&self, level: Value, message: Value, context: Value) {
        if !self.state.is_active() {
            return;
        }
        self.messages.lock().push(LogMessage {
            time: now_micros(),
            level,
            message,
            context,
        });
    }
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LogCollector {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn collected(&self) -> Value {
        serde_json::to_value(&*self.messages.lock()).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    fn reset(&self) {
        self.messages.lock().clear();
    }

    fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn set_active(&self, active: bool) {
        self.state.set_active(active);
    }
}

// =============================================================================
// tracing integration
// =============================================================================

/// `tracing_subscriber` layer that feeds every event into a [`LogCollector`].
///
/// The level becomes the lowercase level name, the `message` field becomes
/// the message, and all other fields (plus `target`) form the context.
#[derive(Debug, Clone)]
pub struct LogLayer {
    collector: Arc<LogCollector>,
}

impl LogLayer {
    pub fn new(collector: Arc<LogCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for LogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if !self.collector.is_active() {
            return;
        }
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        visitor.fields.insert(
            "target".to_owned(),
            Value::String(metadata.target().to_owned()),
        );

        self.collector.log(
            &metadata.level().to_string().to_lowercase(),
            visitor.message.unwrap_or_default(),
            Value::Object(visitor.fields),
        );
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_dispatch_records_message() {
        let collector = LogCollector::new();
        collector
            .dispatch(&[json!("info"), json!("hello"), json!({"user": 1})])
            .unwrap();

        let messages = collector.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, json!("info"));
        assert_eq!(messages[0].message, json!("hello"));
        assert_eq!(messages[0].context, json!({"user": 1}));
        assert!(messages[0].time > 0);
    }

    #[test]
    fn test_dispatch_rejects_wrong_arity() {
        let collector = LogCollector::new();

        for payload in [
            vec![],
            vec![json!("info")],
            vec![json!("info"), json!("hello")],
            vec![json!("info"), json!("hello"), json!({}), json!("extra")],
        ] {
            let err = collector.dispatch(&payload).unwrap_err();
            assert!(matches!(err, CollectorError::InvalidArgument { .. }));
            assert!(err.to_string().contains("[level, message, context]"));
        }
        assert!(collector.messages().is_empty());
    }

    #[test]
    fn test_dispatch_rejects_wrong_arity_while_inactive() {
        let collector = LogCollector::new();
        collector.set_active(false);
        assert!(collector.dispatch(&[json!("info")]).is_err());
    }

    #[test]
    fn test_inactive_collector_ignores_messages() {
        let collector = LogCollector::new();
        collector.log("info", "before", json!({}));
        let before = collector.collected();

        collector.set_active(false);
        collector.log("info", "ignored", json!({}));
        collector
            .dispatch(&[json!("error"), json!("ignored"), json!({})])
            .unwrap();

        assert_eq!(collector.collected(), before);
    }

    #[test]
    fn test_reset_and_lifecycle() {
        let collector = LogCollector::new();
        collector.log("debug", "one", json!({}));
        collector.reset();
        collector.reset();
        assert_eq!(collector.collected(), json!([]));

        collector.log("debug", "two", json!({}));
        collector.shutdown().unwrap();
        assert!(!collector.is_active());
        assert_eq!(collector.collected(), json!([]));

        collector.startup().unwrap();
        assert!(collector.is_active());
    }

    #[test]
    fn test_log_layer_captures_tracing_events() {
        let collector = Arc::new(LogCollector::new());
        let subscriber =
            tracing_subscriber::registry().with(LogLayer::new(Arc::clone(&collector)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(user = 42, cached = true, "disk almost full");
            tracing::info!("plain message");
        });

        let messages = collector.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].level, json!("warn"));
        assert_eq!(messages[0].message, json!("disk almost full"));
        assert_eq!(messages[0].context["user"], json!(42));
        assert_eq!(messages[0].context["cached"], json!(true));
        assert!(messages[0].context["target"].is_string());
        assert_eq!(messages[1].level, json!("info"));
        assert_eq!(messages[1].message, json!("plain message"));
    }
}
