//! Router output collector.
//!
//! The router itself stays external: the collector reads the host's already
//! computed route list and route tree through [`RouteSource`] and records the
//! route matched for the current request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::collector::{Collector, CollectorState, IndexCollector};

/// Collector name used as the storage key.
pub const ROUTER_COLLECTOR_NAME: &str = "router";

/// A registered route as reported by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub name: Option<String>,
    pub pattern: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl RouteInfo {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

/// The route matched for the current request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRoute {
    pub name: Option<String>,
    pub pattern: String,
    pub arguments: BTreeMap<String, String>,
    /// Time spent matching, in seconds.
    pub match_time: f64,
}

impl MatchedRoute {
    pub fn new(
        name: Option<String>,
        pattern: impl Into<String>,
        arguments: BTreeMap<String, String>,
        match_time: Duration,
    ) -> Self {
        Self {
            name,
            pattern: pattern.into(),
            arguments,
            match_time: match_time.as_secs_f64(),
        }
    }
}

/// Read access to the host router's computed output.
pub trait RouteSource: Send + Sync {
    /// Flat list of all registered routes.
    fn routes(&self) -> Vec<RouteInfo>;

    /// Group/route hierarchy in the router's own shape.
    fn route_tree(&self) -> Value;
}

/// Collects routing output and the matched route.
pub struct RouterCollector {
    state: CollectorState,
    source: Option<Arc<dyn RouteSource>>,
    matched: Mutex<Option<MatchedRoute>>,
}

impl RouterCollector {
    /// Collector without route listing; only the matched route is recorded.
    pub fn new() -> Self {
        Self {
            state: CollectorState::new(ROUTER_COLLECTOR_NAME),
            source: None,
            matched: Mutex::new(None),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn RouteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Record the route matched for the current request. Last match wins.
    pub fn collect(&self, matched: MatchedRoute) {
        if !self.state.is_active() {
            return;
        }
        *self.matched.lock() = Some(matched);
    }
}

impl Default for RouterCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouterCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterCollector")
            .field("state", &self.state)
            .field("has_source", &self.source.is_some())
            .field("matched", &*self.matched.lock())
            .finish()
    }
}

impl Collector for RouterCollector {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn collected(&self) -> Value {
        let (routes, tree) = match &self.source {
            Some(source) => (
                serde_json::to_value(source.routes()).unwrap_or(Value::Null),
                source.route_tree(),
            ),
            None => (Value::Array(Vec::new()), Value::Null),
        };
        json!({
            "routes": routes,
            "routesTree": tree,
            "currentRoute": *self.matched.lock(),
        })
    }

    fn reset(&self) {
        *self.matched.lock() = None;
    }

    fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn set_active(&self, active: bool) {
        self.state.set_active(active);
    }

    fn as_index(&self) -> Option<&dyn IndexCollector> {
        Some(self)
    }
}

impl IndexCollector for RouterCollector {
    fn index_data(&self) -> Value {
        json!({ "router": *self.matched.lock() })
    }
}
