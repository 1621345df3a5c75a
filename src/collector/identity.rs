//! Authenticated identity collector.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::collector::{Collector, CollectorState, IndexCollector};

/// Collector name used as the storage key.
pub const IDENTITY_COLLECTOR_NAME: &str = "identity";

/// An authenticated principal, as resolved by the host's auth layer.
pub trait Identity {
    /// The principal's id, if it has one.
    fn id(&self) -> Option<String>;

    /// Concrete type name recorded as the identity's `class`.
    ///
    /// Resolved on the implementing type, so it survives `&dyn Identity`.
    fn class_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IdentityRecord {
    id: Option<String>,
    class: String,
}

/// Collects every non-empty identity resolution of a lifecycle.
#[derive(Debug)]
pub struct IdentityCollector {
    state: CollectorState,
    identities: Mutex<Vec<IdentityRecord>>,
}

impl IdentityCollector {
    pub fn new() -> Self {
        Self {
            state: CollectorState::new(IDENTITY_COLLECTOR_NAME),
            identities: Mutex::new(Vec::new()),
        }
    }

    /// Record an identity. `None` (no authenticated principal) is ignored.
    pub fn collect<I: Identity + ?Sized>(&self, identity: Option<&I>) {
        if !self.state.is_active() {
            return;
        }
        let Some(identity) = identity else {
            return;
        };

        self.identities.lock().push(IdentityRecord {
            id: identity.id(),
            class: identity.class_name().to_owned(),
        });
    }
}

impl Default for IdentityCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for IdentityCollector {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn collected(&self) -> Value {
        serde_json::to_value(&*self.identities.lock()).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    fn reset(&self) {
        self.identities.lock().clear();
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

impl IndexCollector for IdentityCollector {
    fn index_data(&self) -> Value {
        let identities = self.identities.lock();
        json!({
            "identity": {
                "lastId": identities.last().and_then(|record| record.id.clone()),
                "total": identities.len(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User {
        id: u64,
    }

    impl Identity for User {
        fn id(&self) -> Option<String> {
            Some(self.id.to_string())
        }
    }

    struct Guest;

    impl Identity for Guest {
        fn id(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_collect_records_id_and_type() {
        let collector = IdentityCollector::new();
        collector.collect(Some(&User { id: 7 }));

        let collected = collector.collected();
        assert_eq!(collected.as_array().unwrap().len(), 1);
        assert_eq!(collected[0]["id"], json!("7"));
        assert_eq!(
            collected[0]["class"],
            json!(std::any::type_name::<User>())
        );
    }

    #[test]
    fn test_collect_ignores_none() {
        let collector = IdentityCollector::new();
        collector.collect::<User>(None);
        assert_eq!(collector.collected(), json!([]));
        assert_eq!(
            collector.index_data(),
            json!({"identity": {"lastId": null, "total": 0}})
        );
    }

    #[test]
    fn test_index_data_tracks_last_and_total() {
        let collector = IdentityCollector::new();
        collector.collect(Some(&User { id: 1 }));
        collector.collect::<User>(None);
        collector.collect(Some(&User { id: 2 }));

        assert_eq!(
            collector.index_data(),
            json!({"identity": {"lastId": "2", "total": 2}})
        );
    }

    #[test]
    fn test_index_data_with_idless_identity() {
        let collector = IdentityCollector::new();
        collector.collect(Some(&User { id: 1 }));
        collector.collect(Some(&Guest));

        assert_eq!(
            collector.index_data(),
            json!({"identity": {"lastId": null, "total": 2}})
        );
    }

    #[test]
    fn test_inactive_collector_ignores_identities() {
        let collector = IdentityCollector::new();
        collector.set_active(false);
        collector.collect(Some(&User { id: 1 }));
        assert_eq!(collector.collected(), json!([]));
    }

    #[test]
    fn test_collect_through_trait_object_keeps_concrete_type() {
        let collector = IdentityCollector::new();
        let boxed: Box<dyn Identity> = Box::new(User { id: 4 });
        collector.collect(Some(boxed.as_ref()));
        collector.collect::<dyn Identity>(Some(&Guest));

        let collected = collector.collected();
        assert_eq!(collected[0]["id"], json!("4"));
        assert_eq!(collected[0]["class"], json!(std::any::type_name::<User>()));
        assert_eq!(collected[1]["class"], json!(std::any::type_name::<Guest>()));
    }

    #[test]
    fn test_exposes_index_capability() {
        let collector = IdentityCollector::new();
        assert!(collector.as_index().is_some());
    }
}
