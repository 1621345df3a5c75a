//! Debugger id generation.

use uuid::Uuid;

/// Produces the unique identifier of one lifecycle.
///
/// The id is generated once at construction and returned unchanged for the
/// generator's lifetime. Ids are UUIDv7 in simple (hex) form, so they sort in
/// creation order, which durable storages rely on when pruning history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerIdGenerator {
    id: String,
}

impl DebuggerIdGenerator {
    /// Create a generator with a freshly generated id.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7().simple().to_string(),
        }
    }

    /// Create a generator bound to a known id (e.g. when re-opening a session).
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The debugger id of this lifecycle.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for DebuggerIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DebuggerIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}
