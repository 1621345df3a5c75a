//! Storage record types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// One lifecycle's collected data: collector name to dataset.
pub type SessionRecord = serde_json::Map<String, serde_json::Value>;

/// Kind of a flushed record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RecordKind {
    /// Full session record, every collector's dataset.
    Data,
    /// Index projection: id, collector names and index data.
    Summary,
}
