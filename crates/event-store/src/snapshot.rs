//! Point-in-time copies of aggregate state.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AggregateId, Version};

/// Schema revision written when the caller does not name one.
pub const DEFAULT_SNAPSHOT_SCHEMA: u32 = 1;

/// Aggregate state captured at `version`, letting a load skip the stream
/// prefix up to and including that version.
///
/// `schema` names the layout of `state`. A snapshot is only restorable by a
/// reader expecting the same aggregate type and schema; anything else must be
/// ignored and the stream replayed from the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub version: Version,
    #[serde(default = "default_schema")]
    pub schema: u32,
    pub taken_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

fn default_schema() -> u32 {
    DEFAULT_SNAPSHOT_SCHEMA
}

impl Snapshot {
    /// Wraps already-serialized state at the default schema.
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            schema: DEFAULT_SNAPSHOT_SCHEMA,
            taken_at: Utc::now(),
            state,
        }
    }

    /// Serializes `state` into a snapshot.
    pub fn capture<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            serde_json::to_value(state)?,
        ))
    }

    pub fn with_schema(mut self, schema: u32) -> Self {
        self.schema = schema;
        self
    }

    /// True when a reader of `aggregate_type` at `schema` may restore this.
    pub fn is_restorable_as(&self, aggregate_type: &str, schema: u32) -> bool {
        self.aggregate_type == aggregate_type && self.schema == schema
    }

    pub fn restore<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
