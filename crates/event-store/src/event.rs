use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Identity of one stored event, also the tie-breaker of the global order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Position of a stream, i.e. the number of events it holds.
///
/// A stream that was never written sits at 0; its first event is version 1.
/// Writers hand the version they read back to the store, which refuses the
/// append if the stream has moved on since.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The position of an empty stream.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The version carried by the first event of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A stored event: the serialized domain event plus its stream position.
///
/// Audited events carry an [`AuditEntry`](crate::AuditEntry) under
/// `metadata["audit"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    /// Domain event name, e.g. `UnitsBooked` or `RefundRecorded`.
    pub event_type: String,
    pub aggregate_id: AggregateId,
    /// `AvailabilitySlice`, `Booking` or `Cancellation`.
    pub aggregate_type: String,
    /// Stream version after this event.
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Assembles an [`EventEnvelope`]; the id and timestamp are generated when
/// not given.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    pub fn event_id(self, event_id: EventId) -> Self {
        Self {
            event_id: Some(event_id),
            ..self
        }
    }

    pub fn event_type(self, event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..self
        }
    }

    pub fn aggregate_id(self, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..self
        }
    }

    pub fn aggregate_type(self, aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            ..self
        }
    }

    pub fn version(self, version: Version) -> Self {
        Self {
            version: Some(version),
            ..self
        }
    }

    pub fn timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Serializes `payload` as the event body.
    pub fn payload<T: Serialize>(self, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(self.payload_raw(serde_json::to_value(payload)?))
    }

    pub fn payload_raw(self, payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..self
        }
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Fails with [`EventStoreError::InvalidEnvelope`] naming the first
    /// required field left unset.
    pub fn build(self) -> Result<EventEnvelope, EventStoreError> {
        fn required<T>(value: Option<T>, field: &'static str) -> Result<T, EventStoreError> {
            value.ok_or(EventStoreError::InvalidEnvelope(field))
        }

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: required(self.event_type, "event_type")?,
            aggregate_id: required(self.aggregate_id, "aggregate_id")?,
            aggregate_type: required(self.aggregate_type, "aggregate_type")?,
            version: required(self.version, "version")?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: required(self.payload, "payload")?,
            metadata: self.metadata,
        })
    }
}
