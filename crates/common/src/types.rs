use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SliceKey;

/// Identifier of an event stream.
///
/// Streams are named by a short prefix and a natural key, e.g.
/// `slice:havan:2024-05-01:morning` or `booking:<uuid>`. Deriving the id
/// from the natural key means the store's version check also guards
/// creation: two writers can never open the same stream twice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

impl AggregateId {
    /// Creates an aggregate ID from a raw stream name.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Stream holding the availability map of one slice.
    pub fn slice(key: &SliceKey) -> Self {
        Self(format!("slice:{key}"))
    }

    /// Stream holding one booking.
    pub fn booking(id: BookingId) -> Self {
        Self(format!("booking:{id}"))
    }

    /// Stream holding the cancellation of a booking.
    pub fn cancellation(id: CancellationId) -> Self {
        Self(format!("cancellation:{id}"))
    }

    /// Returns the raw stream name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AggregateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AggregateId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random booking ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a booking ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BookingId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Namespace for deriving cancellation ids from booking ids.
const CANCELLATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b3d_4c71_8e52_0d9a_f3b6_1e27);

/// Unique identifier for a cancellation.
///
/// A booking has at most one cancellation, so the id is derived from the
/// booking id instead of being random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CancellationId(Uuid);

impl CancellationId {
    /// Returns the cancellation id belonging to a booking.
    pub fn for_booking(booking_id: BookingId) -> Self {
        Self(Uuid::new_v5(
            &CANCELLATION_NAMESPACE,
            booking_id.as_uuid().as_bytes(),
        ))
    }

    /// Creates a cancellation ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CancellationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CancellationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
