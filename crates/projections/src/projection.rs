//! Projection trait and catch-up positions.

use std::fmt;

use async_trait::async_trait;
use event_store::EventEnvelope;
use serde::de::DeserializeOwned;

use crate::{ProjectionError, Result};

/// How far through the global log a projection has read.
///
/// Owned by the processor, so a projection never has to track it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Events read, whatever their aggregate type.
    pub events_seen: u64,
    /// Events folded into the view.
    pub events_applied: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(self, applied: bool) -> Self {
        Self {
            events_seen: self.events_seen + 1,
            events_applied: self.events_applied + u64::from(applied),
        }
    }
}

impl fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seen {} / applied {}", self.events_seen, self.events_applied)
    }
}

/// Folds the events of one aggregate type into a view.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Aggregate type whose events are applied. Anything else is skipped.
    fn source(&self) -> &'static str;

    async fn apply(&self, event: &EventEnvelope) -> Result<()>;

    /// Drops everything applied so far.
    async fn clear(&self);
}

/// Decodes an event payload on behalf of `projection`.
pub(crate) fn decode<T: DeserializeOwned>(projection: &'static str, event: &EventEnvelope) -> Result<T> {
    serde_json::from_value(event.payload.clone()).map_err(|source| ProjectionError::Decode {
        projection,
        event_type: event.event_type.clone(),
        event_id: event.event_id,
        source,
    })
}
