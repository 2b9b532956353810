//! Projection error types.

use event_store::{EventId, EventStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A stored payload no longer matches the event type it claims to be.
    #[error("{projection} could not decode {event_type} {event_id}: {source}")]
    Decode {
        projection: &'static str,
        event_type: String,
        event_id: EventId,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
