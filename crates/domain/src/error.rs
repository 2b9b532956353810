//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::booking::BookingError;
use crate::cancellation::CancellationError;
use crate::layout::LayoutError;
use crate::slice::SliceError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Slice error: {0}")]
    Slice(#[from] SliceError),

    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    #[error("Cancellation error: {0}")]
    Cancellation(#[from] CancellationError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Whether a write lost an optimistic concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::EventStore(e) if e.is_conflict())
    }

    /// Whether the backing store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::EventStore(e) if e.is_unavailable())
    }
}
