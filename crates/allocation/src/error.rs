//! Allocation error types.

use domain::{BookingError, CancellationError, DomainError, LayoutError, SliceError};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors surfaced by the allocation services.
///
/// Lower layers have their own error enums; they are folded into this
/// taxonomy at the service boundary so callers match on outcomes rather
/// than on where a failure came from.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The request itself is malformed: empty selection, unknown unit,
    /// bad amount.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The actor's role may not perform this operation.
    #[error("Permission denied: {actor_role} may not {operation}")]
    PermissionDenied {
        actor_role: String,
        operation: String,
    },

    /// Units were taken by a concurrent writer, or are ineligible under
    /// an all-or-nothing policy.
    #[error("Conflict on {slice_key}: units {unit_ids:?} are no longer eligible")]
    Conflict {
        slice_key: String,
        unit_ids: Vec<String>,
    },

    /// The record is not in a state that allows the operation.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Refund already recorded")]
    AlreadyRefunded,

    #[error("Not found: {0}")]
    NotFound(String),

    /// The store could not be reached. Nothing was written.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AllocationError {
    pub fn conflict(slice_key: impl ToString, unit_ids: Vec<String>) -> Self {
        Self::Conflict {
            slice_key: slice_key.to_string(),
            unit_ids,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<EventStoreError> for AllocationError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::Unavailable(msg) => Self::Unavailable(msg),
            EventStoreError::AggregateNotFound(id) => Self::NotFound(id.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<LayoutError> for AllocationError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::SourceUnavailable(msg) => Self::Unavailable(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<BookingError> for AllocationError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotPlaced => Self::NotFound(err.to_string()),
            BookingError::AlreadyPlaced | BookingError::InvalidStateTransition { .. } => {
                Self::InvalidStateTransition(err.to_string())
            }
            BookingError::NoUnits
            | BookingError::CustomerRequired
            | BookingError::InvalidAmount { .. } => Self::Validation(err.to_string()),
        }
    }
}

impl From<CancellationError> for AllocationError {
    fn from(err: CancellationError) -> Self {
        match err {
            CancellationError::AlreadyRefunded => Self::AlreadyRefunded,
            CancellationError::InvalidRefund(msg) => Self::Validation(msg),
            CancellationError::NotOpened => Self::NotFound(err.to_string()),
            CancellationError::AlreadyOpened => Self::InvalidStateTransition(err.to_string()),
        }
    }
}

impl From<DomainError> for AllocationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::EventStore(e) => e.into(),
            DomainError::Layout(e) => e.into(),
            DomainError::Booking(e) => e.into(),
            DomainError::Cancellation(e) => e.into(),
            DomainError::Slice(SliceError::EmptySelection) => {
                Self::Validation("no units selected".to_string())
            }
            DomainError::Slice(e) => Self::InvalidStateTransition(e.to_string()),
            DomainError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } => Self::NotFound(format!("{aggregate_type} {aggregate_id}")),
            DomainError::Serialization(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ProjectionError> for AllocationError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::EventStore(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Convenience type alias for allocation results.
pub type Result<T> = std::result::Result<T, AllocationError>;
