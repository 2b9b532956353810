use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The expected version did not match the stream's current version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The aggregate was not found in the event store.
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(AggregateId),

    /// The backing store could not be reached.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// The batch handed to `append` was malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// An envelope was built without a required field.
    #[error("Invalid event envelope: missing {0}")]
    InvalidEnvelope(&'static str),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Whether the error means the store could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl From<sqlx::Error> for EventStoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err.to_string()),
            other => Self::Database(other),
        }
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_map_to_unavailable() {
        let err: EventStoreError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_unavailable());

        let err: EventStoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, EventStoreError::Database(_)));
    }
}
