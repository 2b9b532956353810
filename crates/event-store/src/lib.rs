//! Append-only, versioned event log with optimistic concurrency.
//!
//! Every aggregate lives in its own stream. Appends carry the version the
//! writer last observed and fail with [`EventStoreError::ConcurrencyConflict`]
//! when another writer got there first.

pub mod audit;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod snapshot;
pub mod store;

pub use audit::{AUDIT_METADATA_KEY, AuditEntry};
pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::{EventCursor, EventQuery, SortOrder};
pub use snapshot::{DEFAULT_SNAPSHOT_SCHEMA, Snapshot};
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream, StreamLoad};
