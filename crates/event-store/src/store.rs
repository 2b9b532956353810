use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Snapshot, Version};

/// Concurrency guard for one append.
///
/// `expected_version: None` appends unconditionally and is only used by
/// tests and tooling; writers always name the version they read.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stream must still be at `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not have been written yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// What a load needs to rebuild one stream: an optional restorable
/// snapshot and the events recorded after it.
#[derive(Debug, Default)]
pub struct StreamLoad {
    pub snapshot: Option<Snapshot>,
    pub events: Vec<EventEnvelope>,
}

/// Append-only log of versioned streams.
///
/// Implementations are shared between request handlers and background
/// tasks, so they must be `Send + Sync`. Every call against an unreachable
/// backend fails with [`EventStoreError::Unavailable`] without side effects.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch to a single stream, all or nothing.
    ///
    /// Fails with `ConcurrencyConflict` when `options.expected_version` is
    /// set and the stream has moved on. Returns the stream's new version.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// The whole stream, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// The stream from `from_version` (inclusive) onwards.
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: &AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Every event of every stream in append order.
    ///
    /// The order is stable: events appended later always come after the
    /// ones returned by an earlier call, whatever their timestamps. Readers
    /// may therefore remember how far they got as a plain count.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// `None` for a stream that was never written.
    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>>;

    /// Stores `snapshot`, replacing any earlier one of the same stream.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_snapshot(&self, aggregate_id: &AggregateId) -> Result<Option<Snapshot>>;

    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn aggregate_exists(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Reads a stream for rebuilding an `aggregate_type` aggregate whose
    /// snapshots are laid out at `schema`.
    ///
    /// A stored snapshot of another type or schema is skipped and the whole
    /// stream is returned instead.
    async fn load_aggregate(
        &self,
        aggregate_id: &AggregateId,
        aggregate_type: &str,
        schema: u32,
    ) -> Result<StreamLoad> {
        let snapshot = match self.get_snapshot(aggregate_id).await? {
            Some(snapshot) if snapshot.is_restorable_as(aggregate_type, schema) => Some(snapshot),
            Some(stale) => {
                tracing::debug!(
                    %aggregate_id,
                    stored_type = %stale.aggregate_type,
                    stored_schema = stale.schema,
                    schema,
                    "ignoring snapshot, replaying full stream"
                );
                metrics::counter!("event_store_snapshots_skipped_total").increment(1);
                None
            }
            None => None,
        };

        let from = snapshot
            .as_ref()
            .map_or(Version::first(), |s| s.version.next());
        let events = self
            .get_events_for_aggregate_from_version(aggregate_id, from)
            .await?;
        Ok(StreamLoad { snapshot, events })
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates events before appending.
///
/// A batch must be non-empty, target a single stream and carry sequential
/// versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}
