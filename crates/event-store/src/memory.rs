use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Snapshot, SortOrder, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    events: Vec<EventEnvelope>,
    /// Positions in `events` per stream, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
}

impl Log {
    fn current_version(&self, aggregate_id: &AggregateId) -> Version {
        self.streams
            .get(aggregate_id)
            .and_then(|positions| positions.last())
            .map(|&pos| self.events[pos].version)
            .unwrap_or(Version::initial())
    }

    fn stream(&self, aggregate_id: &AggregateId) -> impl Iterator<Item = &EventEnvelope> {
        self.streams
            .get(aggregate_id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.events[pos])
    }
}

/// In-memory event store.
///
/// Provides the same interface and concurrency semantics as the PostgreSQL
/// implementation. The whole append runs under one write lock, which makes
/// the version check and the insert a single step.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.streams.clear();
        self.snapshots.write().await.clear();
    }

    /// Simulates an outage: while set, every operation fails with
    /// `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        self.ensure_available()?;
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id.clone();
        let first_new_version = events[0].version;

        let mut log = self.log.write().await;
        let current_version = log.current_version(&aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Unique (aggregate_id, version) constraint.
        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());
        for event in events {
            let pos = log.events.len();
            log.streams
                .entry(event.aggregate_id.clone())
                .or_default()
                .push(pos);
            log.events.push(event);
        }

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.ensure_available()?;
        let log = self.log.read().await;
        Ok(log.stream(aggregate_id).cloned().collect())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: &AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        self.ensure_available()?;
        let log = self.log.read().await;
        Ok(log
            .stream(aggregate_id)
            .filter(|e| e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        self.ensure_available()?;
        let log = self.log.read().await;
        let mut events: Vec<_> = match query.aggregate_id {
            Some(ref id) => log.stream(id).filter(|e| query.matches(e)).cloned().collect(),
            None => log
                .events
                .iter()
                .filter(|e| query.matches(e))
                .cloned()
                .collect(),
        };

        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.event_id.as_uuid().cmp(&b.event_id.as_uuid()))
        });
        if query.order == SortOrder::Descending {
            events.reverse();
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.query_events(EventQuery::for_event_type(event_type))
            .await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        self.ensure_available()?;
        let events = self.log.read().await.events.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        self.ensure_available()?;
        let log = self.log.read().await;
        Ok(log.stream(aggregate_id).last().map(|e| e.version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.ensure_available()?;
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.aggregate_id.clone(), snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: &AggregateId) -> Result<Option<Snapshot>> {
        self.ensure_available()?;
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(aggregate_id).cloned())
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_available()
    }
}
