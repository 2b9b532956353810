//! Store wrapper for exercising partial failures in service tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventQuery, EventStore, EventStoreError,
    EventStream, InMemoryEventStore, Result, Snapshot, Version,
};

#[derive(Default)]
struct Faults {
    /// Appends whose first event has this type fail as unavailable.
    fail_event_type: Option<&'static str>,
    /// Appends whose first event has this type lose a version race.
    contend_event_type: Option<&'static str>,
    /// Appends to streams of this aggregate type are stamped this far back.
    backdate: Option<(&'static str, Duration)>,
}

/// An [`InMemoryEventStore`] whose appends can be made to fail, to lose
/// version races, or to carry timestamps older than the ones already stored.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryEventStore,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryEventStore {
        &self.inner
    }

    pub fn fail_appends_of(&self, event_type: &'static str) {
        self.faults.lock().unwrap().fail_event_type = Some(event_type);
    }

    pub fn contend_appends_of(&self, event_type: &'static str) {
        self.faults.lock().unwrap().contend_event_type = Some(event_type);
    }

    pub fn backdate_appends_to(&self, aggregate_type: &'static str, by: Duration) {
        self.faults.lock().unwrap().backdate = Some((aggregate_type, by));
    }

    pub fn heal(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }
}

#[async_trait]
impl EventStore for FaultyStore {
    async fn append(&self, mut events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        {
            let faults = self.faults.lock().unwrap();
            if let Some(first) = events.first()
                && faults.fail_event_type == Some(first.event_type.as_str())
            {
                return Err(EventStoreError::Unavailable(format!(
                    "{} appends switched off",
                    first.event_type
                )));
            }
            if let Some(first) = events.first()
                && faults.contend_event_type == Some(first.event_type.as_str())
            {
                let expected = options.expected_version.unwrap_or_else(Version::initial);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id.clone(),
                    expected,
                    actual: expected.next(),
                });
            }
            if let Some((aggregate_type, by)) = faults.backdate {
                for event in events.iter_mut().filter(|e| e.aggregate_type == aggregate_type) {
                    event.timestamp -= by;
                }
            }
        }
        self.inner.append(events, options).await
    }

    async fn get_events_for_aggregate(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        self.inner.get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: &AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        self.inner
            .get_events_for_aggregate_from_version(aggregate_id, from_version)
            .await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        self.inner.query_events(query).await
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.inner.get_events_by_type(event_type).await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        self.inner.stream_all_events().await
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        self.inner.get_aggregate_version(aggregate_id).await
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.inner.save_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, aggregate_id: &AggregateId) -> Result<Option<Snapshot>> {
        self.inner.get_snapshot(aggregate_id).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
