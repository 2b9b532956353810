//! Load, decide, commit.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{
    AUDIT_METADATA_KEY, AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot,
    StreamLoad, Version,
};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Outcome of a committed decision.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// State with the new events applied.
    pub aggregate: A,
    pub events: Vec<A::Event>,
    /// Stream version after the commit; unchanged when nothing was decided.
    pub new_version: Version,
}

/// An intention addressed to one aggregate stream.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_id(&self) -> AggregateId;
}

/// Rebuilds aggregates from their streams and commits decided events.
///
/// [`execute`](Self::execute) covers the usual load, decide and commit round
/// trip. Callers that retry on conflict or batch several decisions (the
/// allocation coordinator) drive [`load`](Self::load) and
/// [`commit`](Self::commit) themselves.
pub struct CommandHandler<S, A> {
    store: S,
    _aggregate: PhantomData<fn() -> A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _aggregate: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current state of the stream; `A::default()` at version 0 if it was
    /// never written.
    pub async fn load(&self, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let StreamLoad { snapshot, events } = self
            .store
            .load_aggregate(aggregate_id, A::aggregate_type(), A::SNAPSHOT_SCHEMA)
            .await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => snapshot.restore::<A>()?,
            None => A::default(),
        };
        for envelope in events {
            aggregate.apply(serde_json::from_value(envelope.payload)?);
            aggregate.set_version(envelope.version);
        }
        Ok(aggregate)
    }

    /// Like [`load`](Self::load), but `None` when the stream has not been
    /// opened.
    pub async fn load_existing(&self, aggregate_id: &AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Appends `events` on top of `base_version`, the version they were
    /// decided against.
    ///
    /// Fails with a concurrency conflict if the stream moved on since.
    pub async fn commit(
        &self,
        aggregate_id: &AggregateId,
        base_version: Version,
        events: &[A::Event],
    ) -> Result<Version, DomainError> {
        if events.is_empty() {
            return Ok(base_version);
        }

        let options = if base_version.is_initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(base_version)
        };
        let envelopes = envelopes::<A>(aggregate_id, base_version, events)?;
        Ok(self.store.append(envelopes, options).await?)
    }

    /// Loads the stream, lets `decide` turn the current state into events and
    /// commits them. A decision with no events writes nothing.
    pub async fn execute<F>(
        &self,
        aggregate_id: &AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let base_version = aggregate.version();
        let events = decide(&aggregate)?;

        let new_version = self.commit(aggregate_id, base_version, &events).await?;
        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// [`execute`](Self::execute), then a snapshot if one fell due.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: &AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, decide).await?;
        self.snapshot_if_due(aggregate_id, &result.aggregate).await?;
        Ok(result)
    }

    /// Saves `aggregate` as the stream's snapshot when its version is on the
    /// snapshot interval. Returns whether one was written.
    pub async fn snapshot_if_due(
        &self,
        aggregate_id: &AggregateId,
        aggregate: &A,
    ) -> Result<bool, DomainError> {
        if !aggregate.snapshot_due() {
            return Ok(false);
        }
        let snapshot = Snapshot::capture(
            aggregate_id.clone(),
            A::aggregate_type(),
            aggregate.version(),
            aggregate,
        )?
        .with_schema(A::SNAPSHOT_SCHEMA);
        self.store.save_snapshot(snapshot).await?;
        tracing::debug!(%aggregate_id, version = %aggregate.version(), "saved snapshot");
        Ok(true)
    }
}

fn envelopes<A: Aggregate>(
    aggregate_id: &AggregateId,
    base_version: Version,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut version = base_version;
    events
        .iter()
        .map(|event| -> Result<EventEnvelope, DomainError> {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id.clone())
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            if let Some(audit) = event.audit() {
                builder = builder.metadata(AUDIT_METADATA_KEY, serde_json::to_value(&audit)?);
            }
            Ok(builder.build()?)
        })
        .collect()
}
