use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Snapshot, SortOrder,
    Version, store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const SELECT_EVENTS: &str = "SELECT id, event_type, aggregate_id, aggregate_type, version, \
                             timestamp, payload, metadata FROM events";

const VERSION_CONSTRAINT: &str = "unique_aggregate_version";

/// Advisory lock key serializing appends, so `sequence` order is commit order.
const APPEND_LOCK: i64 = 0x5e9_1ce;

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    aggregate_id: String,
    aggregate_type: String,
    version: i64,
    timestamp: DateTime<Utc>,
    payload: serde_json::Value,
    metadata: serde_json::Value,
}

impl TryFrom<EventRow> for EventEnvelope {
    type Error = EventStoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Self {
            event_id: EventId::from_uuid(row.id),
            event_type: row.event_type,
            aggregate_id: AggregateId::new(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            version: Version::new(row.version),
            timestamp: row.timestamp,
            payload: row.payload,
            metadata: serde_json::from_value(row.metadata)?,
        })
    }
}

#[derive(FromRow)]
struct SnapshotRow {
    aggregate_id: String,
    aggregate_type: String,
    version: i64,
    schema_version: i32,
    taken_at: DateTime<Utc>,
    state: serde_json::Value,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            aggregate_id: AggregateId::new(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            version: Version::new(row.version),
            schema: row.schema_version.max(0) as u32,
            taken_at: row.taken_at,
            state: row.state,
        }
    }
}

fn into_envelopes(rows: Vec<EventRow>) -> Result<Vec<EventEnvelope>> {
    rows.into_iter().map(EventEnvelope::try_from).collect()
}

/// Event store over the `events` and `snapshots` tables.
///
/// Every append runs in one transaction. The `unique_aggregate_version`
/// constraint settles races that slip past the version read, so two writers
/// can never both land the same stream version.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens a pool on `database_url` and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        tracing::info!(max_connections, "connected to postgres event store");
        Ok(store)
    }

    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn fetch_events(&self, mut query: QueryBuilder<'_, Postgres>) -> Result<Vec<EventEnvelope>> {
        let rows: Vec<EventRow> = query.build_query_as().fetch_all(&self.pool).await?;
        into_envelopes(rows)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;
        let aggregate_id = events[0].aggregate_id.clone();

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK)
            .execute(&mut *tx)
            .await?;

        let current: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_one(&mut *tx)
                .await?;
        let current = Version::new(current);

        if let Some(expected) = options.expected_version
            && expected != current
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        let mut insert = QueryBuilder::<Postgres>::new(
            "INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata) ",
        );
        let mut rows = Vec::with_capacity(events.len());
        for event in &events {
            rows.push((event, serde_json::to_value(&event.metadata)?));
        }
        insert.push_values(rows, |mut row, (event, metadata)| {
            row.push_bind(event.event_id.as_uuid())
                .push_bind(event.event_type.clone())
                .push_bind(event.aggregate_id.as_str().to_string())
                .push_bind(event.aggregate_type.clone())
                .push_bind(event.version.as_i64())
                .push_bind(event.timestamp)
                .push_bind(event.payload.clone())
                .push_bind(metadata);
        });

        insert.build().execute(&mut *tx).await.map_err(|err| {
            // A racing writer committed between our version read and insert.
            if let sqlx::Error::Database(ref db) = err
                && db.constraint() == Some(VERSION_CONSTRAINT)
            {
                return EventStoreError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.clone(),
                    expected: options.expected_version.unwrap_or(current),
                    actual: current.next(),
                };
            }
            EventStoreError::from(err)
        })?;

        tx.commit().await?;

        let last = events.last().map_or(current, |e| e.version);
        tracing::debug!(%aggregate_id, %last, count = events.len(), "appended events");
        Ok(last)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::first())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: &AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let mut query = QueryBuilder::new(SELECT_EVENTS);
        query
            .push(" WHERE aggregate_id = ")
            .push_bind(aggregate_id.as_str().to_string())
            .push(" AND version >= ")
            .push_bind(from_version.as_i64())
            .push(" ORDER BY version");
        self.fetch_events(query).await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = QueryBuilder::new(SELECT_EVENTS);
        sql.push(" WHERE TRUE");

        if let Some(id) = query.aggregate_id {
            sql.push(" AND aggregate_id = ").push_bind(id.as_str().to_string());
        }
        if let Some(aggregate_type) = query.aggregate_type {
            sql.push(" AND aggregate_type = ").push_bind(aggregate_type);
        }
        if let Some(event_types) = query.event_types {
            sql.push(" AND event_type = ANY(").push_bind(event_types).push(")");
        }
        if let Some(from) = query.from_version {
            sql.push(" AND version >= ").push_bind(from.as_i64());
        }
        if let Some(to) = query.to_version {
            sql.push(" AND version <= ").push_bind(to.as_i64());
        }
        if let Some(from) = query.from_timestamp {
            sql.push(" AND timestamp >= ").push_bind(from);
        }
        if let Some(to) = query.to_timestamp {
            sql.push(" AND timestamp <= ").push_bind(to);
        }
        if let Some(key) = query.metadata_key {
            sql.push(" AND metadata ? ").push_bind(key);
        }

        let (cmp, direction) = match query.order {
            SortOrder::Ascending => (">", "ASC"),
            SortOrder::Descending => ("<", "DESC"),
        };
        if let Some(cursor) = query.after {
            sql.push(format!(" AND (timestamp, id) {cmp} ("))
                .push_bind(cursor.timestamp)
                .push(", ")
                .push_bind(cursor.event_id.as_uuid())
                .push(")");
        }
        sql.push(format!(" ORDER BY timestamp {direction}, id {direction}"));

        if let Some(limit) = query.limit {
            sql.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sql.push(" OFFSET ").push_bind(offset as i64);
        }

        self.fetch_events(sql).await
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.query_events(EventQuery::for_event_type(event_type))
            .await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata \
             FROM events ORDER BY sequence",
        )
        .fetch_all(&self.pool)
        .await?;

        let events = into_envelopes(rows)?;
        Ok(Box::pin(futures_util::stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO snapshots (aggregate_id, aggregate_type, version, schema_version, taken_at, state) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (aggregate_id) DO UPDATE SET \
                 aggregate_type = EXCLUDED.aggregate_type, \
                 version = EXCLUDED.version, \
                 schema_version = EXCLUDED.schema_version, \
                 taken_at = EXCLUDED.taken_at, \
                 state = EXCLUDED.state",
        )
        .bind(snapshot.aggregate_id.as_str())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version.as_i64())
        .bind(i32::try_from(snapshot.schema).unwrap_or(i32::MAX))
        .bind(snapshot.taken_at)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: &AggregateId) -> Result<Option<Snapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT aggregate_id, aggregate_type, version, schema_version, taken_at, state \
             FROM snapshots WHERE aggregate_id = $1",
        )
        .bind(aggregate_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Snapshot::from))
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
