use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, EventEnvelope, EventId, Version};

/// Order in which query results are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Position of one event in the global `(timestamp, event_id)` order.
///
/// Used for keyset pagination: the cursor of the last item of a page is
/// handed back to fetch the items strictly beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCursor {
    pub timestamp: DateTime<Utc>,
    pub event_id: EventId,
}

impl EventCursor {
    pub fn of(event: &EventEnvelope) -> Self {
        Self {
            timestamp: event.timestamp,
            event_id: event.event_id,
        }
    }

    fn key(&self) -> (DateTime<Utc>, uuid::Uuid) {
        (self.timestamp, self.event_id.as_uuid())
    }

    /// Whether `event` lies strictly beyond this cursor in `order`.
    pub fn precedes(&self, event: &EventEnvelope, order: SortOrder) -> bool {
        let other = (event.timestamp, event.event_id.as_uuid());
        match order {
            SortOrder::Ascending => other > self.key(),
            SortOrder::Descending => other < self.key(),
        }
    }
}

/// Builder for constructing event queries.
///
/// Allows filtering events by aggregate, event type, version range, time
/// range and metadata, with keyset or offset pagination.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by aggregate ID.
    pub aggregate_id: Option<AggregateId>,

    /// Filter by aggregate type.
    pub aggregate_type: Option<String>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<String>>,

    /// Filter by minimum version (inclusive).
    pub from_version: Option<Version>,

    /// Filter by maximum version (inclusive).
    pub to_version: Option<Version>,

    /// Filter by events after this timestamp (inclusive).
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by events before this timestamp (inclusive).
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Only events whose metadata contains this key.
    pub metadata_key: Option<String>,

    /// Only events strictly beyond this cursor in `order`.
    pub after: Option<EventCursor>,

    /// Result ordering by `(timestamp, event_id)`.
    pub order: SortOrder,

    /// Maximum number of events to return.
    pub limit: Option<usize>,

    /// Number of events to skip.
    pub offset: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific aggregate.
    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    /// Creates a query for events of a specific type.
    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    /// Filters by aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Filters by aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Filters by event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    /// Filters by multiple event types (any of these).
    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Filters to events starting from this version (inclusive).
    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    /// Filters to events up to this version (inclusive).
    pub fn to_version(mut self, version: Version) -> Self {
        self.to_version = Some(version);
        self
    }

    /// Filters to events after this timestamp (inclusive).
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters to events before this timestamp (inclusive).
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Keeps only events carrying the given metadata key.
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = Some(key.into());
        self
    }

    /// Continues a keyset scan strictly beyond `cursor`.
    pub fn after(mut self, cursor: EventCursor) -> Self {
        self.after = Some(cursor);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Shorthand for newest-first ordering.
    pub fn descending(self) -> Self {
        self.order(SortOrder::Descending)
    }

    /// Limits the number of events returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many events before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a single event passes every filter of this query.
    ///
    /// Pagination (`limit`/`offset`) is applied by the caller.
    pub fn matches(&self, e: &EventEnvelope) -> bool {
        if let Some(ref id) = self.aggregate_id
            && &e.aggregate_id != id
        {
            return false;
        }
        if let Some(ref agg_type) = self.aggregate_type
            && &e.aggregate_type != agg_type
        {
            return false;
        }
        if let Some(ref types) = self.event_types
            && !types.contains(&e.event_type)
        {
            return false;
        }
        if let Some(from) = self.from_version
            && e.version < from
        {
            return false;
        }
        if let Some(to) = self.to_version
            && e.version > to
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && e.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && e.timestamp > to
        {
            return false;
        }
        if let Some(ref key) = self.metadata_key
            && !e.metadata.contains_key(key)
        {
            return false;
        }
        if let Some(cursor) = self.after
            && !cursor.precedes(e, self.order)
        {
            return false;
        }
        true
    }
}
