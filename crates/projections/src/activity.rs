//! Activity log: audited events read back newest first.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{AUDIT_METADATA_KEY, AuditEntry, EventCursor, EventId, EventQuery, EventStore};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 200;

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub aggregate_id: AggregateId,
    pub audit: AuditEntry,
}

impl ActivityRecord {
    pub fn cursor(&self) -> EventCursor {
        EventCursor {
            timestamp: self.timestamp,
            event_id: self.event_id,
        }
    }
}

/// A page of activity plus the cursor for the page after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPage {
    pub entries: Vec<ActivityRecord>,
    /// `None` once the log is exhausted.
    pub next: Option<EventCursor>,
}

/// Reads the audit trail straight from the event store.
///
/// Every audited event carries its entry in metadata, so there is no separate
/// projection to keep in sync.
pub struct ActivityLog<S: EventStore> {
    store: S,
}

impl<S: EventStore> ActivityLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns up to `limit` records older than `before`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn page(&self, before: Option<EventCursor>, limit: usize) -> Result<ActivityPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let mut query = EventQuery::new()
            .with_metadata_key(AUDIT_METADATA_KEY)
            .descending()
            .limit(limit + 1);
        if let Some(cursor) = before {
            query = query.after(cursor);
        }

        let mut events = self.store.query_events(query).await?;
        let has_more = events.len() > limit;
        events.truncate(limit);

        let entries: Vec<ActivityRecord> = events
            .into_iter()
            .filter_map(|event| {
                let audit = event.audit()?;
                Some(ActivityRecord {
                    event_id: event.event_id,
                    timestamp: event.timestamp,
                    event_type: event.event_type,
                    aggregate_id: event.aggregate_id,
                    audit,
                })
            })
            .collect();

        let next = if has_more {
            entries.last().map(ActivityRecord::cursor)
        } else {
            None
        };

        Ok(ActivityPage { entries, next })
    }
}
