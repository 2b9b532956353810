use common::Actor;
use serde::{Deserialize, Serialize};

use crate::EventEnvelope;

/// Metadata key under which an event carries its audit entry.
pub const AUDIT_METADATA_KEY: &str = "audit";

/// Who did what to which units, attached to the event that did it.
///
/// The carrying event supplies the timestamp and a stable id, so the
/// activity log is just the audited events read back in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: String,
    /// Slice key or record id the action applied to.
    pub scope: String,
    pub affected_unit_ids: Vec<String>,
    pub count: usize,
    pub note: Option<String>,
}

impl AuditEntry {
    pub fn new(
        actor: Actor,
        action: impl Into<String>,
        scope: impl Into<String>,
        affected_unit_ids: Vec<String>,
    ) -> Self {
        let count = affected_unit_ids.len();
        Self {
            actor,
            action: action.into(),
            scope: scope.into(),
            affected_unit_ids,
            count,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl EventEnvelope {
    /// Reads the audit entry attached to this event, if any.
    pub fn audit(&self) -> Option<AuditEntry> {
        self.metadata
            .get(AUDIT_METADATA_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregateId, Version};

    #[test]
    fn audit_entry_round_trips_through_metadata() {
        let entry = AuditEntry::new(
            Actor::admin("u-1", "Asha"),
            "block",
            "havan:2024-05-01:morning",
            vec!["A-C1-R1-S1".to_string(), "A-C1-R1-S2".to_string()],
        )
        .with_note("maintenance");

        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new("slice:havan:2024-05-01:morning"))
            .aggregate_type("AvailabilitySlice")
            .event_type("UnitsBlocked")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .metadata(AUDIT_METADATA_KEY, serde_json::to_value(&entry).unwrap())
            .build()
            .unwrap();

        let read = envelope.audit().unwrap();
        assert_eq!(read.count, 2);
        assert_eq!(read, entry);
    }

    #[test]
    fn events_without_audit_metadata_return_none() {
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new("booking:1"))
            .aggregate_type("Booking")
            .event_type("BookingPlaced")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap();
        assert!(envelope.audit().is_none());
    }
}
