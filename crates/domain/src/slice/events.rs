//! Availability slice events.

use chrono::{DateTime, Utc};
use common::{Actor, BookingId, SliceKey};
use event_store::AuditEntry;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::BookingClaim;

/// Events recorded on an availability slice stream.
///
/// Unit ids are stored as plain strings so streams written before ids were
/// canonical still replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SliceEvent {
    UnitsBooked(UnitsBookedData),
    UnitsBlocked(UnitsBlockedData),
    UnitsUnblocked(UnitsUnblockedData),
    UnitsReleased(UnitsReleasedData),
    UnitIdsMigrated(UnitIdsMigratedData),
}

impl DomainEvent for SliceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SliceEvent::UnitsBooked(_) => "UnitsBooked",
            SliceEvent::UnitsBlocked(_) => "UnitsBlocked",
            SliceEvent::UnitsUnblocked(_) => "UnitsUnblocked",
            SliceEvent::UnitsReleased(_) => "UnitsReleased",
            SliceEvent::UnitIdsMigrated(_) => "UnitIdsMigrated",
        }
    }

    fn audit(&self) -> Option<AuditEntry> {
        let entry = match self {
            SliceEvent::UnitsBooked(data) => AuditEntry::new(
                data.actor.clone(),
                "book",
                data.slice_key.to_string(),
                data.unit_ids.clone(),
            )
            .with_note(format!("booking {}", data.claim.booking_id)),
            SliceEvent::UnitsBlocked(data) => AuditEntry::new(
                data.actor.clone(),
                "block",
                data.slice_key.to_string(),
                data.unit_ids.clone(),
            )
            .with_note(data.reason.clone()),
            SliceEvent::UnitsUnblocked(data) => AuditEntry::new(
                data.actor.clone(),
                "unblock",
                data.slice_key.to_string(),
                data.unit_ids.clone(),
            ),
            SliceEvent::UnitsReleased(data) => AuditEntry::new(
                data.actor.clone(),
                "release",
                data.slice_key.to_string(),
                data.unit_ids.clone(),
            )
            .with_note(format!("booking {}", data.booking_id)),
            SliceEvent::UnitIdsMigrated(data) => AuditEntry::new(
                data.actor.clone(),
                "migrate_legacy_ids",
                data.slice_key.to_string(),
                data.renamed.iter().map(|(_, new)| new.clone()).collect(),
            ),
        };
        Some(entry)
    }
}

impl SliceEvent {
    pub fn slice_key(&self) -> &SliceKey {
        match self {
            SliceEvent::UnitsBooked(data) => &data.slice_key,
            SliceEvent::UnitsBlocked(data) => &data.slice_key,
            SliceEvent::UnitsUnblocked(data) => &data.slice_key,
            SliceEvent::UnitsReleased(data) => &data.slice_key,
            SliceEvent::UnitIdsMigrated(data) => &data.slice_key,
        }
    }

    /// Unit ids whose state this event changed.
    pub fn unit_ids(&self) -> Vec<String> {
        match self {
            SliceEvent::UnitsBooked(data) => data.unit_ids.clone(),
            SliceEvent::UnitsBlocked(data) => data.unit_ids.clone(),
            SliceEvent::UnitsUnblocked(data) => data.unit_ids.clone(),
            SliceEvent::UnitsReleased(data) => data.unit_ids.clone(),
            SliceEvent::UnitIdsMigrated(data) => {
                data.renamed.iter().map(|(_, new)| new.clone()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsBookedData {
    pub slice_key: SliceKey,
    pub unit_ids: Vec<String>,
    pub claim: BookingClaim,
    pub actor: Actor,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsBlockedData {
    pub slice_key: SliceKey,
    pub unit_ids: Vec<String>,
    pub reason: String,
    pub actor: Actor,
    pub blocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsUnblockedData {
    pub slice_key: SliceKey,
    pub unit_ids: Vec<String>,
    pub actor: Actor,
    pub unblocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsReleasedData {
    pub slice_key: SliceKey,
    pub unit_ids: Vec<String>,
    pub booking_id: BookingId,
    pub actor: Actor,
    pub released_at: DateTime<Utc>,
}

/// Legacy keys rewritten to canonical ids, as `(legacy, canonical)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitIdsMigratedData {
    pub slice_key: SliceKey,
    pub renamed: Vec<(String, String)>,
    pub actor: Actor,
    pub migrated_at: DateTime<Utc>,
}

impl SliceEvent {
    pub fn units_booked(
        slice_key: SliceKey,
        unit_ids: Vec<String>,
        claim: BookingClaim,
        actor: Actor,
    ) -> Self {
        SliceEvent::UnitsBooked(UnitsBookedData {
            slice_key,
            unit_ids,
            claim,
            actor,
            booked_at: Utc::now(),
        })
    }

    pub fn units_blocked(
        slice_key: SliceKey,
        unit_ids: Vec<String>,
        reason: impl Into<String>,
        actor: Actor,
    ) -> Self {
        SliceEvent::UnitsBlocked(UnitsBlockedData {
            slice_key,
            unit_ids,
            reason: reason.into(),
            actor,
            blocked_at: Utc::now(),
        })
    }

    pub fn units_unblocked(slice_key: SliceKey, unit_ids: Vec<String>, actor: Actor) -> Self {
        SliceEvent::UnitsUnblocked(UnitsUnblockedData {
            slice_key,
            unit_ids,
            actor,
            unblocked_at: Utc::now(),
        })
    }

    pub fn units_released(
        slice_key: SliceKey,
        unit_ids: Vec<String>,
        booking_id: BookingId,
        actor: Actor,
    ) -> Self {
        SliceEvent::UnitsReleased(UnitsReleasedData {
            slice_key,
            unit_ids,
            booking_id,
            actor,
            released_at: Utc::now(),
        })
    }

    pub fn unit_ids_migrated(
        slice_key: SliceKey,
        renamed: Vec<(String, String)>,
        actor: Actor,
    ) -> Self {
        SliceEvent::UnitIdsMigrated(UnitIdsMigratedData {
            slice_key,
            renamed,
            actor,
            migrated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::InventoryKind;

    fn key() -> SliceKey {
        SliceKey::shift(
            InventoryKind::HavanSeat,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            "morning",
        )
        .unwrap()
    }

    #[test]
    fn blocked_event_audit_carries_reason_and_count() {
        let event = SliceEvent::units_blocked(
            key(),
            vec!["A-C1-R1-S1".to_string(), "A-C1-R1-S2".to_string()],
            "priest seating",
            Actor::admin("adm-1", "Ravi"),
        );

        assert_eq!(event.event_type(), "UnitsBlocked");
        let audit = event.audit().unwrap();
        assert_eq!(audit.action, "block");
        assert_eq!(audit.scope, "havan:2024-05-01:morning");
        assert_eq!(audit.count, 2);
        assert_eq!(audit.note.as_deref(), Some("priest seating"));
    }

    #[test]
    fn event_serialization() {
        let booking_id = BookingId::new();
        let event = SliceEvent::units_booked(
            key(),
            vec!["A-C1-R1-S1".to_string()],
            BookingClaim {
                booking_id,
                user_id: "u-7".to_string(),
                customer_name: "Meera".to_string(),
            },
            Actor::system("checkout"),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("UnitsBooked"));

        let deserialized: SliceEvent = serde_json::from_str(&json).unwrap();
        if let SliceEvent::UnitsBooked(data) = deserialized {
            assert_eq!(data.claim.booking_id, booking_id);
            assert_eq!(data.slice_key, key());
        } else {
            panic!("Expected UnitsBooked event");
        }
    }

    #[test]
    fn migration_reports_new_ids() {
        let event = SliceEvent::unit_ids_migrated(
            key(),
            vec![("A-1-1-1".to_string(), "A-C1-R1-S1".to_string())],
            Actor::admin("adm-1", "Ravi"),
        );
        assert_eq!(event.unit_ids(), vec!["A-C1-R1-S1".to_string()]);
        assert_eq!(event.audit().unwrap().action, "migrate_legacy_ids");
    }
}
