//! Traits shared by the slice, booking and cancellation aggregates.

use common::AggregateId;
use event_store::{AuditEntry, DEFAULT_SNAPSHOT_SCHEMA, Version};
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded on a stream, named in the past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored in the envelope's `event_type` column.
    fn event_type(&self) -> &'static str;

    /// Who decided this event and what it touched. Only events that record an
    /// actor's decision return one; those are what the activity log lists.
    fn audit(&self) -> Option<AuditEntry> {
        None
    }
}

/// State rebuilt by folding a stream's events, in version order, into
/// `Default::default()`.
///
/// `apply` runs for freshly decided events and during replay alike. It must
/// not fail and must not read anything besides `self` and the event, or a
/// reload would disagree with the writer that decided the event.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;
    type Error: std::error::Error + Send + Sync;

    /// Stored as the envelope's `aggregate_type`; also keys snapshots.
    fn aggregate_type() -> &'static str;

    /// `None` until the stream's opening event has been applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        events.into_iter().for_each(|event| self.apply(event));
    }
}

/// An aggregate whose serialized state may stand in for a stream prefix.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// A snapshot is taken whenever the version is a multiple of this.
    const SNAPSHOT_EVERY: i64 = 50;

    /// Revision of the serialized layout. Snapshots written under another
    /// revision are never restored; the stream is replayed instead.
    const SNAPSHOT_SCHEMA: u32 = DEFAULT_SNAPSHOT_SCHEMA;

    fn snapshot_due(&self) -> bool {
        let version = self.version().as_i64();
        version > 0 && version % Self::SNAPSHOT_EVERY == 0
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    /// A gate counting admissions; enough state to exercise the fold.
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Gate {
        id: Option<AggregateId>,
        admitted: u32,
        closed: bool,
        version: Version,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum GateEvent {
        Opened { gate: String },
        Admitted { count: u32 },
        Closed,
    }

    impl DomainEvent for GateEvent {
        fn event_type(&self) -> &'static str {
            match self {
                GateEvent::Opened { .. } => "GateOpened",
                GateEvent::Admitted { .. } => "GateAdmitted",
                GateEvent::Closed => "GateClosed",
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("gate is closed")]
    struct GateClosed;

    impl Aggregate for Gate {
        type Event = GateEvent;
        type Error = GateClosed;

        fn aggregate_type() -> &'static str {
            "Gate"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id.clone()
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: GateEvent) {
            match event {
                GateEvent::Opened { gate } => self.id = Some(AggregateId::new(format!("gate:{gate}"))),
                GateEvent::Admitted { count } => self.admitted += count,
                GateEvent::Closed => self.closed = true,
            }
        }
    }

    impl SnapshotCapable for Gate {
        const SNAPSHOT_EVERY: i64 = 3;
    }

    #[test]
    fn fold_builds_state_in_order() {
        let mut gate = Gate::default();
        assert!(gate.id().is_none());

        gate.apply_events([
            GateEvent::Opened {
                gate: "north".to_string(),
            },
            GateEvent::Admitted { count: 2 },
            GateEvent::Admitted { count: 5 },
            GateEvent::Closed,
        ]);

        assert_eq!(gate.id(), Some(AggregateId::new("gate:north")));
        assert_eq!(gate.admitted, 7);
        assert!(gate.closed);
    }

    #[test]
    fn events_carry_no_audit_unless_they_opt_in() {
        assert_eq!(GateEvent::Closed.event_type(), "GateClosed");
        assert!(GateEvent::Admitted { count: 1 }.audit().is_none());
    }

    #[test]
    fn snapshots_fall_due_on_multiples_of_the_interval() {
        let due: Vec<i64> = (0..=9)
            .filter(|&v| {
                let mut gate = Gate::default();
                gate.set_version(Version::new(v));
                gate.snapshot_due()
            })
            .collect();

        assert_eq!(due, vec![3, 6, 9]);
        assert_eq!(Gate::SNAPSHOT_SCHEMA, DEFAULT_SNAPSHOT_SCHEMA);
    }
}
