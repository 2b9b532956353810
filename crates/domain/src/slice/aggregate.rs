//! Availability slice aggregate implementation.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, SliceKey};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::layout::UnitId;

use super::{SliceError, SliceEvent, Transition, UnitState, UnitStatus};

/// Unit-to-state map for one slice key.
///
/// Only booked and blocked units are stored; every other unit of the layout
/// is available. The stream version is the slice's concurrency token.
///
/// Imported history may store a unit under a legacy key. Until it is
/// migrated that key still holds the unit: reads and plans resolve it, and
/// unblocks and releases remove it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilitySlice {
    key: Option<SliceKey>,

    #[serde(default)]
    version: Version,

    units: BTreeMap<String, UnitState>,

    last_updated: Option<DateTime<Utc>>,
}

/// Requested units split by whether they can take a transition right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlicePlan {
    pub eligible: Vec<UnitId>,
    pub skipped: Vec<UnitId>,
}

impl SlicePlan {
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty()
    }
}

/// What a legacy id migration did, or would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// `(legacy, canonical)` pairs rewritten.
    pub renamed: Vec<(String, String)>,
    /// Legacy keys whose canonical id already holds state; left untouched.
    pub collisions: Vec<String>,
    /// Keys that are neither canonical nor a known legacy format.
    pub unrecognized: Vec<String>,
}

impl Aggregate for AvailabilitySlice {
    type Event = SliceEvent;
    type Error = SliceError;

    fn aggregate_type() -> &'static str {
        "AvailabilitySlice"
    }

    fn id(&self) -> Option<AggregateId> {
        self.key.as_ref().map(AggregateId::slice)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if self.key.is_none() {
            self.key = Some(event.slice_key().clone());
        }

        match event {
            SliceEvent::UnitsBooked(data) => {
                for unit_id in data.unit_ids {
                    self.units.insert(
                        unit_id,
                        UnitState::Booked {
                            booking_id: data.claim.booking_id,
                            user_id: data.claim.user_id.clone(),
                            customer_name: data.claim.customer_name.clone(),
                            booked_at: data.booked_at,
                        },
                    );
                }
                self.last_updated = Some(data.booked_at);
            }
            SliceEvent::UnitsBlocked(data) => {
                for unit_id in data.unit_ids {
                    self.units.insert(
                        unit_id,
                        UnitState::Blocked {
                            reason: data.reason.clone(),
                            blocked_at: data.blocked_at,
                            blocked_by: data.actor.id.clone(),
                        },
                    );
                }
                self.last_updated = Some(data.blocked_at);
            }
            SliceEvent::UnitsUnblocked(data) => {
                for unit_id in &data.unit_ids {
                    if let Some(stored) = self.stored_key_of(unit_id) {
                        self.units.remove(&stored);
                    }
                }
                self.last_updated = Some(data.unblocked_at);
            }
            SliceEvent::UnitsReleased(data) => {
                for unit_id in &data.unit_ids {
                    if let Some(stored) = self.stored_key_of(unit_id)
                        && self.units[&stored].is_booked_by(data.booking_id)
                    {
                        self.units.remove(&stored);
                    }
                }
                self.last_updated = Some(data.released_at);
            }
            SliceEvent::UnitIdsMigrated(data) => {
                for (legacy, canonical) in data.renamed {
                    if let Some(state) = self.units.remove(&legacy) {
                        self.units.insert(canonical, state);
                    }
                }
                self.last_updated = Some(data.migrated_at);
            }
        }
    }
}

impl SnapshotCapable for AvailabilitySlice {}

// Query methods
impl AvailabilitySlice {
    /// An empty slice, as read for a key that was never written.
    pub fn untouched(key: SliceKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn key(&self) -> Option<&SliceKey> {
        self.key.as_ref()
    }

    pub fn units(&self) -> &BTreeMap<String, UnitState> {
        &self.units
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn state_of(&self, unit: &UnitId) -> Option<&UnitState> {
        self.units.get(&unit.to_string()).or_else(|| {
            self.units
                .iter()
                .find(|(stored, _)| UnitId::parse_legacy(stored).as_ref() == Some(unit))
                .map(|(_, state)| state)
        })
    }

    /// Whether any unit is still stored under a legacy key.
    pub fn has_legacy_keys(&self) -> bool {
        self.units.keys().any(|stored| !UnitId::is_canonical(stored))
    }

    /// Legacy keys by the unit they name; the first key wins on duplicates.
    fn legacy_keys(&self) -> HashMap<UnitId, &str> {
        let mut keys = HashMap::new();
        for stored in self.units.keys() {
            if let Some(unit) = UnitId::parse_legacy(stored) {
                keys.entry(unit).or_insert(stored.as_str());
            }
        }
        keys
    }

    /// The key under which the unit named by `unit_id` is stored, if any.
    fn stored_key_of(&self, unit_id: &str) -> Option<String> {
        if self.units.contains_key(unit_id) {
            return Some(unit_id.to_string());
        }
        let unit = UnitId::parse_any(unit_id).ok()?;
        let canonical = unit.to_string();
        if self.units.contains_key(&canonical) {
            return Some(canonical);
        }
        self.legacy_keys().get(&unit).map(|stored| stored.to_string())
    }

    pub fn status_of(&self, unit: &UnitId) -> UnitStatus {
        UnitStatus::of(self.state_of(unit))
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.values().filter(|s| s.status() == status).count()
    }

    /// Units in this slice currently held by `booking`.
    pub fn units_booked_by(&self, booking: common::BookingId) -> Vec<String> {
        self.units
            .iter()
            .filter(|(_, state)| state.is_booked_by(booking))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

// Command methods (return events)
impl AvailabilitySlice {
    /// Splits `units` into those that can take `transition` and those that
    /// cannot. Duplicates collapse onto their first occurrence.
    pub fn plan(&self, units: &[UnitId], transition: &Transition) -> SlicePlan {
        let legacy = self.legacy_keys();
        let mut seen = HashSet::new();
        let mut plan = SlicePlan::default();
        for unit in units {
            if !seen.insert(unit) {
                continue;
            }
            let state = self
                .units
                .get(&unit.to_string())
                .or_else(|| legacy.get(unit).and_then(|stored| self.units.get(*stored)));
            if transition.accepts(state) {
                plan.eligible.push(unit.clone());
            } else {
                plan.skipped.push(unit.clone());
            }
        }
        plan
    }

    /// Produces the single event applying `transition` to `units`.
    ///
    /// Every unit must currently accept the transition.
    pub fn transition(
        &self,
        key: &SliceKey,
        units: &[UnitId],
        transition: &Transition,
        actor: &Actor,
    ) -> Result<Vec<SliceEvent>, SliceError> {
        if units.is_empty() {
            return Err(SliceError::EmptySelection);
        }

        let plan = self.plan(units, transition);
        if !plan.skipped.is_empty() {
            return Err(SliceError::Ineligible {
                transition: transition.kind(),
                unit_ids: plan.skipped.iter().map(UnitId::to_string).collect(),
            });
        }

        let key = key.clone();
        let ids: Vec<String> = plan.eligible.iter().map(UnitId::to_string).collect();
        let actor = actor.clone();
        let event = match transition {
            Transition::Book(claim) => SliceEvent::units_booked(key, ids, claim.clone(), actor),
            Transition::Block { reason } => SliceEvent::units_blocked(key, ids, reason, actor),
            Transition::Unblock => SliceEvent::units_unblocked(key, ids, actor),
            Transition::Release { booking_id } => {
                SliceEvent::units_released(key, ids, *booking_id, actor)
            }
        };
        Ok(vec![event])
    }

    /// Rewrites stored legacy unit keys to canonical ids.
    ///
    /// Produces no event when there is nothing to rename.
    pub fn migrate_legacy_ids(
        &self,
        key: &SliceKey,
        actor: &Actor,
    ) -> (Vec<SliceEvent>, MigrationReport) {
        let mut report = MigrationReport::default();
        let mut claimed: HashSet<String> = HashSet::new();

        for stored in self.units.keys() {
            if UnitId::is_canonical(stored) {
                continue;
            }
            match UnitId::parse_legacy(stored) {
                Some(unit) => {
                    let canonical = unit.to_string();
                    if self.units.contains_key(&canonical) || !claimed.insert(canonical.clone()) {
                        report.collisions.push(stored.clone());
                    } else {
                        report.renamed.push((stored.clone(), canonical));
                    }
                }
                None => report.unrecognized.push(stored.clone()),
            }
        }

        let events = if report.renamed.is_empty() {
            vec![]
        } else {
            vec![SliceEvent::unit_ids_migrated(
                key.clone(),
                report.renamed.clone(),
                actor.clone(),
            )]
        };
        (events, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::{BookingClaim, TransitionKind};
    use chrono::NaiveDate;
    use common::{BookingId, InventoryKind};

    fn key() -> SliceKey {
        SliceKey::shift(
            InventoryKind::Stall,
            NaiveDate::from_ymd_opt(2024, 10, 12).unwrap(),
            "evening",
        )
        .unwrap()
    }

    fn unit(s: &str) -> UnitId {
        s.parse().unwrap()
    }

    fn admin() -> Actor {
        Actor::admin("adm-1", "Ravi")
    }

    fn claim(booking_id: BookingId) -> Transition {
        Transition::Book(BookingClaim {
            booking_id,
            user_id: "u-1".to_string(),
            customer_name: "Asha".to_string(),
        })
    }

    fn run(slice: &mut AvailabilitySlice, units: &[&str], transition: Transition) {
        let units: Vec<UnitId> = units.iter().map(|u| unit(u)).collect();
        let events = slice
            .transition(&key(), &units, &transition, &admin())
            .unwrap();
        slice.apply_events(events);
    }

    #[test]
    fn untouched_slice_is_all_available() {
        let slice = AvailabilitySlice::untouched(key());
        assert_eq!(slice.status_of(&unit("A-C1-R1-S1")), UnitStatus::Available);
        assert!(slice.units().is_empty());
        assert_eq!(slice.version(), Version::initial());
    }

    #[test]
    fn book_block_unblock_release() {
        let mut slice = AvailabilitySlice::default();
        let booking = BookingId::new();

        run(&mut slice, &["A-C1-R1-S1", "A-C1-R1-S2"], claim(booking));
        run(
            &mut slice,
            &["A-C1-R1-S3"],
            Transition::Block {
                reason: "stage".to_string(),
            },
        );

        assert_eq!(slice.key(), Some(&key()));
        assert_eq!(slice.count(UnitStatus::Booked), 2);
        assert_eq!(slice.status_of(&unit("A-C1-R1-S3")), UnitStatus::Blocked);
        assert!(slice.last_updated().is_some());

        run(&mut slice, &["A-C1-R1-S3"], Transition::Unblock);
        assert_eq!(slice.status_of(&unit("A-C1-R1-S3")), UnitStatus::Available);

        run(
            &mut slice,
            &["A-C1-R1-S1", "A-C1-R1-S2"],
            Transition::Release { booking_id: booking },
        );
        assert!(slice.units().is_empty());
    }

    #[test]
    fn plan_skips_ineligible_and_collapses_duplicates() {
        let mut slice = AvailabilitySlice::default();
        run(&mut slice, &["A-C1-R1-S1"], claim(BookingId::new()));

        let requested = [unit("A-C1-R1-S2"), unit("A-C1-R1-S1"), unit("A-C1-R1-S2")];
        let plan = slice.plan(
            &requested,
            &Transition::Block {
                reason: "x".to_string(),
            },
        );

        assert_eq!(plan.eligible, vec![unit("A-C1-R1-S2")]);
        assert_eq!(plan.skipped, vec![unit("A-C1-R1-S1")]);
    }

    #[test]
    fn transition_rejects_ineligible_units() {
        let mut slice = AvailabilitySlice::default();
        run(&mut slice, &["A-C1-R1-S1"], claim(BookingId::new()));

        let result = slice.transition(
            &key(),
            &[unit("A-C1-R1-S1"), unit("A-C1-R1-S2")],
            &claim(BookingId::new()),
            &admin(),
        );
        match result {
            Err(SliceError::Ineligible {
                transition,
                unit_ids,
            }) => {
                assert_eq!(transition, TransitionKind::Book);
                assert_eq!(unit_ids, vec!["A-C1-R1-S1".to_string()]);
            }
            other => panic!("expected Ineligible, got {other:?}"),
        }

        let empty = slice.transition(&key(), &[], &Transition::Unblock, &admin());
        assert!(matches!(empty, Err(SliceError::EmptySelection)));
    }

    #[test]
    fn release_ignores_units_of_other_bookings() {
        let mut slice = AvailabilitySlice::default();
        let mine = BookingId::new();
        let theirs = BookingId::new();
        run(&mut slice, &["A-C1-R1-S1"], claim(mine));
        run(&mut slice, &["A-C1-R1-S2"], claim(theirs));

        let plan = slice.plan(
            &[unit("A-C1-R1-S1"), unit("A-C1-R1-S2")],
            &Transition::Release { booking_id: mine },
        );
        assert_eq!(plan.eligible, vec![unit("A-C1-R1-S1")]);
        assert_eq!(slice.units_booked_by(theirs), vec!["A-C1-R1-S2".to_string()]);
    }

    #[test]
    fn migrate_renames_legacy_keys_once() {
        let mut slice = AvailabilitySlice::default();
        slice.apply(SliceEvent::units_blocked(
            key(),
            vec![
                "A-1-1-1".to_string(),
                "B2-1-3".to_string(),
                "A-C1-R1-S2".to_string(),
            ],
            "legacy",
            admin(),
        ));

        let (events, report) = slice.migrate_legacy_ids(&key(), &admin());
        assert_eq!(events.len(), 1);
        assert_eq!(
            report.renamed,
            vec![
                ("A-1-1-1".to_string(), "A-C1-R1-S1".to_string()),
                ("B2-1-3".to_string(), "B-C2-R1-S3".to_string()),
            ]
        );
        slice.apply_events(events);

        assert_eq!(slice.status_of(&unit("A-C1-R1-S1")), UnitStatus::Blocked);
        assert_eq!(slice.status_of(&unit("B-C2-R1-S3")), UnitStatus::Blocked);
        assert!(!slice.units().contains_key("A-1-1-1"));

        let (again, report) = slice.migrate_legacy_ids(&key(), &admin());
        assert!(again.is_empty());
        assert!(report.renamed.is_empty());
    }

    #[test]
    fn migrate_never_merges_into_existing_canonical_key() {
        let mut slice = AvailabilitySlice::default();
        slice.apply(SliceEvent::units_blocked(
            key(),
            vec![
                "A-1-1-1".to_string(),
                "A1-1-1".to_string(),
                "A-C1-R1-S1".to_string(),
                "???".to_string(),
            ],
            "legacy",
            admin(),
        ));

        let (events, report) = slice.migrate_legacy_ids(&key(), &admin());
        assert!(events.is_empty());
        assert_eq!(report.collisions.len(), 2);
        assert_eq!(report.unrecognized, vec!["???".to_string()]);
    }

    #[test]
    fn legacy_keys_hold_their_units_until_migrated() {
        let mut slice = AvailabilitySlice::default();
        let booking = BookingId::new();
        slice.apply(SliceEvent::units_booked(
            key(),
            vec!["A-1-1-1".to_string()],
            BookingClaim {
                booking_id: booking,
                user_id: "u-1".to_string(),
                customer_name: "Asha".to_string(),
            },
            admin(),
        ));
        slice.apply(SliceEvent::units_blocked(
            key(),
            vec!["A2-1-1".to_string()],
            "imported",
            admin(),
        ));
        assert!(slice.has_legacy_keys());
        assert_eq!(slice.status_of(&unit("A-C1-R1-S1")), UnitStatus::Booked);

        let block = Transition::Block {
            reason: "stage".to_string(),
        };
        let plan = slice.plan(&[unit("A-C1-R1-S1"), unit("A-C2-R1-S1")], &block);
        assert!(plan.eligible.is_empty());
        assert_eq!(plan.skipped.len(), 2);
        assert!(slice.transition(&key(), &[unit("A-C1-R1-S1")], &claim(BookingId::new()), &admin()).is_err());

        run(&mut slice, &["A-C2-R1-S1"], Transition::Unblock);
        run(&mut slice, &["A-C1-R1-S1"], Transition::Release { booking_id: booking });
        assert!(slice.units().is_empty());
        assert!(!slice.has_legacy_keys());
    }
}
