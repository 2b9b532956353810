//! Full-slice snapshot delivered to viewers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::SliceKey;
use domain::{Aggregate, AvailabilitySlice, UnitId, UnitState, UnitStatus};
use event_store::Version;
use serde::{Deserialize, Serialize};

/// The whole unit map of a slice at one version.
///
/// Units absent from `units` are available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSnapshot {
    pub key: SliceKey,
    pub version: Version,
    pub last_updated: Option<DateTime<Utc>>,
    pub units: BTreeMap<String, UnitState>,
}

impl SliceSnapshot {
    /// The snapshot of a slice that was never written.
    pub fn untouched(key: &SliceKey) -> Self {
        Self {
            key: key.clone(),
            version: Version::initial(),
            last_updated: None,
            units: BTreeMap::new(),
        }
    }

    pub fn of(key: &SliceKey, slice: &AvailabilitySlice) -> Self {
        Self {
            key: key.clone(),
            version: slice.version(),
            last_updated: slice.last_updated(),
            units: canonical_units(slice),
        }
    }

    pub fn status_of(&self, unit_id: &str) -> UnitStatus {
        UnitStatus::of(self.units.get(unit_id))
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.values().filter(|s| s.status() == status).count()
    }
}

/// Unit map keyed by canonical id. Units still stored under a legacy key
/// appear under the id they name; a canonical entry takes precedence.
fn canonical_units(slice: &AvailabilitySlice) -> BTreeMap<String, UnitState> {
    let mut units = BTreeMap::new();
    for (stored, state) in slice.units() {
        match UnitId::parse_legacy(stored) {
            Some(unit) => {
                units.entry(unit.to_string()).or_insert_with(|| state.clone());
            }
            None => {
                units.insert(stored.clone(), state.clone());
            }
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Actor;
    use domain::SliceEvent;

    #[test]
    fn legacy_keys_are_shown_under_canonical_ids() {
        let key = SliceKey::show("gala-2024").unwrap();
        let admin = Actor::admin("adm-1", "Ravi");
        let mut slice = AvailabilitySlice::untouched(key.clone());
        slice.apply(SliceEvent::units_blocked(
            key.clone(),
            vec!["P-1-1-1".to_string(), "P-C1-R1-S2".to_string()],
            "imported",
            admin,
        ));

        let snapshot = SliceSnapshot::of(&key, &slice);
        assert_eq!(
            snapshot.units.keys().collect::<Vec<_>>(),
            vec!["P-C1-R1-S1", "P-C1-R1-S2"]
        );
        assert_eq!(snapshot.status_of("P-C1-R1-S1"), UnitStatus::Blocked);
        assert_eq!(snapshot.count(UnitStatus::Blocked), 2);
    }
}
