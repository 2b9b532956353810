//! Allocation coordinator: every unit-state change goes through here.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Actor, AggregateId, InventoryKind, SliceKey};
use domain::{
    Aggregate, AvailabilitySlice, CommandHandler, DomainError, Layout, LayoutCache,
    MigrationReport, SlicePlan, Transition, TransitionKind, UnitDescriptor, UnitId, UnitState,
    UnitStatus,
};
use event_store::{EventStore, Version};
use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};
use crate::policy::{self, Operation};
use crate::sync::{SliceSnapshot, SnapshotFeed, SnapshotStream, Subscription, SyncPublisher};

/// Tuning for the commit loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Commits attempted before giving up on a slice that keeps moving
    /// under disjoint concurrent writes.
    pub max_commit_attempts: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 5,
        }
    }
}

/// What to do with requested units that cannot take the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Apply to the eligible units and report the rest as skipped.
    #[default]
    BestEffort,
    /// Apply to every requested unit or to none.
    AllOrNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    NoEligibleUnits,
}

/// Result of an allocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationOutcome {
    pub slice_key: SliceKey,
    pub transition: TransitionKind,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    /// Slice version after the allocation.
    pub version: Version,
}

impl AllocationOutcome {
    fn new(key: &SliceKey, transition: &Transition, plan: &SlicePlan, version: Version) -> Self {
        Self {
            slice_key: key.clone(),
            transition: transition.kind(),
            applied: plan.eligible.iter().map(UnitId::to_string).collect(),
            skipped: plan.skipped.iter().map(UnitId::to_string).collect(),
            version,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        if self.applied.is_empty() {
            OutcomeStatus::NoEligibleUnits
        } else {
            OutcomeStatus::Applied
        }
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// A unit with its layout attributes and current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitView {
    pub unit: UnitDescriptor,
    pub status: UnitStatus,
    pub state: Option<UnitState>,
}

/// An allocation planned against one slice version and not yet written.
///
/// Dropping it leaves no trace.
#[derive(Debug)]
pub struct PreparedAllocation {
    key: SliceKey,
    transition: Transition,
    actor: Actor,
    policy: AllocationPolicy,
    requested: Vec<UnitId>,
    slice: AvailabilitySlice,
    plan: SlicePlan,
}

impl PreparedAllocation {
    pub fn base_version(&self) -> Version {
        self.slice.version()
    }

    pub fn eligible(&self) -> &[UnitId] {
        &self.plan.eligible
    }

    pub fn skipped(&self) -> &[UnitId] {
        &self.plan.skipped
    }
}

/// Applies transitions to availability slices with optimistic concurrency.
///
/// A slice's stream version is its concurrency token. Losing a race to a
/// writer that touched other units is retried transparently; losing one
/// to a writer that took requested units surfaces as a `Conflict`.
pub struct AllocationCoordinator<S: EventStore> {
    handler: CommandHandler<S, AvailabilitySlice>,
    layouts: Arc<LayoutCache>,
    publisher: SyncPublisher,
    config: CoordinatorConfig,
}

impl<S: EventStore> AllocationCoordinator<S> {
    pub fn new(
        store: S,
        layouts: Arc<LayoutCache>,
        publisher: SyncPublisher,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            layouts,
            publisher,
            config,
        }
    }

    pub fn store(&self) -> &S {
        self.handler.store()
    }

    pub fn layouts(&self) -> &Arc<LayoutCache> {
        &self.layouts
    }

    pub fn publisher(&self) -> &SyncPublisher {
        &self.publisher
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_layout(&self, kind: InventoryKind) -> Result<Arc<Layout>> {
        Ok(self.layouts.get(kind).await?)
    }

    /// Loads a slice, empty if it was never written.
    pub async fn load_slice(&self, key: &SliceKey) -> Result<AvailabilitySlice> {
        let slice = self.handler.load(&AggregateId::slice(key)).await?;
        if slice.key().is_none() {
            return Ok(AvailabilitySlice::untouched(key.clone()));
        }
        Ok(slice)
    }

    #[tracing::instrument(skip(self), fields(slice = %key))]
    pub async fn get_slice(&self, key: &SliceKey) -> Result<SliceSnapshot> {
        let slice = self.load_slice(key).await?;
        Ok(SliceSnapshot::of(key, &slice))
    }

    /// Looks up one unit. Legacy id formats are accepted.
    #[tracing::instrument(skip(self), fields(slice = %key))]
    pub async fn get_state(&self, key: &SliceKey, unit_id: &str) -> Result<UnitView> {
        let unit = UnitId::parse_any(unit_id)?;
        let layout = self.layouts.get(key.kind()).await?;
        let descriptor = layout.resolve(&unit).ok_or_else(|| {
            AllocationError::NotFound(format!("unit {unit} in the {} layout", key.kind()))
        })?;

        let slice = self.load_slice(key).await?;
        let state = slice.state_of(&unit).cloned();
        Ok(UnitView {
            unit: descriptor,
            status: UnitStatus::of(state.as_ref()),
            state,
        })
    }

    /// Attaches a viewer to a slice. The first item is the current snapshot.
    pub async fn subscribe(&self, key: &SliceKey) -> Result<Subscription> {
        // Attached before the load: a commit landing in between is published
        // to this viewer and outranks the loaded snapshot.
        let subscription = self.publisher.attach(key);
        let current = self.get_slice(key).await?;
        self.publisher.publish(current);
        Ok(subscription)
    }

    /// Applies `transition` to whichever requested units accept it.
    pub async fn allocate(
        &self,
        key: &SliceKey,
        unit_ids: &[String],
        transition: Transition,
        actor: &Actor,
    ) -> Result<AllocationOutcome> {
        self.allocate_with_policy(key, unit_ids, transition, actor, AllocationPolicy::BestEffort)
            .await
    }

    #[tracing::instrument(
        skip(self, unit_ids, transition, actor),
        fields(slice = %key, transition = %transition.kind(), actor = %actor, requested = unit_ids.len())
    )]
    pub async fn allocate_with_policy(
        &self,
        key: &SliceKey,
        unit_ids: &[String],
        transition: Transition,
        actor: &Actor,
        policy: AllocationPolicy,
    ) -> Result<AllocationOutcome> {
        let prepared = self
            .prepare(key, unit_ids, transition, actor, policy)
            .await?;
        self.commit(prepared).await
    }

    /// Validates the request and plans it against the current slice version.
    pub async fn prepare(
        &self,
        key: &SliceKey,
        unit_ids: &[String],
        transition: Transition,
        actor: &Actor,
        policy: AllocationPolicy,
    ) -> Result<PreparedAllocation> {
        policy::authorize(actor, Operation::Allocate(transition.kind()))?;
        let requested = self.resolve_units(key, unit_ids, &transition).await?;

        let slice = self.load_slice(key).await?;
        let plan = slice.plan(&requested, &transition);
        if policy == AllocationPolicy::AllOrNothing && !plan.skipped.is_empty() {
            metrics::counter!("allocation_conflicts_total").increment(1);
            return Err(AllocationError::conflict(key, ids(&plan.skipped)));
        }

        Ok(PreparedAllocation {
            key: key.clone(),
            transition,
            actor: actor.clone(),
            policy,
            requested,
            slice,
            plan,
        })
    }

    /// Writes a prepared allocation.
    ///
    /// On a version conflict the slice is reloaded. If any planned unit was
    /// taken meanwhile the allocation fails with those units; otherwise it
    /// is replanned and committed again, up to `max_commit_attempts`.
    pub async fn commit(&self, prepared: PreparedAllocation) -> Result<AllocationOutcome> {
        let PreparedAllocation {
            key,
            transition,
            actor,
            policy,
            requested,
            mut slice,
            mut plan,
        } = prepared;
        let id = AggregateId::slice(&key);

        for attempt in 1..=self.config.max_commit_attempts.max(1) {
            if plan.is_empty() {
                tracing::debug!(skipped = plan.skipped.len(), "no eligible units");
                return Ok(AllocationOutcome::new(
                    &key,
                    &transition,
                    &plan,
                    slice.version(),
                ));
            }

            let events = slice
                .transition(&key, &plan.eligible, &transition, &actor)
                .map_err(DomainError::from)?;

            match self.handler.commit(&id, slice.version(), &events).await {
                Ok(new_version) => {
                    slice.apply_events(events);
                    slice.set_version(new_version);
                    return Ok(self.committed(&id, &key, &transition, &slice, &plan).await);
                }
                Err(err) if err.is_conflict() => {
                    let fresh = self.load_slice(&key).await?;
                    let replanned = fresh.plan(&requested, &transition);

                    let lost: Vec<UnitId> = plan
                        .eligible
                        .iter()
                        .filter(|u| !replanned.eligible.contains(u))
                        .cloned()
                        .collect();
                    if !lost.is_empty() {
                        metrics::counter!("allocation_conflicts_total").increment(1);
                        tracing::info!(lost = lost.len(), "units taken by a concurrent writer");
                        return Err(AllocationError::conflict(&key, ids(&lost)));
                    }
                    if policy == AllocationPolicy::AllOrNothing && !replanned.skipped.is_empty() {
                        metrics::counter!("allocation_conflicts_total").increment(1);
                        return Err(AllocationError::conflict(&key, ids(&replanned.skipped)));
                    }

                    tracing::debug!(attempt, "disjoint concurrent write, replanning");
                    metrics::counter!("allocation_commit_retries_total").increment(1);
                    slice = fresh;
                    plan = replanned;
                }
                Err(err) => return Err(err.into()),
            }
        }

        metrics::counter!("allocation_conflicts_total").increment(1);
        tracing::warn!(
            attempts = self.config.max_commit_attempts,
            "slice kept moving, giving up"
        );
        Err(AllocationError::conflict(&key, ids(&plan.eligible)))
    }

    /// Rewrites legacy unit keys stored in a slice to canonical ids.
    #[tracing::instrument(skip(self, actor), fields(slice = %key, actor = %actor))]
    pub async fn migrate_legacy_ids(&self, key: &SliceKey, actor: &Actor) -> Result<MigrationReport> {
        policy::authorize(actor, Operation::MigrateLegacyIds)?;
        let id = AggregateId::slice(key);
        let mut pending = Vec::new();

        for _ in 0..self.config.max_commit_attempts.max(1) {
            let mut slice = self.load_slice(key).await?;
            let (events, report) = slice.migrate_legacy_ids(key, actor);
            pending = report.renamed.iter().map(|(legacy, _)| legacy.clone()).collect();
            if events.is_empty() {
                return Ok(report);
            }

            match self.handler.commit(&id, slice.version(), &events).await {
                Ok(new_version) => {
                    slice.apply_events(events);
                    slice.set_version(new_version);
                    self.after_write(&id, key, &slice).await;
                    tracing::info!(
                        renamed = report.renamed.len(),
                        collisions = report.collisions.len(),
                        "legacy unit ids migrated"
                    );
                    return Ok(report);
                }
                Err(err) if err.is_conflict() => continue,
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(
            attempts = self.config.max_commit_attempts,
            "slice kept moving, legacy ids left in place"
        );
        Err(AllocationError::conflict(key, pending))
    }

    async fn resolve_units(
        &self,
        key: &SliceKey,
        unit_ids: &[String],
        transition: &Transition,
    ) -> Result<Vec<UnitId>> {
        if unit_ids.is_empty() {
            return Err(AllocationError::Validation("no units requested".to_string()));
        }
        let units = unit_ids
            .iter()
            .map(|raw| UnitId::parse_any(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // A release only needs the units to be held by the booking.
        if matches!(transition, Transition::Release { .. }) {
            return Ok(units);
        }

        let layout = self.layouts.get(key.kind()).await?;
        let needs_active = matches!(transition, Transition::Book(_) | Transition::Block { .. });
        let unknown: Vec<String> = units
            .iter()
            .filter(|u| {
                if needs_active {
                    !layout.is_allocatable(u)
                } else {
                    layout.resolve(u).is_none()
                }
            })
            .map(UnitId::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(AllocationError::Validation(format!(
                "units not allocatable in the {} layout: {}",
                key.kind(),
                unknown.join(", ")
            )));
        }
        Ok(units)
    }

    async fn committed(
        &self,
        id: &AggregateId,
        key: &SliceKey,
        transition: &Transition,
        slice: &AvailabilitySlice,
        plan: &SlicePlan,
    ) -> AllocationOutcome {
        metrics::counter!("allocation_commits_total", "transition" => transition.kind().as_str())
            .increment(1);
        metrics::counter!("allocation_units_applied_total").increment(plan.eligible.len() as u64);
        tracing::info!(
            applied = plan.eligible.len(),
            skipped = plan.skipped.len(),
            version = slice.version().as_i64(),
            "allocation committed"
        );

        self.after_write(id, key, slice).await;
        AllocationOutcome::new(key, transition, plan, slice.version())
    }

    /// Snapshot and publish. The write already happened, so neither can fail it.
    async fn after_write(&self, id: &AggregateId, key: &SliceKey, slice: &AvailabilitySlice) {
        if let Err(err) = self.handler.snapshot_if_due(id, slice).await {
            tracing::warn!(error = %err, "failed to save slice snapshot");
        }
        self.publisher.publish(SliceSnapshot::of(key, slice));
    }
}

#[async_trait]
impl<S: EventStore> SnapshotFeed for AllocationCoordinator<S> {
    async fn connect(&self, key: &SliceKey) -> Result<SnapshotStream> {
        Ok(Box::pin(self.subscribe(key).await?))
    }
}

fn ids(units: &[UnitId]) -> Vec<String> {
    units.iter().map(UnitId::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookingId;
    use domain::{Block, BookingClaim, InMemoryLayoutSource, SliceEvent};
    use event_store::InMemoryEventStore;

    use crate::testing::FaultyStore;

    fn key() -> SliceKey {
        SliceKey::show("gala-2024").unwrap()
    }

    fn admin() -> Actor {
        Actor::admin("adm-1", "Ravi")
    }

    fn units(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn book(booking_id: BookingId) -> Transition {
        Transition::Book(BookingClaim {
            booking_id,
            user_id: "u-1".to_string(),
            customer_name: "Asha".to_string(),
        })
    }

    async fn coordinator() -> AllocationCoordinator<InMemoryEventStore> {
        coordinator_on(InMemoryEventStore::new()).await
    }

    async fn coordinator_on<S: EventStore>(store: S) -> AllocationCoordinator<S> {
        let source = InMemoryLayoutSource::new();
        source
            .replace_blocks(
                InventoryKind::ShowSeat,
                vec![Block::new("P", 2, 2, 4), Block::new("Q", 1, 1, 2).inactive()],
            )
            .await
            .unwrap();
        AllocationCoordinator::new(
            store,
            Arc::new(LayoutCache::new(Arc::new(source))),
            SyncPublisher::new(),
            CoordinatorConfig::default(),
        )
    }

    #[tokio::test]
    async fn block_skips_booked_units() {
        let c = coordinator().await;
        c.allocate(&key(), &units(&["P-C1-R1-S1"]), book(BookingId::new()), &Actor::system("checkout"))
            .await
            .unwrap();

        let outcome = c
            .allocate(
                &key(),
                &units(&["P-C1-R1-S1", "P-C1-R1-S2"]),
                Transition::Block {
                    reason: "sound desk".to_string(),
                },
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.applied, vec!["P-C1-R1-S2"]);
        assert_eq!(outcome.skipped, vec!["P-C1-R1-S1"]);
        let state = c.get_state(&key(), "P-C1-R1-S1").await.unwrap();
        assert_eq!(state.status, UnitStatus::Booked);
    }

    #[tokio::test]
    async fn unblock_on_available_unit_is_a_no_op() {
        let c = coordinator().await;
        let outcome = c
            .allocate(&key(), &units(&["P-C1-R1-S3"]), Transition::Unblock, &admin())
            .await
            .unwrap();

        assert_eq!(outcome.status(), OutcomeStatus::NoEligibleUnits);
        assert_eq!(outcome.skipped, vec!["P-C1-R1-S3"]);
        assert_eq!(outcome.version, Version::initial());
        assert!(c.store().event_count().await == 0);
    }

    #[tokio::test]
    async fn legacy_and_duplicate_ids_collapse() {
        let c = coordinator().await;
        let outcome = c
            .allocate(
                &key(),
                &units(&["P-1-1-1", "P1-1-1", "P-C1-R1-S1"]),
                Transition::Block {
                    reason: "vip".to_string(),
                },
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.applied, vec!["P-C1-R1-S1"]);
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_inactive_and_empty_requests() {
        let c = coordinator().await;
        let block = || Transition::Block {
            reason: "x".to_string(),
        };

        for request in [units(&[]), units(&["Z-C1-R1-S1"]), units(&["Q-C1-R1-S1"]), units(&["nope"])] {
            let result = c.allocate(&key(), &request, block(), &admin()).await;
            assert!(
                matches!(result, Err(AllocationError::Validation(_))),
                "{request:?} -> {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn customers_cannot_block() {
        let c = coordinator().await;
        let result = c
            .allocate(
                &key(),
                &units(&["P-C1-R1-S1"]),
                Transition::Block {
                    reason: "x".to_string(),
                },
                &Actor::customer("u-1", "Asha"),
            )
            .await;
        assert!(matches!(result, Err(AllocationError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn customers_cannot_book_outside_checkout() {
        let c = coordinator().await;
        let result = c
            .allocate(
                &key(),
                &units(&["P-C1-R1-S1"]),
                book(BookingId::new()),
                &Actor::customer("u-1", "Asha"),
            )
            .await;
        assert!(matches!(result, Err(AllocationError::PermissionDenied { .. })));
        assert_eq!(c.store().event_count().await, 0);
    }

    #[tokio::test]
    async fn units_under_unmigrated_legacy_keys_are_not_reallocated() {
        let c = coordinator().await;
        let imported = SliceEvent::units_booked(
            key(),
            units(&["P-1-1-1"]),
            BookingClaim {
                booking_id: BookingId::new(),
                user_id: "u-9".to_string(),
                customer_name: "Imported".to_string(),
            },
            admin(),
        );
        c.handler
            .commit(&AggregateId::slice(&key()), Version::initial(), &[imported])
            .await
            .unwrap();

        let outcome = c
            .allocate(
                &key(),
                &units(&["P-C1-R1-S1"]),
                Transition::Block {
                    reason: "stage".to_string(),
                },
                &admin(),
            )
            .await
            .unwrap();
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.skipped, vec!["P-C1-R1-S1"]);

        let booked = c
            .allocate(&key(), &units(&["P-C1-R1-S1"]), book(BookingId::new()), &Actor::system("checkout"))
            .await
            .unwrap();
        assert_eq!(booked.status(), OutcomeStatus::NoEligibleUnits);

        let slice = c.load_slice(&key()).await.unwrap();
        assert_eq!(slice.units().keys().collect::<Vec<_>>(), vec!["P-1-1-1"]);
        let state = c.get_state(&key(), "P-C1-R1-S1").await.unwrap();
        assert_eq!(state.status, UnitStatus::Booked);
    }

    #[tokio::test]
    async fn migration_that_keeps_losing_races_names_the_legacy_keys() {
        let store = FaultyStore::new();
        let c = coordinator_on(store.clone()).await;
        let imported = SliceEvent::units_blocked(key(), units(&["P-1-1-1"]), "imported", admin());
        c.handler
            .commit(&AggregateId::slice(&key()), Version::initial(), &[imported])
            .await
            .unwrap();

        store.contend_appends_of("UnitIdsMigrated");
        let err = c.migrate_legacy_ids(&key(), &admin()).await.unwrap_err();
        match err {
            AllocationError::Conflict { unit_ids, .. } => assert_eq!(unit_ids, vec!["P-1-1-1"]),
            other => panic!("expected a conflict, got {other:?}"),
        }

        store.heal();
        let report = c.migrate_legacy_ids(&key(), &admin()).await.unwrap();
        assert_eq!(report.renamed.len(), 1);
    }

    #[tokio::test]
    async fn all_or_nothing_writes_nothing_on_partial_eligibility() {
        let c = coordinator().await;
        let system = Actor::system("checkout");
        c.allocate(&key(), &units(&["P-C1-R1-S1"]), book(BookingId::new()), &system)
            .await
            .unwrap();

        let result = c
            .allocate_with_policy(
                &key(),
                &units(&["P-C1-R1-S1", "P-C1-R1-S2"]),
                book(BookingId::new()),
                &system,
                AllocationPolicy::AllOrNothing,
            )
            .await;

        match result {
            Err(AllocationError::Conflict { unit_ids, .. }) => {
                assert_eq!(unit_ids, vec!["P-C1-R1-S1"])
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        let slice = c.get_slice(&key()).await.unwrap();
        assert_eq!(slice.status_of("P-C1-R1-S2"), UnitStatus::Available);
    }

    #[tokio::test]
    async fn overlapping_prepared_allocations_conflict() {
        let c = coordinator().await;
        let system = Actor::system("checkout");
        let first = c
            .prepare(&key(), &units(&["P-C1-R1-S1", "P-C1-R1-S2"]), book(BookingId::new()), &system, AllocationPolicy::BestEffort)
            .await
            .unwrap();
        let second = c
            .prepare(&key(), &units(&["P-C1-R1-S2", "P-C1-R1-S3"]), book(BookingId::new()), &system, AllocationPolicy::BestEffort)
            .await
            .unwrap();
        assert_eq!(first.base_version(), second.base_version());

        c.commit(first).await.unwrap();
        match c.commit(second).await {
            Err(AllocationError::Conflict { unit_ids, .. }) => {
                assert_eq!(unit_ids, vec!["P-C1-R1-S2"])
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let slice = c.get_slice(&key()).await.unwrap();
        assert_eq!(slice.status_of("P-C1-R1-S3"), UnitStatus::Available);
        assert_eq!(slice.version, Version::new(1));
    }

    #[tokio::test]
    async fn disjoint_prepared_allocations_both_land() {
        let c = coordinator().await;
        let system = Actor::system("checkout");
        let first = c
            .prepare(&key(), &units(&["P-C1-R1-S1"]), book(BookingId::new()), &system, AllocationPolicy::BestEffort)
            .await
            .unwrap();
        let second = c
            .prepare(&key(), &units(&["P-C2-R2-S4"]), book(BookingId::new()), &system, AllocationPolicy::BestEffort)
            .await
            .unwrap();

        c.commit(first).await.unwrap();
        let outcome = c.commit(second).await.unwrap();

        assert_eq!(outcome.applied, vec!["P-C2-R2-S4"]);
        assert_eq!(outcome.version, Version::new(2));
    }

    #[tokio::test]
    async fn dropped_plan_leaves_no_trace() {
        let c = coordinator().await;
        let prepared = c
            .prepare(&key(), &units(&["P-C1-R1-S1"]), book(BookingId::new()), &Actor::system("checkout"), AllocationPolicy::BestEffort)
            .await
            .unwrap();
        drop(prepared);

        assert_eq!(c.store().event_count().await, 0);
    }

    #[tokio::test]
    async fn unavailable_store_fails_closed() {
        let c = coordinator().await;
        c.store().set_unavailable(true);

        let result = c
            .allocate(
                &key(),
                &units(&["P-C1-R1-S1"]),
                Transition::Block {
                    reason: "x".to_string(),
                },
                &admin(),
            )
            .await;
        assert!(matches!(result, Err(AllocationError::Unavailable(_))));

        c.store().set_unavailable(false);
        assert_eq!(c.get_slice(&key()).await.unwrap().units.len(), 0);
    }

    #[tokio::test]
    async fn get_state_reports_layout_attributes() {
        let c = coordinator().await;
        let view = c.get_state(&key(), "Q-C1-R1-S2").await.unwrap();
        assert!(!view.unit.active);
        assert_eq!(view.status, UnitStatus::Available);

        let missing = c.get_state(&key(), "P-C9-R1-S1").await;
        assert!(matches!(missing, Err(AllocationError::NotFound(_))));
    }
}
