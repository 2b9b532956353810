//! Cancellation and refund reconciliation.
//!
//! A confirmed booking is cancelled, its cancellation record opened and its
//! units released, in that order. A release that fails once the booking is
//! already cancelled is left to [`Reconciler::sweep`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{Actor, BookingId, CancellationId};
use domain::{
    BookingRecord, BookingService, BookingStatus, CancelBooking, CancellationError, CancellationRecord,
    CancellationService, DomainError, OpenCancellation, RecordRefund, RefundInput, Transition,
};
use event_store::EventStore;
use projections::{
    BookingsView, CancellationFilter, CancellationReport, CancellationsView, ProjectionProcessor,
};
use serde::Serialize;

use crate::coordinator::AllocationCoordinator;
use crate::error::{AllocationError, Result};
use crate::policy::{self, Operation};

/// What one reconciliation sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub bookings_checked: usize,
    pub units_released: usize,
    pub cancellations_opened: usize,
    /// Pending bookings past the checkout window that still held units.
    pub stale_pending: usize,
    pub failures: usize,
}

pub struct Reconciler<S: EventStore> {
    bookings: BookingService<S>,
    cancellations: CancellationService<S>,
    coordinator: Arc<AllocationCoordinator<S>>,
    processor: ProjectionProcessor<S>,
    bookings_view: BookingsView,
    cancellations_view: CancellationsView,
    pending_ttl: Duration,
}

impl<S: EventStore + Clone> Reconciler<S> {
    pub fn new(store: S, coordinator: Arc<AllocationCoordinator<S>>) -> Self {
        let bookings_view = BookingsView::new();
        let cancellations_view = CancellationsView::new();

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(bookings_view.clone()));
        processor.register(Box::new(cancellations_view.clone()));

        Self {
            bookings: BookingService::new(store.clone()),
            cancellations: CancellationService::new(store),
            coordinator,
            processor,
            bookings_view,
            cancellations_view,
            pending_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl<S: EventStore> Reconciler<S> {
    /// Sets how long checkout may hold units for an unconfirmed booking.
    /// Fifteen minutes unless set.
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    pub fn bookings(&self) -> &BookingService<S> {
        &self.bookings
    }

    pub async fn get_booking(&self, booking_id: BookingId) -> Result<BookingRecord> {
        self.bookings
            .get(booking_id)
            .await?
            .and_then(|b| b.into_record())
            .ok_or_else(|| AllocationError::NotFound(format!("booking {booking_id}")))
    }

    pub async fn get_cancellation(&self, cancellation_id: CancellationId) -> Result<CancellationRecord> {
        self.cancellations
            .get(cancellation_id)
            .await?
            .and_then(|c| c.into_record())
            .ok_or_else(|| AllocationError::NotFound(format!("cancellation {cancellation_id}")))
    }

    /// Cancels a confirmed booking and returns its pending cancellation.
    #[tracing::instrument(skip(self, actor, reason), fields(actor = %actor))]
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<CancellationRecord> {
        policy::authorize(actor, Operation::CancelBooking)?;

        let mut cmd = CancelBooking::new(booking_id, actor.clone());
        cmd.reason = reason.clone();
        let cancelled = self.bookings.cancel(cmd).await?;
        let booking = cancelled
            .aggregate
            .into_record()
            .ok_or_else(|| AllocationError::Internal("cancelled booking has no record".into()))?;

        let opened = self
            .cancellations
            .open(OpenCancellation::for_booking(&booking, actor.clone(), reason))
            .await?;
        let cancellation = opened
            .aggregate
            .into_record()
            .ok_or_else(|| AllocationError::Internal("opened cancellation has no record".into()))?;

        if let Err(err) = self.release(&booking, actor).await {
            tracing::warn!(error = %err, "release deferred to the next sweep");
            metrics::counter!("reconciler_release_deferred_total").increment(1);
        }

        metrics::counter!("reconciler_cancellations_total").increment(1);
        tracing::info!(
            cancellation_id = %cancellation.id,
            units = booking.unit_ids.len(),
            "booking cancelled"
        );
        Ok(cancellation)
    }

    /// Records the refund paid for a pending cancellation.
    #[tracing::instrument(skip(self, input, actor), fields(actor = %actor))]
    pub async fn record_refund(
        &self,
        cancellation_id: CancellationId,
        input: RefundInput,
        actor: &Actor,
    ) -> Result<CancellationRecord> {
        policy::authorize(actor, Operation::RecordRefund)?;

        let result = self
            .cancellations
            .record_refund(RecordRefund::new(cancellation_id, input, actor.clone()))
            .await?;
        let record = result
            .aggregate
            .into_record()
            .ok_or_else(|| AllocationError::Internal("refunded cancellation has no record".into()))?;

        metrics::counter!("reconciler_refunds_total").increment(1);
        Ok(record)
    }

    /// Cancellations matching `filter`, newest first.
    pub async fn list_cancellations(&self, filter: &CancellationFilter) -> Result<Vec<CancellationRecord>> {
        self.processor.run_catch_up().await?;
        Ok(self.cancellations_view.list(filter).await)
    }

    /// Totals folded from every stored cancellation.
    pub async fn report(&self) -> Result<CancellationReport> {
        self.processor.run_catch_up().await?;
        Ok(self.cancellations_view.report().await)
    }

    /// Repairs what a partially failed cancellation or checkout left behind.
    ///
    /// Every cancelled booking gets its cancellation record and loses any
    /// unit still booked under its id. A pending booking older than the
    /// checkout window loses its units too. Safe to run repeatedly.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn sweep(&self, actor: &Actor) -> Result<SweepReport> {
        policy::authorize(actor, Operation::Sweep)?;
        self.processor.run_catch_up().await?;

        let mut report = SweepReport::default();
        for booking in self.bookings_view.cancelled().await {
            report.bookings_checked += 1;

            match self.ensure_cancellation(&booking, actor).await {
                Ok(true) => report.cancellations_opened += 1,
                Ok(false) => {}
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(booking_id = %booking.id, error = %err, "could not open cancellation");
                }
            }

            match self.release(&booking, actor).await {
                Ok(released) => report.units_released += released,
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(booking_id = %booking.id, error = %err, "release failed");
                }
            }
        }

        // A window too large to subtract never expires anything.
        let cutoff = chrono::Duration::from_std(self.pending_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        for booking in self.bookings_view.by_status(BookingStatus::Pending).await {
            if cutoff.is_none_or(|cutoff| booking.created_at > cutoff) {
                continue;
            }
            report.bookings_checked += 1;

            // The view may trail a confirmation that landed after catch-up.
            match self.bookings.get(booking.id).await {
                Ok(Some(current)) if current.status() == BookingStatus::Pending => {}
                Ok(_) => continue,
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(booking_id = %booking.id, error = %err, "could not reload booking");
                    continue;
                }
            }

            match self.release(&booking, actor).await {
                Ok(0) => {}
                Ok(released) => {
                    report.stale_pending += 1;
                    report.units_released += released;
                    tracing::info!(booking_id = %booking.id, released, "freed units of an unconfirmed booking");
                }
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(booking_id = %booking.id, error = %err, "release failed");
                }
            }
        }

        metrics::counter!("reconciler_units_released_total").increment(report.units_released as u64);
        if report.units_released > 0 || report.failures > 0 {
            tracing::info!(?report, "reconciliation sweep repaired state");
        } else {
            tracing::debug!(checked = report.bookings_checked, "reconciliation sweep found nothing");
        }
        Ok(report)
    }

    /// Releases every unit of the slice still booked by `booking`.
    async fn release(&self, booking: &BookingRecord, actor: &Actor) -> Result<usize> {
        let slice = self.coordinator.load_slice(&booking.slice_key).await?;
        let held = slice.units_booked_by(booking.id);
        if held.is_empty() {
            return Ok(0);
        }

        let outcome = self
            .coordinator
            .allocate(
                &booking.slice_key,
                &held,
                Transition::Release {
                    booking_id: booking.id,
                },
                actor,
            )
            .await?;
        Ok(outcome.applied_count())
    }

    async fn ensure_cancellation(&self, booking: &BookingRecord, actor: &Actor) -> Result<bool> {
        let id = CancellationId::for_booking(booking.id);
        if self.cancellations_view.get(id).await.is_some() {
            return Ok(false);
        }

        let cancelled_by = booking.cancelled_by.clone().unwrap_or_else(|| actor.clone());
        match self
            .cancellations
            .open(OpenCancellation::for_booking(booking, cancelled_by, None))
            .await
        {
            Ok(_) => Ok(true),
            Err(DomainError::Cancellation(CancellationError::AlreadyOpened)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{AllocationPolicy, CoordinatorConfig};
    use crate::sync::SyncPublisher;
    use common::{InventoryKind, SliceKey};
    use domain::{
        Block, BookingClaim, ConfirmBooking, CustomerInfo, InMemoryLayoutSource, LayoutCache,
        Money, PaymentInfo, PlaceBooking, RefundStatus, UnitId, UnitStatus,
    };
    use crate::testing::FaultyStore;

    struct Fixture {
        reconciler: Reconciler<FaultyStore>,
        coordinator: Arc<AllocationCoordinator<FaultyStore>>,
        store: FaultyStore,
    }

    fn key() -> SliceKey {
        SliceKey::show("gala-2024").unwrap()
    }

    fn admin() -> Actor {
        Actor::admin("adm-1", "Ravi")
    }

    async fn fixture() -> Fixture {
        let store = FaultyStore::new();
        let source = InMemoryLayoutSource::new();
        source
            .replace_blocks(InventoryKind::ShowSeat, vec![Block::new("P", 1, 1, 4)])
            .await
            .unwrap();
        let coordinator = Arc::new(AllocationCoordinator::new(
            store.clone(),
            Arc::new(LayoutCache::new(Arc::new(source))),
            SyncPublisher::new(),
            CoordinatorConfig::default(),
        ));
        Fixture {
            reconciler: Reconciler::new(store.clone(), Arc::clone(&coordinator)),
            coordinator,
            store,
        }
    }

    /// Books `seats` and confirms the booking.
    async fn confirmed_booking(f: &Fixture, seats: &[u32], rupees: i64) -> BookingId {
        let booking_id = claimed_booking(f, seats, rupees).await;
        f.reconciler
            .bookings()
            .confirm(ConfirmBooking::new(booking_id))
            .await
            .unwrap();
        booking_id
    }

    /// Places a booking for `seats` and claims them, leaving it pending.
    async fn claimed_booking(f: &Fixture, seats: &[u32], rupees: i64) -> BookingId {
        let units: Vec<UnitId> = seats.iter().map(|s| UnitId::new("P", 1, 1, *s).unwrap()).collect();
        let cmd = PlaceBooking::new(
            key(),
            units.clone(),
            CustomerInfo::new("u-1", "Asha", "asha@example.com"),
            PaymentInfo::new(Money::from_rupees(rupees), "card"),
        );
        let booking_id = cmd.booking_id;
        f.reconciler.bookings().place(cmd).await.unwrap();
        f.coordinator
            .allocate_with_policy(
                &key(),
                &units.iter().map(UnitId::to_string).collect::<Vec<_>>(),
                Transition::Book(BookingClaim {
                    booking_id,
                    user_id: "u-1".to_string(),
                    customer_name: "Asha".to_string(),
                }),
                &Actor::system("checkout"),
                AllocationPolicy::AllOrNothing,
            )
            .await
            .unwrap();
        booking_id
    }

    #[tokio::test]
    async fn cancel_releases_units_and_opens_pending_refund() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[1, 2], 900).await;

        let cancellation = f
            .reconciler
            .cancel_booking(booking_id, &admin(), Some("illness".to_string()))
            .await
            .unwrap();

        assert_eq!(cancellation.refund_status, RefundStatus::Pending);
        assert_eq!(cancellation.original_amount, Money::from_rupees(900));
        let slice = f.coordinator.get_slice(&key()).await.unwrap();
        assert_eq!(slice.status_of("P-C1-R1-S1"), UnitStatus::Available);
        assert_eq!(slice.status_of("P-C1-R1-S2"), UnitStatus::Available);
    }

    #[tokio::test]
    async fn cancel_requires_a_confirmed_booking() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[1], 100).await;
        f.reconciler.cancel_booking(booking_id, &admin(), None).await.unwrap();

        let again = f.reconciler.cancel_booking(booking_id, &admin(), None).await;
        assert!(matches!(again, Err(AllocationError::InvalidStateTransition(_))));

        let unknown = f.reconciler.cancel_booking(BookingId::new(), &admin(), None).await;
        assert!(matches!(unknown, Err(AllocationError::NotFound(_))));
    }

    #[tokio::test]
    async fn refund_is_recorded_once() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[3], 500).await;
        let cancellation = f.reconciler.cancel_booking(booking_id, &admin(), None).await.unwrap();

        let refunded = f
            .reconciler
            .record_refund(cancellation.id, RefundInput::new(Money::from_rupees(450), "card"), &admin())
            .await
            .unwrap();
        assert_eq!(refunded.refund_status, RefundStatus::Refunded);
        assert_eq!(refunded.refund_amount(), Money::from_rupees(450));

        let second = f
            .reconciler
            .record_refund(cancellation.id, RefundInput::new(Money::from_rupees(450), "card"), &admin())
            .await;
        assert!(matches!(second, Err(AllocationError::AlreadyRefunded)));

        let report = f.reconciler.report().await.unwrap();
        assert_eq!(report.refunded_count, 1);
        assert_eq!(report.total_refund_amount, Money::from_rupees(450));
    }

    #[tokio::test]
    async fn refund_input_is_validated() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[4], 500).await;
        let cancellation = f.reconciler.cancel_booking(booking_id, &admin(), None).await.unwrap();

        for input in [
            RefundInput::new(Money::zero(), "card"),
            RefundInput::new(Money::from_rupees(10), " "),
        ] {
            let result = f.reconciler.record_refund(cancellation.id, input, &admin()).await;
            assert!(matches!(result, Err(AllocationError::Validation(_))), "{result:?}");
        }
    }

    #[tokio::test]
    async fn sweep_releases_orphaned_units() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[1, 2], 300).await;

        // Cancel the booking directly so its units stay booked.
        f.reconciler
            .bookings()
            .cancel(CancelBooking::new(booking_id, admin()))
            .await
            .unwrap();

        let report = f.reconciler.sweep(&Actor::system("sweep")).await.unwrap();
        assert_eq!(report.bookings_checked, 1);
        assert_eq!(report.units_released, 2);
        assert_eq!(report.cancellations_opened, 1);
        assert_eq!(report.failures, 0);

        let slice = f.coordinator.get_slice(&key()).await.unwrap();
        assert_eq!(slice.count(UnitStatus::Booked), 0);

        let again = f.reconciler.sweep(&Actor::system("sweep")).await.unwrap();
        assert_eq!(again.units_released, 0);
        assert_eq!(again.cancellations_opened, 0);
    }

    #[tokio::test]
    async fn failed_release_is_deferred_then_repaired_by_sweep() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[1, 3], 600).await;

        f.store.fail_appends_of("UnitsReleased");
        let cancellation = f
            .reconciler
            .cancel_booking(booking_id, &admin(), None)
            .await
            .unwrap();
        assert_eq!(cancellation.refund_status, RefundStatus::Pending);
        let slice = f.coordinator.get_slice(&key()).await.unwrap();
        assert_eq!(slice.count(UnitStatus::Booked), 2);

        // Still failing: the sweep reports it and changes nothing.
        let failed = f.reconciler.sweep(&Actor::system("sweep")).await.unwrap();
        assert_eq!(failed.failures, 1);
        assert_eq!(failed.units_released, 0);

        f.store.heal();
        let report = f.reconciler.sweep(&Actor::system("sweep")).await.unwrap();
        assert_eq!(report.units_released, 2);
        assert_eq!(report.cancellations_opened, 0);
        assert_eq!(report.failures, 0);
        let slice = f.coordinator.get_slice(&key()).await.unwrap();
        assert_eq!(slice.count(UnitStatus::Booked), 0);
    }

    #[tokio::test]
    async fn sweep_leaves_units_rebooked_after_cancellation() {
        let f = fixture().await;
        let booking_id = confirmed_booking(&f, &[2], 300).await;

        f.reconciler.cancel_booking(booking_id, &admin(), None).await.unwrap();
        let rebooked = confirmed_booking(&f, &[2], 300).await;

        let report = f.reconciler.sweep(&admin()).await.unwrap();
        assert_eq!(report.units_released, 0);
        let view = f.coordinator.get_state(&key(), "P-C1-R1-S2").await.unwrap();
        assert!(view.state.unwrap().is_booked_by(rebooked));
    }

    #[tokio::test]
    async fn sweep_frees_units_of_pending_bookings_past_the_window() {
        let f = fixture().await;
        let stuck = claimed_booking(&f, &[4], 200).await;

        let within = f.reconciler.sweep(&Actor::system("sweep")).await.unwrap();
        assert_eq!(within.stale_pending, 0);
        assert_eq!(within.units_released, 0);

        let reconciler = Reconciler::new(f.store.clone(), Arc::clone(&f.coordinator))
            .with_pending_ttl(Duration::ZERO);
        let report = reconciler.sweep(&Actor::system("sweep")).await.unwrap();
        assert_eq!(report.stale_pending, 1);
        assert_eq!(report.units_released, 1);

        let slice = f.coordinator.get_slice(&key()).await.unwrap();
        assert_eq!(slice.status_of("P-C1-R1-S4"), UnitStatus::Available);
        let booking = f.reconciler.get_booking(stuck).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn report_counts_cancellations_stamped_before_an_earlier_read() {
        let f = fixture().await;
        let first = confirmed_booking(&f, &[1], 400).await;
        let second = confirmed_booking(&f, &[2], 600).await;

        f.reconciler.cancel_booking(second, &admin(), None).await.unwrap();
        assert_eq!(f.reconciler.report().await.unwrap().total_cancellations, 1);

        // Appended after the read above, stamped before it.
        f.store
            .backdate_appends_to("Cancellation", chrono::Duration::seconds(5));
        f.reconciler.cancel_booking(first, &admin(), None).await.unwrap();

        let report = f.reconciler.report().await.unwrap();
        assert_eq!(report.total_cancellations, 2);
        assert_eq!(report.total_original_amount, Money::from_rupees(1000));
        let listed = f
            .reconciler
            .list_cancellations(&CancellationFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn customers_cannot_cancel_or_sweep() {
        let f = fixture().await;
        let customer = Actor::customer("u-1", "Asha");
        assert!(matches!(
            f.reconciler.cancel_booking(BookingId::new(), &customer, None).await,
            Err(AllocationError::PermissionDenied { .. })
        ));
        assert!(matches!(
            f.reconciler.sweep(&customer).await,
            Err(AllocationError::PermissionDenied { .. })
        ));
    }
}
