//! Checkout adapter: pending booking, unit claim, confirmation.

use std::sync::Arc;

use common::{Actor, BookingId, SliceKey};
use domain::{
    BookingClaim, BookingRecord, BookingService, ConfirmBooking, CustomerInfo, PaymentInfo,
    PlaceBooking, Transition, UnitId,
};
use event_store::EventStore;

use crate::coordinator::{AllocationCoordinator, AllocationPolicy};
use crate::error::{AllocationError, Result};
use crate::policy::{self, Operation};

/// Drives a booking from checkout through to its claimed units.
///
/// This is the only way units become Booked. A booking whose claim fails
/// stays pending and owns no units; one whose confirmation fails gives its
/// units back before the error is returned.
pub struct CheckoutService<S: EventStore> {
    bookings: BookingService<S>,
    coordinator: Arc<AllocationCoordinator<S>>,
    claimant: Actor,
}

impl<S: EventStore> CheckoutService<S> {
    pub fn new(store: S, coordinator: Arc<AllocationCoordinator<S>>) -> Self {
        Self {
            bookings: BookingService::new(store),
            coordinator,
            claimant: Actor::system("checkout"),
        }
    }

    #[tracing::instrument(skip(self, unit_ids, customer, payment, actor), fields(slice = %key, actor = %actor))]
    pub async fn place(
        &self,
        key: &SliceKey,
        unit_ids: &[String],
        customer: CustomerInfo,
        payment: PaymentInfo,
        actor: &Actor,
    ) -> Result<BookingRecord> {
        policy::authorize(actor, Operation::Checkout)?;
        if unit_ids.is_empty() {
            return Err(AllocationError::Validation("no units requested".to_string()));
        }
        let units = unit_ids
            .iter()
            .map(|raw| UnitId::parse_any(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let (user_id, customer_name) = (customer.user_id.clone(), customer.name.clone());
        let cmd = PlaceBooking::new(key.clone(), units, customer, payment);
        let booking_id = cmd.booking_id;
        let placed = self.bookings.place(cmd).await?;
        let unit_ids: Vec<String> = placed
            .aggregate
            .record()
            .map(|r| r.unit_ids.iter().map(UnitId::to_string).collect())
            .unwrap_or_default();

        let claim = BookingClaim {
            booking_id,
            user_id,
            customer_name,
        };
        if let Err(err) = self
            .coordinator
            .allocate_with_policy(
                key,
                &unit_ids,
                Transition::Book(claim),
                &self.claimant,
                AllocationPolicy::AllOrNothing,
            )
            .await
        {
            tracing::info!(%booking_id, error = %err, "claim failed, booking left pending");
            metrics::counter!("checkout_claims_failed_total").increment(1);
            return Err(err);
        }

        let confirmed = match self.bookings.confirm(ConfirmBooking::new(booking_id)).await {
            Ok(confirmed) => confirmed,
            Err(err) => {
                metrics::counter!("checkout_confirm_failed_total").increment(1);
                self.give_back(key, &unit_ids, booking_id).await;
                return Err(err.into());
            }
        };
        metrics::counter!("checkout_bookings_confirmed_total").increment(1);
        confirmed
            .aggregate
            .into_record()
            .ok_or_else(|| AllocationError::Internal("confirmed booking has no record".into()))
    }

    /// Releases units claimed for a booking that could not be confirmed.
    ///
    /// A failed release is left to the sweep, which frees units of pending
    /// bookings once they outlive the checkout window.
    async fn give_back(&self, key: &SliceKey, unit_ids: &[String], booking_id: BookingId) {
        match self
            .coordinator
            .allocate(key, unit_ids, Transition::Release { booking_id }, &self.claimant)
            .await
        {
            Ok(outcome) => tracing::warn!(
                %booking_id,
                released = outcome.applied_count(),
                "confirmation failed, claimed units released"
            ),
            Err(err) => {
                metrics::counter!("checkout_release_deferred_total").increment(1);
                tracing::warn!(%booking_id, error = %err, "confirmation failed, release deferred to the sweep");
            }
        }
    }
}
