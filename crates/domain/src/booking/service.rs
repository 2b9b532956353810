//! Booking service providing a simplified API for booking operations.

use common::{AggregateId, BookingId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Booking, CancelBooking, ConfirmBooking, PlaceBooking};

/// Service for managing bookings.
pub struct BookingService<S: EventStore> {
    handler: CommandHandler<S, Booking>,
}

impl<S: EventStore> BookingService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Booking> {
        &self.handler
    }

    /// Records a pending booking.
    #[tracing::instrument(skip(self), fields(booking_id = %cmd.booking_id))]
    pub async fn place(&self, cmd: PlaceBooking) -> Result<CommandResult<Booking>, DomainError> {
        let id = cmd.aggregate_id();
        let PlaceBooking {
            booking_id,
            slice_key,
            unit_ids,
            customer,
            payment,
        } = cmd;

        self.handler
            .execute(&id, |booking| {
                booking.place(booking_id, slice_key, unit_ids, customer, payment)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, cmd: ConfirmBooking) -> Result<CommandResult<Booking>, DomainError> {
        self.handler
            .execute(&cmd.aggregate_id(), |booking| booking.confirm())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, cmd: CancelBooking) -> Result<CommandResult<Booking>, DomainError> {
        let id = cmd.aggregate_id();
        let CancelBooking {
            cancelled_by,
            reason,
            ..
        } = cmd;

        self.handler
            .execute(&id, |booking| booking.cancel(cancelled_by, reason))
            .await
    }

    /// Loads a booking by id.
    ///
    /// Returns None if the booking doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>, DomainError> {
        self.handler
            .load_existing(&AggregateId::booking(booking_id))
            .await
    }

    /// Loads a booking, failing if it doesn't exist.
    pub async fn require(&self, booking_id: BookingId) -> Result<Booking, DomainError> {
        self.get(booking_id)
            .await?
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: "Booking",
                aggregate_id: booking_id.to_string(),
            })
    }
}
