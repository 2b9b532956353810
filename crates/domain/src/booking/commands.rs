//! Booking commands.

use common::{Actor, AggregateId, BookingId, SliceKey};

use crate::command::Command;
use crate::layout::UnitId;

use super::{Booking, CustomerInfo, PaymentInfo};

/// Command to record a booking from checkout.
#[derive(Debug, Clone)]
pub struct PlaceBooking {
    pub booking_id: BookingId,
    pub slice_key: SliceKey,
    pub unit_ids: Vec<UnitId>,
    pub customer: CustomerInfo,
    pub payment: PaymentInfo,
}

impl PlaceBooking {
    /// Creates a PlaceBooking command with a generated booking id.
    pub fn new(
        slice_key: SliceKey,
        unit_ids: Vec<UnitId>,
        customer: CustomerInfo,
        payment: PaymentInfo,
    ) -> Self {
        Self {
            booking_id: BookingId::new(),
            slice_key,
            unit_ids,
            customer,
            payment,
        }
    }
}

impl Command for PlaceBooking {
    type Aggregate = Booking;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::booking(self.booking_id)
    }
}

/// Command to confirm a booking once its units are claimed.
#[derive(Debug, Clone)]
pub struct ConfirmBooking {
    pub booking_id: BookingId,
}

impl ConfirmBooking {
    pub fn new(booking_id: BookingId) -> Self {
        Self { booking_id }
    }
}

impl Command for ConfirmBooking {
    type Aggregate = Booking;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::booking(self.booking_id)
    }
}

/// Command to cancel a confirmed booking.
#[derive(Debug, Clone)]
pub struct CancelBooking {
    pub booking_id: BookingId,
    pub cancelled_by: Actor,
    pub reason: Option<String>,
}

impl CancelBooking {
    pub fn new(booking_id: BookingId, cancelled_by: Actor) -> Self {
        Self {
            booking_id,
            cancelled_by,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Command for CancelBooking {
    type Aggregate = Booking;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::booking(self.booking_id)
    }
}
