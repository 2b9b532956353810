//! Cancellation commands.

use common::{Actor, AggregateId, BookingId, CancellationId, SliceKey};

use crate::booking::BookingRecord;
use crate::command::Command;
use crate::layout::UnitId;
use crate::money::Money;

use super::{Cancellation, RefundInput};

/// Command to open the cancellation record for a cancelled booking.
#[derive(Debug, Clone)]
pub struct OpenCancellation {
    pub booking_id: BookingId,
    pub slice_key: SliceKey,
    pub unit_ids: Vec<UnitId>,
    pub original_amount: Money,
    pub cancelled_by: Actor,
    pub reason: Option<String>,
}

impl OpenCancellation {
    /// Opens a cancellation carrying the booking's units and paid amount.
    pub fn for_booking(booking: &BookingRecord, cancelled_by: Actor, reason: Option<String>) -> Self {
        Self {
            booking_id: booking.id,
            slice_key: booking.slice_key.clone(),
            unit_ids: booking.unit_ids.clone(),
            original_amount: booking.payment.amount,
            cancelled_by,
            reason,
        }
    }
}

impl Command for OpenCancellation {
    type Aggregate = Cancellation;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::cancellation(CancellationId::for_booking(self.booking_id))
    }
}

/// Command to record the refund paid for a cancellation.
#[derive(Debug, Clone)]
pub struct RecordRefund {
    pub cancellation_id: CancellationId,
    pub input: RefundInput,
    pub refunded_by: Actor,
}

impl RecordRefund {
    pub fn new(cancellation_id: CancellationId, input: RefundInput, refunded_by: Actor) -> Self {
        Self {
            cancellation_id,
            input,
            refunded_by,
        }
    }
}

impl Command for RecordRefund {
    type Aggregate = Cancellation;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::cancellation(self.cancellation_id)
    }
}
