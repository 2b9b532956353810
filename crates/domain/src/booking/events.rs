//! Booking domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, BookingId, SliceKey};
use event_store::AuditEntry;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::layout::UnitId;

use super::{CustomerInfo, PaymentInfo};

/// Events that can occur on a booking aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// Checkout recorded the booking.
    BookingPlaced(BookingPlacedData),

    /// Units were claimed and the booking is final.
    BookingConfirmed(BookingConfirmedData),

    /// An administrator cancelled the booking.
    BookingCancelled(BookingCancelledData),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingPlaced(_) => "BookingPlaced",
            BookingEvent::BookingConfirmed(_) => "BookingConfirmed",
            BookingEvent::BookingCancelled(_) => "BookingCancelled",
        }
    }

    fn audit(&self) -> Option<AuditEntry> {
        match self {
            BookingEvent::BookingCancelled(data) => {
                let entry = AuditEntry::new(
                    data.cancelled_by.clone(),
                    "cancel_booking",
                    AggregateId::booking(data.booking_id).to_string(),
                    data.unit_ids.iter().map(UnitId::to_string).collect(),
                );
                Some(match &data.reason {
                    Some(reason) => entry.with_note(reason.clone()),
                    None => entry,
                })
            }
            BookingEvent::BookingPlaced(_) | BookingEvent::BookingConfirmed(_) => None,
        }
    }
}

impl BookingEvent {
    pub fn booking_id(&self) -> BookingId {
        match self {
            BookingEvent::BookingPlaced(data) => data.booking_id,
            BookingEvent::BookingConfirmed(data) => data.booking_id,
            BookingEvent::BookingCancelled(data) => data.booking_id,
        }
    }
}

/// Data for BookingPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPlacedData {
    pub booking_id: BookingId,
    pub slice_key: SliceKey,
    /// Units in the order the customer picked them.
    pub unit_ids: Vec<UnitId>,
    pub customer: CustomerInfo,
    pub payment: PaymentInfo,
    pub placed_at: DateTime<Utc>,
}

/// Data for BookingConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedData {
    pub booking_id: BookingId,
    pub confirmed_at: DateTime<Utc>,
}

/// Data for BookingCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancelledData {
    pub booking_id: BookingId,

    /// Copied from the booking so the cancellation can be reconciled
    /// without loading it again.
    pub slice_key: SliceKey,
    pub unit_ids: Vec<UnitId>,

    pub cancelled_by: Actor,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl BookingEvent {
    pub fn booking_placed(
        booking_id: BookingId,
        slice_key: SliceKey,
        unit_ids: Vec<UnitId>,
        customer: CustomerInfo,
        payment: PaymentInfo,
    ) -> Self {
        BookingEvent::BookingPlaced(BookingPlacedData {
            booking_id,
            slice_key,
            unit_ids,
            customer,
            payment,
            placed_at: Utc::now(),
        })
    }

    pub fn booking_confirmed(booking_id: BookingId) -> Self {
        BookingEvent::BookingConfirmed(BookingConfirmedData {
            booking_id,
            confirmed_at: Utc::now(),
        })
    }

    pub fn booking_cancelled(
        booking_id: BookingId,
        slice_key: SliceKey,
        unit_ids: Vec<UnitId>,
        cancelled_by: Actor,
        reason: Option<String>,
    ) -> Self {
        BookingEvent::BookingCancelled(BookingCancelledData {
            booking_id,
            slice_key,
            unit_ids,
            cancelled_by,
            reason,
            cancelled_at: Utc::now(),
        })
    }
}
