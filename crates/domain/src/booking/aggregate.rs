//! Booking aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, BookingId, SliceKey};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::layout::UnitId;

use super::{BookingError, BookingEvent, BookingStatus, CustomerInfo, PaymentInfo};

/// A booking as it stands after all of its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: BookingId,
    pub slice_key: SliceKey,
    pub unit_ids: Vec<UnitId>,
    pub customer: CustomerInfo,
    pub payment: PaymentInfo,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Actor>,
}

impl BookingRecord {
    /// Folds a booking event into a record. Shared by the aggregate and the
    /// bookings read model.
    pub fn apply(record: &mut Option<Self>, event: BookingEvent) {
        match event {
            BookingEvent::BookingPlaced(data) => {
                *record = Some(BookingRecord {
                    id: data.booking_id,
                    slice_key: data.slice_key,
                    unit_ids: data.unit_ids,
                    customer: data.customer,
                    payment: data.payment,
                    status: BookingStatus::Pending,
                    created_at: data.placed_at,
                    confirmed_at: None,
                    cancelled_at: None,
                    cancelled_by: None,
                });
            }
            BookingEvent::BookingConfirmed(data) => {
                if let Some(record) = record {
                    record.status = BookingStatus::Confirmed;
                    record.confirmed_at = Some(data.confirmed_at);
                }
            }
            BookingEvent::BookingCancelled(data) => {
                if let Some(record) = record {
                    record.status = BookingStatus::Cancelled;
                    record.cancelled_at = Some(data.cancelled_at);
                    record.cancelled_by = Some(data.cancelled_by);
                }
            }
        }
    }
}

/// Booking aggregate root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default)]
    version: Version,

    record: Option<BookingRecord>,
}

impl Aggregate for Booking {
    type Event = BookingEvent;
    type Error = BookingError;

    fn aggregate_type() -> &'static str {
        "Booking"
    }

    fn id(&self) -> Option<AggregateId> {
        self.record.as_ref().map(|r| AggregateId::booking(r.id))
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        BookingRecord::apply(&mut self.record, event);
    }
}

impl SnapshotCapable for Booking {}

// Query methods
impl Booking {
    pub fn record(&self) -> Option<&BookingRecord> {
        self.record.as_ref()
    }

    pub fn into_record(self) -> Option<BookingRecord> {
        self.record
    }

    /// Returns the status, or `Pending` for a booking that was never placed.
    pub fn status(&self) -> BookingStatus {
        self.record.as_ref().map(|r| r.status).unwrap_or_default()
    }
}

// Command methods (return events)
impl Booking {
    pub fn place(
        &self,
        booking_id: BookingId,
        slice_key: SliceKey,
        unit_ids: Vec<UnitId>,
        customer: CustomerInfo,
        payment: PaymentInfo,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        if self.record.is_some() {
            return Err(BookingError::AlreadyPlaced);
        }
        if unit_ids.is_empty() {
            return Err(BookingError::NoUnits);
        }
        if payment.amount.is_negative() {
            return Err(BookingError::InvalidAmount {
                paise: payment.amount.paise(),
            });
        }
        if customer.user_id.trim().is_empty() {
            return Err(BookingError::CustomerRequired);
        }

        let mut unique = Vec::with_capacity(unit_ids.len());
        for unit in unit_ids {
            if !unique.contains(&unit) {
                unique.push(unit);
            }
        }

        Ok(vec![BookingEvent::booking_placed(
            booking_id, slice_key, unique, customer, payment,
        )])
    }

    pub fn confirm(&self) -> Result<Vec<BookingEvent>, BookingError> {
        let record = self.record.as_ref().ok_or(BookingError::NotPlaced)?;
        if !record.status.can_confirm() {
            return Err(BookingError::InvalidStateTransition {
                current: record.status,
                action: "confirm",
            });
        }
        Ok(vec![BookingEvent::booking_confirmed(record.id)])
    }

    pub fn cancel(
        &self,
        cancelled_by: Actor,
        reason: Option<String>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        let record = self.record.as_ref().ok_or(BookingError::NotPlaced)?;
        if !record.status.can_cancel() {
            return Err(BookingError::InvalidStateTransition {
                current: record.status,
                action: "cancel",
            });
        }
        Ok(vec![BookingEvent::booking_cancelled(
            record.id,
            record.slice_key.clone(),
            record.unit_ids.clone(),
            cancelled_by,
            reason,
        )])
    }
}
