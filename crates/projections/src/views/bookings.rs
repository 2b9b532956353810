//! Bookings read model: booking records indexed by id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, SliceKey};
use domain::{BookingEvent, BookingRecord, BookingStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, decode};
use crate::read_model::ReadModel;

/// Read model view holding the latest record of every booking.
///
/// Records are folded with the same function the aggregate uses, so the view
/// never disagrees with a freshly loaded `Booking`.
#[derive(Clone)]
pub struct BookingsView {
    bookings: Arc<RwLock<HashMap<BookingId, BookingRecord>>>,
}

impl BookingsView {
    /// Creates a new empty bookings view.
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, booking_id: BookingId) -> Option<BookingRecord> {
        self.bookings.read().await.get(&booking_id).cloned()
    }

    /// Gets bookings in the given status, oldest first.
    pub async fn by_status(&self, status: BookingStatus) -> Vec<BookingRecord> {
        let mut records: Vec<_> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        records.sort_by_key(|b| b.created_at);
        records
    }

    /// Gets cancelled bookings. Used by the reconciliation sweep.
    pub async fn cancelled(&self) -> Vec<BookingRecord> {
        self.by_status(BookingStatus::Cancelled).await
    }

    /// Gets every booking placed against a slice.
    pub async fn for_slice(&self, slice_key: &SliceKey) -> Vec<BookingRecord> {
        let mut records: Vec<_> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| &b.slice_key == slice_key)
            .cloned()
            .collect();
        records.sort_by_key(|b| b.created_at);
        records
    }
}

impl Default for BookingsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for BookingsView {
    fn name(&self) -> &'static str {
        "BookingsView"
    }

    fn source(&self) -> &'static str {
        "Booking"
    }

    async fn apply(&self, event: &EventEnvelope) -> Result<()> {
        let booking_event: BookingEvent = decode(self.name(), event)?;
        let booking_id = booking_event.booking_id();

        let mut bookings = self.bookings.write().await;
        let mut record = bookings.remove(&booking_id);
        BookingRecord::apply(&mut record, booking_event);
        if let Some(record) = record {
            bookings.insert(booking_id, record);
        }
        Ok(())
    }

    async fn clear(&self) {
        self.bookings.write().await.clear();
    }
}

#[async_trait]
impl ReadModel for BookingsView {
    type Key = BookingId;
    type Record = BookingRecord;

    async fn find(&self, key: &BookingId) -> Option<BookingRecord> {
        self.get(*key).await
    }

    async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }
}
