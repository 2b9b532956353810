//! Cancellation domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, BookingId, CancellationId, SliceKey};
use event_store::AuditEntry;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::layout::UnitId;
use crate::money::Money;

/// Events that can occur on a cancellation aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CancellationEvent {
    /// A confirmed booking was cancelled and now awaits its refund.
    CancellationOpened(CancellationOpenedData),

    /// The refund was paid out.
    RefundRecorded(RefundRecordedData),
}

impl DomainEvent for CancellationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CancellationEvent::CancellationOpened(_) => "CancellationOpened",
            CancellationEvent::RefundRecorded(_) => "RefundRecorded",
        }
    }

    fn audit(&self) -> Option<AuditEntry> {
        match self {
            CancellationEvent::RefundRecorded(data) => Some(
                AuditEntry::new(
                    data.refunded_by.clone(),
                    "record_refund",
                    AggregateId::cancellation(data.cancellation_id).to_string(),
                    vec![],
                )
                .with_note(format!("{} via {}", data.amount, data.method)),
            ),
            // The booking cancellation that opens this record is audited.
            CancellationEvent::CancellationOpened(_) => None,
        }
    }
}

impl CancellationEvent {
    pub fn cancellation_id(&self) -> CancellationId {
        match self {
            CancellationEvent::CancellationOpened(data) => data.cancellation_id,
            CancellationEvent::RefundRecorded(data) => data.cancellation_id,
        }
    }
}

/// Data for CancellationOpened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOpenedData {
    pub cancellation_id: CancellationId,
    pub booking_id: BookingId,
    pub slice_key: SliceKey,
    pub unit_ids: Vec<UnitId>,
    pub original_amount: Money,
    pub cancelled_by: Actor,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for RefundRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRecordedData {
    pub cancellation_id: CancellationId,
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub refunded_by: Actor,
    pub refunded_at: DateTime<Utc>,
}
