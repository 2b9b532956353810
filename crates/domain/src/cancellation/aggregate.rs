//! Cancellation aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, BookingId, CancellationId, SliceKey};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::layout::UnitId;
use crate::money::Money;

use super::events::{CancellationOpenedData, RefundRecordedData};
use super::{CancellationError, CancellationEvent, OpenCancellation};

/// Refund progress of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    Pending,
    Refunded,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for RefundStatus {
    type Err = CancellationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "refunded" => Ok(RefundStatus::Refunded),
            other => Err(CancellationError::InvalidRefund(format!(
                "unknown refund status {other:?}"
            ))),
        }
    }
}

/// What an administrator enters when paying a refund out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInput {
    pub amount: Money,
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RefundInput {
    pub fn new(amount: Money, method: impl Into<String>) -> Self {
        Self {
            amount,
            method: method.into(),
            reference: None,
            notes: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), CancellationError> {
        if !self.amount.is_positive() {
            return Err(CancellationError::InvalidRefund(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.method.trim().is_empty() {
            return Err(CancellationError::InvalidRefund(
                "method is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A refund that has been paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDetails {
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub refunded_at: DateTime<Utc>,
    pub refunded_by: Actor,
}

/// A cancellation as it stands after all of its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub id: CancellationId,
    pub booking_id: BookingId,
    pub slice_key: SliceKey,
    pub unit_ids: Vec<UnitId>,
    pub original_amount: Money,
    pub refund_status: RefundStatus,
    pub refund: Option<RefundDetails>,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Actor,
}

impl CancellationRecord {
    /// Refunded amount, zero while the refund is pending.
    pub fn refund_amount(&self) -> Money {
        self.refund.as_ref().map_or_else(Money::zero, |r| r.amount)
    }

    /// Folds a cancellation event into a record. Shared by the aggregate and
    /// the cancellations read model.
    pub fn apply(record: &mut Option<Self>, event: CancellationEvent) {
        match event {
            CancellationEvent::CancellationOpened(data) => {
                *record = Some(Self::opened(data));
            }
            CancellationEvent::RefundRecorded(data) => {
                if let Some(record) = record {
                    record.apply_refund(data);
                }
            }
        }
    }

    fn opened(data: CancellationOpenedData) -> Self {
        Self {
            id: data.cancellation_id,
            booking_id: data.booking_id,
            slice_key: data.slice_key,
            unit_ids: data.unit_ids,
            original_amount: data.original_amount,
            refund_status: RefundStatus::Pending,
            refund: None,
            reason: data.reason,
            cancelled_at: data.cancelled_at,
            cancelled_by: data.cancelled_by,
        }
    }

    fn apply_refund(&mut self, data: RefundRecordedData) {
        self.refund_status = RefundStatus::Refunded;
        self.refund = Some(RefundDetails {
            amount: data.amount,
            method: data.method,
            reference: data.reference,
            notes: data.notes,
            refunded_at: data.refunded_at,
            refunded_by: data.refunded_by,
        });
    }
}

/// Cancellation aggregate root. At most one exists per booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cancellation {
    #[serde(default)]
    version: Version,

    record: Option<CancellationRecord>,
}

impl Aggregate for Cancellation {
    type Event = CancellationEvent;
    type Error = CancellationError;

    fn aggregate_type() -> &'static str {
        "Cancellation"
    }

    fn id(&self) -> Option<AggregateId> {
        self.record.as_ref().map(|r| AggregateId::cancellation(r.id))
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        CancellationRecord::apply(&mut self.record, event);
    }
}

impl SnapshotCapable for Cancellation {}

// Query methods
impl Cancellation {
    pub fn record(&self) -> Option<&CancellationRecord> {
        self.record.as_ref()
    }

    pub fn into_record(self) -> Option<CancellationRecord> {
        self.record
    }
}

// Command methods (return events)
impl Cancellation {
    pub fn open(&self, cmd: OpenCancellation) -> Result<Vec<CancellationEvent>, CancellationError> {
        if self.record.is_some() {
            return Err(CancellationError::AlreadyOpened);
        }

        Ok(vec![CancellationEvent::CancellationOpened(
            CancellationOpenedData {
                cancellation_id: CancellationId::for_booking(cmd.booking_id),
                booking_id: cmd.booking_id,
                slice_key: cmd.slice_key,
                unit_ids: cmd.unit_ids,
                original_amount: cmd.original_amount,
                cancelled_by: cmd.cancelled_by,
                reason: cmd.reason,
                cancelled_at: Utc::now(),
            },
        )])
    }

    pub fn record_refund(
        &self,
        input: RefundInput,
        refunded_by: Actor,
    ) -> Result<Vec<CancellationEvent>, CancellationError> {
        let record = self.record.as_ref().ok_or(CancellationError::NotOpened)?;
        if record.refund_status == RefundStatus::Refunded {
            return Err(CancellationError::AlreadyRefunded);
        }
        input.validate()?;

        Ok(vec![CancellationEvent::RefundRecorded(RefundRecordedData {
            cancellation_id: record.id,
            amount: input.amount,
            method: input.method,
            reference: input.reference,
            notes: input.notes,
            refunded_by,
            refunded_at: Utc::now(),
        })])
    }
}
