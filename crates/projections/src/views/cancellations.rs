//! Cancellations read model: cancellation records and the refund report.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CancellationId, SliceKey};
use domain::{CancellationEvent, CancellationRecord, Money, RefundStatus};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, decode};
use crate::read_model::ReadModel;

/// Criteria for listing cancellations. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationFilter {
    pub refund_status: Option<RefundStatus>,
    pub slice_key: Option<SliceKey>,
    /// Inclusive lower bound on `cancelled_at`.
    pub cancelled_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `cancelled_at`.
    pub cancelled_to: Option<DateTime<Utc>>,
}

impl CancellationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refund_status(mut self, status: RefundStatus) -> Self {
        self.refund_status = Some(status);
        self
    }

    pub fn slice_key(mut self, key: SliceKey) -> Self {
        self.slice_key = Some(key);
        self
    }

    pub fn cancelled_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.cancelled_from = from;
        self.cancelled_to = to;
        self
    }

    pub fn matches(&self, record: &CancellationRecord) -> bool {
        if let Some(status) = self.refund_status
            && record.refund_status != status
        {
            return false;
        }
        if let Some(ref key) = self.slice_key
            && &record.slice_key != key
        {
            return false;
        }
        if let Some(from) = self.cancelled_from
            && record.cancelled_at < from
        {
            return false;
        }
        if let Some(to) = self.cancelled_to
            && record.cancelled_at > to
        {
            return false;
        }
        true
    }
}

/// Refund totals over a set of cancellations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationReport {
    pub total_cancellations: usize,
    pub pending_refund_count: usize,
    pub refunded_count: usize,
    pub total_refund_amount: Money,
    pub total_original_amount: Money,
}

impl CancellationReport {
    /// Folds the report from records. Nothing is cached between calls.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CancellationRecord>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut report, record| {
                report.total_cancellations += 1;
                match record.refund_status {
                    RefundStatus::Pending => report.pending_refund_count += 1,
                    RefundStatus::Refunded => report.refunded_count += 1,
                }
                report.total_refund_amount += record.refund_amount();
                report.total_original_amount += record.original_amount;
                report
            })
    }
}

/// Read model view holding every cancellation record.
#[derive(Clone)]
pub struct CancellationsView {
    cancellations: Arc<RwLock<HashMap<CancellationId, CancellationRecord>>>,
}

impl CancellationsView {
    /// Creates a new empty cancellations view.
    pub fn new() -> Self {
        Self {
            cancellations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, cancellation_id: CancellationId) -> Option<CancellationRecord> {
        self.cancellations
            .read()
            .await
            .get(&cancellation_id)
            .cloned()
    }

    /// Lists matching cancellations, most recently cancelled first.
    pub async fn list(&self, filter: &CancellationFilter) -> Vec<CancellationRecord> {
        let mut records: Vec<_> = self
            .cancellations
            .read()
            .await
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.cancelled_at
                .cmp(&a.cancelled_at)
                .then_with(|| b.id.as_uuid().cmp(&a.id.as_uuid()))
        });
        records
    }

    /// Computes the report over all stored cancellations.
    pub async fn report(&self) -> CancellationReport {
        CancellationReport::from_records(self.cancellations.read().await.values())
    }
}

impl Default for CancellationsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for CancellationsView {
    fn name(&self) -> &'static str {
        "CancellationsView"
    }

    fn source(&self) -> &'static str {
        "Cancellation"
    }

    async fn apply(&self, event: &EventEnvelope) -> Result<()> {
        let cancellation_event: CancellationEvent = decode(self.name(), event)?;
        let cancellation_id = cancellation_event.cancellation_id();

        let mut cancellations = self.cancellations.write().await;
        let mut record = cancellations.remove(&cancellation_id);
        CancellationRecord::apply(&mut record, cancellation_event);
        if let Some(record) = record {
            cancellations.insert(cancellation_id, record);
        }
        Ok(())
    }

    async fn clear(&self) {
        self.cancellations.write().await.clear();
    }
}

#[async_trait]
impl ReadModel for CancellationsView {
    type Key = CancellationId;
    type Record = CancellationRecord;

    async fn find(&self, key: &CancellationId) -> Option<CancellationRecord> {
        self.get(*key).await
    }

    async fn len(&self) -> usize {
        self.cancellations.read().await.len()
    }
}
