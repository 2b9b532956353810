//! Cancellation service.

use common::{AggregateId, CancellationId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Cancellation, OpenCancellation, RecordRefund};

/// Service for managing cancellation records.
pub struct CancellationService<S: EventStore> {
    handler: CommandHandler<S, Cancellation>,
}

impl<S: EventStore> CancellationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Cancellation> {
        &self.handler
    }

    #[tracing::instrument(skip(self), fields(booking_id = %cmd.booking_id))]
    pub async fn open(
        &self,
        cmd: OpenCancellation,
    ) -> Result<CommandResult<Cancellation>, DomainError> {
        let id = cmd.aggregate_id();
        self.handler
            .execute(&id, |cancellation| cancellation.open(cmd))
            .await
    }

    #[tracing::instrument(skip(self), fields(cancellation_id = %cmd.cancellation_id))]
    pub async fn record_refund(
        &self,
        cmd: RecordRefund,
    ) -> Result<CommandResult<Cancellation>, DomainError> {
        let id = cmd.aggregate_id();
        let RecordRefund {
            input,
            refunded_by,
            ..
        } = cmd;

        self.handler
            .execute(&id, |cancellation| {
                cancellation.record_refund(input, refunded_by)
            })
            .await
    }

    /// Loads a cancellation by id.
    ///
    /// Returns None if the cancellation doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get(
        &self,
        cancellation_id: CancellationId,
    ) -> Result<Option<Cancellation>, DomainError> {
        self.handler
            .load_existing(&AggregateId::cancellation(cancellation_id))
            .await
    }
}
