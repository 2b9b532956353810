//! Cancellation and refund records.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{Cancellation, CancellationRecord, RefundDetails, RefundInput, RefundStatus};
pub use commands::{OpenCancellation, RecordRefund};
pub use events::{CancellationEvent, CancellationOpenedData, RefundRecordedData};
pub use service::CancellationService;

use thiserror::Error;

/// Errors that can occur during cancellation and refund operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancellationError {
    #[error("Cancellation already exists for this booking")]
    AlreadyOpened,

    #[error("Cancellation not found")]
    NotOpened,

    #[error("Refund already recorded")]
    AlreadyRefunded,

    #[error("Invalid refund: {0}")]
    InvalidRefund(String),
}
