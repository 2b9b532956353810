//! Booking aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::{Booking, BookingRecord};
pub use commands::{CancelBooking, ConfirmBooking, PlaceBooking};
pub use events::{BookingCancelledData, BookingConfirmedData, BookingEvent, BookingPlacedData};
pub use service::BookingService;
pub use state::BookingStatus;
pub use value_objects::{CustomerInfo, PaymentInfo};

use thiserror::Error;

/// Errors that can occur during booking operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("Booking already placed")]
    AlreadyPlaced,

    #[error("Booking has not been placed")]
    NotPlaced,

    #[error("Booking has no units")]
    NoUnits,

    #[error("Customer user id is required")]
    CustomerRequired,

    #[error("Invalid amount: {paise} paise (must not be negative)")]
    InvalidAmount { paise: i64 },

    /// Booking is not in the expected state.
    #[error("Invalid state transition: cannot {action} a {current} booking")]
    InvalidStateTransition {
        current: BookingStatus,
        action: &'static str,
    },
}
