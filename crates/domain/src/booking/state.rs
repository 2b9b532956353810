//! Booking state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The state of a booking in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Cancelled
/// ```
///
/// A pending booking whose units could not be claimed simply stays pending
/// and owns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Recorded by checkout, units not yet claimed.
    #[default]
    Pending,

    /// Payment confirmed and units booked.
    Confirmed,

    /// Cancelled after confirmation (terminal state).
    Cancelled,
}

impl BookingStatus {
    pub fn can_confirm(&self) -> bool {
        matches!(self, BookingStatus::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
