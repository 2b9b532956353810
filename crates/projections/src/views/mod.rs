//! Read model views for the CQRS query side.

pub mod bookings;
pub mod cancellations;

pub use bookings::BookingsView;
pub use cancellations::{CancellationFilter, CancellationReport, CancellationsView};
