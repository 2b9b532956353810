//! Query side of the allocation system.
//!
//! Bookings and cancellations are folded from their event streams into
//! in-memory views by a [`ProjectionProcessor`]; the refund report is
//! computed from the cancellation records on every call. The activity log
//! needs no view and reads audited events straight from the store.

pub mod activity;
pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use activity::{ActivityLog, ActivityPage, ActivityRecord, MAX_PAGE_SIZE};
pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    BookingsView, CancellationFilter, CancellationReport, CancellationsView,
};
