//! Allocation services over availability slices.
//!
//! This crate owns every unit-state change:
//! - [`AllocationCoordinator`] applies transitions with optimistic concurrency
//! - [`BulkExecutor`] runs admin block/unblock over filtered selections
//! - [`SyncPublisher`] pushes committed slice snapshots to live viewers
//! - [`Reconciler`] cancels bookings, records refunds and sweeps leftovers
//! - [`CheckoutService`] claims units for a new booking
//!
//! Unit-level conflicts are never retried here; callers decide what to do
//! with the units they lost.

pub mod bulk;
pub mod checkout;
pub mod coordinator;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod sync;

#[cfg(test)]
mod testing;

pub use bulk::{BulkAction, BulkExecutor, BulkOutcome, Selection, UnitFilter};
pub use checkout::CheckoutService;
pub use coordinator::{
    AllocationCoordinator, AllocationOutcome, AllocationPolicy, CoordinatorConfig, OutcomeStatus,
    PreparedAllocation, UnitView,
};
pub use error::{AllocationError, Result};
pub use policy::{Operation, authorize};
pub use reconciler::{Reconciler, SweepReport};
pub use sync::{
    BackoffPolicy, ReconnectingSubscription, SliceSnapshot, SnapshotFeed, SnapshotStream,
    Subscription, SyncPublisher,
};
