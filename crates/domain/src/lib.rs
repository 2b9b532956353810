//! Domain layer for slice inventory allocation.
//!
//! This crate provides:
//! - Aggregate and command handling infrastructure over the event store
//! - The inventory layout generator and its read-through cache
//! - The availability slice aggregate (unit to state map per time window)
//! - Booking and cancellation aggregates with their state machines

pub mod aggregate;
pub mod booking;
pub mod cancellation;
pub mod command;
pub mod error;
pub mod layout;
pub mod money;
pub mod slice;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use booking::{
    Booking, BookingError, BookingEvent, BookingRecord, BookingService, BookingStatus,
    CancelBooking, ConfirmBooking, CustomerInfo, PaymentInfo, PlaceBooking,
};
pub use cancellation::{
    Cancellation, CancellationError, CancellationEvent, CancellationRecord, CancellationService,
    OpenCancellation, RecordRefund, RefundDetails, RefundInput, RefundStatus,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use layout::{
    Block, InMemoryLayoutSource, Layout, LayoutCache, LayoutChanged, LayoutError, LayoutSource,
    UnitCategory, UnitDescriptor, UnitId,
};
pub use money::Money;
pub use slice::{
    AvailabilitySlice, BookingClaim, MigrationReport, SliceError, SliceEvent, SlicePlan,
    Transition, TransitionKind, UnitState, UnitStatus,
};
