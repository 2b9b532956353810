//! Availability slice aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::{AvailabilitySlice, MigrationReport, SlicePlan};
pub use events::{
    SliceEvent, UnitIdsMigratedData, UnitsBlockedData, UnitsBookedData, UnitsReleasedData,
    UnitsUnblockedData,
};
pub use state::{BookingClaim, Transition, TransitionKind, UnitState, UnitStatus};

use thiserror::Error;

/// Errors that can occur when changing unit states on a slice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SliceError {
    #[error("No units selected")]
    EmptySelection,

    /// Some units are not in a state that accepts the transition.
    #[error("Cannot {transition} units {unit_ids:?}")]
    Ineligible {
        transition: TransitionKind,
        unit_ids: Vec<String>,
    },
}
