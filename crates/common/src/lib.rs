//! Identifiers shared by every crate in the workspace.

pub mod actor;
pub mod slice;
pub mod types;

pub use actor::{Actor, ActorRole, ParseRoleError};
pub use slice::{InventoryKind, SliceKey, SliceKeyError, TimeWindow};
pub use types::{AggregateId, BookingId, CancellationId};
