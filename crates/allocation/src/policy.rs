//! Role rules for allocation operations.

use std::fmt;

use common::{Actor, ActorRole};
use domain::TransitionKind;

use crate::error::{AllocationError, Result};

/// Every operation the services gate on the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Allocate(TransitionKind),
    Checkout,
    CancelBooking,
    RecordRefund,
    MigrateLegacyIds,
    ManageLayout,
    ViewRecords,
    Sweep,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Allocate(kind) => write!(f, "{kind} units"),
            Operation::Checkout => f.write_str("place bookings"),
            Operation::CancelBooking => f.write_str("cancel bookings"),
            Operation::RecordRefund => f.write_str("record refunds"),
            Operation::MigrateLegacyIds => f.write_str("migrate unit ids"),
            Operation::ManageLayout => f.write_str("manage layouts"),
            Operation::ViewRecords => f.write_str("view cancellations and activity"),
            Operation::Sweep => f.write_str("run reconciliation"),
        }
    }
}

fn allowed_roles(operation: Operation) -> &'static [ActorRole] {
    match operation {
        // Units become Booked only under a placed booking, which checkout
        // creates before it claims them as the system.
        Operation::Allocate(TransitionKind::Book) => &[ActorRole::System],
        Operation::Checkout => &[ActorRole::Customer, ActorRole::System],
        Operation::Allocate(TransitionKind::Block | TransitionKind::Unblock) => &[ActorRole::Admin],
        Operation::Allocate(TransitionKind::Release) | Operation::Sweep => {
            &[ActorRole::Admin, ActorRole::System]
        }
        Operation::CancelBooking
        | Operation::RecordRefund
        | Operation::MigrateLegacyIds
        | Operation::ManageLayout
        | Operation::ViewRecords => &[ActorRole::Admin],
    }
}

/// Fails with `PermissionDenied` unless `actor` may perform `operation`.
pub fn authorize(actor: &Actor, operation: Operation) -> Result<()> {
    if allowed_roles(operation).contains(&actor.role) {
        return Ok(());
    }

    tracing::warn!(actor = %actor, %operation, "permission denied");
    metrics::counter!("allocation_permission_denied_total").increment(1);
    Err(AllocationError::PermissionDenied {
        actor_role: actor.role.to_string(),
        operation: operation.to_string(),
    })
}
