//! Per-unit state and the transitions between states.

use std::fmt;

use chrono::{DateTime, Utc};
use common::BookingId;
use serde::{Deserialize, Serialize};

/// Stored state of a unit. A unit with no stored state is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitState {
    Booked {
        booking_id: BookingId,
        user_id: String,
        customer_name: String,
        booked_at: DateTime<Utc>,
    },
    Blocked {
        reason: String,
        blocked_at: DateTime<Utc>,
        blocked_by: String,
    },
}

impl UnitState {
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::Booked { .. } => UnitStatus::Booked,
            Self::Blocked { .. } => UnitStatus::Blocked,
        }
    }

    pub fn is_booked_by(&self, booking: BookingId) -> bool {
        matches!(self, Self::Booked { booking_id, .. } if *booking_id == booking)
    }
}

/// The three mutually exclusive unit states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Booked,
    Blocked,
}

impl UnitStatus {
    pub fn of(state: Option<&UnitState>) -> Self {
        state.map_or(Self::Available, UnitState::status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a booked unit belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingClaim {
    pub booking_id: BookingId,
    pub user_id: String,
    pub customer_name: String,
}

/// A requested state change for a set of units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// Available to Booked.
    Book(BookingClaim),
    /// Available to Blocked.
    Block { reason: String },
    /// Blocked to Available.
    Unblock,
    /// Booked by `booking_id` to Available.
    Release { booking_id: BookingId },
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Self::Book(_) => TransitionKind::Book,
            Self::Block { .. } => TransitionKind::Block,
            Self::Unblock => TransitionKind::Unblock,
            Self::Release { .. } => TransitionKind::Release,
        }
    }

    /// Whether a unit in `state` may take this transition.
    pub fn accepts(&self, state: Option<&UnitState>) -> bool {
        match self {
            Self::Book(_) | Self::Block { .. } => state.is_none(),
            Self::Unblock => matches!(state, Some(UnitState::Blocked { .. })),
            Self::Release { booking_id } => state.is_some_and(|s| s.is_booked_by(*booking_id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Book,
    Block,
    Unblock,
    Release,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booked(booking_id: BookingId) -> UnitState {
        UnitState::Booked {
            booking_id,
            user_id: "u-1".to_string(),
            customer_name: "Asha".to_string(),
            booked_at: Utc::now(),
        }
    }

    fn blocked() -> UnitState {
        UnitState::Blocked {
            reason: "maintenance".to_string(),
            blocked_at: Utc::now(),
            blocked_by: "admin".to_string(),
        }
    }

    #[test]
    fn preconditions() {
        let booking = BookingId::new();
        let book = Transition::Book(BookingClaim {
            booking_id: booking,
            user_id: "u-1".to_string(),
            customer_name: "Asha".to_string(),
        });
        let block = Transition::Block {
            reason: "vip".to_string(),
        };

        assert!(book.accepts(None));
        assert!(!book.accepts(Some(&blocked())));
        assert!(!block.accepts(Some(&booked(booking))));
        assert!(Transition::Unblock.accepts(Some(&blocked())));
        assert!(!Transition::Unblock.accepts(None));
        assert!(!Transition::Unblock.accepts(Some(&booked(booking))));

        let release = Transition::Release { booking_id: booking };
        assert!(release.accepts(Some(&booked(booking))));
        assert!(!release.accepts(Some(&booked(BookingId::new()))));
        assert!(!release.accepts(Some(&blocked())));
        assert!(!release.accepts(None));
    }

    #[test]
    fn status_defaults_to_available() {
        assert_eq!(UnitStatus::of(None), UnitStatus::Available);
        assert_eq!(UnitStatus::of(Some(&blocked())), UnitStatus::Blocked);
    }

    #[test]
    fn transition_json_shape() {
        let json = serde_json::to_value(Transition::Block {
            reason: "stage".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "block");
        assert_eq!(json["reason"], "stage");

        let unblock: Transition = serde_json::from_str(r#"{"type":"unblock"}"#).unwrap();
        assert_eq!(unblock.kind(), TransitionKind::Unblock);
    }
}
