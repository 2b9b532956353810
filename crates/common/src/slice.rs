use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing inventory kinds and slice keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SliceKeyError {
    #[error("unknown inventory kind: {0}")]
    UnknownKind(String),

    #[error("malformed slice key: {0}")]
    Malformed(String),

    #[error("invalid date in slice key: {0}")]
    InvalidDate(String),

    #[error("{kind} inventory cannot use a {window} window")]
    WindowMismatch {
        kind: &'static str,
        window: &'static str,
    },
}

/// The kind of inventory a layout and its slices describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    /// Seats around a havan kund, sold per date and shift.
    HavanSeat,
    /// Vendor stalls, sold per date and shift.
    Stall,
    /// Theatre seats, sold per show instance.
    ShowSeat,
}

impl InventoryKind {
    pub const ALL: [InventoryKind; 3] = [Self::HavanSeat, Self::Stall, Self::ShowSeat];

    /// Short name used in slice keys and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HavanSeat => "havan",
            Self::Stall => "stall",
            Self::ShowSeat => "show",
        }
    }

    /// Whether slices of this kind are keyed by show instance.
    pub fn is_show(&self) -> bool {
        matches!(self, Self::ShowSeat)
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryKind {
    type Err = SliceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "havan" => Ok(Self::HavanSeat),
            "stall" => Ok(Self::Stall),
            "show" => Ok(Self::ShowSeat),
            other => Err(SliceKeyError::UnknownKind(other.to_string())),
        }
    }
}

/// The bookable time window of a slice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Shift { date: NaiveDate, shift: String },
    Show { instance: String },
}

impl TimeWindow {
    fn label(&self) -> &'static str {
        match self {
            Self::Shift { .. } => "shift",
            Self::Show { .. } => "show",
        }
    }
}

/// Address of one availability slice: an inventory kind and a time window.
///
/// The canonical string form is `kind:date:shift` for shift windows and
/// `show:instance` for show windows. Parsing is the exact inverse of
/// `Display`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SliceKey {
    kind: InventoryKind,
    window: TimeWindow,
}

impl SliceKey {
    /// Creates a key for a date and shift.
    pub fn shift(
        kind: InventoryKind,
        date: NaiveDate,
        shift: impl Into<String>,
    ) -> Result<Self, SliceKeyError> {
        Self::new(
            kind,
            TimeWindow::Shift {
                date,
                shift: shift.into(),
            },
        )
    }

    /// Creates a key for a show instance.
    pub fn show(instance: impl Into<String>) -> Result<Self, SliceKeyError> {
        Self::new(
            InventoryKind::ShowSeat,
            TimeWindow::Show {
                instance: instance.into(),
            },
        )
    }

    pub fn new(kind: InventoryKind, window: TimeWindow) -> Result<Self, SliceKeyError> {
        if kind.is_show() != matches!(window, TimeWindow::Show { .. }) {
            return Err(SliceKeyError::WindowMismatch {
                kind: kind.as_str(),
                window: window.label(),
            });
        }
        let segment = match &window {
            TimeWindow::Shift { shift, .. } => shift,
            TimeWindow::Show { instance } => instance,
        };
        if !is_valid_segment(segment) {
            return Err(SliceKeyError::Malformed(segment.clone()));
        }
        Ok(Self { kind, window })
    }

    pub fn kind(&self) -> InventoryKind {
        self.kind
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.window {
            TimeWindow::Shift { date, shift } => {
                write!(f, "{}:{}:{}", self.kind, date.format("%Y-%m-%d"), shift)
            }
            TimeWindow::Show { instance } => write!(f, "{}:{}", self.kind, instance),
        }
    }
}

impl FromStr for SliceKey {
    type Err = SliceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| SliceKeyError::Malformed(s.to_string()))?;
        let kind: InventoryKind = kind.parse()?;

        if kind.is_show() {
            return Self::show(rest);
        }

        let (date, shift) = rest
            .split_once(':')
            .ok_or_else(|| SliceKeyError::Malformed(s.to_string()))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| SliceKeyError::InvalidDate(date.to_string()))?;
        Self::shift(kind, date, shift)
    }
}

impl TryFrom<String> for SliceKey {
    type Error = SliceKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SliceKey> for String {
    fn from(key: SliceKey) -> Self {
        key.to_string()
    }
}
