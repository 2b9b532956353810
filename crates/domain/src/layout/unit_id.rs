use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LayoutError;

/// Canonical identity of one bookable unit: `{block}-C{column}-R{row}-S{seat}`.
///
/// Block ids are ASCII letters only, which keeps the two historical
/// formats (`A-1-2-3` and `A1-2-3`) unambiguous when migrating old slices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId {
    pub(super) block: String,
    pub(super) column: u32,
    pub(super) row: u32,
    pub(super) seat: u32,
}

impl UnitId {
    pub fn new(block: impl Into<String>, column: u32, row: u32, seat: u32) -> Result<Self, LayoutError> {
        let block = block.into();
        if !is_valid_block_id(&block) {
            return Err(LayoutError::InvalidBlockId(block));
        }
        if column == 0 || row == 0 || seat == 0 {
            return Err(LayoutError::InvalidUnitId(format!(
                "{block}-C{column}-R{row}-S{seat}"
            )));
        }
        Ok(Self {
            block,
            column,
            row,
            seat,
        })
    }

    pub fn block(&self) -> &str {
        &self.block
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn seat(&self) -> u32 {
        self.seat
    }

    /// Parses either the canonical form or one of the historical formats.
    pub fn parse_any(s: &str) -> Result<Self, LayoutError> {
        s.parse().or_else(|_| {
            Self::parse_legacy(s).ok_or_else(|| LayoutError::InvalidUnitId(s.to_string()))
        })
    }

    /// Parses a historical id: `A-1-2-3` (bare numbers) or `A1-2-3`
    /// (block glued to column). Returns `None` for anything else, including
    /// canonical ids.
    pub fn parse_legacy(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            [block, column, row, seat] => Self::new(
                *block,
                parse_number(column)?,
                parse_number(row)?,
                parse_number(seat)?,
            )
            .ok(),
            [glued, row, seat] => {
                let split = glued.find(|c: char| c.is_ascii_digit())?;
                let (block, column) = glued.split_at(split);
                Self::new(
                    block,
                    parse_number(column)?,
                    parse_number(row)?,
                    parse_number(seat)?,
                )
                .ok()
            }
            _ => None,
        }
    }

    /// Whether `s` is already in canonical form.
    pub fn is_canonical(s: &str) -> bool {
        s.parse::<UnitId>().is_ok_and(|id| id.to_string() == s)
    }
}

pub(super) fn is_valid_block_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 16 && id.chars().all(|c| c.is_ascii_alphabetic())
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_prefixed(s: &str, prefix: char) -> Option<u32> {
    parse_number(s.strip_prefix(prefix)?)
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-C{}-R{}-S{}",
            self.block, self.column, self.row, self.seat
        )
    }
}

impl FromStr for UnitId {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LayoutError::InvalidUnitId(s.to_string());
        let parts: Vec<&str> = s.split('-').collect();
        let [block, column, row, seat] = parts.as_slice() else {
            return Err(invalid());
        };
        Self::new(
            *block,
            parse_prefixed(column, 'C').ok_or_else(invalid)?,
            parse_prefixed(row, 'R').ok_or_else(invalid)?,
            parse_prefixed(seat, 'S').ok_or_else(invalid)?,
        )
    }
}

impl TryFrom<String> for UnitId {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip() {
        let id = UnitId::new("A", 1, 2, 3).unwrap();
        assert_eq!(id.to_string(), "A-C1-R2-S3");
        assert_eq!("A-C1-R2-S3".parse::<UnitId>().unwrap(), id);
        assert!(UnitId::is_canonical("A-C1-R2-S3"));
    }

    #[test]
    fn legacy_formats_map_to_canonical() {
        let expected = UnitId::new("VIP", 2, 10, 4).unwrap();
        assert_eq!(UnitId::parse_legacy("VIP-2-10-4"), Some(expected.clone()));
        assert_eq!(UnitId::parse_legacy("VIP2-10-4"), Some(expected.clone()));
        assert_eq!(UnitId::parse_any("VIP2-10-4").unwrap(), expected);
        assert!(!UnitId::is_canonical("VIP-2-10-4"));
    }

    #[test]
    fn canonical_ids_are_not_legacy() {
        assert!(UnitId::parse_legacy("A-C1-R2-S3").is_none());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "A", "A-C0-R1-S1", "1-C1-R1-S1", "A-C1-R1", "A--1-1", "A-Cx-R1-S1"] {
            assert!(UnitId::parse_any(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn zero_padded_canonical_is_not_canonical() {
        // Parses, but its display differs, so it is not the canonical spelling.
        assert!(!UnitId::is_canonical("A-C01-R2-S3"));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let id = UnitId::new("E", 2, 3, 1).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"E-C2-R3-S1\"");
        assert!(serde_json::from_str::<UnitId>("\"E-2-3-1\"").is_err());
    }
}
