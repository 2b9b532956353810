//! Inventory layout: blocks of units and the deterministic unit universe
//! derived from them.

mod cache;
mod source;
mod unit_id;

pub use cache::LayoutCache;
pub use source::{InMemoryLayoutSource, LayoutChanged, LayoutSource};
pub use unit_id::UnitId;

use std::collections::HashSet;

use common::InventoryKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Errors produced while validating layouts and unit ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Invalid block id {0:?}: block ids are 1-16 ASCII letters")]
    InvalidBlockId(String),

    #[error("Duplicate block id {0}")]
    DuplicateBlock(String),

    #[error("Block {block} has zero {field}")]
    InvalidDimensions { block: String, field: &'static str },

    #[error("Block {block} has a negative price")]
    NegativePrice { block: String },

    #[error("Invalid unit id {0:?}")]
    InvalidUnitId(String),

    #[error("Layout source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Category a block sells its units under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Reserved,
    Free,
    Vip,
    #[default]
    Regular,
}

impl UnitCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Free => "free",
            Self::Vip => "vip",
            Self::Regular => "regular",
        }
    }
}

/// A configured group of units sharing dimensions, price and category.
///
/// For havan seating `columns` are kund columns and `rows` the kunds in
/// each column; stalls and show seats use the same three dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub name: String,
    pub columns: u32,
    pub rows: u32,
    pub seats_per_row: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub category: UnitCategory,
}

fn default_active() -> bool {
    true
}

impl Block {
    /// Creates an active regular block named after its id, priced at zero.
    pub fn new(id: impl Into<String>, columns: u32, rows: u32, seats_per_row: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            columns,
            rows,
            seats_per_row,
            active: true,
            price: Money::zero(),
            category: UnitCategory::Regular,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    pub fn with_category(mut self, category: UnitCategory) -> Self {
        self.category = category;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn unit_count(&self) -> usize {
        self.columns as usize * self.rows as usize * self.seats_per_row as usize
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if !unit_id::is_valid_block_id(&self.id) {
            return Err(LayoutError::InvalidBlockId(self.id.clone()));
        }
        for (field, value) in [
            ("columns", self.columns),
            ("rows", self.rows),
            ("seats_per_row", self.seats_per_row),
        ] {
            if value == 0 {
                return Err(LayoutError::InvalidDimensions {
                    block: self.id.clone(),
                    field,
                });
            }
        }
        if self.price.is_negative() {
            return Err(LayoutError::NegativePrice {
                block: self.id.clone(),
            });
        }
        Ok(())
    }

    fn contains(&self, unit: &UnitId) -> bool {
        unit.block() == self.id
            && unit.column() <= self.columns
            && unit.row() <= self.rows
            && unit.seat() <= self.seats_per_row
    }

    fn descriptor(&self, id: UnitId) -> UnitDescriptor {
        UnitDescriptor {
            id,
            block_id: self.id.clone(),
            category: self.category,
            price: self.price,
            active: self.active,
        }
    }

    /// Units of this block in column, row, seat order.
    fn descriptors(&self) -> impl Iterator<Item = UnitDescriptor> + '_ {
        (1..=self.columns).flat_map(move |column| {
            (1..=self.rows).flat_map(move |row| {
                (1..=self.seats_per_row).map(move |seat| {
                    self.descriptor(UnitId {
                        block: self.id.clone(),
                        column,
                        row,
                        seat,
                    })
                })
            })
        })
    }
}

/// One unit with the attributes it inherits from its block at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub id: UnitId,
    pub block_id: String,
    pub category: UnitCategory,
    pub price: Money,
    pub active: bool,
}

/// The ordered block list for one inventory kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    kind: InventoryKind,
    revision: u64,
    blocks: Vec<Block>,
}

impl Layout {
    pub fn new(kind: InventoryKind, revision: u64, blocks: Vec<Block>) -> Result<Self, LayoutError> {
        let mut seen = HashSet::new();
        for block in &blocks {
            block.validate()?;
            if !seen.insert(block.id.as_str()) {
                return Err(LayoutError::DuplicateBlock(block.id.clone()));
            }
        }
        Ok(Self {
            kind,
            revision,
            blocks,
        })
    }

    pub fn empty(kind: InventoryKind) -> Self {
        Self {
            kind,
            revision: 0,
            blocks: Vec::new(),
        }
    }

    pub fn kind(&self) -> InventoryKind {
        self.kind
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Allocatable units: every unit of every active block, in block order
    /// then column, row, seat.
    pub fn units(&self) -> Vec<UnitDescriptor> {
        self.blocks
            .iter()
            .filter(|b| b.active)
            .flat_map(Block::descriptors)
            .collect()
    }

    /// Every unit of every block, inactive blocks included.
    pub fn all_units(&self) -> Vec<UnitDescriptor> {
        self.blocks.iter().flat_map(Block::descriptors).collect()
    }

    pub fn active_unit_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.active)
            .map(Block::unit_count)
            .sum()
    }

    /// Resolves a unit of any configured block, active or not.
    pub fn resolve(&self, unit: &UnitId) -> Option<UnitDescriptor> {
        self.blocks
            .iter()
            .find(|b| b.contains(unit))
            .map(|b| b.descriptor(unit.clone()))
    }

    /// Whether the unit exists and its block is accepting new allocations.
    pub fn is_allocatable(&self, unit: &UnitId) -> bool {
        self.resolve(unit).is_some_and(|u| u.active)
    }
}
