//! Bulk block/unblock over explicit or filtered unit selections.

use std::sync::Arc;

use common::{Actor, SliceKey};
use domain::{Transition, TransitionKind, UnitCategory, UnitDescriptor, UnitStatus};
use event_store::{EventStore, Version};
use serde::{Deserialize, Serialize};

use crate::coordinator::{AllocationCoordinator, AllocationOutcome};
use crate::error::{AllocationError, Result};
use crate::policy::{self, Operation};

/// Narrows the layout of a slice. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFilter {
    pub block: Option<String>,
    pub category: Option<UnitCategory>,
    pub row: Option<u32>,
    pub status: Option<UnitStatus>,
}

impl UnitFilter {
    pub fn matches(&self, unit: &UnitDescriptor, status: UnitStatus) -> bool {
        self.block.as_ref().is_none_or(|b| *b == unit.block_id)
            && self.category.is_none_or(|c| c == unit.category)
            && self.row.is_none_or(|r| r == unit.id.row())
            && self.status.is_none_or(|s| s == status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    Explicit { unit_ids: Vec<String> },
    AllFiltered { filter: UnitFilter },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkAction {
    Block { reason: String },
    Unblock,
}

impl BulkAction {
    fn transition(self) -> Transition {
        match self {
            BulkAction::Block { reason } => Transition::Block { reason },
            BulkAction::Unblock => Transition::Unblock,
        }
    }

    fn kind(&self) -> TransitionKind {
        match self {
            BulkAction::Block { .. } => TransitionKind::Block,
            BulkAction::Unblock => TransitionKind::Unblock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Selection size before booked units were dropped.
    pub requested_count: usize,
    pub dropped_booked: usize,
    pub applied_count: usize,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub version: Version,
}

impl BulkOutcome {
    fn empty(requested_count: usize, dropped_booked: usize, version: Version) -> Self {
        Self {
            requested_count,
            dropped_booked,
            applied_count: 0,
            applied: Vec::new(),
            skipped: Vec::new(),
            version,
        }
    }

    fn from_outcome(requested_count: usize, dropped_booked: usize, outcome: AllocationOutcome) -> Self {
        Self {
            requested_count,
            dropped_booked,
            applied_count: outcome.applied_count(),
            applied: outcome.applied,
            skipped: outcome.skipped,
            version: outcome.version,
        }
    }
}

/// Admin bulk actions, executed as a single allocation.
pub struct BulkExecutor<S: EventStore> {
    coordinator: Arc<AllocationCoordinator<S>>,
}

impl<S: EventStore> BulkExecutor<S> {
    pub fn new(coordinator: Arc<AllocationCoordinator<S>>) -> Self {
        Self { coordinator }
    }

    #[tracing::instrument(skip(self, selection, action, actor), fields(slice = %key, actor = %actor))]
    pub async fn execute(
        &self,
        key: &SliceKey,
        selection: Selection,
        action: BulkAction,
        actor: &Actor,
    ) -> Result<BulkOutcome> {
        policy::authorize(actor, Operation::Allocate(action.kind()))?;

        let (unit_ids, requested_count, dropped_booked) = match selection {
            Selection::Explicit { unit_ids } => {
                let count = unit_ids.len();
                (unit_ids, count, 0)
            }
            Selection::AllFiltered { filter } => self.select(key, &filter, &action).await?,
        };

        if unit_ids.is_empty() {
            if requested_count == 0 && dropped_booked == 0 {
                return Err(AllocationError::Validation(
                    "selection matched no units".to_string(),
                ));
            }
            let version = self.coordinator.get_slice(key).await?.version;
            return Ok(BulkOutcome::empty(requested_count, dropped_booked, version));
        }

        let outcome = self
            .coordinator
            .allocate(key, &unit_ids, action.transition(), actor)
            .await?;
        metrics::counter!("bulk_actions_total").increment(1);
        tracing::info!(
            requested = requested_count,
            dropped_booked,
            applied = outcome.applied_count(),
            "bulk action finished"
        );

        Ok(BulkOutcome::from_outcome(requested_count, dropped_booked, outcome))
    }

    /// Expands a filter over the layout, dropping booked units.
    ///
    /// Blocking only reaches active blocks. Unblocking reaches every block,
    /// so units held in a block that was later deactivated can be freed.
    async fn select(
        &self,
        key: &SliceKey,
        filter: &UnitFilter,
        action: &BulkAction,
    ) -> Result<(Vec<String>, usize, usize)> {
        let layout = self.coordinator.get_layout(key.kind()).await?;
        let slice = self.coordinator.get_slice(key).await?;
        let candidates = match action {
            BulkAction::Block { .. } => layout.units(),
            BulkAction::Unblock => layout.all_units(),
        };

        let mut selected = Vec::new();
        let mut requested = 0;
        let mut dropped = 0;
        for unit in candidates {
            let id = unit.id.to_string();
            let status = slice.status_of(&id);
            if !filter.matches(&unit, status) {
                continue;
            }
            requested += 1;
            if status == UnitStatus::Booked {
                dropped += 1;
                continue;
            }
            selected.push(id);
        }

        Ok((selected, requested, dropped))
    }
}
