use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::InventoryKind;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

use super::{Block, Layout, LayoutError};

/// Notification that the layout for a kind has been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutChanged {
    pub kind: InventoryKind,
    pub revision: u64,
}

/// Where layouts come from.
///
/// Implementations publish a [`LayoutChanged`] for every replacement so
/// caches can drop stale copies.
#[async_trait]
pub trait LayoutSource: Send + Sync {
    /// Loads the current layout for `kind`.
    ///
    /// An unconfigured kind yields an empty layout at revision 0.
    async fn load(&self, kind: InventoryKind) -> Result<Layout, LayoutError>;

    /// Subscribes to layout change notifications.
    fn watch(&self) -> broadcast::Receiver<LayoutChanged>;
}

/// Layout source held in memory, used by tests and the default server.
#[derive(Clone)]
pub struct InMemoryLayoutSource {
    layouts: Arc<RwLock<HashMap<InventoryKind, Layout>>>,
    changes: broadcast::Sender<LayoutChanged>,
    loads: Arc<AtomicUsize>,
}

impl InMemoryLayoutSource {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            layouts: Arc::new(RwLock::new(HashMap::new())),
            changes,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replaces the blocks for `kind`, bumping its revision.
    pub async fn replace_blocks(
        &self,
        kind: InventoryKind,
        blocks: Vec<Block>,
    ) -> Result<Layout, LayoutError> {
        let mut layouts = self.layouts.write().await;
        let revision = layouts.get(&kind).map_or(0, Layout::revision) + 1;
        let layout = Layout::new(kind, revision, blocks)?;
        layouts.insert(kind, layout.clone());
        drop(layouts);

        tracing::info!(kind = %kind, revision, "Layout replaced");
        // No receivers is fine; nothing is cached yet.
        let _ = self.changes.send(LayoutChanged { kind, revision });
        Ok(layout)
    }

    /// Number of `load` calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryLayoutSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LayoutSource for InMemoryLayoutSource {
    async fn load(&self, kind: InventoryKind) -> Result<Layout, LayoutError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let layouts = self.layouts.read().await;
        Ok(layouts
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Layout::empty(kind)))
    }

    fn watch(&self) -> broadcast::Receiver<LayoutChanged> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_kind_is_empty() {
        let source = InMemoryLayoutSource::new();
        let layout = source.load(InventoryKind::Stall).await.unwrap();
        assert_eq!(layout.revision(), 0);
        assert!(layout.units().is_empty());
    }

    #[tokio::test]
    async fn replace_bumps_revision_and_notifies() {
        let source = InMemoryLayoutSource::new();
        let mut changes = source.watch();

        source
            .replace_blocks(InventoryKind::HavanSeat, vec![Block::new("A", 1, 1, 1)])
            .await
            .unwrap();
        source
            .replace_blocks(InventoryKind::HavanSeat, vec![Block::new("A", 2, 1, 1)])
            .await
            .unwrap();

        assert_eq!(
            changes.recv().await.unwrap(),
            LayoutChanged {
                kind: InventoryKind::HavanSeat,
                revision: 1
            }
        );
        assert_eq!(changes.recv().await.unwrap().revision, 2);

        let layout = source.load(InventoryKind::HavanSeat).await.unwrap();
        assert_eq!(layout.units().len(), 2);
    }

    #[tokio::test]
    async fn invalid_blocks_leave_layout_untouched() {
        let source = InMemoryLayoutSource::new();
        source
            .replace_blocks(InventoryKind::Stall, vec![Block::new("A", 1, 1, 1)])
            .await
            .unwrap();

        let result = source
            .replace_blocks(InventoryKind::Stall, vec![Block::new("A", 0, 1, 1)])
            .await;
        assert!(result.is_err());

        let layout = source.load(InventoryKind::Stall).await.unwrap();
        assert_eq!(layout.revision(), 1);
    }
}
