use std::collections::HashMap;
use std::sync::Arc;

use common::InventoryKind;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{Mutex, RwLock, broadcast};

use super::{Layout, LayoutChanged, LayoutError, LayoutSource};

/// Read-through cache of layouts per inventory kind.
///
/// Change notifications from the source are drained on every read, so a
/// replaced layout is never served after its notification was published.
pub struct LayoutCache {
    source: Arc<dyn LayoutSource>,
    entries: RwLock<HashMap<InventoryKind, Arc<Layout>>>,
    changes: Mutex<broadcast::Receiver<LayoutChanged>>,
}

impl LayoutCache {
    pub fn new(source: Arc<dyn LayoutSource>) -> Self {
        let changes = Mutex::new(source.watch());
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub fn source(&self) -> &Arc<dyn LayoutSource> {
        &self.source
    }

    /// Returns the current layout for `kind`, loading it on a miss.
    pub async fn get(&self, kind: InventoryKind) -> Result<Arc<Layout>, LayoutError> {
        self.drain_changes().await;

        if let Some(layout) = self.entries.read().await.get(&kind) {
            metrics::counter!("layout_cache_hits_total").increment(1);
            return Ok(Arc::clone(layout));
        }

        metrics::counter!("layout_cache_misses_total").increment(1);
        let layout = Arc::new(self.source.load(kind).await?);

        let mut entries = self.entries.write().await;
        let entry = entries.entry(kind).or_insert_with(|| Arc::clone(&layout));
        if entry.revision() < layout.revision() {
            *entry = Arc::clone(&layout);
        }
        Ok(Arc::clone(entry))
    }

    pub async fn invalidate(&self, kind: InventoryKind) {
        self.entries.write().await.remove(&kind);
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    async fn drain_changes(&self) {
        let mut changes = self.changes.lock().await;
        loop {
            match changes.try_recv() {
                Ok(change) => {
                    tracing::debug!(kind = %change.kind, revision = change.revision, "Layout cache invalidated");
                    self.invalidate(change.kind).await;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Layout change notifications lagged, clearing cache");
                    self.invalidate_all().await;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
