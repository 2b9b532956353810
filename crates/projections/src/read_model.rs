//! Query access shared by the views.

use async_trait::async_trait;

/// Keyed lookup over a view's records.
#[async_trait]
pub trait ReadModel: Send + Sync {
    type Key: Send + Sync;
    type Record: Send;

    async fn find(&self, key: &Self::Key) -> Option<Self::Record>;

    /// Number of records currently held.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
