//! Feeds stored events to the registered projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Brings projections up to date with the event store.
///
/// Every projection has a position in the store's append order, counted in
/// events. A catch-up reads the whole log and hands each projection only
/// what lies beyond its position, so repeated runs are cheap for the views
/// and never apply an event twice. Positions stay valid because the log only
/// grows at its end, whatever timestamps late appends carry. Catch-ups are
/// serialized on the position table.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    positions: Mutex<Vec<ProjectionPosition>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            positions: Mutex::new(Vec::new()),
        }
    }

    /// Registers a projection at position zero.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
        self.positions.get_mut().push(ProjectionPosition::zero());
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Current position of the projection called `name`.
    pub async fn position(&self, name: &str) -> Option<ProjectionPosition> {
        let positions = self.positions.lock().await;
        self.projections
            .iter()
            .position(|p| p.name() == name)
            .map(|i| positions[i])
    }

    /// Applies every event the projections have not seen yet.
    ///
    /// A failing projection keeps its position at the failed event; the next
    /// run retries from there.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut positions = self.positions.lock().await;
        let mut stream = self.store.stream_all_events().await?;
        let mut seen: u64 = 0;
        let mut applied: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            seen += 1;

            for (projection, position) in self.projections.iter().zip(positions.iter_mut()) {
                if position.events_seen >= seen {
                    continue;
                }
                let relevant = event.aggregate_type == projection.source();
                if relevant {
                    projection.apply(&event).await?;
                    applied += 1;
                    metrics::counter!("projections_events_processed", "projection" => projection.name())
                        .increment(1);
                }
                *position = position.advance(relevant);
            }
        }

        for (projection, position) in self.projections.iter().zip(positions.iter()) {
            metrics::gauge!("projection_position", "projection" => projection.name())
                .set(position.events_seen as f64);
        }
        tracing::debug!(events_seen = seen, applied, "catch-up complete");
        Ok(())
    }

    /// Clears every view and replays the whole log into it.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        {
            let mut positions = self.positions.lock().await;
            for (projection, position) in self.projections.iter().zip(positions.iter_mut()) {
                projection.clear().await;
                *position = ProjectionPosition::zero();
            }
        }
        tracing::info!(projections = self.projections.len(), "rebuilding projections");
        self.run_catch_up().await
    }
}
