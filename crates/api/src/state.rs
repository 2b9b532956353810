//! Shared application state.

use std::sync::Arc;

use allocation::{
    AllocationCoordinator, BackoffPolicy, BulkExecutor, CheckoutService, Reconciler, SyncPublisher,
};
use domain::{InMemoryLayoutSource, LayoutCache};
use event_store::EventStore;
use projections::ActivityLog;
use tokio::sync::watch;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub event_store: S,
    pub coordinator: Arc<AllocationCoordinator<S>>,
    pub bulk: BulkExecutor<S>,
    pub checkout: CheckoutService<S>,
    pub reconciler: Reconciler<S>,
    pub activity: ActivityLog<S>,
    pub layouts: InMemoryLayoutSource,
    pub backoff: BackoffPolicy,
    shutdown: watch::Sender<bool>,
}

impl<S: EventStore> AppState<S> {
    /// Ends every live stream and keeps new ones from reconnecting.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.coordinator.publisher().disconnect_all();
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub fn shutting_down(&self) -> impl Future<Output = ()> + Send + 'static + use<S> {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|down| *down).await;
        }
    }
}

/// Wires every service over one event store and layout source.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    layouts: InMemoryLayoutSource,
    config: &Config,
) -> Arc<AppState<S>> {
    let cache = Arc::new(LayoutCache::new(Arc::new(layouts.clone())));
    let coordinator = Arc::new(AllocationCoordinator::new(
        event_store.clone(),
        cache,
        SyncPublisher::new(),
        config.coordinator(),
    ));

    Arc::new(AppState {
        bulk: BulkExecutor::new(Arc::clone(&coordinator)),
        checkout: CheckoutService::new(event_store.clone(), Arc::clone(&coordinator)),
        reconciler: Reconciler::new(event_store.clone(), Arc::clone(&coordinator))
            .with_pending_ttl(config.pending_ttl),
        activity: ActivityLog::new(event_store.clone()),
        coordinator,
        event_store,
        layouts,
        backoff: config.backoff(),
        shutdown: watch::Sender::new(false),
    })
}
