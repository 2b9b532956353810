//! Shared fixtures for allocation integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use allocation::{
    AllocationCoordinator, BulkExecutor, CheckoutService, CoordinatorConfig, Reconciler,
    SyncPublisher,
};
use common::{Actor, BookingId, InventoryKind, SliceKey};
use domain::{Block, BookingClaim, InMemoryLayoutSource, LayoutCache, Transition};
use event_store::InMemoryEventStore;

pub struct Harness {
    pub store: InMemoryEventStore,
    pub source: InMemoryLayoutSource,
    pub coordinator: Arc<AllocationCoordinator<InMemoryEventStore>>,
    pub bulk: BulkExecutor<InMemoryEventStore>,
    pub checkout: CheckoutService<InMemoryEventStore>,
    pub reconciler: Reconciler<InMemoryEventStore>,
}

impl Harness {
    /// Harness over a show-seat layout with one active block per entry.
    pub async fn new(blocks: Vec<Block>) -> Self {
        let store = InMemoryEventStore::new();
        let source = InMemoryLayoutSource::new();
        source
            .replace_blocks(InventoryKind::ShowSeat, blocks)
            .await
            .unwrap();

        let coordinator = Arc::new(AllocationCoordinator::new(
            store.clone(),
            Arc::new(LayoutCache::new(Arc::new(source.clone()))),
            SyncPublisher::new(),
            CoordinatorConfig::default(),
        ));

        Self {
            bulk: BulkExecutor::new(Arc::clone(&coordinator)),
            checkout: CheckoutService::new(store.clone(), Arc::clone(&coordinator)),
            reconciler: Reconciler::new(store.clone(), Arc::clone(&coordinator)),
            store,
            source,
            coordinator,
        }
    }
}

pub fn key() -> SliceKey {
    SliceKey::show("gala-2024").unwrap()
}

pub fn admin() -> Actor {
    Actor::admin("adm-1", "Ravi")
}

pub fn system() -> Actor {
    Actor::system("checkout")
}

pub fn units(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

pub fn book(booking_id: BookingId) -> Transition {
    Transition::Book(BookingClaim {
        booking_id,
        user_id: format!("u-{booking_id}"),
        customer_name: "Asha".to_string(),
    })
}
