use std::sync::Arc;

use allocation::{AllocationCoordinator, CoordinatorConfig, SyncPublisher};
use common::{Actor, BookingId, InventoryKind, SliceKey};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use domain::{Block, BookingClaim, InMemoryLayoutSource, LayoutCache, Transition};
use event_store::InMemoryEventStore;

fn coordinator(rt: &tokio::runtime::Runtime) -> AllocationCoordinator<InMemoryEventStore> {
    let source = InMemoryLayoutSource::new();
    rt.block_on(source.replace_blocks(
        InventoryKind::HavanSeat,
        vec![Block::new("A", 4, 10, 5), Block::new("B", 4, 10, 5)],
    ))
    .unwrap();
    AllocationCoordinator::new(
        InMemoryEventStore::new(),
        Arc::new(LayoutCache::new(Arc::new(source))),
        SyncPublisher::new(),
        CoordinatorConfig::default(),
    )
}

fn slice_key(day: u32) -> SliceKey {
    SliceKey::shift(
        InventoryKind::HavanSeat,
        chrono::NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        "morning",
    )
    .unwrap()
}

fn book() -> Transition {
    Transition::Book(BookingClaim {
        booking_id: BookingId::new(),
        user_id: "u-bench".to_string(),
        customer_name: "Bench".to_string(),
    })
}

/// Books a single unit on a fresh slice.
fn bench_book_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let coordinator = coordinator(&rt);
    let system = Actor::system("bench");
    let mut day = 0;

    c.bench_function("allocation/book_1_unit", |b| {
        b.iter_batched(
            || {
                day = day % 28 + 1;
                rt.block_on(coordinator.store().clear());
                slice_key(day)
            },
            |key| {
                rt.block_on(coordinator.allocate(&key, &["A-C1-R1-S1".to_string()], book(), &system))
                    .unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

/// Blocks a whole 200-unit block, then unblocks it again.
fn bench_block_unblock_block(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let coordinator = coordinator(&rt);
    let admin = Actor::admin("adm", "Bench");
    let key = slice_key(1);
    let layout = rt.block_on(coordinator.get_layout(InventoryKind::HavanSeat)).unwrap();
    let block_a: Vec<String> = layout
        .units()
        .iter()
        .filter(|u| u.block_id == "A")
        .map(|u| u.id.to_string())
        .collect();

    c.bench_function("allocation/block_unblock_200_units", |b| {
        b.iter(|| {
            rt.block_on(async {
                coordinator
                    .allocate(&key, &block_a, Transition::Block { reason: "bench".to_string() }, &admin)
                    .await
                    .unwrap();
                coordinator
                    .allocate(&key, &block_a, Transition::Unblock, &admin)
                    .await
                    .unwrap();
            })
        });
    });
}

/// Reads a slice whose stream has a few hundred events behind it.
fn bench_get_slice(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let coordinator = coordinator(&rt);
    let admin = Actor::admin("adm", "Bench");
    let key = slice_key(2);

    rt.block_on(async {
        for seat in 1..=5 {
            for row in 1..=10 {
                let unit = vec![format!("B-C1-R{row}-S{seat}")];
                coordinator
                    .allocate(&key, &unit, Transition::Block { reason: "bench".to_string() }, &admin)
                    .await
                    .unwrap();
            }
        }
    });

    c.bench_function("allocation/get_slice_50_events", |b| {
        b.iter(|| rt.block_on(coordinator.get_slice(&key)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_book_single,
    bench_block_unblock_block,
    bench_get_slice,
);
criterion_main!(benches);
