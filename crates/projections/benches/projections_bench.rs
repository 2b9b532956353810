use common::{Actor, AggregateId, BookingId, CancellationId, SliceKey};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::cancellation::{CancellationOpenedData, RefundRecordedData};
use domain::{CancellationEvent, DomainEvent, Money, UnitId};
use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version, store::EventStore};
use projections::{
    ActivityLog, CancellationFilter, CancellationsView, Projection, ProjectionProcessor,
};

fn make_envelope(
    aggregate_id: AggregateId,
    version: i64,
    event: &CancellationEvent,
) -> EventEnvelope {
    let mut builder = EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Cancellation")
        .event_type(DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap();
    if let Some(audit) = event.audit() {
        builder = builder.metadata(
            event_store::AUDIT_METADATA_KEY,
            serde_json::to_value(&audit).unwrap(),
        );
    }
    builder.build().unwrap()
}

/// Populate a store with N cancellations, every other one refunded.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    let admin = Actor::admin("adm", "Bench");
    for i in 0..n {
        let booking_id = BookingId::new();
        let cancellation_id = CancellationId::for_booking(booking_id);
        let aggregate_id = AggregateId::cancellation(cancellation_id);

        let mut events = vec![make_envelope(
            aggregate_id.clone(),
            1,
            &CancellationEvent::CancellationOpened(CancellationOpenedData {
                cancellation_id,
                booking_id,
                slice_key: SliceKey::show("bench").unwrap(),
                unit_ids: vec![UnitId::new("A", 1, 1, 1).unwrap()],
                original_amount: Money::from_rupees(1100),
                cancelled_by: admin.clone(),
                reason: None,
                cancelled_at: chrono::Utc::now(),
            }),
        )];
        if i % 2 == 0 {
            events.push(make_envelope(
                aggregate_id,
                2,
                &CancellationEvent::RefundRecorded(RefundRecordedData {
                    cancellation_id,
                    amount: Money::from_rupees(1100),
                    method: "card".to_string(),
                    reference: None,
                    notes: None,
                    refunded_by: admin.clone(),
                    refunded_at: chrono::Utc::now(),
                }),
            ));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 500));

    c.bench_function("projections/catch_up_750_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let view = CancellationsView::new();
                let mut processor = ProjectionProcessor::new(store.clone());
                processor.register(Box::new(view.clone()) as Box<dyn Projection>);
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_report_and_list(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let view = CancellationsView::new();

    rt.block_on(async {
        populate_store(&store, 1000).await;
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(view.clone()));
        processor.run_catch_up().await.unwrap();
    });

    c.bench_function("projections/report_1000_cancellations", |b| {
        b.iter(|| rt.block_on(view.report()));
    });

    c.bench_function("projections/list_pending_1000_cancellations", |b| {
        b.iter(|| {
            rt.block_on(view.list(
                &CancellationFilter::new().refund_status(domain::RefundStatus::Pending),
            ))
        });
    });
}

fn bench_activity_page(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 1000));
    let log = ActivityLog::new(store);

    c.bench_function("projections/activity_first_page_50", |b| {
        b.iter(|| rt.block_on(log.page(None, 50)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_catch_up,
    bench_report_and_list,
    bench_activity_page,
);
criterion_main!(benches);
