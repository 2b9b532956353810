//! Property tests: random transition sequences against a reference model.

mod support;

use std::collections::HashMap;

use allocation::AllocationOutcome;
use common::BookingId;
use domain::{Block, Transition, UnitStatus};
use proptest::prelude::*;
use support::{Harness, admin, book, key, system};

const SEATS: u32 = 6;

#[derive(Debug, Clone)]
enum Op {
    Book(usize, Vec<u32>),
    Block(Vec<u32>),
    Unblock(Vec<u32>),
    Release(usize, Vec<u32>),
}

/// The expected state of each seat: None when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Held {
    Booked(usize),
    Blocked,
}

fn seats() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1..=SEATS, 1..4)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, seats()).prop_map(|(b, s)| Op::Book(b, s)),
        seats().prop_map(Op::Block),
        seats().prop_map(Op::Unblock),
        (0..3usize, seats()).prop_map(|(b, s)| Op::Release(b, s)),
    ]
}

fn unit(seat: u32) -> String {
    format!("A-C1-R1-S{seat}")
}

fn accepts(op: &Op, held: Option<&Held>) -> bool {
    match op {
        Op::Book(..) | Op::Block(_) => held.is_none(),
        Op::Unblock(_) => held == Some(&Held::Blocked),
        Op::Release(b, _) => held == Some(&Held::Booked(*b)),
    }
}

fn requested(op: &Op) -> &[u32] {
    match op {
        Op::Book(_, s) | Op::Block(s) | Op::Unblock(s) | Op::Release(_, s) => s,
    }
}

/// Seats the model expects `op` to move, in first-occurrence order.
fn expected(model: &HashMap<u32, Held>, op: &Op) -> Vec<String> {
    let mut seen: Vec<u32> = Vec::new();
    for seat in requested(op) {
        if !seen.contains(seat) && accepts(op, model.get(seat)) {
            seen.push(*seat);
        }
    }
    seen.into_iter().map(unit).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn slice_follows_the_model(ops in prop::collection::vec(op(), 1..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let h = Harness::new(vec![Block::new("A", 1, 1, SEATS)]).await;
            let bookings = [BookingId::new(), BookingId::new(), BookingId::new()];
            let mut model: HashMap<u32, Held> = HashMap::new();

            for op in &ops {
                let want = expected(&model, op);
                let (transition, actor) = match op {
                    Op::Book(b, _) => (book(bookings[*b]), system()),
                    Op::Block(_) => (Transition::Block { reason: "prop".to_string() }, admin()),
                    Op::Unblock(_) => (Transition::Unblock, admin()),
                    Op::Release(b, _) => (Transition::Release { booking_id: bookings[*b] }, admin()),
                };
                let ids: Vec<String> = requested(op).iter().map(|s| unit(*s)).collect();
                let outcome: AllocationOutcome = h
                    .coordinator
                    .allocate(&key(), &ids, transition, &actor)
                    .await
                    .unwrap();
                assert_eq!(outcome.applied, want, "{op:?}");

                for seat in requested(op) {
                    if !want.contains(&unit(*seat)) {
                        continue;
                    }
                    match op {
                        Op::Book(b, _) => model.insert(*seat, Held::Booked(*b)),
                        Op::Block(_) => model.insert(*seat, Held::Blocked),
                        Op::Unblock(_) | Op::Release(..) => model.remove(seat),
                    };
                }
            }

            let slice = h.coordinator.get_slice(&key()).await.unwrap();
            for seat in 1..=SEATS {
                let status = slice.status_of(&unit(seat));
                match model.get(&seat) {
                    None => assert_eq!(status, UnitStatus::Available),
                    Some(Held::Blocked) => assert_eq!(status, UnitStatus::Blocked),
                    Some(Held::Booked(b)) => {
                        assert!(slice.units[&unit(seat)].is_booked_by(bookings[*b]));
                    }
                }
            }
            assert_eq!(
                slice.count(UnitStatus::Booked) + slice.count(UnitStatus::Blocked),
                model.len()
            );
        });
    }
}
