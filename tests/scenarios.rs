//! Scenario Tests - small fleets with hand-checked outcomes.

use seat_alloc::{Engine, Fleet, QueueEntry, Request, Response, NO_SEAT};

const S: i16 = 10;
const K: i32 = 3;

#[test]
fn test_three_leg_cycles_exhaust_every_seat() {
    let mut fleet = Fleet::new(S, 1, K);
    let mut successes = 0;
    let mut sentinels = 0;
    let mut id = 0;

    for cycle in 0..(K + 2) {
        for (start, stop) in [(3, 4), (0, 3), (4, 10)] {
            id += 1;
            let seat = fleet.book(&Request::new(id, 0, start, stop));
            if seat == NO_SEAT {
                sentinels += 1;
                assert!(cycle >= K, "cycle {} must not fail", cycle);
            } else {
                successes += 1;
                assert!((1..=K).contains(&seat));
                assert!(cycle < K, "cycle {} must fail", cycle);
            }
        }
    }

    assert_eq!(successes, 9);
    assert_eq!(sentinels, 6);
    assert!(fleet.free_intervals(0).is_empty());
    assert_eq!(fleet.arena().allocated(), 0);
}

#[test]
fn test_cycle_refills_the_split_seat() {
    let mut fleet = Fleet::new(S, 1, K);
    let middle = fleet.book(&Request::new(1, 0, 3, 4));
    let head = fleet.book(&Request::new(2, 0, 0, 3));
    let tail = fleet.book(&Request::new(3, 0, 4, 10));

    // Best fit packs the leftovers of the first seat before opening another
    assert_eq!(middle, head);
    assert_eq!(middle, tail);
    assert_eq!(fleet.free_intervals(0).len(), (K - 1) as usize);
}

#[test]
fn test_zero_length_request_is_rejected() {
    let mut fleet = Fleet::new(S, 1, K);
    let before = fleet.state_hash();
    assert_eq!(fleet.book(&Request::new(1, 0, 5, 5)), NO_SEAT);
    assert_eq!(fleet.state_hash(), before);
}

#[test]
fn test_out_of_range_train_is_rejected() {
    let mut fleet = Fleet::new(S, 1, K);
    assert_eq!(fleet.book(&Request::new(1, 1, 0, 1)), NO_SEAT);
}

#[test]
fn test_scenarios_through_engine() {
    let mut engine = Engine::new(Fleet::new(S, 1, K));
    let (producer, mut responses) = rtrb::RingBuffer::<Response>::new(64);
    engine.process_entry(QueueEntry::Open { session: 9, responses: producer });

    let requests = [
        Request::new(100, 0, 5, 5),
        Request::new(101, 1, 0, 1),
        Request::new(102, 0, 0, 10),
    ];
    for request in requests {
        engine.process_entry(QueueEntry::Request { session: 9, request });
    }

    assert_eq!(responses.pop().unwrap(), Response::new(100, 0, NO_SEAT));
    assert_eq!(responses.pop().unwrap(), Response::new(101, 1, NO_SEAT));
    let booked = responses.pop().unwrap();
    assert_eq!((booked.request_id, booked.sequence), (102, 2));
    assert!(booked.is_booked());
}
