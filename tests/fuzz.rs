//! Fuzz Test - checks the allocator against a naive reference.
//!
//! Before every booking the reference scans the train's free intervals
//! for the tightest superset. After it, the train's free set must equal
//! the old one with exactly that interval split, and every seat's free
//! and booked intervals must still partition the route.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use seat_alloc::{Fleet, Request, NO_SEAT};
use std::collections::BTreeMap;

type Interval = (i32, i16, i16); // (seat, start, length)

/// Tightest free interval covering `[start, stop)`: minimum slack, then
/// minimum leading slack. Returns `(start, length)` only; any seat holding
/// that exact interval is an acceptable match.
fn reference_best_fit(free: &[Interval], start: i16, stop: i16) -> Option<(i16, i16)> {
    free.iter()
        .filter(|&&(_, s, len)| s <= start && s + len >= stop)
        .map(|&(_, s, len)| (len - (stop - start), start - s, s, len))
        .min()
        .map(|(_, _, s, len)| (s, len))
}

/// Apply a booking of `[start, stop)` on `matched` to a free set.
fn reference_split(free: &[Interval], matched: Interval, start: i16, stop: i16) -> Vec<Interval> {
    let mut out = free.to_vec();
    let pos = out.iter().position(|&i| i == matched).expect("matched interval must be free");
    out.remove(pos);

    let (seat, s, len) = matched;
    if start > s {
        out.push((seat, s, start - s));
    }
    if s + len > stop {
        out.push((seat, stop, s + len - stop));
    }
    out.sort_unstable();
    out
}

/// Every seat's free plus booked segments cover `[0, S)` exactly once.
fn assert_partition(
    fleet: &Fleet,
    train: usize,
    booked: &BTreeMap<(usize, i32), Vec<(i16, i16)>>,
) {
    let segments = fleet.segments() as usize;
    for seat in 1..=fleet.seats() {
        let mut cover = vec![0u8; segments];
        for (s, free_seat, len) in fleet
            .free_intervals(train)
            .into_iter()
            .map(|(seat, s, len)| (s, seat, len))
        {
            if free_seat == seat {
                for leg in s..s + len {
                    cover[leg as usize] += 1;
                }
            }
        }
        for &(start, stop) in booked.get(&(train, seat)).map(Vec::as_slice).unwrap_or(&[]) {
            for leg in start..stop {
                cover[leg as usize] += 1;
            }
        }
        assert!(
            cover.iter().all(|&c| c == 1),
            "train {} seat {} coverage {:?}",
            train,
            seat,
            cover
        );
    }
}

fn run_fuzz(seed: u64, segments: i16, trains: i32, seats: i32, count: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut fleet = Fleet::new(segments, trains, seats);
    let mut booked: BTreeMap<(usize, i32), Vec<(i16, i16)>> = BTreeMap::new();

    for id in 0..count as i64 {
        // 10% malformed requests
        if rng.gen_bool(0.1) {
            let bad = match rng.gen_range(0..4) {
                0 => Request::new(id, rng.gen_range(0..trains), 3, 3),
                1 => Request::new(id, trains, 0, 1),
                2 => Request::new(id, 0, -1, 2),
                _ => Request::new(id, 0, 0, segments + 1),
            };
            let before = fleet.state_hash();
            assert_eq!(fleet.book(&bad), NO_SEAT);
            assert_eq!(fleet.state_hash(), before);
            continue;
        }

        let train = rng.gen_range(0..trains);
        let start = rng.gen_range(0..segments);
        let stop = rng.gen_range(start + 1..=segments);
        let free_before = fleet.free_intervals(train as usize);
        let expected = reference_best_fit(&free_before, start, stop);

        let seat = fleet.book(&Request::new(id, train, start, stop));

        match expected {
            None => {
                assert_eq!(seat, NO_SEAT, "request {} [{}, {}) must fail", id, start, stop);
                assert_eq!(fleet.free_intervals(train as usize), free_before);
            }
            Some((s, len)) => {
                assert_ne!(seat, NO_SEAT, "request {} [{}, {}) must succeed", id, start, stop);
                let matched = (seat, s, len);
                assert!(
                    free_before.contains(&matched),
                    "seat {} has no free [{}, {}) for request [{}, {})",
                    seat,
                    s,
                    s + len,
                    start,
                    stop
                );
                assert_eq!(
                    fleet.free_intervals(train as usize),
                    reference_split(&free_before, matched, start, stop)
                );

                let ranges = booked.entry((train as usize, seat)).or_default();
                for &(b_start, b_stop) in ranges.iter() {
                    assert!(stop <= b_start || start >= b_stop, "seat {} double booked", seat);
                }
                ranges.push((start, stop));
            }
        }

        if id % 64 == 0 {
            assert_partition(&fleet, train as usize, &booked);
        }
    }

    for train in 0..trains as usize {
        assert_partition(&fleet, train, &booked);
    }
}

#[test]
fn test_fuzz_small_route() {
    run_fuzz(0xDEADBEEF, 4, 2, 6, 5_000);
}

#[test]
fn test_fuzz_default_route() {
    run_fuzz(0xCAFEBABE, 10, 3, 20, 20_000);
}

#[test]
fn test_fuzz_long_route() {
    run_fuzz(0x5EED, 24, 2, 8, 20_000);
}

#[test]
fn test_fuzz_single_segment() {
    run_fuzz(1, 1, 1, 5, 100);
}
