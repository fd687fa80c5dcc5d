//! Fleet - every train's interval map plus the arena they share.
//!
//! The fleet is the allocator thread's whole world: it is built once at
//! startup, moved onto the allocator thread, and never touched by anyone
//! else. Requests go in, seat numbers come out.

use crate::arena::TicketArena;
use crate::interval_map::TrainIntervalMap;
use crate::protocol::{Request, NO_SEAT};
use crate::search_order::BestFitSearchOrder;

/// Allocator context: the ticket arena, one interval map per train, and
/// the shared best-fit search order.
pub struct Fleet {
    arena: TicketArena,
    trains: Vec<TrainIntervalMap>,
    order: BestFitSearchOrder,
    segments: i16,
    seats: i32,
}

impl Fleet {
    /// Build a fleet of `trains` trains with `seats` seats over `segments`
    /// legs, every seat free for the whole route.
    ///
    /// The arena holds `segments * trains * seats` tickets: a seat can never
    /// be split into more fragments than it has segments.
    ///
    /// # Panics
    /// Panics if the arena capacity does not fit the 32-bit index space.
    /// `Config::validate` rejects such shapes before they get here.
    pub fn new(segments: i16, trains: i32, seats: i32) -> Self {
        let capacity = segments.max(0) as u64 * trains.max(0) as u64 * seats.max(0) as u64;
        assert!(
            capacity < crate::arena::NULL_INDEX as u64,
            "fleet of {} tickets exceeds the arena index space",
            capacity
        );

        let mut arena = TicketArena::new(capacity as u32);
        let mut maps = Vec::with_capacity(trains.max(0) as usize);
        for _ in 0..trains.max(0) {
            let mut map = TrainIntervalMap::new(segments);
            map.initialize(&mut arena, seats);
            maps.push(map);
        }

        Self {
            arena,
            trains: maps,
            order: BestFitSearchOrder::new(segments),
            segments,
            seats,
        }
    }

    /// Returns true if `request` addresses an existing train and a
    /// non-empty leg range inside the route.
    #[inline]
    pub fn is_valid(&self, request: &Request) -> bool {
        request.start >= 0
            && request.stop > request.start
            && request.stop <= self.segments
            && request.train >= 0
            && (request.train as usize) < self.trains.len()
    }

    /// Book any seat covering the requested legs.
    ///
    /// Returns the seat number, or [`NO_SEAT`] if the request is invalid or
    /// no seat has a free window covering it. Invalid requests never reach
    /// an interval map.
    #[inline]
    pub fn book(&mut self, request: &Request) -> i32 {
        if !self.is_valid(request) {
            return NO_SEAT;
        }

        let start = request.start;
        let length = request.stop - request.start;
        let map = &mut self.trains[request.train as usize];

        loop {
            let Some(found) = map.find(&self.order, start, length) else {
                return NO_SEAT;
            };
            if let Some(popped) = map.reserve(start, length, &mut self.arena, found) {
                let seat = self.arena.get(popped).seat;
                self.arena.free(popped);
                return seat;
            }
        }
    }

    #[inline]
    pub fn train(&self, train: usize) -> Option<&TrainIntervalMap> {
        self.trains.get(train)
    }

    #[inline]
    pub fn arena(&self) -> &TicketArena {
        &self.arena
    }

    #[inline]
    pub fn search_order(&self) -> &BestFitSearchOrder {
        &self.order
    }

    #[inline]
    pub fn segments(&self) -> i16 {
        self.segments
    }

    #[inline]
    pub fn train_count(&self) -> usize {
        self.trains.len()
    }

    #[inline]
    pub fn seats(&self) -> i32 {
        self.seats
    }

    /// Free intervals of `train` as sorted `(seat, start, length)` triples.
    pub fn free_intervals(&self, train: usize) -> Vec<(i32, i16, i16)> {
        let mut out = Vec::new();
        if let Some(map) = self.trains.get(train) {
            map.for_each_free(&self.arena, |t| out.push((t.seat, t.start, t.length)));
        }
        out.sort_unstable();
        out
    }

    /// Pre-fault the arena so the first requests do not page fault.
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    /// Compute a hash of the current state (for determinism testing)
    pub fn state_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};

        let mut hasher = rustc_hash::FxHasher::default();
        self.arena.allocated().hash(&mut hasher);
        for train in 0..self.trains.len() {
            for interval in self.free_intervals(train) {
                interval.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("segments", &self.segments)
            .field("trains", &self.trains.len())
            .field("seats", &self.seats)
            .field("arena", &self.arena)
            .finish()
    }
}
