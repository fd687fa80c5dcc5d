//! Train Interval Map - free seat intervals of one train, bucketed by shape.
//!
//! A grid of `S x S` bucket heads keyed by `(start, length - 1)`. Each
//! bucket holds an intrusive chain (through `Ticket::next`) of every seat
//! whose free window is exactly that interval. Lookups probe the shared
//! [`BestFitSearchOrder`]; reservations pop the chain head and push the
//! leftover fragments back, all in O(1) per fragment.

use crate::arena::{Ticket, TicketArena, TicketIndex, NULL_INDEX};
use crate::search_order::BestFitSearchOrder;

/// Free-interval index for a single train.
#[derive(Clone, Debug)]
pub struct TrainIntervalMap {
    /// Number of segments on the route
    segments: i16,
    /// Chain heads, `S * S` cells indexed by `(length - 1) * S + start`
    buckets: Box<[TicketIndex]>,
}

impl TrainIntervalMap {
    /// Create a map with every bucket empty.
    pub fn new(segments: i16) -> Self {
        let cells = segments.max(0) as usize * segments.max(0) as usize;
        Self {
            segments,
            buckets: vec![NULL_INDEX; cells].into_boxed_slice(),
        }
    }

    #[inline]
    fn bucket(&self, start: i16, length: i16) -> usize {
        debug_assert!(length >= 1 && start >= 0 && start + length <= self.segments);
        (length as usize - 1) * self.segments as usize + start as usize
    }

    /// Seed the map with one ticket per seat covering the whole route.
    ///
    /// Seats are numbered from 1. All tickets land in the `(0, S)` bucket,
    /// chained in seat order.
    pub fn initialize(&mut self, arena: &mut TicketArena, seats: i32) {
        let whole = self.bucket(0, self.segments);
        let mut prev = NULL_INDEX;
        for seat in 1..=seats {
            let index = arena.allocate();
            *arena.get_mut(index) = Ticket::new(seat, 0, self.segments);
            if prev == NULL_INDEX {
                self.buckets[whole] = index;
            } else {
                arena.get_mut(prev).next = index;
            }
            prev = index;
        }
    }

    /// Head of the chain for exactly `[start, start + length)`.
    #[inline]
    pub fn head(&self, start: i16, length: i16) -> TicketIndex {
        self.buckets[self.bucket(start, length)]
    }

    /// Find the tightest free interval containing `[start, start + length)`.
    ///
    /// Walks the search order and returns the head of the first non-empty
    /// bucket, so the match has minimum total slack and, among those,
    /// minimum leading slack. Which seat is returned is unspecified. Never
    /// mutates the map.
    #[inline]
    pub fn find(
        &self,
        order: &BestFitSearchOrder,
        start: i16,
        length: i16,
    ) -> Option<TicketIndex> {
        debug_assert_eq!(order.segments(), self.segments);
        order
            .candidates(start, length)
            .map(|(cand_start, cand_length)| self.head(cand_start, cand_length))
            .find(|&head| head != NULL_INDEX)
    }

    /// Reserve `[start, start + length)` out of the interval `found` matched.
    ///
    /// Pops the head of `found`'s bucket and pushes any leading and trailing
    /// leftover back as fresh tickets for the same seat. Returns the popped
    /// ticket, which the caller must free once it has read the seat. Only
    /// its `seat` is meaningful: `start` and `length` still describe the
    /// matched superset, not the booked range.
    ///
    /// Returns `None` if the bucket emptied since `find`. That cannot happen
    /// with a single writer; callers should retry from `find` if it does.
    pub fn reserve(
        &mut self,
        start: i16,
        length: i16,
        arena: &mut TicketArena,
        found: TicketIndex,
    ) -> Option<TicketIndex> {
        let matched = *arena.get(found);
        let key = self.bucket(matched.start, matched.length);

        let popped = self.buckets[key];
        if popped == NULL_INDEX {
            return None;
        }
        let seat = arena.get(popped).seat;
        self.buckets[key] = arena.get(popped).next;
        arena.get_mut(popped).next = NULL_INDEX;

        let leading = start - matched.start;
        if leading > 0 {
            self.push(arena, Ticket::new(seat, matched.start, leading));
        }

        let trailing = matched.end() - start - length;
        if trailing > 0 {
            self.push(arena, Ticket::new(seat, start + length, trailing));
        }

        Some(popped)
    }

    /// Allocate a ticket and push it onto the front of its bucket.
    #[inline]
    fn push(&mut self, arena: &mut TicketArena, ticket: Ticket) {
        let key = self.bucket(ticket.start, ticket.length);
        let index = arena.allocate();
        let slot = arena.get_mut(index);
        *slot = ticket;
        slot.next = self.buckets[key];
        self.buckets[key] = index;
    }

    /// Visit every free ticket, bucket by bucket.
    pub fn for_each_free<F: FnMut(&Ticket)>(&self, arena: &TicketArena, mut f: F) {
        for &head in self.buckets.iter() {
            let mut index = head;
            while index != NULL_INDEX {
                let ticket = arena.get(index);
                f(ticket);
                index = ticket.next;
            }
        }
    }

    /// Number of free tickets on this train.
    pub fn free_count(&self, arena: &TicketArena) -> usize {
        let mut count = 0;
        self.for_each_free(arena, |_| count += 1);
        count
    }

    #[inline]
    pub fn segments(&self) -> i16 {
        self.segments
    }
}
