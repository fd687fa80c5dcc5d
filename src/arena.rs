//! Ticket Arena - O(1) free-list allocator for interval records.
//!
//! The arena pre-allocates every ticket slot at startup, eliminating heap
//! allocation in the hot path. Free slots are threaded into one intrusive
//! free list through their `next` field, so `allocate` and `free` are a
//! single pop/push on the list head.

use std::fmt;

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for arena indices - our "compressed pointers".
///
/// Bucket chains and the free list link tickets by index, never by
/// reference, so the arena can be moved freely between threads.
pub type TicketIndex = u32;

/// One seat's contiguous free interval on one train - exactly 12 bytes.
///
/// # Memory Layout
///
/// | Field   | Type | Offset | Size |
/// |---------|------|--------|------|
/// | seat    | i32  | 0      | 4    |
/// | start   | i16  | 4      | 2    |
/// | length  | i16  | 6      | 2    |
/// | next    | u32  | 8      | 4    |
/// | **Total** |    |        | 12   |
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Seat number owning this interval (1-based)
    pub seat: i32,

    /// First free segment
    pub start: i16,

    /// Number of free segments (>= 1 while the ticket sits in a bucket)
    pub length: i16,

    /// Next ticket in the same bucket chain, or the next free slot
    pub next: TicketIndex,
}

const _: () = assert!(
    std::mem::size_of::<Ticket>() == 12,
    "Ticket must stay 12 bytes"
);

impl Ticket {
    /// Create a new unlinked ticket
    #[inline]
    pub const fn new(seat: i32, start: i16, length: i16) -> Self {
        Self {
            seat,
            start,
            length,
            next: NULL_INDEX,
        }
    }

    /// Create an empty/uninitialized ticket (for the free list)
    #[inline]
    pub const fn empty() -> Self {
        Self::new(0, 0, 0)
    }

    /// One past the last segment covered by this ticket.
    #[inline]
    pub const fn end(&self) -> i16 {
        self.start + self.length
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("seat", &self.seat)
            .field("start", &self.start)
            .field("length", &self.length)
            .field("next", &self.next)
            .finish()
    }
}

/// Pre-allocated ticket pool with O(1) allocation and deallocation.
///
/// Owned exclusively by the allocator thread: nothing here is
/// synchronized, and nothing needs to be.
pub struct TicketArena {
    /// Contiguous block of pre-allocated tickets
    tickets: Vec<Ticket>,

    /// Head of the free list (index of first available ticket)
    free_head: TicketIndex,

    /// Number of tickets currently handed out
    allocated_count: u32,

    /// Total capacity
    capacity: u32,
}

impl TicketArena {
    /// Create a new arena with the specified capacity.
    ///
    /// # Panics
    /// Panics if capacity is not below `NULL_INDEX`, which is reserved
    /// as the end-of-chain marker.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "Capacity must be less than NULL_INDEX");

        let mut tickets = vec![Ticket::empty(); capacity as usize];
        for (i, ticket) in tickets.iter_mut().enumerate() {
            ticket.next = i as u32 + 1;
        }
        if let Some(last) = tickets.last_mut() {
            last.next = NULL_INDEX;
        }

        Self {
            tickets,
            free_head: if capacity > 0 { 0 } else { NULL_INDEX },
            allocated_count: 0,
            capacity,
        }
    }

    /// Pop a ticket slot off the free list.
    ///
    /// # Panics
    /// Panics when the arena is exhausted. Capacity is sized for the
    /// theoretical maximum number of live fragments, so reaching this is a
    /// configuration bug rather than a runtime condition.
    ///
    /// # Complexity
    /// O(1) - pops from head of free list
    #[inline]
    pub fn allocate(&mut self) -> TicketIndex {
        let index = self.free_head;
        assert!(
            index != NULL_INDEX,
            "ticket arena exhausted ({} slots); capacity is misconfigured",
            self.capacity
        );

        self.free_head = self.tickets[index as usize].next;
        self.allocated_count += 1;
        self.tickets[index as usize].next = NULL_INDEX;
        index
    }

    /// Push a ticket slot back onto the free list.
    ///
    /// The caller must ensure the slot is not linked into any bucket and
    /// has not already been freed.
    ///
    /// # Complexity
    /// O(1) - pushes to head of free list
    #[inline]
    pub fn free(&mut self, index: TicketIndex) {
        debug_assert!(index < self.capacity, "Index out of bounds");
        debug_assert!(self.allocated_count > 0, "Double free detected");

        let ticket = &mut self.tickets[index as usize];
        *ticket = Ticket::empty();
        ticket.next = self.free_head;
        self.free_head = index;
        self.allocated_count -= 1;
    }

    #[inline]
    pub fn get(&self, index: TicketIndex) -> &Ticket {
        debug_assert!(index < self.capacity, "Index out of bounds");
        &self.tickets[index as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, index: TicketIndex) -> &mut Ticket {
        debug_assert!(index < self.capacity, "Index out of bounds");
        &mut self.tickets[index as usize]
    }

    /// Returns the number of tickets currently handed out.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    /// Returns the total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns true if no slot is free.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NULL_INDEX
    }

    /// Pre-fault all memory pages.
    ///
    /// Walks every slot so the OS maps the whole pool before the first
    /// request arrives, keeping page faults out of the hot path.
    pub fn warm_up(&mut self) {
        for ticket in &mut self.tickets {
            let seat = ticket.seat;
            // Volatile write to prevent optimization
            unsafe {
                std::ptr::write_volatile(&mut ticket.seat, seat);
            }
        }
    }
}

impl fmt::Debug for TicketArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketArena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_size() {
        assert_eq!(std::mem::size_of::<Ticket>(), 12);
    }

    #[test]
    fn test_arena_creation() {
        let arena = TicketArena::new(100);
        assert_eq!(arena.capacity(), 100);
        assert_eq!(arena.allocated(), 0);
        assert!(!arena.is_full());
    }

    #[test]
    fn test_arena_allocate_free() {
        let mut arena = TicketArena::new(3);

        let idx0 = arena.allocate();
        let idx1 = arena.allocate();
        let idx2 = arena.allocate();

        assert_eq!(arena.allocated(), 3);
        assert!(arena.is_full());

        arena.free(idx1);
        assert_eq!(arena.allocated(), 2);
        assert!(!arena.is_full());

        // Most recently freed slot comes back first
        let idx3 = arena.allocate();
        assert_eq!(idx3, idx1);

        arena.free(idx0);
        arena.free(idx2);
        arena.free(idx3);
        assert_eq!(arena.allocated(), 0);
    }

    #[test]
    fn test_allocated_ticket_is_unlinked() {
        let mut arena = TicketArena::new(4);
        let idx = arena.allocate();
        assert_eq!(arena.get(idx).next, NULL_INDEX);
    }

    #[test]
    #[should_panic(expected = "ticket arena exhausted")]
    fn test_exhaustion_is_fatal() {
        let mut arena = TicketArena::new(1);
        arena.allocate();
        arena.allocate();
    }

    #[test]
    fn test_arena_get_set() {
        let mut arena = TicketArena::new(10);
        let idx = arena.allocate();

        *arena.get_mut(idx) = Ticket::new(7, 2, 5);

        let ticket = arena.get(idx);
        assert_eq!(ticket.seat, 7);
        assert_eq!(ticket.start, 2);
        assert_eq!(ticket.length, 5);
        assert_eq!(ticket.end(), 7);
    }

    #[test]
    fn test_zero_capacity_is_full() {
        let arena = TicketArena::new(0);
        assert!(arena.is_full());
    }

    #[test]
    fn test_arena_warm_up() {
        let mut arena = TicketArena::new(1000);
        arena.warm_up();
        assert_eq!(arena.allocated(), 0);
    }
}
