//! Global Request Queue - the single hand-off into the allocator thread.
//!
//! One bounded SPSC ring (rtrb) shared by every session: the reactor is
//! the only producer, the allocator loop the only consumer. rtrb keeps a
//! monotonic write and read position and publishes each slot with
//! release/acquire ordering, so an entry's payload is always visible
//! before the position that announces it.
//!
//! Besides requests the ring carries session lifecycle entries. Because
//! they travel through the same FIFO, the allocator always sees a
//! session's `Open` before its first request and its `Close` after its
//! last one.

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::protocol::{Request, Response};

/// Identifies a session across the two threads. Never reused.
pub type SessionId = u64;

/// One entry of the global queue.
pub enum QueueEntry {
    /// A new session: hands its response ring producer to the allocator.
    Open {
        session: SessionId,
        responses: Producer<Response>,
    },
    /// A validated-size request read from `session`.
    Request { session: SessionId, request: Request },
    /// `session` is gone and fully answered; drop its response producer.
    Close { session: SessionId },
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEntry::Open { session, .. } => f.debug_struct("Open").field("session", session).finish(),
            QueueEntry::Request { session, request } => f
                .debug_struct("Request")
                .field("session", session)
                .field("request", request)
                .finish(),
            QueueEntry::Close { session } => f.debug_struct("Close").field("session", session).finish(),
        }
    }
}

/// Create the global queue with room for `capacity` entries.
pub fn global_queue(capacity: usize) -> (RequestProducer, RequestConsumer) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        RequestProducer { inner: producer, capacity },
        RequestConsumer { inner: consumer },
    )
}

/// Reactor-side end of the global queue.
pub struct RequestProducer {
    inner: Producer<QueueEntry>,
    capacity: usize,
}

impl RequestProducer {
    /// Append an entry, handing it back if the ring is full.
    ///
    /// Never blocks: admission control keeps the ring from filling up, and
    /// the caller keeps anything that did not fit for the next turn.
    #[inline]
    pub fn push(&mut self, entry: QueueEntry) -> Result<(), QueueEntry> {
        self.inner.push(entry).map_err(|PushError::Full(entry)| entry)
    }

    /// Entries the ring can still accept.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.inner.slots()
    }

    /// Entries produced but not yet consumed by the allocator.
    #[inline]
    pub fn pending(&self) -> usize {
        self.capacity - self.free_slots()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true once the allocator side has gone away.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

/// Allocator-side end of the global queue.
pub struct RequestConsumer {
    inner: Consumer<QueueEntry>,
}

impl RequestConsumer {
    /// Take the oldest entry, strictly in production order.
    #[inline]
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.inner.pop().ok()
    }

    /// Entries waiting to be consumed.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(session: SessionId, id: i64) -> QueueEntry {
        QueueEntry::Request {
            session,
            request: Request::new(id, 0, 0, 1),
        }
    }

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = global_queue(8);
        for id in 0..5 {
            tx.push(request(1, id)).unwrap();
        }
        for id in 0..5 {
            match rx.pop() {
                Some(QueueEntry::Request { request, .. }) => assert_eq!(request.request_id, id),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(rx.pop().is_none());
    }

    #[test]
    fn test_full_ring_hands_entry_back() {
        let (mut tx, mut rx) = global_queue(2);
        tx.push(request(1, 0)).unwrap();
        tx.push(request(1, 1)).unwrap();
        assert_eq!(tx.free_slots(), 0);
        assert_eq!(tx.pending(), 2);

        match tx.push(request(1, 2)) {
            Err(QueueEntry::Request { request, .. }) => assert_eq!(request.request_id, 2),
            other => panic!("expected rejected entry, got {:?}", other.is_ok()),
        }

        rx.pop().unwrap();
        assert_eq!(tx.free_slots(), 1);
        assert!(tx.push(request(1, 2)).is_ok());
    }

    #[test]
    fn test_counters_track_across_threads() {
        let (mut tx, mut rx) = global_queue(64);
        let handle = std::thread::spawn(move || {
            let mut seen = 0i64;
            while seen < 10_000 {
                if let Some(QueueEntry::Request { request, .. }) = rx.pop() {
                    assert_eq!(request.request_id, seen);
                    seen += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
        });

        let mut id = 0;
        while id < 10_000 {
            let entry = request(7, id);
            if tx.push(entry).is_ok() {
                id += 1;
            } else {
                std::hint::spin_loop();
            }
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_abandoned_after_consumer_drop() {
        let (tx, rx) = global_queue(4);
        assert!(!tx.is_abandoned());
        drop(rx);
        assert!(tx.is_abandoned());
    }
}
