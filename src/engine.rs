//! Engine - the allocator loop.
//!
//! Drains the global request queue strictly in arrival order, books seats
//! against the addressed train, and publishes one response per request to
//! the owning session. Runs on its own thread, optionally pinned, and
//! busy-polls: it never blocks and never takes a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::fleet::Fleet;
use crate::protocol::Request;
use crate::queue::{QueueEntry, RequestConsumer, SessionId};
use crate::session::ResponseSink;

/// The allocator: sole owner of the fleet and of every session's response
/// producer.
pub struct Engine {
    /// Interval maps and ticket arena
    fleet: Fleet,
    /// Response rings of live sessions, by session id
    sinks: FxHashMap<SessionId, ResponseSink>,
    /// Requests processed so far; the next response's sequence number
    sequence: u64,
}

impl Engine {
    pub fn new(fleet: Fleet) -> Self {
        Self {
            fleet,
            sinks: FxHashMap::default(),
            sequence: 0,
        }
    }

    /// Run the allocator loop until `shutdown` is raised.
    ///
    /// Every entry produced before the flag is observed is still processed,
    /// so no admitted request goes unanswered while the loop is alive.
    pub fn run(&mut self, queue: &mut RequestConsumer, shutdown: &AtomicBool, pin_to_core: bool) {
        if pin_to_core {
            self.pin_to_core();
        }

        info!(
            trains = self.fleet.train_count(),
            seats = self.fleet.seats(),
            segments = self.fleet.segments(),
            "allocator loop started"
        );

        // Main event loop (busy-wait)
        loop {
            while let Some(entry) = queue.pop() {
                self.process_entry(entry);
            }
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            std::hint::spin_loop();
        }

        info!(processed = self.sequence, "allocator loop stopped");
    }

    /// Move the engine onto a dedicated `allocator` thread and run it there.
    ///
    /// The thread hands the engine back when it stops.
    pub fn spawn(
        mut self,
        mut queue: RequestConsumer,
        shutdown: Arc<AtomicBool>,
        pin_to_core: bool,
    ) -> std::io::Result<JoinHandle<Engine>> {
        std::thread::Builder::new()
            .name("allocator".into())
            .spawn(move || {
                self.run(&mut queue, &shutdown, pin_to_core);
                self
            })
    }

    /// Apply one queue entry.
    #[inline]
    pub fn process_entry(&mut self, entry: QueueEntry) {
        match entry {
            QueueEntry::Open { session, responses } => {
                self.sinks.insert(session, ResponseSink::from(responses));
            }
            QueueEntry::Request { session, request } => {
                self.process_request(session, &request);
            }
            QueueEntry::Close { session } => {
                self.sinks.remove(&session);
            }
        }
    }

    /// Book `request` and answer it on `session`.
    ///
    /// Returns the seat (or sentinel) that was sent back.
    #[inline]
    pub fn process_request(&mut self, session: SessionId, request: &Request) -> i32 {
        let seat = self.fleet.book(request);
        // Sequence numbers wrap on the wire
        let sequence = self.sequence as i32;
        self.sequence += 1;

        match self.sinks.get_mut(&session) {
            Some(sink) => sink.enqueue_response(request.request_id, sequence, seat),
            None => debug!(session, request_id = request.request_id, "response for unknown session dropped"),
        }
        seat
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                if core_affinity::set_for_current(*last_core) {
                    info!(core = last_core.id, "allocator pinned");
                }
            }
        }
    }

    /// Warm up the engine by pre-faulting memory pages.
    pub fn warm_up(&mut self) {
        self.fleet.warm_up();
    }

    #[inline]
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Requests processed so far.
    #[inline]
    pub fn processed(&self) -> u64 {
        self.sequence
    }

    /// Sessions currently registered.
    #[inline]
    pub fn session_count(&self) -> usize {
        self.sinks.len()
    }
}
