//! # Seat-Alloc
//!
//! A segment-interval seat allocator for a fixed fleet of trains: book
//! *any* seat whose free window covers the requested legs, at very high
//! request rates and with bounded latency.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: One thread owns every interval map and the ticket arena (no locks)
//! - **Best-Fit**: A precomputed search order finds the tightest free window in O(S²) probes
//! - **Arena Allocation**: Interval records come from a fixed free list, never the heap
//! - **Edge Backpressure**: Sessions read only what the rings downstream can absorb
//!
//! ## Architecture
//!
//! ```text
//! [Reactor Thread] --> [Global SPSC Queue] --> [Allocator Thread (Pinned)]
//!        ^                                              |
//!        '------------ [Per-session SPSC Rings] <-------'
//! ```

pub mod arena;
pub mod config;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod interval_map;
pub mod protocol;
pub mod queue;
pub mod reactor;
pub mod search_order;
pub mod session;

// Re-exports for convenience
pub use arena::{Ticket, TicketArena, TicketIndex, NULL_INDEX};
pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use fleet::Fleet;
pub use interval_map::TrainIntervalMap;
pub use protocol::{Request, Response, NO_SEAT, REQUEST_SIZE, RESPONSE_SIZE};
pub use queue::{global_queue, QueueEntry, RequestConsumer, RequestProducer, SessionId};
pub use reactor::Reactor;
pub use search_order::{BestFitSearchOrder, SearchOffset};
pub use session::{SessionChannel, SessionLimits, Transport};
