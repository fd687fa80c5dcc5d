//! Configuration surface, fixed at startup.
//!
//! Every option can be given on the command line or through a
//! `SEAT_ALLOC_*` environment variable. Queue capacities default to what
//! the target throughput and latency imply: a session may have a full
//! latency window of requests in flight, and the global queue holds five
//! sessions' worth.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::session::SessionLimits;

#[derive(Clone, Debug, Parser)]
#[command(name = "seat-alloc", version, about = "Segment-interval train seat allocator")]
pub struct Config {
    /// Segments (legs) per route
    #[arg(long, env = "SEAT_ALLOC_SEGMENTS", default_value_t = 10)]
    pub segments: i16,

    /// Number of trains
    #[arg(long, env = "SEAT_ALLOC_TRAINS", default_value_t = 5000)]
    pub trains: i32,

    /// Seats per train
    #[arg(long, env = "SEAT_ALLOC_SEATS", default_value_t = 3000)]
    pub seats: i32,

    /// Address to listen on
    #[arg(long, env = "SEAT_ALLOC_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// TCP port to listen on
    #[arg(long, env = "SEAT_ALLOC_PORT", default_value_t = 12306)]
    pub port: u16,

    /// Maximum concurrent connections
    #[arg(long, env = "SEAT_ALLOC_MAX_CONNECTIONS", default_value_t = 500)]
    pub max_connections: usize,

    /// Sustained request rate to size queues for (requests/second)
    #[arg(long, env = "SEAT_ALLOC_TARGET_RATE", default_value_t = 2_000_000)]
    pub target_rate: usize,

    /// Maximum queueing latency to size queues for (seconds)
    #[arg(long, env = "SEAT_ALLOC_TARGET_LATENCY_SECS", default_value_t = 3)]
    pub target_latency_secs: usize,

    /// Per-session ring capacity in records (default: rate x latency)
    #[arg(long, env = "SEAT_ALLOC_SESSION_QUEUE")]
    pub session_queue: Option<usize>,

    /// Global queue capacity in entries (default: 5 x session queue)
    #[arg(long, env = "SEAT_ALLOC_GLOBAL_QUEUE")]
    pub global_queue: Option<usize>,

    /// Seconds without a request before a session is dropped
    #[arg(long, env = "SEAT_ALLOC_SESSION_TIMEOUT_SECS", default_value_t = 10)]
    pub session_timeout_secs: u64,

    /// Records kept free in every ring as a safety margin
    #[arg(long, env = "SEAT_ALLOC_READ_MARGIN", default_value_t = 4)]
    pub read_margin: usize,

    /// Buffered response bytes that trigger a write before all requests
    /// are answered
    #[arg(long, env = "SEAT_ALLOC_COALESCE_BYTES", default_value_t = 1400)]
    pub coalesce_bytes: usize,

    /// Pin the allocator thread to the last CPU core
    #[arg(long, env = "SEAT_ALLOC_PIN_CORE")]
    pub pin_core: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segments: 10,
            trains: 5000,
            seats: 3000,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 12306,
            max_connections: 500,
            target_rate: 2_000_000,
            target_latency_secs: 3,
            session_queue: None,
            global_queue: None,
            session_timeout_secs: 10,
            read_margin: 4,
            coalesce_bytes: 1400,
            pin_core: false,
        }
    }
}

impl Config {
    /// Per-session ring capacity `Q`.
    pub fn session_queue_capacity(&self) -> usize {
        self.session_queue
            .unwrap_or_else(|| self.target_rate.saturating_mul(self.target_latency_secs))
    }

    /// Global queue capacity `G`.
    pub fn global_queue_capacity(&self) -> usize {
        self.global_queue
            .unwrap_or_else(|| self.session_queue_capacity().saturating_mul(5))
    }

    /// Ticket slots needed for the fleet: `S x T x K`.
    pub fn arena_capacity(&self) -> u64 {
        self.segments.max(0) as u64 * self.trains.max(0) as u64 * self.seats.max(0) as u64
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            capacity: self.session_queue_capacity(),
            margin: self.read_margin,
            coalesce_bytes: self.coalesce_bytes,
        }
    }

    /// Reject shapes the allocator cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.segments <= 0 {
            return Err(Error::Config(format!("segments must be positive, got {}", self.segments)));
        }
        if self.trains <= 0 {
            return Err(Error::Config(format!("trains must be positive, got {}", self.trains)));
        }
        if self.seats <= 0 {
            return Err(Error::Config(format!("seats must be positive, got {}", self.seats)));
        }
        if self.arena_capacity() >= crate::arena::NULL_INDEX as u64 {
            return Err(Error::Config(format!(
                "{} ticket slots exceed the 32-bit arena index space",
                self.arena_capacity()
            )));
        }
        let session = self.session_queue_capacity();
        if session <= self.read_margin {
            return Err(Error::Config(format!(
                "session queue ({}) must exceed the read margin ({})",
                session, self.read_margin
            )));
        }
        let global = self.global_queue_capacity();
        if global <= self.read_margin {
            return Err(Error::Config(format!(
                "global queue ({}) must exceed the read margin ({})",
                global, self.read_margin
            )));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be positive".into()));
        }
        Ok(())
    }
}
