//! Error types for server startup and transport setup.
//!
//! Per-request failures are never errors: invalid or unavailable bookings
//! are answered with the `NO_SEAT` sentinel, and a failing connection is
//! simply released. Only the paths that bring the server up return these.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can stop the server from starting or running.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration describes a fleet or queue that cannot be built.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The async runtime could not be created.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),

    /// A thread could not be spawned or joined.
    #[error("thread failure: {0}")]
    Thread(String),

    /// Any other I/O failure outside a session.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;
