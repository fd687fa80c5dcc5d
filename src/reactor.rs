//! Network Reactor - owns every connection and feeds the global queue.
//!
//! One task on a current-thread tokio runtime drives all sockets by hand:
//! each turn it flushes responses, reads requests up to each session's
//! admissible window, reclaims finished sessions, and only then waits
//! (briefly) for readiness. Reads and writes are `try_*` calls; readiness
//! is edge-like, so a session's `can_read`/`can_write` flag is cleared on
//! `WouldBlock` and set again only by a readiness notification.

use std::future::poll_fn;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::{QueueEntry, RequestProducer, SessionId};
use crate::session::{response_ring, SessionChannel, SessionLimits};

/// Upper bound on a single readiness wait.
const READINESS_WAIT: Duration = Duration::from_millis(1);

/// The reactor: all live sessions plus the producer end of the global queue.
pub struct Reactor {
    listener: TcpListener,
    sessions: Vec<SessionChannel<TcpStream>>,
    queue: RequestProducer,
    /// Sessions whose `Close` did not fit in the global queue yet
    pending_closes: Vec<SessionId>,
    next_session: SessionId,
    limits: SessionLimits,
    max_connections: usize,
    session_timeout: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Reactor {
    /// Bind the listening socket described by `config`.
    pub async fn bind(config: &Config, queue: RequestProducer, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            listener,
            sessions: Vec::with_capacity(config.max_connections),
            queue,
            pending_closes: Vec::new(),
            next_session: 0,
            limits: config.session_limits(),
            max_connections: config.max_connections,
            session_timeout: config.session_timeout(),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of sessions not yet destroyed (including released ones still
    /// waiting for answers).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drive the reactor until the shutdown flag is raised or the allocator
    /// goes away.
    pub async fn run(&mut self) -> Result<()> {
        while !self.shutdown.load(Ordering::Acquire) {
            if self.queue.is_abandoned() {
                warn!("allocator gone; stopping reactor");
                break;
            }
            self.turn().await;
        }
        info!(sessions = self.sessions.len(), "reactor stopped");
        Ok(())
    }

    /// One reactor iteration.
    pub async fn turn(&mut self) {
        self.flush_writes();
        let can_read = self.read_requests();
        let (write_pending, waiting_write) = self.reclaim_sessions();

        let mut waited = false;
        if waiting_write > 0 && write_pending == waiting_write {
            self.wait_writable().await;
            waited = true;
        }
        if !can_read {
            self.wait_readable().await;
            waited = true;
        }
        if !waited {
            // Let other tasks on this runtime (signal handling) make progress
            tokio::task::yield_now().await;
        }
    }

    /// Write buffered responses of every writable session.
    fn flush_writes(&mut self) {
        for session in &mut self.sessions {
            if session.is_released() || !session.can_write() {
                continue;
            }
            if let Err(e) = session.drain_writes() {
                warn!(session = session.id(), error = %e, "write failed; releasing session");
                session.release();
            }
        }
    }

    /// Read and enqueue requests; evict idle sessions. Returns true if any
    /// live session may still have unread bytes.
    fn read_requests(&mut self) -> bool {
        let now = Instant::now();
        let mut can_read = false;

        for session in &mut self.sessions {
            if session.is_released() {
                continue;
            }
            if session.can_read() {
                if let Err(e) = session.read_requests(self.queue.free_slots()) {
                    debug!(session = session.id(), error = %e, "read failed; releasing session");
                    session.release();
                    continue;
                }
            }
            session.enqueue_requests(&mut self.queue);

            if now.duration_since(session.last_activity()) > self.session_timeout {
                warn!(session = session.id(), "session timed out");
                session.release();
                continue;
            }
            can_read |= session.can_read();
        }
        can_read
    }

    /// Destroy released sessions that have every admitted request answered.
    ///
    /// Returns `(write_pending, waiting_write)`: live sessions with unsent
    /// responses, and how many of those are blocked on write readiness.
    fn reclaim_sessions(&mut self) -> (usize, usize) {
        self.pending_closes
            .retain(|&session| self.queue.push(QueueEntry::Close { session }).is_err());

        let mut write_pending = 0;
        let mut waiting_write = 0;
        let queue = &mut self.queue;
        let pending_closes = &mut self.pending_closes;

        self.sessions.retain_mut(|session| {
            if session.is_released() {
                session.collect_responses();
                if session.is_reclaimable() {
                    let id = session.id();
                    if queue.push(QueueEntry::Close { session: id }).is_err() {
                        pending_closes.push(id);
                    }
                    info!(session = id, "session closed");
                    return false;
                }
                return true;
            }
            if session.has_unsent() {
                write_pending += 1;
                if !session.can_write() {
                    waiting_write += 1;
                }
            }
            true
        });

        (write_pending, waiting_write)
    }

    /// Wait until some blocked writer becomes writable, or the wait expires.
    async fn wait_writable(&mut self) {
        let sessions = &mut self.sessions;
        let ready = poll_fn(|cx| {
            let mut progressed = false;
            for session in sessions.iter_mut() {
                if session.is_released() || session.can_write() || !session.has_unsent() {
                    continue;
                }
                match session.transport().poll_write_ready(cx) {
                    Poll::Ready(Ok(())) => {
                        session.set_can_write();
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => {
                        warn!(session = session.id(), error = %e, "write readiness failed; releasing session");
                        session.release();
                        progressed = true;
                    }
                    Poll::Pending => {}
                }
            }
            if progressed {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        });
        let _ = tokio::time::timeout(READINESS_WAIT, ready).await;
    }

    /// Wait until some session becomes readable or a connection arrives,
    /// or the wait expires. New connections are accepted here.
    async fn wait_readable(&mut self) {
        let listener = &self.listener;
        let sessions = &mut self.sessions;
        let mut accepted = Vec::new();

        let ready = poll_fn(|cx| {
            let mut progressed = false;
            loop {
                match listener.poll_accept(cx) {
                    Poll::Ready(Ok(conn)) => {
                        accepted.push(conn);
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => {
                        warn!(error = %e, "accept failed");
                        break;
                    }
                    Poll::Pending => break,
                }
            }
            for session in sessions.iter_mut() {
                if session.is_released() || session.can_read() {
                    continue;
                }
                match session.transport().poll_read_ready(cx) {
                    Poll::Ready(Ok(())) => {
                        session.set_can_read();
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => {
                        warn!(session = session.id(), error = %e, "read readiness failed; releasing session");
                        session.release();
                        progressed = true;
                    }
                    Poll::Pending => {}
                }
            }
            if progressed {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        });
        let _ = tokio::time::timeout(READINESS_WAIT, ready).await;

        for (stream, peer) in accepted {
            self.accept(stream, peer);
        }
    }

    /// Register a new connection, or turn it away at the connection limit.
    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.sessions.len() >= self.max_connections {
            warn!(%peer, limit = self.max_connections, "max connections reached; rejecting");
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, error = %e, "failed to set TCP_NODELAY");
        }

        let id = self.next_session;
        let (producer, consumer) = response_ring(self.limits.capacity);
        if self
            .queue
            .push(QueueEntry::Open { session: id, responses: producer })
            .is_err()
        {
            warn!(%peer, "global queue full; rejecting connection");
            return;
        }
        self.next_session += 1;

        info!(session = id, %peer, "session opened");
        self.sessions
            .push(SessionChannel::new(id, stream, consumer, self.limits));
    }
}
