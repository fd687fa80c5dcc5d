//! Session Channel - per-connection request and response rings.
//!
//! Each connection owns a fixed inbound byte ring of `Q` request records
//! and a fixed outbound byte ring of `Q` response records, both allocated
//! on accept and never resized. Responses travel from the allocator thread
//! through a per-session SPSC ring (rtrb) and are encoded into the
//! outbound ring by the reactor just before writing.
//!
//! ```text
//! socket --> [inbound ring] --> GlobalRequestQueue --> allocator
//! socket <-- [outbound ring] <-- [response ring] <------'
//! ```
//!
//! All positions are monotonic counters; ring offsets are taken modulo
//! the ring size only when touching memory.

use std::io::{self, IoSlice, IoSliceMut};
use std::time::Instant;

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::protocol::{Request, Response, REQUEST_SIZE, RESPONSE_SIZE};
use crate::queue::{QueueEntry, RequestProducer, SessionId};

/// Non-blocking byte stream under a session.
///
/// Reads and writes follow `std::io` conventions: `WouldBlock` means try
/// again after the next readiness notification, `Ok(0)` from a read means
/// the peer closed, and any other error is fatal for the session.
pub trait Transport {
    fn try_read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize>;
    fn try_write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;
}

impl Transport for tokio::net::TcpStream {
    #[inline]
    fn try_read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        tokio::net::TcpStream::try_read_vectored(self, bufs)
    }

    #[inline]
    fn try_write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        tokio::net::TcpStream::try_write_vectored(self, bufs)
    }
}

/// Sizing shared by every session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLimits {
    /// Records per ring (`Q`)
    pub capacity: usize,
    /// Records of slack kept free in both the local and global rings
    pub margin: usize,
    /// Buffered response bytes that justify a write while requests are
    /// still outstanding
    pub coalesce_bytes: usize,
}

/// Allocator-side handle for writing one session's responses.
pub struct ResponseSink {
    producer: Producer<Response>,
}

impl ResponseSink {
    /// Publish one response to the session.
    ///
    /// rtrb publishes the slot with release ordering before advancing its
    /// write position, so the reactor never observes a half-written record.
    /// The ring cannot be full under admission control; if it momentarily
    /// is, spin until the reactor drains it rather than drop an answer.
    /// Responses to a session whose reactor side is gone are discarded.
    #[inline]
    pub fn enqueue_response(&mut self, request_id: i64, sequence: i32, seat: i32) {
        let mut response = Response::new(request_id, sequence, seat);
        loop {
            match self.producer.push(response) {
                Ok(()) => return,
                Err(PushError::Full(rejected)) => {
                    if self.producer.is_abandoned() {
                        return;
                    }
                    response = rejected;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

impl From<Producer<Response>> for ResponseSink {
    fn from(producer: Producer<Response>) -> Self {
        Self { producer }
    }
}

/// Create a session's response ring: the sink goes to the allocator, the
/// consumer stays with the session.
pub fn response_ring(capacity: usize) -> (Producer<Response>, Consumer<Response>) {
    RingBuffer::new(capacity)
}

/// One connection's state, owned by the reactor thread.
pub struct SessionChannel<T> {
    id: SessionId,
    transport: T,
    limits: SessionLimits,

    inbound: Box<[u8]>,
    /// Bytes received from the socket
    bytes_read: usize,
    /// Complete request records received
    requests_read: usize,
    /// Requests handed to the global queue
    requests_enqueued: usize,

    responses: Consumer<Response>,
    outbound: Box<[u8]>,
    /// Responses taken from the response ring
    responses_received: usize,
    /// Bytes written to the socket
    bytes_sent: usize,

    can_read: bool,
    can_write: bool,
    released: bool,
    last_activity: Instant,
}

impl<T: Transport> SessionChannel<T> {
    /// Wrap a freshly accepted connection.
    ///
    /// `responses` is the consumer end of the ring whose producer was
    /// handed to the allocator. Both byte rings are allocated here, once.
    pub fn new(id: SessionId, transport: T, responses: Consumer<Response>, limits: SessionLimits) -> Self {
        Self {
            id,
            transport,
            limits,
            inbound: vec![0u8; limits.capacity * REQUEST_SIZE].into_boxed_slice(),
            bytes_read: 0,
            requests_read: 0,
            requests_enqueued: 0,
            responses,
            outbound: vec![0u8; limits.capacity * RESPONSE_SIZE].into_boxed_slice(),
            responses_received: 0,
            bytes_sent: 0,
            can_read: true,
            can_write: true,
            released: false,
            last_activity: Instant::now(),
        }
    }

    /// How many more request records may be read from the socket.
    ///
    /// Bounded by the local ring's free room (requests read but not yet
    /// answered on the wire) and by the global queue's free room, each
    /// less the safety margin. Once the allocator falls behind, every
    /// session's window shrinks together.
    pub fn admissible_read_records(&self, global_free: usize) -> usize {
        let margin = self.limits.margin;
        let pending = self.requests_read - self.bytes_sent / RESPONSE_SIZE;
        debug_assert!(pending <= self.limits.capacity);

        let local = self.limits.capacity.saturating_sub(pending);
        let local = if local <= margin { 0 } else { local - margin };
        let global = if global_free <= margin { 0 } else { global_free - margin };
        local.min(global)
    }

    /// Pull request bytes from the socket, up to the admissible window.
    ///
    /// Returns the number of bytes read; `Ok(0)` means the window is closed
    /// or the socket would block. An error, including the peer closing the
    /// stream, is fatal for the session.
    pub fn read_requests(&mut self, global_free: usize) -> io::Result<usize> {
        let window = self.admissible_read_records(global_free);
        if window == 0 {
            return Ok(0);
        }

        let capacity = self.inbound.len();
        let target_end = (self.requests_read + window) * REQUEST_SIZE;
        debug_assert!(target_end > self.bytes_read);
        let start = self.bytes_read % capacity;
        let end = target_end % capacity;

        let result = if start < end {
            let mut bufs = [IoSliceMut::new(&mut self.inbound[start..end])];
            self.transport.try_read_vectored(&mut bufs)
        } else {
            let (head, tail) = self.inbound.split_at_mut(start);
            let mut bufs = [IoSliceMut::new(tail), IoSliceMut::new(&mut head[..end])];
            let count = if end > 0 { 2 } else { 1 };
            self.transport.try_read_vectored(&mut bufs[..count])
        };

        match result {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection")),
            Ok(n) => {
                self.bytes_read += n;
                self.requests_read = self.bytes_read / REQUEST_SIZE;
                self.last_activity = Instant::now();
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.can_read = false;
                Ok(0)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Move every complete request record into the global queue.
    ///
    /// Stops early if the queue is full; the remaining records stay in the
    /// inbound ring for the next turn. Returns the number enqueued.
    pub fn enqueue_requests(&mut self, queue: &mut RequestProducer) -> usize {
        let capacity = self.limits.capacity;
        let mut enqueued = 0;
        while self.requests_enqueued < self.requests_read {
            let offset = (self.requests_enqueued % capacity) * REQUEST_SIZE;
            let mut record = [0u8; REQUEST_SIZE];
            record.copy_from_slice(&self.inbound[offset..offset + REQUEST_SIZE]);

            let entry = QueueEntry::Request {
                session: self.id,
                request: Request::decode(&record),
            };
            if queue.push(entry).is_err() {
                break;
            }
            self.requests_enqueued += 1;
            enqueued += 1;
        }
        enqueued
    }

    /// Take every published response off the response ring and encode it
    /// into the outbound ring.
    pub fn collect_responses(&mut self) -> usize {
        let capacity = self.limits.capacity;
        let mut collected = 0;
        while let Ok(response) = self.responses.pop() {
            let offset = (self.responses_received % capacity) * RESPONSE_SIZE;
            self.outbound[offset..offset + RESPONSE_SIZE].copy_from_slice(&response.encode());
            self.responses_received += 1;
            collected += 1;
        }
        collected
    }

    /// Flush buffered responses to the socket.
    ///
    /// Writes only once every request read so far is answered, or at least
    /// `coalesce_bytes` are buffered, so bursts of small responses share a
    /// syscall. Returns the bytes written; an error is fatal for the
    /// session.
    pub fn drain_writes(&mut self) -> io::Result<usize> {
        self.collect_responses();

        let total = self.responses_received * RESPONSE_SIZE;
        let unsent = total - self.bytes_sent;
        if unsent == 0 {
            return Ok(0);
        }
        if self.responses_received != self.requests_read && unsent < self.limits.coalesce_bytes {
            return Ok(0);
        }

        let capacity = self.outbound.len();
        let start = self.bytes_sent % capacity;
        let end = total % capacity;

        let result = if start < end {
            self.transport.try_write_vectored(&[IoSlice::new(&self.outbound[start..end])])
        } else if end > 0 {
            self.transport.try_write_vectored(&[
                IoSlice::new(&self.outbound[start..]),
                IoSlice::new(&self.outbound[..end]),
            ])
        } else {
            self.transport.try_write_vectored(&[IoSlice::new(&self.outbound[start..])])
        };

        match result {
            Ok(0) => {
                self.can_write = false;
                Ok(0)
            }
            Ok(n) => {
                self.bytes_sent += n;
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.can_write = false;
                Ok(0)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Released and every admitted request has been answered by the
    /// allocator: nothing will ever reference this session again.
    #[inline]
    pub fn is_reclaimable(&self) -> bool {
        self.released && self.responses_received == self.requests_enqueued
    }

    /// Responses received from the allocator but not yet fully written.
    #[inline]
    pub fn has_unsent(&self) -> bool {
        self.responses_received * RESPONSE_SIZE != self.bytes_sent
            || !self.responses.is_empty()
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn can_read(&self) -> bool {
        self.can_read
    }

    #[inline]
    pub fn set_can_read(&mut self) {
        self.can_read = true;
    }

    #[inline]
    pub fn can_write(&self) -> bool {
        self.can_write
    }

    #[inline]
    pub fn set_can_write(&mut self) {
        self.can_write = true;
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop all I/O on this session. It is destroyed once reclaimable.
    #[inline]
    pub fn release(&mut self) {
        self.released = true;
        self.can_read = false;
        self.can_write = false;
    }

    #[inline]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    #[inline]
    pub fn requests_read(&self) -> usize {
        self.requests_read
    }

    #[inline]
    pub fn requests_enqueued(&self) -> usize {
        self.requests_enqueued
    }

    #[inline]
    pub fn responses_received(&self) -> usize {
        self.responses_received
    }

    #[inline]
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }
}
