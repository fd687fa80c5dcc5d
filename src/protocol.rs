//! Wire records exchanged with clients.
//!
//! Both records are fixed 16-byte little-endian frames with no header or
//! delimiter: a connection is simply a stream of requests one way and a
//! stream of responses the other, answered in the order they were sent.

/// Seat value meaning "no seat available or request invalid".
pub const NO_SEAT: i32 = -1;

/// Size of an encoded [`Request`] in bytes.
pub const REQUEST_SIZE: usize = 16;

/// Size of an encoded [`Response`] in bytes.
pub const RESPONSE_SIZE: usize = 16;

/// A booking request for any seat covering `[start, stop)` on one train.
///
/// | Field      | Type | Offset |
/// |------------|------|--------|
/// | request_id | i64  | 0      |
/// | train      | i32  | 8      |
/// | start      | i16  | 12     |
/// | stop       | i16  | 14     |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Request {
    /// Client-assigned id, echoed back in the response
    pub request_id: i64,
    /// Train index in `[0, T)`
    pub train: i32,
    /// First segment, inclusive
    pub start: i16,
    /// Last segment, exclusive
    pub stop: i16,
}

impl Request {
    #[inline]
    pub const fn new(request_id: i64, train: i32, start: i16, stop: i16) -> Self {
        Self {
            request_id,
            train,
            start,
            stop,
        }
    }

    #[inline]
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut buf = [0u8; REQUEST_SIZE];
        buf[0..8].copy_from_slice(&self.request_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.train.to_le_bytes());
        buf[12..14].copy_from_slice(&self.start.to_le_bytes());
        buf[14..16].copy_from_slice(&self.stop.to_le_bytes());
        buf
    }

    #[inline]
    pub fn decode(buf: &[u8; REQUEST_SIZE]) -> Self {
        Self {
            request_id: i64::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ]),
            train: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            start: i16::from_le_bytes([buf[12], buf[13]]),
            stop: i16::from_le_bytes([buf[14], buf[15]]),
        }
    }
}

/// The answer to one [`Request`].
///
/// | Field      | Type | Offset |
/// |------------|------|--------|
/// | request_id | i64  | 0      |
/// | sequence   | i32  | 8      |
/// | seat       | i32  | 12     |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Response {
    /// Echo of the request's id
    pub request_id: i64,
    /// Global processing order of the request (wraps at i32)
    pub sequence: i32,
    /// Assigned seat (>= 1) or [`NO_SEAT`]
    pub seat: i32,
}

impl Response {
    #[inline]
    pub const fn new(request_id: i64, sequence: i32, seat: i32) -> Self {
        Self {
            request_id,
            sequence,
            seat,
        }
    }

    /// Returns true if a seat was assigned.
    #[inline]
    pub const fn is_booked(&self) -> bool {
        self.seat != NO_SEAT
    }

    #[inline]
    pub fn encode(&self) -> [u8; RESPONSE_SIZE] {
        let mut buf = [0u8; RESPONSE_SIZE];
        buf[0..8].copy_from_slice(&self.request_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.sequence.to_le_bytes());
        buf[12..16].copy_from_slice(&self.seat.to_le_bytes());
        buf
    }

    #[inline]
    pub fn decode(buf: &[u8; RESPONSE_SIZE]) -> Self {
        Self {
            request_id: i64::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ]),
            sequence: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            seat: i32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }
}
