//! Growable response buffer with a size ceiling.
//!
//! # Design
//! The transport hands over the response body in chunks of arbitrary size.
//! `ResponseBuffer` tracks its logical allocation (`allocated`) separately
//! from the number of bytes written (`len`) so the growth policy is explicit
//! and independent of how `Vec` rounds its own capacity:
//!
//! - a chunk of `n` bytes fits when `allocated - len >= n + 1` (one byte is
//!   always reserved for the trailing terminator);
//! - otherwise, while `allocated < limit`, the allocation grows by
//!   `2 * (n + 1)`;
//! - once `allocated >= limit` a chunk that does not fit is rejected and
//!   `write_chunk` reports zero bytes consumed, which the transport turns into
//!   a write failure.
//!
//! Invariant after every accepted chunk: `allocated >= len + 1`.

use crate::config::INITIAL_RESPONSE_CAPACITY;

/// Accumulates one response body.
#[derive(Debug)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    allocated: usize,
    limit: usize,
}

impl ResponseBuffer {
    /// Buffer for a response of at most roughly `limit` bytes.
    ///
    /// The first allocation is capped at the limit so that limits below the
    /// initial capacity are still enforced.
    pub fn new(limit: usize) -> Self {
        let allocated = INITIAL_RESPONSE_CAPACITY.min(limit).max(1);
        Self {
            data: Vec::with_capacity(allocated),
            allocated,
            limit,
        }
    }

    /// Append a chunk. Returns the number of bytes consumed: `chunk.len()` on
    /// success, 0 when the chunk would exceed the limit.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> usize {
        let n = chunk.len();
        let needed = n.saturating_add(1);
        if self.allocated - self.len() < needed {
            if self.allocated >= self.limit {
                return 0;
            }
            let grown = self.allocated.saturating_add(needed.saturating_mul(2));
            if self.data.try_reserve_exact(grown - self.data.len()).is_err() {
                return 0;
            }
            self.allocated = grown;
        }
        self.data.extend_from_slice(chunk);
        debug_assert!(self.allocated > self.len());
        n
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current logical allocation, terminator byte included.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Close the buffer and hand the body over.
    pub fn finish(mut self) -> ResponseBody {
        let len = self.data.len();
        self.data.push(0);
        ResponseBody {
            bytes: self.data,
            len,
        }
    }
}

/// A complete response body.
///
/// The underlying storage ends with a NUL terminator that is not part of the
/// content, so the body can be handed to C callers as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
    bytes: Vec<u8>,
    len: usize,
}

impl ResponseBody {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Content followed by the terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    /// Content without the terminator.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.truncate(self.len);
        self.bytes
    }
}
