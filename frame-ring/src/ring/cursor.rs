//! Ring geometry and per-party cursors.
//!
//! A ring of `frame_count` frames allocates `frame_count + 1` slots; the
//! extra slot keeps "empty" (cursors equal) distinct from "full" (writer one
//! slot behind the reader) without a shared counter, as in a Lamport queue.
//!
//! Cursors are frame *sequence numbers* rather than byte pointers. They run
//! modulo an epoch that is a whole multiple of the slot count, so the slot
//! (and byte offset) of a sequence number is stable across the epoch wrap,
//! while the distance between two cursors can exceed one lap. That lets a
//! receive reader tell "caught up" from "lapped by the producer".

use core::ops::Range;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, RingError};

/// Sizes and cursor arithmetic for one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    bytes_per_frame: usize,
    frame_count: usize,
    slots: usize,
    epoch: usize,
}

impl Geometry {
    pub fn new(frame_count: usize, bytes_per_frame: usize) -> Result<Self> {
        if frame_count == 0 {
            return Err(RingError::InvalidGeometry("frame count is zero"));
        }
        let slots = frame_count
            .checked_add(1)
            .ok_or(RingError::InvalidGeometry("frame count overflows"))?;
        // Keep epoch + any distance below usize::MAX so distance math cannot overflow.
        let laps = (usize::MAX / 2) / slots;
        Self::with_laps(frame_count, bytes_per_frame, laps)
    }

    /// Geometry whose cursors wrap after `laps` trips around the buffer.
    pub fn with_laps(frame_count: usize, bytes_per_frame: usize, laps: usize) -> Result<Self> {
        if bytes_per_frame == 0 {
            return Err(RingError::InvalidGeometry("frame size is zero"));
        }
        let slots = frame_count
            .checked_add(1)
            .ok_or(RingError::InvalidGeometry("frame count overflows"))?;
        if laps < 2 {
            return Err(RingError::InvalidGeometry("frame count too large"));
        }
        if slots.checked_mul(bytes_per_frame).is_none() {
            return Err(RingError::InvalidGeometry("buffer length overflows"));
        }
        Ok(Geometry {
            bytes_per_frame,
            frame_count,
            slots,
            epoch: slots * laps,
        })
    }

    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Bytes of backing storage (`slots × bytes_per_frame`).
    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.slots * self.bytes_per_frame
    }

    /// Usable capacity in bytes (`frame_count × bytes_per_frame`).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.frame_count * self.bytes_per_frame
    }

    /// Sequence number `frames` ahead of `seq`.
    #[inline]
    pub fn advance(&self, seq: usize, frames: usize) -> usize {
        debug_assert!(seq < self.epoch);
        (seq + frames % self.epoch) % self.epoch
    }

    /// Frames from `from` forward to `to`.
    #[inline]
    pub fn distance(&self, from: usize, to: usize) -> usize {
        (to + self.epoch - from) % self.epoch
    }

    /// Byte offset of the slot holding sequence number `seq`.
    #[inline]
    pub fn offset(&self, seq: usize) -> usize {
        (seq % self.slots) * self.bytes_per_frame
    }

    /// Split `len` bytes starting at `start` into the run up to the buffer
    /// end and the run continuing from the buffer start (possibly empty).
    #[inline]
    pub fn split(&self, start: usize, len: usize) -> (Range<usize>, Range<usize>) {
        debug_assert!(len <= self.buffer_len());
        let end = self.buffer_len();
        let first = len.min(end - start);
        (start..start + first, 0..len - first)
    }
}

/// A cursor owned by exactly one party.
///
/// The owner loads its own cursor relaxed and publishes with release; other
/// parties observe it with acquire, which orders the slot bytes the owner
/// copied before the cursor moved.
#[derive(Debug, Default)]
pub(crate) struct Cursor(AtomicUsize);

impl Cursor {
    pub const fn new(seq: usize) -> Self {
        Cursor(AtomicUsize::new(seq))
    }

    /// Owner's view of its own cursor.
    #[inline]
    pub fn own(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Another party's view.
    #[inline]
    pub fn observe(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn publish(&self, seq: usize) {
        self.0.store(seq, Ordering::Release);
    }
}
