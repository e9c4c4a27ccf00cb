//! Frame-part addressing.
//!
//! A frame part is the byte sub-range `[offset, offset + count)` of every
//! frame that one reader or writer cares about. It carries no state; all
//! arithmetic here is pure.

use core::fmt;
use core::ops::Range;

use crate::error::{Result, RingError};

/// Byte sub-range of a frame owned by one stream party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FramePart {
    /// Width of the part in bytes.
    pub count: u32,
    /// Start of the part within the frame.
    pub offset: u32,
}

impl FramePart {
    pub const fn new(count: u32, offset: u32) -> Self {
        FramePart { count, offset }
    }

    /// A part covering the whole frame.
    pub const fn whole(bytes_per_frame: u32) -> Self {
        FramePart {
            count: bytes_per_frame,
            offset: 0,
        }
    }

    /// Check that the part is non-empty and lies inside a frame of
    /// `bytes_per_frame` bytes.
    pub fn validate(&self, bytes_per_frame: usize) -> Result<()> {
        let end = self.offset as usize + self.count as usize;
        if self.count == 0 || end > bytes_per_frame {
            return Err(RingError::InvalidFramePart {
                count: self.count,
                offset: self.offset,
                frame: bytes_per_frame,
            });
        }
        Ok(())
    }

    /// Byte range of the part relative to the start of a frame.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.count as usize
    }

    /// Byte range of the part inside the frame starting at `frame_start`.
    #[inline]
    pub fn range_in(&self, frame_start: usize) -> Range<usize> {
        let start = frame_start + self.offset as usize;
        start..start + self.count as usize
    }

    /// Round `bytes` down to a whole number of parts and return that number.
    #[inline]
    pub fn frames_in(&self, bytes: usize) -> usize {
        bytes / self.count as usize
    }
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.count, self.offset)
    }
}
