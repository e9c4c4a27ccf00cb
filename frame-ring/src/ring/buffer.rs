//! Shared frame storage.
//!
//! The buffer is written by one party and read by others at the same time.
//! Which byte ranges each party may touch is decided by the cursor protocol
//! of the ring that owns the buffer, not by the buffer itself, so every
//! accessor is `unsafe` and states the range ownership it relies on.
//!
//! # Safety Contract
//!
//! - A range has at most one writer at a time.
//! - A reader holds a shared slice only over a range no writer touches,
//!   as established by the cursors when the read begins.
//! - The receive ring's producer never waits, so it can lap a slow reader in
//!   the middle of that reader's copy. The producer's stores then race the
//!   reader's loads on the same bytes. This is undefined behavior under the
//!   Rust memory model, which the receive ring accepts in exchange for a
//!   producer that never blocks. Callers avoid it by keeping each read
//!   shorter than `frame_count` producer frames.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ops::Range;

use crate::error::{Result, RingError};

/// Heap-allocated byte buffer with interior mutability.
pub(crate) struct FrameBuffer {
    cells: Box<[UnsafeCell<u8>]>,
}

// SAFETY: concurrent access is coordinated by the owning ring's cursors;
// each range is written by at most one party at a time. See the module
// safety contract for the lapped receive reader.
unsafe impl Sync for FrameBuffer {}
unsafe impl Send for FrameBuffer {}

impl FrameBuffer {
    /// Allocate `len` zeroed bytes, reporting failure instead of aborting.
    pub fn zeroed(len: usize) -> Result<Self> {
        let mut cells: Vec<UnsafeCell<u8>> = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| RingError::AllocationFailure { bytes: len })?;
        cells.resize_with(len, || UnsafeCell::new(0));
        Ok(FrameBuffer {
            cells: cells.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    /// Borrow `range` for reading.
    ///
    /// # Safety
    ///
    /// No other party may write `range` while the slice is alive. The receive
    /// ring's lapped reader breaks this; see the module safety contract.
    #[inline]
    pub unsafe fn slice(&self, range: Range<usize>) -> &[u8] {
        assert!(range.start <= range.end && range.end <= self.len());
        // SAFETY: bounds checked above; aliasing is the caller's contract.
        unsafe { core::slice::from_raw_parts(self.base().add(range.start), range.len()) }
    }

    /// Borrow `range` for writing.
    ///
    /// # Safety
    ///
    /// The caller must be the only party touching `range` while the slice
    /// is alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [u8] {
        assert!(range.start <= range.end && range.end <= self.len());
        // SAFETY: bounds checked above; exclusivity is the caller's contract.
        unsafe { core::slice::from_raw_parts_mut(self.base().add(range.start), range.len()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_has_requested_len() {
        let buf = FrameBuffer::zeroed(12).unwrap();
        assert_eq!(buf.len(), 12);
        assert!(unsafe { buf.slice(0..12) }.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_range() {
        let buf = FrameBuffer::zeroed(8).unwrap();
        unsafe { buf.slice_mut(2..5) }.copy_from_slice(&[1, 2, 3]);
        assert_eq!(unsafe { buf.slice(0..8) }, &[0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn oversized_allocation_fails_cleanly() {
        assert_eq!(
            FrameBuffer::zeroed(usize::MAX).err(),
            Some(RingError::AllocationFailure { bytes: usize::MAX })
        );
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_range_panics() {
        let buf = FrameBuffer::zeroed(4).unwrap();
        let _ = unsafe { buf.slice(2..6) };
    }
}
