//! Debug snapshots of ring state.
//!
//! Snapshots are taken with plain atomic loads and are not synchronized with
//! reconfiguration; values from different cursors may come from slightly
//! different instants.

use alloc::vec::Vec;
use core::fmt;

/// One receive reader's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSnapshot {
    /// Byte offset of the reader's cursor.
    pub offset: usize,
    /// Frames waiting to be read (capped at the ring depth).
    pub pending: usize,
    /// Frames lost to the overwrite policy since the last reset.
    pub overruns: usize,
}

/// Receive ring state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxSnapshot {
    pub bytes_per_frame: usize,
    pub frame_count: usize,
    pub write_offset: usize,
    pub readers: Vec<ReaderSnapshot>,
}

/// One transmit writer's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSnapshot {
    /// Byte offset of the writer's cursor.
    pub offset: usize,
    /// Frames this writer has queued ahead of the consumer.
    pub queued: usize,
    /// Whether the writer currently caps the fill count.
    pub attached: bool,
}

/// Transmit ring state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSnapshot {
    pub bytes_per_frame: usize,
    pub frame_count: usize,
    pub read_offset: usize,
    /// Bytes the consumer may drain.
    pub full_count: usize,
    pub writers: Vec<WriterSnapshot>,
}

impl fmt::Display for RxSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rx {}x{}B write@{}",
            self.frame_count, self.bytes_per_frame, self.write_offset
        )?;
        for (i, r) in self.readers.iter().enumerate() {
            writeln!(
                f,
                "  reader {}: @{} pending={} overruns={}",
                i, r.offset, r.pending, r.overruns
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for TxSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tx {}x{}B read@{} full={}",
            self.frame_count, self.bytes_per_frame, self.read_offset, self.full_count
        )?;
        for (i, w) in self.writers.iter().enumerate() {
            let state = if w.attached { "" } else { " (detached)" };
            writeln!(f, "  writer {}: @{} queued={}{}", i, w.offset, w.queued, state)?;
        }
        Ok(())
    }
}
