//! Receive ring: one producer, many independent readers.
//!
//! The producer (the periodic hardware data mover) writes whole frames and
//! never blocks: when the ring is full it overwrites the oldest frames. Each
//! reader owns a cursor and extracts only its [`FramePart`] of every frame.
//!
//! ```text
//!            write cursor (producer)
//!                  │
//!   ┌──────┬──────┬▼─────┬──────┬──────┬──────┐
//!   │ f3   │ f4   │ next │ f0   │ f1   │ f2   │   frame_count + 1 slots
//!   └──────┴──────┴──────┴──▲───┴──────┴──▲───┘
//!                           │             │
//!                       reader 0      reader 1
//! ```
//!
//! A reader that falls a full lap behind skips forward to the most recent
//! `frame_count` frames on its next [`get`](RxRing::get); the skipped frames
//! are counted as overruns.
//!
//! # Safety Contract
//!
//! The producer never waits for readers. A reader stays clear of the slot
//! being written as long as it keeps within `frame_count` frames of the
//! producer, which the reserved slot and the skip-ahead on [`get`](RxRing::get)
//! arrange at the start of every call. If the producer laps a reader *during*
//! its copy, the producer's plain stores and the reader's plain loads touch
//! the same bytes concurrently. That is a data race in the Rust memory model,
//! not merely a torn frame, and it is the price of a producer that never
//! blocks. Deployments must size `frame_count` and the producer period so that
//! one reader call finishes well within `frame_count` producer frames; the
//! overrun counter reports how close readers come to that limit.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::MAX_READERS;
use crate::copy::CopySink;
use crate::error::{Result, RingError};
use crate::part::FramePart;

use super::buffer::FrameBuffer;
use super::cursor::{Cursor, Geometry};
use super::snapshot::{ReaderSnapshot, RxSnapshot};

struct Reader {
    cursor: Cursor,
    overruns: AtomicUsize,
}

/// Single-producer, multi-reader frame ring.
pub struct RxRing {
    geo: Geometry,
    buf: FrameBuffer,
    write: Cursor,
    readers: Box<[Reader]>,
}

impl RxRing {
    /// Allocate a ring holding `frame_count` frames of `bytes_per_frame`
    /// bytes for `reader_count` readers.
    ///
    /// Every reader starts caught up (empty).
    pub fn allocate(reader_count: usize, frame_count: usize, bytes_per_frame: usize) -> Result<Self> {
        if reader_count > MAX_READERS {
            return Err(RingError::TooManyParties {
                count: reader_count,
                max: MAX_READERS,
            });
        }
        let geo = Geometry::new(frame_count, bytes_per_frame)?;
        let buf = FrameBuffer::zeroed(geo.buffer_len())?;
        let readers = (0..reader_count)
            .map(|_| Reader {
                cursor: Cursor::new(0),
                overruns: AtomicUsize::new(0),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        log::debug!(
            "rx ring: {} reader(s), {} frame(s) of {} bytes ({} bytes allocated)",
            reader_count,
            frame_count,
            bytes_per_frame,
            buf.len()
        );

        Ok(RxRing {
            geo,
            buf,
            write: Cursor::new(0),
            readers,
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.geo.bytes_per_frame()
    }

    pub fn frame_count(&self) -> usize {
        self.geo.frame_count()
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Usable capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.geo.capacity()
    }

    /// Producer side: append whole frames, overwriting unread ones.
    ///
    /// Every frame handed over counts as produced and the call returns
    /// `bytes.len()`. When more than the buffer holds arrives at once only the
    /// newest slots' worth is stored; readers see the rest as overruns.
    /// Only the producer may call this.
    pub fn put(&self, bytes: &[u8]) -> Result<usize> {
        let bpf = self.geo.bytes_per_frame();
        if bytes.len() % bpf != 0 {
            return Err(RingError::MisalignedLength {
                len: bytes.len(),
                frame: bpf,
            });
        }
        let frames = bytes.len() / bpf;
        if frames == 0 {
            return Ok(0);
        }
        let kept = frames.min(self.geo.slots());
        let newest = &bytes[(frames - kept) * bpf..];

        let seq = self.geo.advance(self.write.own(), frames - kept);
        let (head, tail) = self.geo.split(self.geo.offset(seq), newest.len());
        // SAFETY: the producer is the only writer of the buffer. See the
        // safety contract in the module docs for lapped readers.
        unsafe {
            self.buf.slice_mut(head.clone()).copy_from_slice(&newest[..head.len()]);
            self.buf.slice_mut(tail).copy_from_slice(&newest[head.len()..]);
        }
        self.write.publish(self.geo.advance(seq, kept));

        if kept < frames {
            log::trace!("rx put {} frame(s), {} overwritten in place", frames, frames - kept);
        } else {
            log::trace!("rx put {} frame(s)", frames);
        }
        Ok(bytes.len())
    }

    /// Reader side: copy this reader's part of every pending frame into
    /// `sink`, up to `max_bytes`.
    ///
    /// `max_bytes` is rounded down to a multiple of `part.count`. Returns the
    /// number of bytes delivered, which is 0 when nothing new has arrived. If
    /// `sink` faults part way, only whole parts delivered before the fault are
    /// counted and the cursor stops in front of the faulting frame.
    pub fn get<S>(&self, reader: usize, part: FramePart, sink: &mut S, max_bytes: usize) -> Result<usize>
    where
        S: CopySink + ?Sized,
    {
        let slot = self.reader(reader)?;
        part.validate(self.geo.bytes_per_frame())?;
        if max_bytes > self.geo.capacity() {
            return Err(RingError::RequestTooLarge {
                requested: max_bytes,
                capacity: self.geo.capacity(),
            });
        }
        let wanted = part.frames_in(max_bytes);

        let write = self.write.observe();
        let mut seq = slot.cursor.own();
        let mut pending = self.geo.distance(seq, write);
        if pending > self.geo.frame_count() {
            let lost = pending - self.geo.frame_count();
            seq = self.geo.advance(seq, lost);
            pending = self.geo.frame_count();
            slot.overruns.fetch_add(lost, Ordering::Relaxed);
            log::warn!("rx reader {} overrun, {} frame(s) lost", reader, lost);
        }

        let width = part.count as usize;
        let mut copied = 0;
        for _ in 0..pending.min(wanted) {
            // SAFETY: slots between this reader's cursor and the write cursor
            // are not being written unless the producer laps the reader
            // during this copy; see the module safety contract.
            let chunk = unsafe { self.buf.slice(part.range_in(self.geo.offset(seq))) };
            if sink.copy_in(copied, chunk) != 0 {
                break;
            }
            copied += width;
            seq = self.geo.advance(seq, 1);
        }
        slot.cursor.publish(seq);

        Ok(copied)
    }

    /// `true` iff the reader's cursor equals the producer's write cursor.
    ///
    /// A reader lapped by the producer is never reported empty.
    pub fn is_empty(&self, reader: usize) -> Result<bool> {
        let slot = self.reader(reader)?;
        Ok(slot.cursor.observe() == self.write.observe())
    }

    /// Frames this reader has not consumed yet, capped at `frame_count`.
    pub fn pending(&self, reader: usize) -> Result<usize> {
        let slot = self.reader(reader)?;
        let pending = self.geo.distance(slot.cursor.observe(), self.write.observe());
        Ok(pending.min(self.geo.frame_count()))
    }

    /// Move a reader's cursor to the current write position.
    ///
    /// Only valid while the reader is quiesced (during reconfiguration).
    pub fn reset_reader(&self, reader: usize) -> Result<()> {
        let slot = self.reader(reader)?;
        slot.cursor.publish(self.write.observe());
        slot.overruns.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Frames this reader has lost to the overwrite policy since its last reset.
    pub fn overruns(&self, reader: usize) -> Result<usize> {
        Ok(self.reader(reader)?.overruns.load(Ordering::Relaxed))
    }

    /// Read-only view of cursor positions and fill levels.
    pub fn dump(&self) -> RxSnapshot {
        let write = self.write.observe();
        let readers = self
            .readers
            .iter()
            .map(|r| {
                let seq = r.cursor.observe();
                ReaderSnapshot {
                    offset: self.geo.offset(seq),
                    pending: self.geo.distance(seq, write).min(self.geo.frame_count()),
                    overruns: r.overruns.load(Ordering::Relaxed),
                }
            })
            .collect();
        RxSnapshot {
            bytes_per_frame: self.geo.bytes_per_frame(),
            frame_count: self.geo.frame_count(),
            write_offset: self.geo.offset(write),
            readers,
        }
    }

    fn reader(&self, index: usize) -> Result<&Reader> {
        self.readers.get(index).ok_or(RingError::PartyOutOfRange {
            index,
            count: self.readers.len(),
        })
    }
}
