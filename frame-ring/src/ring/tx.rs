//! Transmit ring: many independent writers, one consumer.
//!
//! Each writer owns a cursor and fills only its [`FramePart`] of every frame.
//! The consumer (the periodic hardware data mover) drains whole frames, but
//! only as far as the slowest attached writer has reached: a frame goes out
//! once every contributor has written its part.
//!
//! Writers get back-pressure instead of overwriting: a writer one slot behind
//! the consumer is full and its [`put`](TxRing::put) returns 0.
//!
//! `full_count` (bytes the consumer may drain) is the only state shared by
//! several parties. It is recomputed by writers and decremented by the
//! consumer inside a [`CriticalSection`]; copies always happen outside it.
//! The consumer reserves the frames it is about to drain before copying, so
//! a writer re-joining mid-drain starts after them.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::constants::MAX_WRITERS;
use crate::copy::CopySource;
use crate::error::{Result, RingError};
use crate::part::FramePart;
use crate::sync::section::{CriticalSection, DefaultSection};

use super::buffer::FrameBuffer;
use super::cursor::{Cursor, Geometry};
use super::snapshot::{TxSnapshot, WriterSnapshot};

struct Writer {
    cursor: Cursor,
    attached: AtomicBool,
}

/// Multi-writer, single-consumer frame ring.
pub struct TxRing<C: CriticalSection = DefaultSection> {
    geo: Geometry,
    buf: FrameBuffer,
    read: Cursor,
    /// End of the frames the consumer has reserved; equals `read` between drains.
    drain: Cursor,
    writers: Box<[Writer]>,
    full_count: AtomicUsize,
    section: C,
}

impl TxRing {
    /// Allocate a ring holding `frame_count` frames of `bytes_per_frame`
    /// bytes for `writer_count` writers, all attached at the start.
    pub fn allocate(writer_count: usize, frame_count: usize, bytes_per_frame: usize) -> Result<Self> {
        Self::with_section(writer_count, frame_count, bytes_per_frame, DefaultSection::default())
    }
}

impl<C: CriticalSection> TxRing<C> {
    /// Like [`allocate`](TxRing::allocate) with an explicit critical section.
    pub fn with_section(
        writer_count: usize,
        frame_count: usize,
        bytes_per_frame: usize,
        section: C,
    ) -> Result<Self> {
        if writer_count > MAX_WRITERS {
            return Err(RingError::TooManyParties {
                count: writer_count,
                max: MAX_WRITERS,
            });
        }
        let geo = Geometry::new(frame_count, bytes_per_frame)?;
        let buf = FrameBuffer::zeroed(geo.buffer_len())?;
        let writers = (0..writer_count)
            .map(|_| Writer {
                cursor: Cursor::new(0),
                attached: AtomicBool::new(true),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        log::debug!(
            "tx ring: {} writer(s), {} frame(s) of {} bytes ({} bytes allocated)",
            writer_count,
            frame_count,
            bytes_per_frame,
            buf.len()
        );

        Ok(TxRing {
            geo,
            buf,
            read: Cursor::new(0),
            drain: Cursor::new(0),
            writers,
            full_count: AtomicUsize::new(0),
            section,
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.geo.bytes_per_frame()
    }

    pub fn frame_count(&self) -> usize {
        self.geo.frame_count()
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }

    /// Usable capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.geo.capacity()
    }

    /// Writer side: copy this writer's part of up to `bytes / part.count`
    /// frames from `src` into free slots.
    ///
    /// Returns the number of bytes taken from `src`; 0 when the writer has
    /// no free slot. If `src` faults part way, only whole parts copied before
    /// the fault are counted and the cursor stops in front of that frame.
    pub fn put<S>(&self, writer: usize, part: FramePart, src: &mut S, bytes: usize) -> Result<usize>
    where
        S: CopySource + ?Sized,
    {
        let slot = self.attached_writer(writer)?;
        part.validate(self.geo.bytes_per_frame())?;
        let wanted = part.frames_in(bytes);

        let start = slot.cursor.own();
        let queued = self.geo.distance(self.read.observe(), start);
        // One slot stays free so a full writer never lands on the consumer.
        let free = self.geo.slots().saturating_sub(queued + 1);

        let width = part.count as usize;
        let mut seq = start;
        let mut copied = 0;
        for _ in 0..free.min(wanted) {
            // SAFETY: slots from this writer's cursor up to the consumer are
            // free; only this writer touches its part of them.
            let chunk = unsafe { self.buf.slice_mut(part.range_in(self.geo.offset(seq))) };
            if src.copy_out(copied, chunk) != 0 {
                break;
            }
            copied += width;
            seq = self.geo.advance(seq, 1);
        }

        if seq != start {
            slot.cursor.publish(seq);
            self.section.with(|| self.recompute_full());
            log::trace!("tx writer {} put {} frame(s)", writer, copied / width);
        }
        Ok(copied)
    }

    /// Consumer side: drain up to `bytes` of assembled frames into `dst`.
    ///
    /// `bytes` must be a whole number of frames. Drained slots are cleared so
    /// bytes no writer claims go out as zeros on the next lap.
    pub fn get(&self, dst: &mut [u8], bytes: usize) -> Result<usize> {
        let bpf = self.geo.bytes_per_frame();
        if bytes % bpf != 0 {
            return Err(RingError::MisalignedLength { len: bytes, frame: bpf });
        }
        if bytes > dst.len() {
            return Err(RingError::RequestTooLarge {
                requested: bytes,
                capacity: dst.len(),
            });
        }
        let seq = self.read.own();
        let n = self.section.with(|| {
            let n = self.full_count.load(Ordering::Acquire).min(bytes);
            if n > 0 {
                self.drain.publish(self.geo.advance(seq, n / bpf));
                self.full_count.fetch_sub(n, Ordering::AcqRel);
            }
            n
        });
        if n == 0 {
            return Ok(0);
        }

        let (head, tail) = self.geo.split(self.geo.offset(seq), n);
        // SAFETY: every attached writer is past these slots and none can
        // wrap onto them until the read cursor moves.
        unsafe {
            let first = self.buf.slice_mut(head);
            dst[..first.len()].copy_from_slice(first);
            first.fill(0);
            let split = first.len();
            let second = self.buf.slice_mut(tail);
            dst[split..n].copy_from_slice(second);
            second.fill(0);
        }

        self.read.publish(self.geo.advance(seq, n / bpf));
        Ok(n)
    }

    /// `true` iff the writer sits one frame behind the consumer.
    pub fn is_full(&self, writer: usize) -> Result<bool> {
        let slot = self.writer(writer)?;
        let queued = self.geo.distance(self.read.observe(), slot.cursor.observe());
        Ok(queued == self.geo.slots() - 1)
    }

    /// Bytes the consumer may drain right now.
    pub fn full_count(&self) -> usize {
        self.full_count.load(Ordering::Acquire)
    }

    /// Attach a writer at the consumer's position (after any frames it is
    /// draining right now).
    ///
    /// Only valid while the writer is quiesced (during reconfiguration). Until
    /// it writes, the writer caps the fill count at zero.
    pub fn reset_writer(&self, writer: usize) -> Result<()> {
        let slot = self.writer(writer)?;
        self.section.with(|| {
            slot.cursor.publish(self.drain.observe());
            slot.attached.store(true, Ordering::Release);
            self.recompute_full();
        });
        Ok(())
    }

    /// Stop counting a writer when computing the fill count.
    pub fn detach_writer(&self, writer: usize) -> Result<()> {
        let slot = self.writer(writer)?;
        self.section.with(|| {
            slot.attached.store(false, Ordering::Release);
            self.recompute_full();
        });
        Ok(())
    }

    /// Read-only view of cursor positions and fill levels.
    pub fn dump(&self) -> TxSnapshot {
        let read = self.read.observe();
        let writers = self
            .writers
            .iter()
            .map(|w| {
                let seq = w.cursor.observe();
                WriterSnapshot {
                    offset: self.geo.offset(seq),
                    queued: self.geo.distance(read, seq).min(self.geo.frame_count()),
                    attached: w.attached.load(Ordering::Acquire),
                }
            })
            .collect();
        TxSnapshot {
            bytes_per_frame: self.geo.bytes_per_frame(),
            frame_count: self.geo.frame_count(),
            read_offset: self.geo.offset(read),
            full_count: self.full_count(),
            writers,
        }
    }

    /// Minimum over attached writers of the distance from the consumer's
    /// reserved position. Caller holds the section.
    fn recompute_full(&self) {
        let drain = self.drain.observe();
        let frames = self
            .writers
            .iter()
            .filter(|w| w.attached.load(Ordering::Acquire))
            .map(|w| self.geo.distance(drain, w.cursor.observe()))
            .min()
            .unwrap_or(0);
        self.full_count
            .store(frames * self.geo.bytes_per_frame(), Ordering::Release);
    }

    fn writer(&self, index: usize) -> Result<&Writer> {
        self.writers.get(index).ok_or(RingError::PartyOutOfRange {
            index,
            count: self.writers.len(),
        })
    }

    fn attached_writer(&self, index: usize) -> Result<&Writer> {
        let slot = self.writer(index)?;
        if !slot.attached.load(Ordering::Acquire) {
            return Err(RingError::PartyNotAttached(index));
        }
        Ok(slot)
    }
}
