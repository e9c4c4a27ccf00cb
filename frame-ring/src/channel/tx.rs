//! User-to-hardware channel.
//!
//! [`TxChannel`] wraps a [`TxRing`] with the reconfiguration barrier and the
//! per-writer frame parts. User sessions attach and write their part of each
//! frame; the data mover calls [`isr_get`](TxChannel::isr_get) every period
//! and receives whatever every attached writer has completed.
//!
//! Writers never share bytes: a part that overlaps another attached writer's
//! part is refused at `attach`/`setup`, so every byte of a slot has at most
//! one writer.
//!
//! ## Usage
//!
//! ```ignore
//! let tx = TxChannel::new(RingConfig::new(2, 64, 8))?;
//! let right = tx.attach(FramePart::new(4, 4))?;
//!
//! // In the writer's task (0 means full, try again later):
//! let n = tx.write(&right, &mut &samples[..], samples.len())?;
//!
//! // In the DMA completion ISR:
//! let n = tx.isr_get(&mut dma_half, HALF_BYTES)?;
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;

#[cfg(feature = "std")]
use std::time::Duration;

use crate::config::RingConfig;
use crate::constants::MAX_WRITERS;
use crate::copy::CopySource;
use crate::error::{Result, RingError};
use crate::part::FramePart;
use crate::ring::{TxRing, TxSnapshot};
use crate::sync::section::SetupLock;
use crate::sync::{
    BarrierState, CriticalSection, DefaultParker, DefaultSection, Parker, ReconfigBarrier,
};

use super::slots::{PartyId, PartySlots};

/// Transmit channel: up to [`MAX_WRITERS`] sessions, one hardware consumer.
pub struct TxChannel<P: Parker = DefaultParker, C: CriticalSection = DefaultSection> {
    ring: TxRing<C>,
    barrier: ReconfigBarrier<P>,
    slots: PartySlots,
    parts: Box<[spin::RwLock<Option<FramePart>>]>,
    /// Serializes reconfigurations of this channel.
    setup_lock: SetupLock,
}

impl TxChannel {
    pub fn new(config: RingConfig) -> Result<Self> {
        Self::with_parts(config, ReconfigBarrier::default(), DefaultSection::default())
    }
}

impl<P: Parker, C: CriticalSection> TxChannel<P, C> {
    /// Build a channel from an explicit barrier and critical section.
    pub fn with_parts(config: RingConfig, barrier: ReconfigBarrier<P>, section: C) -> Result<Self> {
        config.validate(MAX_WRITERS)?;
        let ring = TxRing::with_section(
            config.parties,
            config.frame_count,
            config.bytes_per_frame,
            section,
        )?;
        // Writer slots only count once a session attaches.
        for writer in 0..config.parties {
            ring.detach_writer(writer)?;
        }
        let parts = (0..config.parties)
            .map(|_| spin::RwLock::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(TxChannel {
            ring,
            barrier,
            slots: PartySlots::new(config.parties),
            parts,
            setup_lock: SetupLock::new(()),
        })
    }

    /// Assign a free writer slot to a new session writing `part`.
    ///
    /// The writer joins at the consumer's position, so until it writes its
    /// first frame the hardware drains nothing.
    pub fn attach(&self, part: FramePart) -> Result<PartyId> {
        part.validate(self.ring.bytes_per_frame())?;
        let _setup = self.setup_lock.lock();
        let _window = self.barrier.reconfigure();

        self.check_disjoint(part, None)?;
        let id = self.slots.claim().ok_or(RingError::NoFreeParty)?;
        self.ring.reset_writer(id.index())?;
        *self.parts[id.index()].write() = Some(part);

        log::debug!("tx writer {} attached, part {}", id, part);
        Ok(id)
    }

    /// Change the frame part of an attached writer and re-join it at the
    /// consumer's position.
    pub fn setup(&self, id: &PartyId, part: FramePart) -> Result<()> {
        part.validate(self.ring.bytes_per_frame())?;
        let _setup = self.setup_lock.lock();
        let _window = self.barrier.reconfigure();

        self.check_attached(id)?;
        self.check_disjoint(part, Some(id.index()))?;
        self.ring.reset_writer(id.index())?;
        *self.parts[id.index()].write() = Some(part);

        log::debug!("tx writer {} set up, part {}", id, part);
        Ok(())
    }

    /// Release a writer slot, consuming its handle; it stops holding back
    /// the consumer.
    pub fn detach(&self, id: PartyId) -> Result<()> {
        let _setup = self.setup_lock.lock();
        let _window = self.barrier.reconfigure();

        self.check_attached(&id)?;
        self.ring.detach_writer(id.index())?;
        *self.parts[id.index()].write() = None;
        log::debug!("tx writer {} detached", id);
        self.slots.release(id);
        Ok(())
    }

    /// Copy the writer's part of up to `bytes / part.count` frames from `src`.
    ///
    /// Returns 0 when the writer has no free slot (back-pressure).
    pub fn write<S>(&self, id: &PartyId, src: &mut S, bytes: usize) -> Result<usize>
    where
        S: CopySource + ?Sized,
    {
        let _stream = self.barrier.stream();
        self.write_admitted(id, src, bytes)
    }

    /// Like [`write`](Self::write) but gives up if a reconfiguration keeps the
    /// barrier closed for longer than `timeout`.
    #[cfg(feature = "std")]
    pub fn write_timeout<S>(
        &self,
        id: &PartyId,
        src: &mut S,
        bytes: usize,
        timeout: Duration,
    ) -> Result<usize>
    where
        S: CopySource + ?Sized,
    {
        let _stream = self.barrier.stream_timeout(timeout)?;
        self.write_admitted(id, src, bytes)
    }

    /// Hardware side: drain assembled frames. Never blocks and never waits
    /// on the barrier.
    pub fn isr_get(&self, dst: &mut [u8], bytes: usize) -> Result<usize> {
        self.ring.get(dst, bytes)
    }

    pub fn is_full(&self, id: &PartyId) -> Result<bool> {
        self.check_attached(id)?;
        self.ring.is_full(id.index())
    }

    /// Frame part currently assigned to a writer.
    pub fn part(&self, id: &PartyId) -> Option<FramePart> {
        self.slots.check(id).ok()?;
        self.parts.get(id.index()).and_then(|p| *p.read())
    }

    pub fn attached(&self) -> usize {
        self.slots.claimed()
    }

    pub fn barrier_state(&self) -> BarrierState {
        self.barrier.state()
    }

    pub fn barrier(&self) -> &ReconfigBarrier<P> {
        &self.barrier
    }

    pub fn ring(&self) -> &TxRing<C> {
        &self.ring
    }

    pub fn dump(&self) -> TxSnapshot {
        self.ring.dump()
    }

    fn write_admitted<S>(&self, id: &PartyId, src: &mut S, bytes: usize) -> Result<usize>
    where
        S: CopySource + ?Sized,
    {
        self.check_attached(id)?;
        let part = (*self.parts[id.index()].read())
            .ok_or(RingError::PartyNotAttached(id.index()))?;
        self.ring.put(id.index(), part, src, bytes)
    }

    fn check_attached(&self, id: &PartyId) -> Result<()> {
        self.slots.check(id)
    }

    /// Refuse `part` if it shares a byte with another attached writer's part.
    /// Caller holds the setup lock.
    fn check_disjoint(&self, part: FramePart, skip: Option<usize>) -> Result<()> {
        let wanted = part.range();
        for other in self.slots.claimed_indices().filter(|&i| Some(i) != skip) {
            let Some(theirs) = *self.parts[other].read() else {
                continue;
            };
            let theirs = theirs.range();
            if wanted.start < theirs.end && theirs.start < wanted.end {
                return Err(RingError::OverlappingFramePart {
                    count: part.count,
                    offset: part.offset,
                    other,
                });
            }
        }
        Ok(())
    }
}
