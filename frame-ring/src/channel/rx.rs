//! Hardware-to-user channel.
//!
//! [`RxChannel`] wraps an [`RxRing`] with the reconfiguration barrier and the
//! per-reader frame parts. The data mover calls [`isr_put`](RxChannel::isr_put)
//! every period; user sessions attach, read their part, and detach.
//!
//! ## Usage
//!
//! ```ignore
//! let rx = RxChannel::new(RingConfig::new(2, 64, 8))?;
//! let left = rx.attach(FramePart::new(4, 0))?;
//!
//! // In the DMA completion ISR:
//! rx.isr_put(&dma_half)?;
//!
//! // In the reader's task:
//! let n = rx.read(&left, &mut buf[..], 64)?;
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;

#[cfg(feature = "std")]
use std::time::Duration;

use crate::config::RingConfig;
use crate::constants::MAX_READERS;
use crate::copy::CopySink;
use crate::error::{Result, RingError};
use crate::part::FramePart;
use crate::ring::{RxRing, RxSnapshot};
use crate::sync::section::SetupLock;
use crate::sync::{BarrierState, DefaultParker, Parker, ReconfigBarrier};

use super::slots::{PartyId, PartySlots};

/// Receive channel: one hardware producer, up to [`MAX_READERS`] sessions.
pub struct RxChannel<P: Parker = DefaultParker> {
    ring: RxRing,
    barrier: ReconfigBarrier<P>,
    slots: PartySlots,
    parts: Box<[spin::RwLock<Option<FramePart>>]>,
    /// Serializes reconfigurations of this channel.
    setup_lock: SetupLock,
}

impl RxChannel {
    pub fn new(config: RingConfig) -> Result<Self> {
        Self::with_barrier(config, ReconfigBarrier::default())
    }
}

impl<P: Parker> RxChannel<P> {
    /// Build a channel around an explicit barrier (and thus wait primitive).
    pub fn with_barrier(config: RingConfig, barrier: ReconfigBarrier<P>) -> Result<Self> {
        config.validate(MAX_READERS)?;
        let ring = RxRing::allocate(config.parties, config.frame_count, config.bytes_per_frame)?;
        let parts = (0..config.parties)
            .map(|_| spin::RwLock::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(RxChannel {
            ring,
            barrier,
            slots: PartySlots::new(config.parties),
            parts,
            setup_lock: SetupLock::new(()),
        })
    }

    /// Assign a free reader slot to a new session reading `part`.
    ///
    /// The reader starts at the current write position: it only sees frames
    /// produced after it attached.
    pub fn attach(&self, part: FramePart) -> Result<PartyId> {
        part.validate(self.ring.bytes_per_frame())?;
        let _setup = self.setup_lock.lock();
        let _window = self.barrier.reconfigure();

        let id = self.slots.claim().ok_or(RingError::NoFreeParty)?;
        self.ring.reset_reader(id.index())?;
        *self.parts[id.index()].write() = Some(part);

        log::debug!("rx reader {} attached, part {}", id, part);
        Ok(id)
    }

    /// Change the frame part of an attached reader.
    ///
    /// The reader is re-synchronized to the current write position.
    pub fn setup(&self, id: &PartyId, part: FramePart) -> Result<()> {
        part.validate(self.ring.bytes_per_frame())?;
        let _setup = self.setup_lock.lock();
        let _window = self.barrier.reconfigure();

        self.check_attached(id)?;
        self.ring.reset_reader(id.index())?;
        *self.parts[id.index()].write() = Some(part);

        log::debug!("rx reader {} set up, part {}", id, part);
        Ok(())
    }

    /// Release a reader slot, consuming its handle.
    pub fn detach(&self, id: PartyId) -> Result<()> {
        let _setup = self.setup_lock.lock();
        let _window = self.barrier.reconfigure();

        self.check_attached(&id)?;
        *self.parts[id.index()].write() = None;
        log::debug!("rx reader {} detached", id);
        self.slots.release(id);
        Ok(())
    }

    /// Copy the reader's part of pending frames into `sink`.
    ///
    /// Suspends only while a reconfiguration is in progress. Returns 0 when
    /// nothing new has arrived.
    pub fn read<S>(&self, id: &PartyId, sink: &mut S, max_bytes: usize) -> Result<usize>
    where
        S: CopySink + ?Sized,
    {
        let _stream = self.barrier.stream();
        self.read_admitted(id, sink, max_bytes)
    }

    /// Like [`read`](Self::read) but gives up if a reconfiguration keeps the
    /// barrier closed for longer than `timeout`.
    #[cfg(feature = "std")]
    pub fn read_timeout<S>(
        &self,
        id: &PartyId,
        sink: &mut S,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<usize>
    where
        S: CopySink + ?Sized,
    {
        let _stream = self.barrier.stream_timeout(timeout)?;
        self.read_admitted(id, sink, max_bytes)
    }

    /// Hardware side: append whole frames. Never blocks and never waits on
    /// the barrier.
    pub fn isr_put(&self, frames: &[u8]) -> Result<usize> {
        self.ring.put(frames)
    }

    pub fn is_empty(&self, id: &PartyId) -> Result<bool> {
        self.check_attached(id)?;
        self.ring.is_empty(id.index())
    }

    /// Frame part currently assigned to a reader.
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

    /// Frames a reader has lost to the overwrite policy since it was set up.
    pub fn overruns_of(&self, id: &PartyId) -> Result<usize> {
        self.check_attached(id)?;
        self.ring.overruns(id.index())
    }

    pub fn barrier(&self) -> &ReconfigBarrier<P> {
        &self.barrier
    }

    pub fn ring(&self) -> &RxRing {
        &self.ring
    }

    pub fn dump(&self) -> RxSnapshot {
        self.ring.dump()
    }

    fn read_admitted<S>(&self, id: &PartyId, sink: &mut S, max_bytes: usize) -> Result<usize>
    where
        S: CopySink + ?Sized,
    {
        self.check_attached(id)?;
        let part = (*self.parts[id.index()].read())
            .ok_or(RingError::PartyNotAttached(id.index()))?;
        self.ring.get(id.index(), part, sink, max_bytes)
    }

    fn check_attached(&self, id: &PartyId) -> Result<()> {
        self.slots.check(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> RxChannel {
        RxChannel::new(RingConfig::new(2, 5, 6)).unwrap()
    }

    #[test]
    fn new_has_no_readers() {
        let rx = channel();
        assert_eq!(rx.attached(), 0);
        assert_eq!(rx.barrier_state(), BarrierState::Streaming);
    }

    #[test]
    fn attach_sees_only_new_frames() {
        let rx = channel();
        rx.isr_put(&[0u8; 6]).unwrap();

        let id = rx.attach(FramePart::new(4, 0)).unwrap();
        assert!(rx.is_empty(&id).unwrap());

        rx.isr_put(&[1, 2, 3, 4, 5, 6]).unwrap();
        rx.isr_put(&[7, 8, 9, 10, 11, 12]).unwrap();
        let mut out = [0u8; 12];
        assert_eq!(rx.read(&id, &mut out[..], 12).unwrap(), 8);
        assert_eq!(&out[..8], &[1, 2, 3, 4, 7, 8, 9, 10]);
    }

    #[test]
    fn setup_changes_part_and_resyncs() {
        let rx = channel();
        let id = rx.attach(FramePart::new(2, 0)).unwrap();
        rx.isr_put(&[1, 2, 3, 4, 5, 6]).unwrap();

        rx.setup(&id, FramePart::new(2, 4)).unwrap();
        assert_eq!(rx.part(&id), Some(FramePart::new(2, 4)));
        assert!(rx.is_empty(&id).unwrap());

        rx.isr_put(&[1, 2, 3, 4, 5, 6]).unwrap();
        let mut out = [0u8; 2];
        assert_eq!(rx.read(&id, &mut out[..], 2).unwrap(), 2);
        assert_eq!(out, [5, 6]);
    }

    #[test]
    fn readers_may_share_bytes() {
        let rx = channel();
        let a = rx.attach(FramePart::whole(6)).unwrap();
        let b = rx.attach(FramePart::new(2, 2)).unwrap();
        rx.isr_put(&[1, 2, 3, 4, 5, 6]).unwrap();

        let mut whole = [0u8; 6];
        let mut middle = [0u8; 2];
        assert_eq!(rx.read(&a, &mut whole[..], 6).unwrap(), 6);
        assert_eq!(rx.read(&b, &mut middle[..], 2).unwrap(), 2);
        assert_eq!(middle, [3, 4]);
    }

    #[test]
    fn attach_validates_part() {
        let rx = channel();
        assert!(matches!(
            rx.attach(FramePart::new(4, 4)),
            Err(RingError::InvalidFramePart { .. })
        ));
        assert_eq!(rx.attached(), 0);
    }

    #[test]
    fn slots_run_out() {
        let rx = channel();
        let _a = rx.attach(FramePart::whole(6)).unwrap();
        let _b = rx.attach(FramePart::whole(6)).unwrap();
        assert_eq!(rx.attach(FramePart::whole(6)), Err(RingError::NoFreeParty));
    }

    #[test]
    fn detached_reader_is_rejected() {
        let rx = channel();
        let id = rx.attach(FramePart::whole(6)).unwrap();
        let kept = id.duplicate();
        rx.detach(id).unwrap();
        let mut out = [0u8; 6];
        assert_eq!(
            rx.read(&kept, &mut out[..], 6),
            Err(RingError::PartyNotAttached(0))
        );
        assert_eq!(rx.overruns_of(&kept), Err(RingError::PartyNotAttached(0)));
        assert_eq!(rx.part(&kept), None);
    }

    #[test]
    fn reused_slot_refuses_previous_session() {
        let rx = channel();
        let old = rx.attach(FramePart::whole(6)).unwrap();
        let kept = old.duplicate();
        rx.detach(old).unwrap();
        let new = rx.attach(FramePart::new(2, 0)).unwrap();
        assert_eq!(new.index(), kept.index());

        rx.isr_put(&[1, 2, 3, 4, 5, 6]).unwrap();
        let mut out = [0u8; 6];
        assert_eq!(rx.read(&kept, &mut out[..], 6), Err(RingError::StaleParty(0)));
        assert_eq!(rx.setup(&kept, FramePart::whole(6)), Err(RingError::StaleParty(0)));
        assert_eq!(rx.part(&kept), None);

        // The new session's cursor did not move.
        assert_eq!(rx.read(&new, &mut out[..], 6).unwrap(), 2);
        assert_eq!(&out[..2], &[1, 2]);
    }

    #[test]
    fn overruns_are_reported_per_reader() {
        let rx = RxChannel::new(RingConfig::new(1, 2, 1)).unwrap();
        let id = rx.attach(FramePart::whole(1)).unwrap();
        rx.isr_put(&[1, 2, 3, 4, 5]).unwrap();
        let mut out = [0u8; 2];
        assert_eq!(rx.read(&id, &mut out[..], 2).unwrap(), 2);
        assert_eq!(out, [4, 5]);
        assert_eq!(rx.overruns_of(&id), Ok(3));
    }

    #[test]
    fn dump_lists_every_reader_slot() {
        let rx = channel();
        let _id = rx.attach(FramePart::whole(6)).unwrap();
        rx.isr_put(&[0u8; 12]).unwrap();
        let snap = rx.dump();
        assert_eq!(snap.readers.len(), 2);
        assert_eq!(snap.readers[0].pending, 2);
    }
}
