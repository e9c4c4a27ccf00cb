//! Party slot allocator.
//!
//! Hands out reader/writer indices from a fixed table using an atomic bitmap.
//! Claims and releases happen inside a reconfiguration window, but the
//! bitmap itself is lock-free so it can also be inspected from streaming
//! paths and dumps.
//!
//! Every claim bumps the slot's generation. A [`PartyId`] carries the
//! generation it was issued with, so a handle from an earlier session of the
//! same slot is refused even if it was kept alive somehow.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Result, RingError};

/// Capability handle naming one reader or writer slot of a channel.
///
/// Only `attach` creates one and `detach` consumes it. It is neither `Copy`
/// nor `Clone`: sessions that share a party across threads share a
/// reference to the handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PartyId {
    index: u8,
    generation: u32,
}

impl PartyId {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Second handle to the same slot and generation, for tests that need a
    /// handle outliving its session.
    #[cfg(test)]
    pub(crate) fn duplicate(&self) -> PartyId {
        PartyId {
            index: self.index,
            generation: self.generation,
        }
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Bitmap of claimed party slots plus a generation per slot.
pub(crate) struct PartySlots {
    /// Bit N = 1 means slot N is claimed.
    bitmap: AtomicU32,
    generations: Box<[AtomicU32]>,
}

impl PartySlots {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity <= 32, "party bitmap holds at most 32 slots");
        PartySlots {
            bitmap: AtomicU32::new(0),
            generations: (0..capacity)
                .map(|_| AtomicU32::new(0))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Claim the lowest free slot. Returns `None` if all are taken.
    pub fn claim(&self) -> Option<PartyId> {
        loop {
            let bitmap = self.bitmap.load(Ordering::Acquire);
            let slot = (!bitmap).trailing_zeros() as usize;
            if slot >= self.capacity() {
                return None;
            }
            let bit = 1u32 << slot;
            match self.bitmap.compare_exchange_weak(
                bitmap,
                bitmap | bit,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let generation = self.generations[slot]
                        .fetch_add(1, Ordering::AcqRel)
                        .wrapping_add(1);
                    return Some(PartyId {
                        index: slot as u8,
                        generation,
                    });
                }
                Err(_) => continue,
            }
        }
    }

    /// Return a slot to the free pool.
    pub fn release(&self, id: PartyId) {
        let bit = 1u32 << id.index;
        let old = self.bitmap.fetch_and(!bit, Ordering::AcqRel);
        debug_assert!(old & bit != 0, "release of unclaimed party slot");
    }

    /// `Ok` iff `id` names a claimed slot in the generation it was issued.
    pub fn check(&self, id: &PartyId) -> Result<()> {
        let index = id.index();
        let current = self
            .generations
            .get(index)
            .ok_or(RingError::PartyOutOfRange {
                index,
                count: self.capacity(),
            })?;
        if self.bitmap.load(Ordering::Acquire) & (1 << id.index) == 0 {
            return Err(RingError::PartyNotAttached(index));
        }
        if current.load(Ordering::Acquire) != id.generation {
            return Err(RingError::StaleParty(index));
        }
        Ok(())
    }

    /// Indices of the claimed slots.
    pub fn claimed_indices(&self) -> impl Iterator<Item = usize> {
        let bitmap = self.bitmap.load(Ordering::Acquire);
        (0..32).filter(move |i| bitmap & (1 << i) != 0)
    }

    /// Number of claimed slots.
    pub fn claimed(&self) -> usize {
        self.bitmap.load(Ordering::Acquire).count_ones() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_lowest_free_slot() {
        let slots = PartySlots::new(4);
        let a = slots.claim().unwrap();
        let b = slots.claim().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        slots.release(a);
        assert_eq!(slots.claim().map(|id| id.index()), Some(0));
        assert_eq!(slots.claimed(), 2);
    }

    #[test]
    fn exhaustion() {
        let slots = PartySlots::new(2);
        assert!(slots.claim().is_some());
        assert!(slots.claim().is_some());
        assert!(slots.claim().is_none());
    }

    #[test]
    fn full_width_bitmap() {
        let slots = PartySlots::new(32);
        for i in 0..32 {
            assert_eq!(slots.claim().map(|id| id.index()), Some(i));
        }
        assert!(slots.claim().is_none());
        assert_eq!(slots.claimed_indices().count(), 32);
    }

    #[test]
    fn check_tracks_claims() {
        let slots = PartySlots::new(3);
        let id = slots.claim().unwrap();
        assert_eq!(slots.check(&id), Ok(()));
        let kept = id.duplicate();
        slots.release(id);
        assert_eq!(slots.check(&kept), Err(RingError::PartyNotAttached(0)));
        assert_eq!(slots.claimed(), 0);
    }

    #[test]
    fn reclaimed_slot_refuses_old_generation() {
        let slots = PartySlots::new(1);
        let first = slots.claim().unwrap();
        let kept = first.duplicate();
        slots.release(first);

        let second = slots.claim().unwrap();
        assert_eq!(second.index(), kept.index());
        assert_eq!(slots.check(&second), Ok(()));
        assert_eq!(slots.check(&kept), Err(RingError::StaleParty(0)));
    }
}
