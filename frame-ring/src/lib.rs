//! # frame-ring
//!
//! A `no_std` + `alloc` library of frame-oriented ring buffers that sit
//! between a periodic hardware data mover (a DMA completion interrupt, or a
//! thread standing in for one) and the user sessions reading or writing
//! audio-style frames.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Geometry | [`config`] / [`part`] | Ring sizes and per-party frame slices |
//! | Copy | [`copy`] | Fallible copy-in/copy-out towards user memory |
//! | Engine | [`ring`] | [`RxRing`] (overwrite, fan-out) and [`TxRing`] (back-pressure, fan-in) |
//! | Sync | [`sync`] | Reconfiguration barrier, wait primitives, critical sections |
//! | Channel | [`channel`] | Ring + barrier + party slots, the session-facing API |
//!
//! ## Quick start
//!
//! ```ignore
//! use frame_ring::{FramePart, RingConfig, RxChannel};
//!
//! // Stereo, 16-bit samples: 4 bytes per frame, 64 frames deep.
//! let rx = RxChannel::new(RingConfig::new(2, 64, 4))?;
//! let left = rx.attach(FramePart::new(2, 0))?;
//!
//! // In the DMA completion ISR:
//! rx.isr_put(&dma_half)?;
//!
//! // In the session's task:
//! let mut samples = [0u8; 128];
//! let n = rx.read(&left, &mut samples[..], 128)?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `std` | yes | `parking_lot` based parking and critical sections, timeouts |
//!
//! Without `std` every wait spins and the critical section is a
//! `spin::Mutex`; embedded users wrap it in their own interrupt masking by
//! implementing [`CriticalSection`].

#![no_std]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod channel;
pub mod config;
pub mod constants;
pub mod copy;
pub mod error;
pub mod part;
pub mod ring;
pub mod sync;

pub use channel::{PartyId, RxChannel, TxChannel};
pub use config::RingConfig;
pub use copy::{CopyFn, CopySink, CopySource};
pub use error::{Result, RingError};
pub use part::FramePart;
pub use ring::{RxRing, RxSnapshot, TxRing, TxSnapshot};
pub use sync::{BarrierState, CriticalSection, Parker, ReconfigBarrier};
