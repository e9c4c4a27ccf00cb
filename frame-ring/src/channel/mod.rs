//! Session-facing channels.
//!
//! A channel ties one ring to its reconfiguration barrier and to the frame
//! parts of the sessions attached to it. The hardware entry points bypass the
//! barrier; the session entry points go through it.
//!
//! | Channel | Hardware side | Session side |
//! |---------|---------------|--------------|
//! | [`RxChannel`] | [`isr_put`](RxChannel::isr_put) | [`read`](RxChannel::read) |
//! | [`TxChannel`] | [`isr_get`](TxChannel::isr_get) | [`write`](TxChannel::write) |
//!
//! [`attach`](RxChannel::attach), `setup` and `detach` run inside a
//! reconfiguration window: they wait for in-flight reads/writes on that
//! channel to finish and hold new ones back until they return.

pub mod rx;
pub mod slots;
pub mod tx;

pub use rx::RxChannel;
pub use slots::PartyId;
pub use tx::TxChannel;
