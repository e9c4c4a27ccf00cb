//! Ring-buffer engines.
//!
//! | Ring | Producer side | Consumer side | When full |
//! |------|---------------|---------------|-----------|
//! | [`RxRing`] | hardware, whole frames | N readers, one frame part each | overwrite oldest |
//! | [`TxRing`] | N writers, one frame part each | hardware, whole frames | reject (back-pressure) |
//!
//! Both rings allocate `frame_count + 1` slots and keep every cursor owned
//! by exactly one party. Neither engine blocks; "nothing to do" is a
//! zero-byte return.

mod buffer;
mod cursor;
mod rx;
mod snapshot;
mod tx;

pub use rx::RxRing;
pub use snapshot::{ReaderSnapshot, RxSnapshot, TxSnapshot, WriterSnapshot};
pub use tx::TxRing;
