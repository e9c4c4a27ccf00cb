//! Error type shared by the ring engines and channels.
//!
//! Only caller mistakes and allocation failure are errors. An empty receive
//! ring or a full transmit ring is reported as a zero-byte transfer, and a
//! copy that faults part way is reported as a short count.

use thiserror::Error;

/// Errors reported by the ring engines, the barrier-wrapped channels and
/// configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The backing buffer could not be obtained. Fatal to the channel.
    #[error("failed to allocate {bytes} bytes of ring storage")]
    AllocationFailure { bytes: usize },

    /// Ring geometry is unusable (zero sizes or overflowing buffer length).
    #[error("invalid ring geometry: {0}")]
    InvalidGeometry(&'static str),

    /// A byte count is not a multiple of the frame size.
    #[error("length {len} is not a multiple of the {frame}-byte frame")]
    MisalignedLength { len: usize, frame: usize },

    /// A reader/writer index is outside the ring's party table.
    #[error("party index {index} out of range (ring has {count})")]
    PartyOutOfRange { index: usize, count: usize },

    /// A party count exceeds the direction's compile-time maximum.
    #[error("{count} parties requested, at most {max} supported")]
    TooManyParties { count: usize, max: usize },

    /// The frame part does not fit inside one frame, or is empty.
    #[error("frame part [{offset}, {offset}+{count}) does not fit a {frame}-byte frame")]
    InvalidFramePart { count: u32, offset: u32, frame: usize },

    /// A request asks for more than the ring can ever hold.
    #[error("request of {requested} bytes exceeds ring capacity of {capacity}")]
    RequestTooLarge { requested: usize, capacity: usize },

    /// The party slot is not attached to the channel.
    #[error("party {0} is not attached")]
    PartyNotAttached(usize),

    /// The handle was issued to an earlier session of a reused slot.
    #[error("party {0} handle belongs to a previous session")]
    StaleParty(usize),

    /// A writer's frame part overlaps the part of another attached writer.
    #[error("frame part {count}@{offset} overlaps writer {other}")]
    OverlappingFramePart { count: u32, offset: u32, other: usize },

    /// Every party slot of the channel is in use.
    #[error("no free party slot")]
    NoFreeParty,

    /// A cancel-aware wait gave up before the barrier admitted the caller.
    #[error("timed out waiting for reconfiguration to finish")]
    Timeout,
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, RingError>;
