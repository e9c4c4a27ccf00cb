/// Maximum number of independent readers attached to one receive ring.
///
/// Party indices are handed out from a 32-bit bitmap, so this must stay ≤ 32.
pub const MAX_READERS: usize = 8;

/// Maximum number of independent writers attached to one transmit ring.
pub const MAX_WRITERS: usize = 8;

/// Default ring depth in frames (capacity requested by the caller).
pub const DEFAULT_FRAME_COUNT: usize = 64;

/// Default frame width in bytes: 2 channels × 16-bit samples.
pub const DEFAULT_BYTES_PER_FRAME: usize = 4;

const _: () = assert!(MAX_READERS <= 32 && MAX_WRITERS <= 32);
