//! Channel configuration.

use crate::constants::{DEFAULT_BYTES_PER_FRAME, DEFAULT_FRAME_COUNT};
use crate::error::{Result, RingError};

/// Geometry of one ring and the number of parties it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Readers (receive) or writers (transmit).
    pub parties: usize,
    /// Frames the ring holds, not counting the reserved slot.
    pub frame_count: usize,
    pub bytes_per_frame: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            parties: 1,
            frame_count: DEFAULT_FRAME_COUNT,
            bytes_per_frame: DEFAULT_BYTES_PER_FRAME,
        }
    }
}

impl RingConfig {
    pub const fn new(parties: usize, frame_count: usize, bytes_per_frame: usize) -> Self {
        RingConfig {
            parties,
            frame_count,
            bytes_per_frame,
        }
    }

    /// Check sizes against each other and against `max_parties`.
    pub fn validate(&self, max_parties: usize) -> Result<()> {
        if self.parties > max_parties {
            return Err(RingError::TooManyParties {
                count: self.parties,
                max: max_parties,
            });
        }
        if self.frame_count == 0 {
            return Err(RingError::InvalidGeometry("frame count is zero"));
        }
        if self.bytes_per_frame == 0 || self.bytes_per_frame > u32::MAX as usize {
            return Err(RingError::InvalidGeometry("frame size out of range"));
        }
        if self.buffer_len().is_none() {
            return Err(RingError::InvalidGeometry("buffer length overflows"));
        }
        Ok(())
    }

    /// Bytes of backing storage the ring will allocate.
    pub fn buffer_len(&self) -> Option<usize> {
        self.frame_count
            .checked_add(1)?
            .checked_mul(self.bytes_per_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_READERS;

    #[test]
    fn default_is_valid() {
        assert!(RingConfig::default().validate(MAX_READERS).is_ok());
    }

    #[test]
    fn buffer_len_includes_reserved_slot() {
        assert_eq!(RingConfig::new(1, 5, 6).buffer_len(), Some(36));
        assert_eq!(RingConfig::new(1, usize::MAX, 1).buffer_len(), None);
    }

    #[test]
    fn validate_rejects_bad_configs() {
        assert_eq!(
            RingConfig::new(9, 4, 4).validate(8),
            Err(RingError::TooManyParties { count: 9, max: 8 })
        );
        assert!(RingConfig::new(1, 0, 4).validate(8).is_err());
        assert!(RingConfig::new(1, 4, 0).validate(8).is_err());
        assert!(RingConfig::new(1, usize::MAX / 2, 4).validate(8).is_err());
    }
}
