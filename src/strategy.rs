//! Copy strategies: how a transfer is chunked and whether it is buffered.
//!
//! All three modes share one contract: the bytes that reach the sink and the
//! reported total are identical.  They differ only in how many read/write
//! calls reach the underlying resource.
//!
//! | Mode | Per-call transfer | Extra buffering |
//! |------|-------------------|-----------------|
//! | `Unbuffered` | 1 byte | none |
//! | `FixedBlock` | up to `chunk_size` bytes | none |
//! | `BufferedBlock` | up to `chunk_size` bytes | `BufReader`/`BufWriter` of `chunk_size` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Default chunk size for `FixedBlock`: 4 KiB.
pub const DEFAULT_BLOCK_SIZE:    usize = 4 * 1024;
/// Default chunk size for `BufferedBlock`: 16 KiB.
pub const DEFAULT_BUFFERED_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// One byte per read and per write.
    Unbuffered,
    /// One bounded transfer buffer, one write per read.
    FixedBlock,
    /// `FixedBlock` over buffered source and sink.
    BufferedBlock,
}

impl CopyMode {
    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            CopyMode::Unbuffered    => "unbuffered",
            CopyMode::FixedBlock    => "block",
            CopyMode::BufferedBlock => "buffered",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unbuffered" => Some(CopyMode::Unbuffered),
            "block"      => Some(CopyMode::FixedBlock),
            "buffered"   => Some(CopyMode::BufferedBlock),
            _            => None,
        }
    }

    /// Chunk size used when the caller does not pick one.
    pub fn default_chunk_size(self) -> usize {
        match self {
            CopyMode::Unbuffered    => 1,
            CopyMode::FixedBlock    => DEFAULT_BLOCK_SIZE,
            CopyMode::BufferedBlock => DEFAULT_BUFFERED_SIZE,
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CopyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CopyMode::from_name(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown copy mode '{s}' (expected unbuffered, block or buffered)"
            ))
        })
    }
}

/// How a copy is chunked.
///
/// Construct through [`CopyStrategy::unbuffered`], [`CopyStrategy::fixed_block`]
/// or [`CopyStrategy::buffered_block`].  The fields are public so a strategy
/// can be deserialized; [`CopyStrategy::validate`] is run by every copy before
/// any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStrategy {
    pub mode:       CopyMode,
    pub chunk_size: usize,
}

impl CopyStrategy {
    pub fn unbuffered() -> Self {
        Self { mode: CopyMode::Unbuffered, chunk_size: 1 }
    }

    pub fn fixed_block(chunk_size: usize) -> Self {
        Self { mode: CopyMode::FixedBlock, chunk_size }
    }

    pub fn buffered_block(chunk_size: usize) -> Self {
        Self { mode: CopyMode::BufferedBlock, chunk_size }
    }

    /// Build a strategy for `mode`, falling back to the mode's default chunk
    /// size when `chunk_size` is `None`.
    pub fn new(mode: CopyMode, chunk_size: Option<usize>) -> Self {
        Self {
            mode,
            chunk_size: chunk_size.unwrap_or_else(|| mode.default_chunk_size()),
        }
    }

    /// Bytes moved per read.  Always 1 for `Unbuffered`.
    #[inline]
    pub fn effective_chunk_size(&self) -> usize {
        match self.mode {
            CopyMode::Unbuffered => 1,
            CopyMode::FixedBlock | CopyMode::BufferedBlock => self.chunk_size,
        }
    }

    /// Bytes one copy keeps in memory: the transfer buffer, plus the reader
    /// and writer buffers in `BufferedBlock` mode.  `None` on overflow.
    pub fn buffer_footprint(&self) -> Option<usize> {
        let chunk = self.effective_chunk_size();
        match self.mode {
            CopyMode::BufferedBlock                     => chunk.checked_mul(3),
            CopyMode::Unbuffered | CopyMode::FixedBlock => Some(chunk),
        }
    }

    /// Reject a zero chunk size, and one whose buffers cannot be allocated.
    pub fn validate(&self) -> Result<(), Error> {
        if self.mode != CopyMode::Unbuffered && self.chunk_size == 0 {
            return Err(Error::InvalidArgument(format!(
                "chunk size must be at least 1 byte for {} mode",
                self.mode
            )));
        }
        let too_large = |why: &dyn fmt::Display| {
            Error::InvalidArgument(format!(
                "chunk size {} is too large for {} mode: {why}",
                self.chunk_size, self.mode
            ))
        };
        let footprint = self.buffer_footprint()
            .ok_or_else(|| too_large(&"buffer size overflows usize"))?;
        Vec::<u8>::new()
            .try_reserve_exact(footprint)
            .map_err(|e| too_large(&e))?;
        Ok(())
    }
}

impl Default for CopyStrategy {
    fn default() -> Self {
        Self::buffered_block(DEFAULT_BUFFERED_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn mode_names_roundtrip() {
        for mode in [CopyMode::Unbuffered, CopyMode::FixedBlock, CopyMode::BufferedBlock] {
            assert_eq!(CopyMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!("BLOCK".parse::<CopyMode>().unwrap(), CopyMode::FixedBlock);
        assert_eq!("mmap".parse::<CopyMode>().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn unbuffered_ignores_chunk_size() {
        let s = CopyStrategy { mode: CopyMode::Unbuffered, chunk_size: 0 };
        assert!(s.validate().is_ok());
        assert_eq!(s.effective_chunk_size(), 1);
    }

    #[test]
    fn zero_chunk_rejected_for_block_modes() {
        for s in [CopyStrategy::fixed_block(0), CopyStrategy::buffered_block(0)] {
            assert_eq!(s.validate().unwrap_err().kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn oversized_chunk_rejected() {
        for s in [
            CopyStrategy::fixed_block(usize::MAX),
            CopyStrategy::buffered_block(usize::MAX),
            CopyStrategy::buffered_block(usize::MAX / 2),
        ] {
            let err = s.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(err.to_string().contains("too large"), "{err}");
        }
        let s = CopyStrategy { mode: CopyMode::Unbuffered, chunk_size: usize::MAX };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn footprint_counts_buffers() {
        assert_eq!(CopyStrategy::fixed_block(4096).buffer_footprint(), Some(4096));
        assert_eq!(CopyStrategy::buffered_block(4096).buffer_footprint(), Some(3 * 4096));
        assert_eq!(CopyStrategy::unbuffered().buffer_footprint(), Some(1));
        assert_eq!(CopyStrategy::buffered_block(usize::MAX).buffer_footprint(), None);
    }

    #[test]
    fn defaults_follow_mode() {
        assert_eq!(CopyStrategy::new(CopyMode::FixedBlock, None).chunk_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(CopyStrategy::new(CopyMode::BufferedBlock, Some(7)).chunk_size, 7);
        assert_eq!(CopyStrategy::default(), CopyStrategy::buffered_block(16384));
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&CopyStrategy::fixed_block(4096)).unwrap();
        assert_eq!(json, r#"{"mode":"fixed_block","chunk_size":4096}"#);
        let back: CopyStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CopyStrategy::fixed_block(4096));
    }
}
