//! Chunk type tags and their case-encoded property flags.

use core::fmt::Write;

/// Every PNG data stream opens with these eight bytes.
pub(crate) const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// A chunk's 4-byte ASCII type tag.
///
/// The case of each letter encodes a property bit, exposed through the
/// `is_*` accessors.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChunkType(pub(crate) [u8; 4]);

#[allow(nonstandard_style)]
impl ChunkType {
  pub(crate) const IHDR: Self = Self(*b"IHDR");
  pub(crate) const PLTE: Self = Self(*b"PLTE");
  pub(crate) const IDAT: Self = Self(*b"IDAT");
  pub(crate) const IEND: Self = Self(*b"IEND");
  pub(crate) const tRNS: Self = Self(*b"tRNS");
  pub(crate) const bKGD: Self = Self(*b"bKGD");
  pub(crate) const gAMA: Self = Self(*b"gAMA");
  pub(crate) const pHYs: Self = Self(*b"pHYs");
  pub(crate) const tIME: Self = Self(*b"tIME");
}

impl ChunkType {
  /// Critical chunks (uppercase first letter) must be understood by the
  /// decoder; hitting an unknown one is fatal.
  #[inline]
  #[must_use]
  pub const fn is_critical(self) -> bool {
    (self.0[0] & 32) == 0
  }

  /// Whether the chunk type is privately defined rather than standard.
  #[inline]
  #[must_use]
  pub const fn is_private(self) -> bool {
    (self.0[1] & 32) != 0
  }

  /// The reserved bit; should be unset in conforming streams.
  #[inline]
  #[must_use]
  pub const fn is_reserved(self) -> bool {
    (self.0[2] & 32) != 0
  }

  /// Whether editors that don't understand the chunk may copy it.
  #[inline]
  #[must_use]
  pub const fn is_safe_to_copy(self) -> bool {
    (self.0[3] & 32) != 0
  }
}

impl core::fmt::Debug for ChunkType {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_char(self.0[0] as char)?;
    f.write_char(self.0[1] as char)?;
    f.write_char(self.0[2] as char)?;
    f.write_char(self.0[3] as char)?;
    Ok(())
  }
}

#[test]
fn test_chunk_type_flags() {
  assert!(ChunkType::IHDR.is_critical());
  assert!(ChunkType::PLTE.is_critical());
  assert!(!ChunkType::tRNS.is_critical());
  assert!(!ChunkType::gAMA.is_critical());
  assert!(!ChunkType::IHDR.is_private());
  assert!(ChunkType(*b"prVt").is_private());
  assert!(!ChunkType::IHDR.is_safe_to_copy());
  assert!(!ChunkType::tIME.is_safe_to_copy());
  assert!(ChunkType(*b"teXt").is_safe_to_copy());
}
