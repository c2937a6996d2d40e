//! The byte-source collaborator interface.

/// A sequential byte supplier with end-of-stream detection. No seeking.
///
/// A source reporting `end` may later be handed back with more bytes (or a
/// new source may continue the same stream); the decoder treats exhaustion
/// as a suspension point, not an error.
pub trait ByteSource {
  /// The next byte, or `None` when the source is currently exhausted.
  fn read(&mut self) -> Option<u8>;

  /// Whether the source has no more bytes right now.
  fn end(&self) -> bool;
}

/// A [`ByteSource`] over an in-memory slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'b> {
  bytes: &'b [u8],
  pos: usize,
}

impl<'b> SliceSource<'b> {
  /// Wraps a byte slice, starting at its beginning.
  #[inline]
  #[must_use]
  pub const fn new(bytes: &'b [u8]) -> Self {
    Self { bytes, pos: 0 }
  }
}

impl<'b> From<&'b [u8]> for SliceSource<'b> {
  #[inline]
  #[must_use]
  fn from(bytes: &'b [u8]) -> Self {
    Self::new(bytes)
  }
}

impl ByteSource for SliceSource<'_> {
  #[inline]
  fn read(&mut self) -> Option<u8> {
    let b = self.bytes.get(self.pos).copied()?;
    self.pos += 1;
    Some(b)
  }

  #[inline]
  fn end(&self) -> bool {
    self.pos >= self.bytes.len()
  }
}

#[test]
fn test_slice_source() {
  let mut s = SliceSource::new(&[1, 2]);
  assert!(!s.end());
  assert_eq!(s.read(), Some(1));
  assert_eq!(s.read(), Some(2));
  assert!(s.end());
  assert_eq!(s.read(), None);
}
