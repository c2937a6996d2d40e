/// An error from the `pngflow` crate.
///
/// Every fatal condition the decoder can hit maps to exactly one of these
/// kinds. Running out of input mid-stream is *not* here: that is the
/// recoverable [`NeedMoreInput`] signal, which only becomes
/// [`DecodeError::InputTruncated`] when the caller has no further bytes to
/// offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
  /// The byte source ended before a required field.
  InputTruncated,

  /// The first 8 bytes were not the PNG signature.
  BadSignature,

  /// A duplicate or misordered chunk, an unknown critical chunk, an invalid
  /// chunk-length relationship, or a scanline stream that doesn't match the
  /// image geometry.
  Structural,

  /// A disallowed (bit depth, color type) pair, a dimension out of range, or
  /// an unsupported compression/filter/interlace method in the header.
  HeaderInvalid,

  /// A chunk's CRC did not match its declared value.
  CrcMismatch,

  /// The zlib/DEFLATE stream is malformed: bad zlib header, block type 3, an
  /// over-subscribed prefix code, an invalid symbol, or a back-reference
  /// distance exceeding the available history.
  DeflateFormat,

  /// The Adler-32 trailer did not match the decompressed output.
  AdlerMismatch,

  /// The pixel buffer refused creation or a write lock.
  BufferFailed,
}
impl core::fmt::Display for DecodeError {
  #[inline]
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let s = match self {
      DecodeError::InputTruncated => "input ended before a required field",
      DecodeError::BadSignature => "bad PNG signature",
      DecodeError::Structural => "structurally invalid chunk sequence",
      DecodeError::HeaderInvalid => "invalid image header",
      DecodeError::CrcMismatch => "chunk CRC mismatch",
      DecodeError::DeflateFormat => "malformed zlib/DEFLATE stream",
      DecodeError::AdlerMismatch => "Adler-32 trailer mismatch",
      DecodeError::BufferFailed => "pixel buffer creation or lock failed",
    };
    f.write_str(s)
  }
}

/// Marker for a read that stalled because the stream hasn't been fed enough
/// bytes yet.
///
/// All decoder state is left intact when this is returned, so the same
/// operation succeeds after more input is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedMoreInput;

/// Either a fatal error or a recoverable input stall.
///
/// Internal plumbing for the inflater: `?` on a bit-reader result lifts the
/// stall automatically, while fatal conditions are constructed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stall {
  /// More input is required before progress can be made.
  Starved,
  /// The stream is unrecoverably malformed.
  Fatal(DecodeError),
}
impl From<NeedMoreInput> for Stall {
  #[inline]
  fn from(_: NeedMoreInput) -> Self {
    Stall::Starved
  }
}
impl From<DecodeError> for Stall {
  #[inline]
  fn from(e: DecodeError) -> Self {
    Stall::Fatal(e)
  }
}
