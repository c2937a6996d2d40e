//! The parsed image header and the legal pixel formats.

use crate::{error::DecodeError, raster::ColorMode};

/// Width and height are capped here by policy, far below the format's
/// theoretical 2^31 − 1.
pub const MAX_DIMENSION: u32 = 1 << 23;

/// The pixel formats a PNG may declare.
///
/// This combines a channel ordering with a bit depth per channel, so the
/// fifteen legal (bit depth, color type) pairs are the only values that can
/// exist; everything else fails at parse time.
///
/// * Greyscale (`Y`) and indexed (`I`) formats allow 1, 2 and 4 bit pixels,
///   which are tightly packed into bytes with the leftmost pixel in the
///   highest bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PixelFormat {
  Y1,
  Y2,
  Y4,
  Y8,
  Y16,
  Rgb8,
  Rgb16,
  I1,
  I2,
  I4,
  I8,
  Ya8,
  Ya16,
  Rgba8,
  Rgba16,
}

impl PixelFormat {
  /// Maps an IHDR (bit depth, color type) pair to a format.
  #[inline]
  #[must_use]
  pub fn from_depth_and_color(bit_depth: u8, color_type: u8) -> Option<Self> {
    Some(match (bit_depth, color_type) {
      (1, 0) => PixelFormat::Y1,
      (2, 0) => PixelFormat::Y2,
      (4, 0) => PixelFormat::Y4,
      (8, 0) => PixelFormat::Y8,
      (16, 0) => PixelFormat::Y16,
      (8, 2) => PixelFormat::Rgb8,
      (16, 2) => PixelFormat::Rgb16,
      (1, 3) => PixelFormat::I1,
      (2, 3) => PixelFormat::I2,
      (4, 3) => PixelFormat::I4,
      (8, 3) => PixelFormat::I8,
      (8, 4) => PixelFormat::Ya8,
      (16, 4) => PixelFormat::Ya16,
      (8, 6) => PixelFormat::Rgba8,
      (16, 6) => PixelFormat::Rgba16,
      _ => return None,
    })
  }

  /// Bits per channel as declared in the header.
  #[inline]
  #[must_use]
  pub const fn bit_depth(self) -> u8 {
    use PixelFormat::*;
    match self {
      Y1 | I1 => 1,
      Y2 | I2 => 2,
      Y4 | I4 => 4,
      Y8 | I8 | Ya8 | Rgb8 | Rgba8 => 8,
      Y16 | Rgb16 | Ya16 | Rgba16 => 16,
    }
  }

  /// Samples per pixel (1 for indexed formats).
  #[inline]
  #[must_use]
  pub const fn channels(self) -> usize {
    use PixelFormat::*;
    match self {
      Y1 | Y2 | Y4 | Y8 | Y16 | I1 | I2 | I4 | I8 => 1,
      Ya8 | Ya16 => 2,
      Rgb8 | Rgb16 => 3,
      Rgba8 | Rgba16 => 4,
    }
  }

  /// Bits for one whole pixel.
  #[inline]
  #[must_use]
  pub const fn bits_per_pixel(self) -> usize {
    self.bit_depth() as usize * self.channels()
  }

  /// Bytes of packed pixel data in a scanline of `width` pixels, not
  /// counting the filter byte.
  #[inline]
  #[must_use]
  pub const fn bytes_per_scanline(self, width: u32) -> usize {
    (width as usize * self.bits_per_pixel() + 7) / 8
  }

  /// The filter unit: byte distance to the pixel on the left, never zero.
  #[inline]
  #[must_use]
  pub const fn filter_unit(self) -> usize {
    (self.bits_per_pixel() + 7) / 8
  }

  /// Whether pixels are palette indexes.
  #[inline]
  #[must_use]
  pub const fn is_indexed(self) -> bool {
    use PixelFormat::*;
    matches!(self, I1 | I2 | I4 | I8)
  }

  /// The channel layout the pixel buffer is created with.
  ///
  /// Indexed images don't appear here: they expand through the palette into
  /// an RGBA buffer instead.
  #[inline]
  #[must_use]
  pub const fn color_mode(self) -> ColorMode {
    use PixelFormat::*;
    match self {
      Y1 | Y2 | Y4 | Y8 | Y16 => ColorMode::Y,
      Ya8 | Ya16 => ColorMode::Ya,
      Rgb8 | Rgb16 => ColorMode::Rgb,
      I1 | I2 | I4 | I8 | Rgba8 | Rgba16 => ColorMode::Rgba,
    }
  }
}

/// The validated IHDR contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  /// Width in pixels, `1..=MAX_DIMENSION`.
  pub width: u32,
  /// Height in pixels, `1..=MAX_DIMENSION`.
  pub height: u32,
  /// The (bit depth, color type) pair.
  pub format: PixelFormat,
  /// Whether the pixel data is in Adam7 transmission order.
  pub interlaced: bool,
}

impl Header {
  /// Parses and validates a 13-byte IHDR payload.
  pub(crate) fn from_ihdr(data: &[u8]) -> Result<Self, DecodeError> {
    if data.len() != 13 {
      return Err(DecodeError::Structural);
    }
    let width = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let height = u32::from_be_bytes(data[4..8].try_into().unwrap());
    let format =
      PixelFormat::from_depth_and_color(data[8], data[9]).ok_or(DecodeError::HeaderInvalid)?;
    let compression = data[10];
    let filter_method = data[11];
    let interlace_method = data[12];
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
      return Err(DecodeError::HeaderInvalid);
    }
    if compression != 0 || filter_method != 0 || interlace_method > 1 {
      return Err(DecodeError::HeaderInvalid);
    }
    Ok(Self { width, height, format, interlaced: interlace_method == 1 })
  }
}

#[test]
fn test_format_table() {
  assert_eq!(PixelFormat::from_depth_and_color(8, 6), Some(PixelFormat::Rgba8));
  assert_eq!(PixelFormat::from_depth_and_color(16, 3), None);
  assert_eq!(PixelFormat::from_depth_and_color(2, 2), None);
  assert_eq!(PixelFormat::from_depth_and_color(8, 1), None);
  //
  assert_eq!(PixelFormat::Y1.bytes_per_scanline(9), 2);
  assert_eq!(PixelFormat::Y2.bytes_per_scanline(5), 2);
  assert_eq!(PixelFormat::Y4.bytes_per_scanline(3), 2);
  assert_eq!(PixelFormat::Rgb16.bytes_per_scanline(2), 12);
  //
  assert_eq!(PixelFormat::Y1.filter_unit(), 1);
  assert_eq!(PixelFormat::Ya16.filter_unit(), 4);
  assert_eq!(PixelFormat::Rgba16.filter_unit(), 8);
}

#[test]
fn test_header_validation() {
  let mut ihdr = [0_u8; 13];
  ihdr[0..4].copy_from_slice(&2_u32.to_be_bytes());
  ihdr[4..8].copy_from_slice(&2_u32.to_be_bytes());
  ihdr[8] = 8;
  ihdr[9] = 6;
  assert!(Header::from_ihdr(&ihdr).is_ok());

  // dimension policy: 2^23 is in, one more is out.
  ihdr[0..4].copy_from_slice(&MAX_DIMENSION.to_be_bytes());
  assert!(Header::from_ihdr(&ihdr).is_ok());
  ihdr[0..4].copy_from_slice(&(MAX_DIMENSION + 1).to_be_bytes());
  assert_eq!(Header::from_ihdr(&ihdr), Err(DecodeError::HeaderInvalid));
  ihdr[0..4].copy_from_slice(&2_u32.to_be_bytes());

  // nonzero compression method.
  ihdr[10] = 1;
  assert_eq!(Header::from_ihdr(&ihdr), Err(DecodeError::HeaderInvalid));
  ihdr[10] = 0;

  // interlace method out of range.
  ihdr[12] = 2;
  assert_eq!(Header::from_ihdr(&ihdr), Err(DecodeError::HeaderInvalid));

  // wrong payload length.
  assert_eq!(Header::from_ihdr(&ihdr[..12]), Err(DecodeError::Structural));
}
