//! Typed payloads of the ancillary metadata chunks, plus the palette.
//!
//! These update decoder state before any pixel data that depends on them;
//! each may appear at most once per stream.

use alloc::vec::Vec;

use crate::{
  error::DecodeError,
  header::PixelFormat,
  raster::ColorMode,
};

/// Modification time from a `tIME` chunk (UTC per the spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
  /// Full year, e.g. 2003 (not offset by 1900).
  pub year: u16,
  /// 1..=12
  pub month: u8,
  /// 1..=31
  pub day: u8,
  /// 0..=23
  pub hour: u8,
  /// 0..=59
  pub minute: u8,
  /// 0..=60, allowing for leap seconds.
  pub second: u8,
}
impl Timestamp {
  pub(crate) fn from_payload(data: &[u8]) -> Result<Self, DecodeError> {
    match *data {
      [y0, y1, month, day, hour, minute, second] => Ok(Self {
        year: u16::from_be_bytes([y0, y1]),
        month,
        day,
        hour,
        minute,
        second,
      }),
      _ => Err(DecodeError::Structural),
    }
  }
}

/// Preferred background color from a `bKGD` chunk.
///
/// The payload shape depends on the image's color type, so parsing needs the
/// header first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
  /// Grayscale level (color types 0 and 4); always 16-bit on the wire.
  Luma(u16),
  /// RGB level (color types 2 and 6).
  Rgb {
    /// Red sample.
    r: u16,
    /// Green sample.
    g: u16,
    /// Blue sample.
    b: u16,
  },
  /// Palette index (color type 3).
  Index(u8),
}
impl Background {
  pub(crate) fn from_payload(data: &[u8], format: PixelFormat) -> Result<Self, DecodeError> {
    if format.is_indexed() {
      return match *data {
        [i] => Ok(Background::Index(i)),
        _ => Err(DecodeError::Structural),
      };
    }
    match (format.color_mode(), data) {
      (ColorMode::Y | ColorMode::Ya, &[y0, y1]) => {
        Ok(Background::Luma(u16::from_be_bytes([y0, y1])))
      }
      (ColorMode::Rgb | ColorMode::Rgba, &[r0, r1, g0, g1, b0, b1]) => Ok(Background::Rgb {
        r: u16::from_be_bytes([r0, r1]),
        g: u16::from_be_bytes([g0, g1]),
        b: u16::from_be_bytes([b0, b1]),
      }),
      _ => Err(DecodeError::Structural),
    }
  }
}

/// Physical pixel dimensions from a `pHYs` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalDims {
  /// Pixels per unit along the X axis.
  pub ppu_x: u32,
  /// Pixels per unit along the Y axis.
  pub ppu_y: u32,
  /// `true` when the unit is the meter, `false` for "unit unspecified".
  pub is_meters: bool,
}
impl PhysicalDims {
  pub(crate) fn from_payload(data: &[u8]) -> Result<Self, DecodeError> {
    if data.len() != 9 || data[8] > 1 {
      return Err(DecodeError::Structural);
    }
    Ok(Self {
      ppu_x: u32::from_be_bytes(data[0..4].try_into().unwrap()),
      ppu_y: u32::from_be_bytes(data[4..8].try_into().unwrap()),
      is_meters: data[8] == 1,
    })
  }
}

/// Transparency info from a `tRNS` chunk.
///
/// For grayscale and RGB images this is a single fully-transparent color
/// key, carried as decoder state for the consumer; for indexed images the
/// per-entry alphas are folded into the [`Palette`] and applied during
/// write-out. Color types that already carry alpha reject `tRNS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transparency {
  /// The fully transparent gray level (color type 0).
  Luma(u16),
  /// The fully transparent RGB color (color type 2).
  Rgb {
    /// Red sample.
    r: u16,
    /// Green sample.
    g: u16,
    /// Blue sample.
    b: u16,
  },
  /// Per-palette-entry alpha was installed into the palette (color type 3).
  PaletteAlpha,
}

/// The color table for indexed images: up to 256 RGB triplets, with alpha
/// filled in by `tRNS` (entries past the alpha list are fully opaque).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
  entries: Vec<[u8; 3]>,
  alphas: Vec<u8>,
}
impl Palette {
  /// Parses a `PLTE` payload: 1..=256 RGB triplets.
  pub(crate) fn from_plte(data: &[u8]) -> Result<Self, DecodeError> {
    let entries: &[[u8; 3]] =
      bytemuck::try_cast_slice(data).map_err(|_| DecodeError::Structural)?;
    if entries.is_empty() || entries.len() > 256 {
      return Err(DecodeError::Structural);
    }
    Ok(Self { entries: entries.to_vec(), alphas: Vec::new() })
  }

  /// Installs the `tRNS` alpha list; it may be shorter than the palette but
  /// never longer.
  pub(crate) fn set_alphas(&mut self, alphas: &[u8]) -> Result<(), DecodeError> {
    if alphas.len() > self.entries.len() {
      return Err(DecodeError::Structural);
    }
    self.alphas = alphas.to_vec();
    Ok(())
  }

  /// Number of palette entries.
  #[inline]
  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether the palette has no entries (never true for a parsed palette).
  #[inline]
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Looks up an index as RGBA, `None` when the index is out of range.
  #[inline]
  #[must_use]
  pub fn rgba(&self, index: usize) -> Option<[u8; 4]> {
    let [r, g, b] = *self.entries.get(index)?;
    let a = self.alphas.get(index).copied().unwrap_or(0xFF);
    Some([r, g, b, a])
  }
}

#[test]
fn test_timestamp_parse() {
  let t = Timestamp::from_payload(&[0x07, 0xD3, 12, 31, 23, 59, 60]).unwrap();
  assert_eq!(t.year, 2003);
  assert_eq!(t.second, 60);
  assert!(Timestamp::from_payload(&[0; 6]).is_err());
}

#[test]
fn test_background_shapes() {
  let y = Background::from_payload(&[0x01, 0x00], PixelFormat::Y8).unwrap();
  assert_eq!(y, Background::Luma(256));
  let rgb = Background::from_payload(&[0, 1, 0, 2, 0, 3], PixelFormat::Rgba16).unwrap();
  assert_eq!(rgb, Background::Rgb { r: 1, g: 2, b: 3 });
  let idx = Background::from_payload(&[7], PixelFormat::I4).unwrap();
  assert_eq!(idx, Background::Index(7));
  assert!(Background::from_payload(&[0, 1], PixelFormat::Rgb8).is_err());
}

#[test]
fn test_palette_lookup() {
  let mut pal = Palette::from_plte(&[10, 20, 30, 40, 50, 60]).unwrap();
  assert_eq!(pal.len(), 2);
  assert_eq!(pal.rgba(0), Some([10, 20, 30, 0xFF]));
  pal.set_alphas(&[0x80]).unwrap();
  assert_eq!(pal.rgba(0), Some([10, 20, 30, 0x80]));
  // entries past the alpha list stay opaque.
  assert_eq!(pal.rgba(1), Some([40, 50, 60, 0xFF]));
  assert_eq!(pal.rgba(2), None);
  // more alphas than entries is malformed.
  assert!(pal.set_alphas(&[0, 0, 0]).is_err());
}

#[test]
fn test_palette_shape_validation() {
  assert!(Palette::from_plte(&[1, 2]).is_err());
  assert!(Palette::from_plte(&[]).is_err());
  assert!(Palette::from_plte(&[0; 3 * 257]).is_err());
}
