//! Scanline reconstruction for the five PNG filter types.
//!
//! From the PNG spec: filters are applied to **bytes**, not to pixels,
//! regardless of the bit depth or color type of the image. The left
//! neighbor sits one *filter unit* back (one byte for sub-byte depths).

use crate::error::DecodeError;

/// The per-scanline filter, parsed from the leading filter byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowFilter {
  None,
  Sub,
  Up,
  Average,
  Paeth,
}

impl RowFilter {
  pub(crate) fn from_byte(b: u8) -> Result<Self, DecodeError> {
    Ok(match b {
      0 => RowFilter::None,
      1 => RowFilter::Sub,
      2 => RowFilter::Up,
      3 => RowFilter::Average,
      4 => RowFilter::Paeth,
      _ => return Err(DecodeError::Structural),
    })
  }

  /// Reconstructs one scanline in place.
  ///
  /// `above` is the already-reconstructed previous scanline of the same
  /// pass (all zeros for the first row); `unit` is the filter unit. All
  /// arithmetic is modulo 256.
  pub(crate) fn reconstruct(self, row: &mut [u8], above: &[u8], unit: usize) {
    debug_assert_eq!(row.len(), above.len());
    debug_assert!(unit > 0);
    match self {
      RowFilter::None => (),
      RowFilter::Sub => {
        for i in unit..row.len() {
          row[i] = row[i].wrapping_add(row[i - unit]);
        }
      }
      RowFilter::Up => {
        for i in 0..row.len() {
          row[i] = row[i].wrapping_add(above[i]);
        }
      }
      RowFilter::Average => {
        // the first unit has no left neighbor, so `a` is zero there.
        for i in 0..unit.min(row.len()) {
          row[i] = row[i].wrapping_add(above[i] / 2);
        }
        for i in unit..row.len() {
          let a = u16::from(row[i - unit]);
          let b = u16::from(above[i]);
          row[i] = row[i].wrapping_add(((a + b) / 2) as u8);
        }
      }
      RowFilter::Paeth => {
        for i in 0..unit.min(row.len()) {
          row[i] = row[i].wrapping_add(paeth_predictor(0, above[i], 0));
        }
        for i in unit..row.len() {
          row[i] =
            row[i].wrapping_add(paeth_predictor(row[i - unit], above[i], above[i - unit]));
        }
      }
    }
  }
}

/// The Paeth function picks whichever neighbor (left `a`, above `b`, upper
/// left `c`) is closest to `a + b - c`.
///
/// The PNG spec is emphatic that the computation happens exactly, without
/// overflow, and that the tie-break order (`a`, then `b`, then `c`) must not
/// change; i32 math covers every u8 input.
const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

#[test]
fn test_filter_byte_parsing() {
  assert_eq!(RowFilter::from_byte(0), Ok(RowFilter::None));
  assert_eq!(RowFilter::from_byte(4), Ok(RowFilter::Paeth));
  assert_eq!(RowFilter::from_byte(5), Err(DecodeError::Structural));
}

#[test]
fn test_sub_reconstruction() {
  // 3x1 grayscale scanline filtered with Sub: 10 05 FA -> 10 15 0F.
  let mut row = [0x10, 0x05, 0xFA];
  RowFilter::Sub.reconstruct(&mut row, &[0; 3], 1);
  assert_eq!(row, [0x10, 0x15, 0x0F]);
}

#[test]
fn test_up_reconstruction() {
  let mut row = [0x05, 0x02];
  RowFilter::Up.reconstruct(&mut row, &[0x10, 0x13], 1);
  assert_eq!(row, [0x15, 0x15]);
}

#[test]
fn test_average_reconstruction() {
  // a = left, b = above; R = x + floor((a + b) / 2).
  let mut row = [0x02, 0x04, 0x06];
  RowFilter::Average.reconstruct(&mut row, &[0x10, 0x20, 0x06], 1);
  // row[0] = 2 + 0x10/2 = 0x0A; row[1] = 4 + (0x0A + 0x20)/2 = 0x19;
  // row[2] = 6 + (0x19 + 0x06)/2 = 6 + 0x0F = 0x15.
  assert_eq!(row, [0x0A, 0x19, 0x15]);
}

#[test]
fn test_average_no_overflow_at_255() {
  let mut row = [0x01];
  RowFilter::Average.reconstruct(&mut row, &[0xFF], 1);
  assert_eq!(row, [0x01 + 0x7F]);
  let mut row = [0x01, 0x01];
  RowFilter::Average.reconstruct(&mut row, &[0xFF, 0xFF], 1);
  // second byte: a = 0x80, b = 0xFF, (a+b)/2 = 0xBF (u16 math, no wrap).
  assert_eq!(row, [0x80, 0xC0]);
}

#[test]
fn test_paeth_predictor_selection() {
  // all equal: the a-first tie break wins.
  assert_eq!(paeth_predictor(1, 1, 1), 1);
  // p = 15: pa = 5, pb = 5, pc = 0, so c is nearest.
  assert_eq!(paeth_predictor(10, 20, 15), 15);
  assert_eq!(paeth_predictor(0, 255, 0), 255);
  assert_eq!(paeth_predictor(255, 0, 255), 0);
}

#[test]
fn test_paeth_reconstruction_with_unit() {
  // RGB8 (unit 3): the first pixel predicts from above only.
  let mut row = [1, 2, 3, 4, 5, 6];
  let above = [10, 20, 30, 40, 50, 60];
  RowFilter::Paeth.reconstruct(&mut row, &above, 3);
  // first pixel: +paeth(0, b, 0) = +b.
  assert_eq!(&row[..3], &[11, 22, 33]);
  // second pixel: paeth(a=11, b=40, c=10) -> p=41, pa=30, pb=1, pc=31 -> b.
  assert_eq!(row[3], 4 + 40);
}
