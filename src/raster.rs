//! The pixel-buffer collaborator interface and a Vec-backed implementation.

use alloc::vec::Vec;

/// Channel layout of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
  /// One grayscale channel.
  Y,
  /// Grayscale plus alpha.
  Ya,
  /// Red, green, blue.
  Rgb,
  /// Red, green, blue, alpha.
  Rgba,
}
impl ColorMode {
  /// Samples per pixel for this layout.
  #[inline]
  #[must_use]
  pub const fn channels(self) -> usize {
    match self {
      ColorMode::Y => 1,
      ColorMode::Ya => 2,
      ColorMode::Rgb => 3,
      ColorMode::Rgba => 4,
    }
  }
}

/// Where decoded pixels land.
///
/// The decoder creates the buffer once the header (and palette, for indexed
/// color) is known, then takes the write lock exactly once to store the
/// reconstructed image, releasing it on every exit path. While locked the
/// region must not be reallocated and must hold at least
/// `pitch() * height` bytes.
pub trait PixelBuffer {
  /// Allocates storage for an image. Returns `false` on failure.
  fn create(&mut self, width: u32, height: u32, bit_depth: u8, mode: ColorMode) -> bool;

  /// Bytes between the starts of consecutive rows.
  fn pitch(&self) -> usize;

  /// Takes the write lock, exposing the raw storage. `None` on failure or
  /// if already locked.
  fn lock_write(&mut self) -> Option<&mut [u8]>;

  /// Releases the write lock.
  fn unlock_write(&mut self);
}

/// A plain heap-allocated [`PixelBuffer`].
///
/// Rows are tightly packed: the pitch is exactly the byte length of one row
/// of pixels. The struct takes no opinion on whether row 0 is the top or
/// the bottom of the image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Raster {
  width: u32,
  height: u32,
  bit_depth: u8,
  mode: Option<ColorMode>,
  pitch: usize,
  data: Vec<u8>,
  locked: bool,
}

impl Raster {
  /// An empty raster; storage appears on [`create`](PixelBuffer::create).
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Width in pixels.
  #[inline]
  #[must_use]
  pub const fn width(&self) -> u32 {
    self.width
  }

  /// Height in pixels.
  #[inline]
  #[must_use]
  pub const fn height(&self) -> u32 {
    self.height
  }

  /// Bits per channel.
  #[inline]
  #[must_use]
  pub const fn bit_depth(&self) -> u8 {
    self.bit_depth
  }

  /// Channel layout, once created.
  #[inline]
  #[must_use]
  pub const fn color_mode(&self) -> Option<ColorMode> {
    self.mode
  }

  /// Whether `create` has succeeded.
  #[inline]
  #[must_use]
  pub const fn is_created(&self) -> bool {
    self.mode.is_some()
  }

  /// The whole backing store, row-major.
  #[inline]
  #[must_use]
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// One row of pixel bytes.
  ///
  /// ## Panics
  /// * If `y` is out of bounds.
  #[inline]
  #[must_use]
  pub fn row(&self, y: u32) -> &[u8] {
    let start = y as usize * self.pitch;
    &self.data[start..start + self.pitch]
  }
}

impl PixelBuffer for Raster {
  fn create(&mut self, width: u32, height: u32, bit_depth: u8, mode: ColorMode) -> bool {
    if self.locked || width == 0 || height == 0 {
      return false;
    }
    let bits_per_row = width as usize * usize::from(bit_depth) * mode.channels();
    let pitch = (bits_per_row + 7) / 8;
    let total = match pitch.checked_mul(height as usize) {
      Some(t) => t,
      None => return false,
    };
    self.data.clear();
    if self.data.try_reserve_exact(total).is_err() {
      return false;
    }
    self.data.resize(total, 0);
    self.width = width;
    self.height = height;
    self.bit_depth = bit_depth;
    self.mode = Some(mode);
    self.pitch = pitch;
    true
  }

  #[inline]
  fn pitch(&self) -> usize {
    self.pitch
  }

  fn lock_write(&mut self) -> Option<&mut [u8]> {
    if self.locked || self.mode.is_none() {
      return None;
    }
    self.locked = true;
    Some(&mut self.data)
  }

  #[inline]
  fn unlock_write(&mut self) {
    self.locked = false;
  }
}

#[test]
fn test_raster_create_and_lock() {
  let mut r = Raster::new();
  assert!(!r.is_created());
  assert!(r.lock_write().is_none());

  assert!(r.create(3, 2, 8, ColorMode::Rgb));
  assert_eq!(r.pitch(), 9);
  assert_eq!(r.data().len(), 18);

  assert!(r.lock_write().is_some());
  // double lock fails until unlocked.
  assert!(r.lock_write().is_none());
  r.unlock_write();
  assert!(r.lock_write().is_some());
}

#[test]
fn test_raster_packed_pitch() {
  let mut r = Raster::new();
  assert!(r.create(9, 1, 1, ColorMode::Y));
  assert_eq!(r.pitch(), 2);
  assert!(r.create(3, 4, 16, ColorMode::Rgba));
  assert_eq!(r.pitch(), 24);
}
