//! LSB-first bit reading over an appendable byte backing.
//!
//! This is the DEFLATE bit order: the low bit of each byte is the first bit
//! of the stream, and multi-bit fields are little-endian in bit order.

use alloc::vec::Vec;

use crate::error::NeedMoreInput;

/// A checkpoint of the reader's consumption state.
///
/// Only valid until the next [`BitReader::append`]; used to roll back a
/// composite read that stalled partway through.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BitMark {
  pos: usize,
  acc: u32,
  count: u32,
}

/// Bit-level reader that can be fed more bytes at any time.
///
/// Any read that cannot be satisfied returns [`NeedMoreInput`] and leaves the
/// accumulator intact, so the caller may resume the same read after
/// [`append`](Self::append).
#[derive(Debug, Clone, Default)]
pub(crate) struct BitReader {
  bytes: Vec<u8>,
  pos: usize,
  acc: u32,
  count: u32,
}

impl BitReader {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Extends the byte backing, dropping the already-consumed prefix.
  pub(crate) fn append(&mut self, more: &[u8]) {
    if self.pos > 0 {
      self.bytes.drain(..self.pos);
      self.pos = 0;
    }
    self.bytes.extend_from_slice(more);
  }

  /// Total bits that could still be read (buffered plus backing).
  #[inline]
  #[must_use]
  pub(crate) fn bits_available(&self) -> u64 {
    u64::from(self.count) + 8 * (self.bytes.len() - self.pos) as u64
  }

  /// Checks that `n` bits can be read without consuming anything.
  #[inline]
  pub(crate) fn require(&self, n: u64) -> Result<(), NeedMoreInput> {
    if self.bits_available() >= n {
      Ok(())
    } else {
      Err(NeedMoreInput)
    }
  }

  /// Moves one backing byte into the accumulator.
  ///
  /// A no-op when the accumulator already holds more than 24 bits (the next
  /// byte wouldn't fit) or when the backing is exhausted.
  #[inline]
  fn load_byte(&mut self) {
    if self.count > 24 {
      return;
    }
    if let Some(&b) = self.bytes.get(self.pos) {
      self.acc |= u32::from(b) << self.count;
      self.count += 8;
      self.pos += 1;
    }
  }

  /// Consumes and returns the next `n` bits (0 ≤ n ≤ 32), LSB-first.
  pub(crate) fn get_bits(&mut self, n: u32) -> Result<u32, NeedMoreInput> {
    debug_assert!(n <= 32);
    self.require(u64::from(n))?;
    let mut out = 0_u32;
    let mut got = 0_u32;
    while got < n {
      if self.count == 0 {
        self.load_byte();
      }
      let take = (n - got).min(self.count);
      debug_assert!(take > 0);
      if take == 32 {
        out = self.acc;
        self.acc = 0;
      } else {
        out |= (self.acc & ((1_u32 << take) - 1)) << got;
        self.acc >>= take;
      }
      self.count -= take;
      got += take;
    }
    Ok(out)
  }

  /// Returns the next `n` bits (0 ≤ n ≤ 25) without consuming them.
  ///
  /// The limit exists because peeking may have to top up the accumulator,
  /// which can always reach at least 25 buffered bits but not a full 32.
  pub(crate) fn peek_bits(&mut self, n: u32) -> Result<u32, NeedMoreInput> {
    debug_assert!(n <= 25);
    self.require(u64::from(n))?;
    while self.count < n {
      self.load_byte();
    }
    debug_assert!(self.count >= n);
    Ok(self.acc & ((1_u32 << n) - 1))
  }

  /// Discards `n` already-peeked bits.
  #[inline]
  pub(crate) fn consume(&mut self, n: u32) {
    debug_assert!(n <= self.count);
    self.acc >>= n;
    self.count -= n;
  }

  /// Discards bits up to the next byte boundary.
  #[inline]
  pub(crate) fn align_to_byte(&mut self) {
    let drop = self.count & 7;
    self.acc >>= drop;
    self.count -= drop;
  }

  /// Reads one whole byte. The reader must be byte-aligned.
  pub(crate) fn take_byte(&mut self) -> Result<u8, NeedMoreInput> {
    debug_assert_eq!(self.count & 7, 0);
    if self.count >= 8 {
      let b = self.acc as u8;
      self.acc >>= 8;
      self.count -= 8;
      Ok(b)
    } else if let Some(&b) = self.bytes.get(self.pos) {
      self.pos += 1;
      Ok(b)
    } else {
      Err(NeedMoreInput)
    }
  }

  /// Snapshots the consumption state. Invalidated by [`append`](Self::append).
  #[inline]
  #[must_use]
  pub(crate) fn mark(&self) -> BitMark {
    BitMark { pos: self.pos, acc: self.acc, count: self.count }
  }

  /// Rolls back to a snapshot taken since the last append.
  #[inline]
  pub(crate) fn rewind(&mut self, m: BitMark) {
    self.pos = m.pos;
    self.acc = m.acc;
    self.count = m.count;
  }
}

#[test]
fn test_lsb_first_order() {
  let mut r = BitReader::new();
  r.append(&[0b1010_1101]);
  assert_eq!(r.get_bits(4), Ok(0b1101));
  assert_eq!(r.get_bits(4), Ok(0b1010));
  assert_eq!(r.get_bits(1), Err(NeedMoreInput));
}

#[test]
fn test_multibyte_little_endian() {
  let mut r = BitReader::new();
  r.append(&[0x34, 0x12, 0x78, 0x56]);
  assert_eq!(r.get_bits(16), Ok(0x1234));
  assert_eq!(r.get_bits(16), Ok(0x5678));
}

#[test]
fn test_suspension_and_resume() {
  let mut r = BitReader::new();
  r.append(&[0xFF]);
  assert_eq!(r.get_bits(3), Ok(0b111));
  // only 5 bits left, a 9-bit read must stall without touching them.
  assert_eq!(r.get_bits(9), Err(NeedMoreInput));
  r.append(&[0b0000_0001]);
  assert_eq!(r.get_bits(9), Ok(0b0_0011_1111));
}

#[test]
fn test_peek_does_not_consume() {
  let mut r = BitReader::new();
  r.append(&[0xAB, 0xCD]);
  assert_eq!(r.peek_bits(12), Ok(0xDAB));
  assert_eq!(r.peek_bits(12), Ok(0xDAB));
  assert_eq!(r.get_bits(8), Ok(0xAB));
  r.consume(4);
  assert_eq!(r.get_bits(4), Ok(0xC));
}

#[test]
fn test_align_and_take_byte() {
  let mut r = BitReader::new();
  r.append(&[0b0000_0101, 0xEE, 0x77]);
  assert_eq!(r.get_bits(3), Ok(0b101));
  r.align_to_byte();
  assert_eq!(r.take_byte(), Ok(0xEE));
  assert_eq!(r.take_byte(), Ok(0x77));
  assert_eq!(r.take_byte(), Err(NeedMoreInput));
}

#[test]
fn test_mark_rewind() {
  let mut r = BitReader::new();
  r.append(&[0x12, 0x34]);
  let m = r.mark();
  assert_eq!(r.get_bits(12), Ok(0x412));
  r.rewind(m);
  assert_eq!(r.get_bits(16), Ok(0x3412));
}

#[test]
fn test_get_bits_32() {
  let mut r = BitReader::new();
  r.append(&[0x78, 0x56, 0x34, 0x12, 0xFF]);
  assert_eq!(r.get_bits(4), Ok(0x8));
  assert_eq!(r.get_bits(32), Ok(0xF123_4567));
}
