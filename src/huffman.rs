//! Canonical prefix-code (Huffman) tables for DEFLATE.
//!
//! A table is built from nothing but a list of code lengths (RFC 1951
//! section 3.2.2): symbols sharing a length get consecutive codes in symbol
//! order, lengths are assigned in ascending length then ascending symbol.
//! Decoding uses a 512-entry fast table for codes of 9 bits or less and a
//! per-length scan for the rest.

use crate::{
  bits::BitReader,
  error::{DecodeError, Stall},
};

/// Enough slots for the largest DEFLATE alphabet (288 literal/length codes).
pub(crate) const MAX_SYMBOLS: usize = 288;

/// Fast-table entry meaning "no code of 9 bits or less starts here".
const FAST_EMPTY: u16 = 0xFFFF;

/// Reverses the low `bits` bits of `v`.
#[inline]
#[must_use]
fn bit_reverse(v: u32, bits: u32) -> u32 {
  debug_assert!(bits >= 1 && bits <= 16);
  u32::from((v as u16).reverse_bits()) >> (16 - bits)
}

/// A built canonical prefix-code table.
#[derive(Debug, Clone)]
pub(crate) struct PrefixTable {
  /// Indexed by the bit-reversed 9-bit stream prefix; holds the assigned
  /// slot for codes of length ≤ 9.
  fast: [u16; 512],
  /// First canonical code at each length.
  first_code: [u16; 16],
  /// Slot of the first symbol at each length.
  first_symbol: [u16; 16],
  /// One past the last code at each length, pre-shifted to 16 bits; index
  /// 16 is a sentinel that terminates the decode scan.
  max_code: [u32; 17],
  /// Slot → code length.
  size: [u8; MAX_SYMBOLS],
  /// Slot → symbol.
  value: [u16; MAX_SYMBOLS],
}

impl PrefixTable {
  /// Builds the table from per-symbol code lengths (length 0 = unused).
  ///
  /// Rejects lengths over 15 and over-subscribed length sets.
  pub(crate) fn build(lengths: &[u8]) -> Result<Self, DecodeError> {
    debug_assert!(lengths.len() <= MAX_SYMBOLS);

    let mut sizes = [0_u32; 17];
    for &len in lengths {
      if len > 15 {
        return Err(DecodeError::DeflateFormat);
      }
      sizes[usize::from(len)] += 1;
    }
    sizes[0] = 0;
    for i in 1..16 {
      if sizes[i] > (1 << i) {
        return Err(DecodeError::DeflateFormat);
      }
    }

    let mut table = Self {
      fast: [FAST_EMPTY; 512],
      first_code: [0; 16],
      first_symbol: [0; 16],
      max_code: [0; 17],
      size: [0; MAX_SYMBOLS],
      value: [0; MAX_SYMBOLS],
    };

    // first canonical code per length by cumulative doubling.
    let mut next_code = [0_u32; 16];
    let mut code: u32 = 0;
    let mut symbol: u32 = 0;
    for i in 1..16 {
      next_code[i] = code;
      table.first_code[i] = code as u16;
      table.first_symbol[i] = symbol as u16;
      code += sizes[i];
      if sizes[i] != 0 && code - 1 >= (1 << i) {
        return Err(DecodeError::DeflateFormat);
      }
      table.max_code[i] = code << (16 - i);
      code <<= 1;
      symbol += sizes[i];
    }
    table.max_code[16] = 0x1_0000;

    // assign codes in symbol order within each length.
    for (i, &len) in lengths.iter().enumerate() {
      if len == 0 {
        continue;
      }
      let l = usize::from(len);
      let slot = (next_code[l] - u32::from(table.first_code[l])
        + u32::from(table.first_symbol[l])) as usize;
      table.size[slot] = len;
      table.value[slot] = i as u16;
      if l <= 9 {
        let mut k = bit_reverse(next_code[l], l as u32);
        while k < 512 {
          table.fast[k as usize] = slot as u16;
          k += 1 << l;
        }
      }
      next_code[l] += 1;
    }

    Ok(table)
  }

  /// Decodes one symbol from the reader.
  ///
  /// Requires 16 bits of lookahead to be available; within a zlib stream
  /// that is always satisfiable because at least the Adler-32 trailer
  /// follows every code.
  pub(crate) fn decode_one(&self, bits: &mut BitReader) -> Result<u16, Stall> {
    bits.require(16)?;

    let prefix = bits.peek_bits(9)?;
    let slot = self.fast[prefix as usize];
    if slot != FAST_EMPTY {
      let slot = usize::from(slot);
      bits.consume(u32::from(self.size[slot]));
      return Ok(self.value[slot]);
    }

    // not in the fast table, so the code is 10..15 bits; put the stream
    // prefix back into MSB-first order and scan the length sentinels.
    let k = bit_reverse(bits.peek_bits(16)?, 16);
    let mut len = 10_usize;
    while len < 16 && k >= self.max_code[len] {
      len += 1;
    }
    if len == 16 {
      return Err(Stall::Fatal(DecodeError::DeflateFormat));
    }
    let idx = (k >> (16 - len)) as usize;
    let first = usize::from(self.first_code[len]);
    if idx < first {
      return Err(Stall::Fatal(DecodeError::DeflateFormat));
    }
    let slot = idx - first + usize::from(self.first_symbol[len]);
    if slot >= MAX_SYMBOLS || usize::from(self.size[slot]) != len {
      return Err(Stall::Fatal(DecodeError::DeflateFormat));
    }
    bits.consume(len as u32);
    Ok(self.value[slot])
  }
}

#[cfg(test)]
fn decode_all(table: &PrefixTable, stream: &[u8], n: usize) -> alloc::vec::Vec<u16> {
  let mut bits = BitReader::new();
  bits.append(stream);
  // padding so the 16-bit lookahead is always satisfied.
  bits.append(&[0; 4]);
  (0..n).map(|_| table.decode_one(&mut bits).unwrap()).collect()
}

#[test]
fn test_rfc_small_example() {
  // RFC 1951's ABCD example: lengths (2, 1, 3, 3) give codes
  // B=0, A=10, C=110, D=111.
  let table = PrefixTable::build(&[2, 1, 3, 3]).unwrap();
  // stream spells B A C D; each code arrives MSB-first in the LSB-first
  // stream, so the bit sequence is 0, 10, 110, 111 -> 0xDA then 0x01.
  let decoded = decode_all(&table, &[0xDA, 0x01], 4);
  assert_eq!(decoded, alloc::vec![1, 0, 2, 3]);
}

#[test]
fn test_long_code_slow_path() {
  // one symbol per length 1..=12; symbol 11 needs the 10..15-bit scan.
  let lengths: [u8; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
  let table = PrefixTable::build(&lengths).unwrap();
  // canonical codes here: sym(k) is k ones followed by a zero.
  let mut bits = BitReader::new();
  // sym11 = 111111111110 (11 ones then a zero), plus lookahead padding.
  bits.append(&[0xFF, 0x07, 0, 0, 0, 0]);
  assert_eq!(table.decode_one(&mut bits).unwrap(), 11);
}

#[test]
fn test_over_subscription_rejected() {
  // three codes of length 1 cannot exist.
  assert!(PrefixTable::build(&[1, 1, 1]).is_err());
  // but two is a complete code.
  assert!(PrefixTable::build(&[1, 1]).is_ok());
}

#[test]
fn test_length_over_15_rejected() {
  assert!(PrefixTable::build(&[16]).is_err());
}
