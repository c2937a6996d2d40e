//! Incremental zlib/DEFLATE decompression.
//!
//! The [`Inflater`] accepts a zlib stream (RFC 1950 framing around RFC 1951
//! DEFLATE blocks) in as many [`feed`](Inflater::feed) calls as the caller
//! likes. Parsing is an explicit state machine: each state makes progress
//! until it stalls on input, and a stalled composite read rolls the bit
//! reader back so the next `feed` re-runs it from a clean boundary.

use alloc::vec::Vec;

use log::trace;

use crate::{
  bits::BitReader,
  error::{DecodeError, Stall},
  huffman::PrefixTable,
};

/// DEFLATE's back-reference window: distances may never exceed this.
pub(crate) const WINDOW_SIZE: usize = 32_768;

/// Length-symbol base values for symbols 257..=285.
const LENGTH_BASE: [u16; 29] = [
  3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
  163, 195, 227, 258,
];
/// Extra bits carried by each length symbol.
const LENGTH_EXTRA: [u32; 29] =
  [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0];
/// Distance-symbol base values for symbols 0..=29.
const DIST_BASE: [u16; 30] = [
  1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
  2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
/// Extra bits carried by each distance symbol.
const DIST_EXTRA: [u32; 30] =
  [0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13];

/// The order in which the code-length alphabet's lengths are transmitted.
const CODE_LENGTH_ORDER: [usize; 19] =
  [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// Outcome of a successful [`Inflater::feed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
  /// The whole stream decoded and the Adler-32 trailer matched.
  Complete,
  /// Parsing stalled; feed more bytes to continue.
  NeedsMoreInput,
}

#[derive(Debug)]
enum InflateState {
  ZlibHeader,
  BlockHeader,
  StoredLen,
  StoredBody { remaining: u32 },
  DynamicHeader,
  DynamicLengths { hlit: usize, hdist: usize, cl: PrefixTable, lengths: Vec<u8> },
  HuffmanBody { lit_len: PrefixTable, dist: PrefixTable },
  Trailer,
  Done,
}

#[derive(Debug, Clone, Copy)]
struct Adler32 {
  s1: u32,
  s2: u32,
}
impl Adler32 {
  const fn new() -> Self {
    Self { s1: 1, s2: 0 }
  }
  #[inline]
  fn push(&mut self, byte: u8) {
    self.s1 = (self.s1 + u32::from(byte)) % 65_521;
    self.s2 = (self.s2 + self.s1) % 65_521;
  }
  const fn finish(&self) -> u32 {
    self.s2 << 16 | self.s1
  }
}

#[inline]
fn emit(out: &mut Vec<u8>, adler: &mut Adler32, byte: u8) {
  out.push(byte);
  adler.push(byte);
}

fn next_block_state(final_block: bool) -> InflateState {
  if final_block {
    InflateState::Trailer
  } else {
    InflateState::BlockHeader
  }
}

fn fixed_lit_len_table() -> Result<PrefixTable, DecodeError> {
  let mut lengths = [0_u8; 288];
  let mut i = 0;
  while i < 288 {
    lengths[i] = match i {
      0..=143 => 8,
      144..=255 => 9,
      256..=279 => 7,
      _ => 8,
    };
    i += 1;
  }
  PrefixTable::build(&lengths)
}

fn fixed_dist_table() -> Result<PrefixTable, DecodeError> {
  PrefixTable::build(&[5_u8; 32])
}

/// Streaming zlib decompressor.
///
/// Feed compressed bytes as they arrive; the accumulated output doubles as
/// the back-reference history, so it is only handed out once. A fatal error
/// latches: every later `feed` returns the same error without doing work.
#[derive(Debug)]
pub struct Inflater {
  bits: BitReader,
  state: InflateState,
  final_block: bool,
  out: Vec<u8>,
  adler: Adler32,
  latched: Option<DecodeError>,
}

impl Default for Inflater {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Inflater {
  /// A fresh inflater expecting a zlib header.
  #[must_use]
  pub fn new() -> Self {
    Self {
      bits: BitReader::new(),
      state: InflateState::ZlibHeader,
      final_block: false,
      out: Vec::new(),
      adler: Adler32::new(),
      latched: None,
    }
  }

  /// Appends compressed bytes and decodes as far as possible.
  pub fn feed(&mut self, bytes: &[u8]) -> Result<FeedOutcome, DecodeError> {
    if let Some(e) = self.latched {
      return Err(e);
    }
    self.bits.append(bytes);
    match self.run() {
      Ok(()) => Ok(FeedOutcome::Complete),
      Err(Stall::Starved) => Ok(FeedOutcome::NeedsMoreInput),
      Err(Stall::Fatal(e)) => {
        self.latched = Some(e);
        Err(e)
      }
    }
  }

  /// Whether the stream has fully decoded (trailer verified).
  #[inline]
  #[must_use]
  pub fn is_done(&self) -> bool {
    matches!(self.state, InflateState::Done)
  }

  /// All output produced so far.
  #[inline]
  #[must_use]
  pub fn output(&self) -> &[u8] {
    &self.out
  }

  /// Takes ownership of the output, leaving the inflater empty.
  ///
  /// Only call after [`is_done`](Self::is_done): the output is also the
  /// back-reference history, so draining it mid-stream would corrupt later
  /// copies.
  #[inline]
  #[must_use]
  pub fn take_output(&mut self) -> Vec<u8> {
    debug_assert!(self.is_done());
    core::mem::take(&mut self.out)
  }

  fn run(&mut self) -> Result<(), Stall> {
    let Self { bits, state, final_block, out, adler, .. } = self;
    loop {
      match state {
        InflateState::ZlibHeader => {
          bits.require(16)?;
          let cmf = bits.get_bits(8)?;
          let flg = bits.get_bits(8)?;
          let method = cmf & 0x0F;
          let window_bits = cmf >> 4;
          let fdict = flg & 0x20;
          if method != 8 || window_bits > 7 || (cmf << 8 | flg) % 31 != 0 || fdict != 0 {
            return Err(Stall::Fatal(DecodeError::DeflateFormat));
          }
          *state = InflateState::BlockHeader;
        }

        InflateState::BlockHeader => {
          bits.require(3)?;
          *final_block = bits.get_bits(1)? != 0;
          let block_type = bits.get_bits(2)?;
          trace!("deflate block type {} (final: {})", block_type, *final_block);
          match block_type {
            0 => {
              bits.align_to_byte();
              *state = InflateState::StoredLen;
            }
            1 => {
              *state = InflateState::HuffmanBody {
                lit_len: fixed_lit_len_table()?,
                dist: fixed_dist_table()?,
              };
            }
            2 => *state = InflateState::DynamicHeader,
            _ => return Err(Stall::Fatal(DecodeError::DeflateFormat)),
          }
        }

        InflateState::StoredLen => {
          bits.require(32)?;
          let len = bits.get_bits(16)?;
          let nlen = bits.get_bits(16)?;
          if len != !nlen & 0xFFFF {
            return Err(Stall::Fatal(DecodeError::DeflateFormat));
          }
          *state = InflateState::StoredBody { remaining: len };
        }

        InflateState::StoredBody { remaining } => {
          while *remaining > 0 {
            match bits.take_byte() {
              Ok(b) => {
                emit(out, adler, b);
                *remaining -= 1;
              }
              Err(_) => return Err(Stall::Starved),
            }
          }
          *state = next_block_state(*final_block);
        }

        InflateState::DynamicHeader => {
          let m = bits.mark();
          bits.require(14)?;
          let hlit = bits.get_bits(5)? as usize + 257;
          let hdist = bits.get_bits(5)? as usize + 1;
          let hclen = bits.get_bits(4)? as usize + 4;
          if bits.require(3 * hclen as u64).is_err() {
            bits.rewind(m);
            return Err(Stall::Starved);
          }
          if hlit > 286 || hdist > 30 {
            return Err(Stall::Fatal(DecodeError::DeflateFormat));
          }
          let mut cl_lengths = [0_u8; 19];
          for &position in CODE_LENGTH_ORDER.iter().take(hclen) {
            cl_lengths[position] = bits.get_bits(3)? as u8;
          }
          let cl = PrefixTable::build(&cl_lengths)?;
          let lengths = Vec::with_capacity(hlit + hdist);
          *state = InflateState::DynamicLengths { hlit, hdist, cl, lengths };
        }

        InflateState::DynamicLengths { hlit, hdist, cl, lengths } => {
          let total = *hlit + *hdist;
          while lengths.len() < total {
            // code (≤ 7 bits with 16-bit lookahead) plus worst-case repeat
            // field, so one iteration never half-consumes.
            bits.require(23)?;
            let sym = cl.decode_one(bits)?;
            match sym {
              0..=15 => lengths.push(sym as u8),
              16 => {
                let &last = lengths.last().ok_or(Stall::Fatal(DecodeError::DeflateFormat))?;
                let n = 3 + bits.get_bits(2)? as usize;
                if lengths.len() + n > total {
                  return Err(Stall::Fatal(DecodeError::DeflateFormat));
                }
                lengths.extend(core::iter::repeat(last).take(n));
              }
              17 | 18 => {
                let n = if sym == 17 {
                  3 + bits.get_bits(3)? as usize
                } else {
                  11 + bits.get_bits(7)? as usize
                };
                if lengths.len() + n > total {
                  return Err(Stall::Fatal(DecodeError::DeflateFormat));
                }
                lengths.extend(core::iter::repeat(0).take(n));
              }
              _ => return Err(Stall::Fatal(DecodeError::DeflateFormat)),
            }
          }
          if lengths[256] == 0 {
            // the end-of-block code has to exist.
            return Err(Stall::Fatal(DecodeError::DeflateFormat));
          }
          let lit_len = PrefixTable::build(&lengths[..*hlit])?;
          let dist = PrefixTable::build(&lengths[*hlit..])?;
          *state = InflateState::HuffmanBody { lit_len, dist };
        }

        InflateState::HuffmanBody { lit_len, dist } => {
          loop {
            let m = bits.mark();
            let sym = lit_len.decode_one(bits)?;
            if sym < 256 {
              emit(out, adler, sym as u8);
              continue;
            }
            if sym == 256 {
              break;
            }
            if sym > 285 {
              return Err(Stall::Fatal(DecodeError::DeflateFormat));
            }
            let li = usize::from(sym - 257);
            let step = (|| -> Result<(usize, usize), Stall> {
              let len = usize::from(LENGTH_BASE[li]) + bits.get_bits(LENGTH_EXTRA[li])? as usize;
              let dsym = dist.decode_one(bits)?;
              if dsym > 29 {
                return Err(Stall::Fatal(DecodeError::DeflateFormat));
              }
              let di = usize::from(dsym);
              let d = usize::from(DIST_BASE[di]) + bits.get_bits(DIST_EXTRA[di])? as usize;
              Ok((len, d))
            })();
            match step {
              Ok((len, d)) => {
                if d > out.len() || d > WINDOW_SIZE {
                  return Err(Stall::Fatal(DecodeError::DeflateFormat));
                }
                for _ in 0..len {
                  let b = out[out.len() - d];
                  emit(out, adler, b);
                }
              }
              Err(Stall::Starved) => {
                // the length symbol was already consumed; rewind so the
                // next feed retries the whole back-reference.
                bits.rewind(m);
                return Err(Stall::Starved);
              }
              Err(fatal) => return Err(fatal),
            }
          }
          *state = next_block_state(*final_block);
        }

        InflateState::Trailer => {
          bits.align_to_byte();
          bits.require(32)?;
          let mut declared = 0_u32;
          for _ in 0..4 {
            declared = declared << 8 | u32::from(bits.take_byte()?);
          }
          if declared != adler.finish() {
            return Err(Stall::Fatal(DecodeError::AdlerMismatch));
          }
          trace!("zlib stream complete ({} bytes out)", out.len());
          *state = InflateState::Done;
        }

        InflateState::Done => return Ok(()),
      }
    }
  }
}

#[cfg(test)]
fn adler_of(data: &[u8]) -> u32 {
  let mut a = Adler32::new();
  for &b in data {
    a.push(b);
  }
  a.finish()
}

/// Test-side bit writer: fields go in LSB-first, prefix codes MSB-first.
#[cfg(test)]
struct BitSink {
  bytes: Vec<u8>,
  acc: u32,
  n: u32,
}
#[cfg(test)]
impl BitSink {
  fn new() -> Self {
    BitSink { bytes: Vec::new(), acc: 0, n: 0 }
  }
  fn push_lsb(&mut self, v: u32, n: u32) {
    self.acc |= v << self.n;
    self.n += n;
    while self.n >= 8 {
      self.bytes.push(self.acc as u8);
      self.acc >>= 8;
      self.n -= 8;
    }
  }
  fn push_code(&mut self, pattern: u16, len: u32) {
    for i in (0..len).rev() {
      self.push_lsb(u32::from(pattern >> i) & 1, 1);
    }
  }
  fn finish(mut self) -> Vec<u8> {
    if self.n > 0 {
      self.bytes.push(self.acc as u8);
    }
    self.bytes
  }
}

#[cfg(test)]
fn stored_stream(data: &[u8]) -> Vec<u8> {
  let mut v = alloc::vec![0x78, 0x01, 0x01];
  let len = data.len() as u16;
  v.extend_from_slice(&len.to_le_bytes());
  v.extend_from_slice(&(!len).to_le_bytes());
  v.extend_from_slice(data);
  v.extend_from_slice(&adler_of(data).to_be_bytes());
  v
}

/// Fixed-huffman stream of literals `lits` followed by one back-reference of
/// length 3 at `dist`, then end-of-block.
#[cfg(test)]
fn fixed_backref_stream(lits: &[u8], dist_sym: u16) -> Vec<u8> {
  fn fixed_lit_code(byte: u8) -> u16 {
    0x30 + u16::from(byte)
  }
  let mut sink = BitSink::new();
  sink.push_lsb(1, 1); // final
  sink.push_lsb(1, 2); // fixed huffman
  for &b in lits {
    sink.push_code(fixed_lit_code(b), 8);
  }
  sink.push_code(1, 7); // length symbol 257 (length 3, no extra)
  sink.push_code(dist_sym, 5);
  sink.push_code(0, 7); // end of block
  let mut v = alloc::vec![0x78, 0x01];
  v.extend_from_slice(&sink.finish());
  v
}

#[test]
fn test_stored_round_trip() {
  let mut inf = Inflater::new();
  assert_eq!(inf.feed(&stored_stream(b"Hello")), Ok(FeedOutcome::Complete));
  assert_eq!(inf.output(), b"Hello");
  assert!(inf.is_done());
}

#[test]
fn test_stored_byte_at_a_time() {
  let stream = stored_stream(b"incremental feeding works");
  let mut inf = Inflater::new();
  let mut last = FeedOutcome::NeedsMoreInput;
  for &b in stream.iter() {
    last = inf.feed(&[b]).unwrap();
  }
  assert_eq!(last, FeedOutcome::Complete);
  assert_eq!(inf.output(), b"incremental feeding works");
}

#[test]
fn test_backref_at_exact_history_length() {
  // one literal then a distance-1 length-3 copy: "AAAA".
  let mut stream = fixed_backref_stream(b"A", 0);
  stream.extend_from_slice(&adler_of(b"AAAA").to_be_bytes());
  let mut inf = Inflater::new();
  assert_eq!(inf.feed(&stream), Ok(FeedOutcome::Complete));
  assert_eq!(inf.output(), b"AAAA");
}

#[test]
fn test_backref_past_history_is_fatal() {
  // one byte of history but the back-reference reaches two bytes behind.
  // trailing zeros stand in for the trailer so the symbol lookahead is
  // satisfied and the decoder reaches the distance check.
  let mut stream = fixed_backref_stream(b"A", 1);
  stream.extend_from_slice(&[0; 4]);
  let mut inf = Inflater::new();
  assert_eq!(inf.feed(&stream), Err(DecodeError::DeflateFormat));
  // the error latches.
  assert_eq!(inf.feed(&[0]), Err(DecodeError::DeflateFormat));
}

#[test]
fn test_zlib_header_validation() {
  // wrong compression method.
  assert_eq!(Inflater::new().feed(&[0x77, 0x9C]), Err(DecodeError::DeflateFormat));
  // failed mod-31 check.
  assert_eq!(Inflater::new().feed(&[0x78, 0x02]), Err(DecodeError::DeflateFormat));
  // preset dictionary flag set; 0x78 0x20 still passes the mod-31 check.
  assert_eq!(Inflater::new().feed(&[0x78, 0x20]), Err(DecodeError::DeflateFormat));
}

#[test]
fn test_block_type_three_is_fatal() {
  // bfinal=1, btype=11.
  assert_eq!(Inflater::new().feed(&[0x78, 0x01, 0x07]), Err(DecodeError::DeflateFormat));
}

#[test]
fn test_stored_len_complement_mismatch() {
  let bad = [0x78, 0x01, 0x01, 0x05, 0x00, 0x00, 0x00];
  assert_eq!(Inflater::new().feed(&bad), Err(DecodeError::DeflateFormat));
}

#[test]
fn test_adler_mismatch() {
  let mut stream = stored_stream(b"checksummed");
  let last = stream.len() - 1;
  stream[last] ^= 0xFF;
  assert_eq!(Inflater::new().feed(&stream), Err(DecodeError::AdlerMismatch));
}

#[test]
fn test_miniz_round_trips() {
  let mut data = Vec::new();
  for i in 0..50_000_u32 {
    data.push((i * 31 % 251) as u8);
  }
  data.extend_from_slice(b"some highly compressible text ".repeat(500).as_slice());
  for level in [0, 1, 6, 10] {
    let stream = miniz_oxide::deflate::compress_to_vec_zlib(&data, level);
    let mut inf = Inflater::new();
    assert_eq!(inf.feed(&stream), Ok(FeedOutcome::Complete), "level {level}");
    assert_eq!(inf.output(), data.as_slice(), "level {level}");
  }
}

#[test]
fn test_resume_at_every_split_point() {
  let data = b"abcabcabcabc some repeated data to get back-references going";
  let stream = miniz_oxide::deflate::compress_to_vec_zlib(data, 6);
  for split in 0..stream.len() {
    let mut inf = Inflater::new();
    inf.feed(&stream[..split]).unwrap();
    assert_eq!(inf.feed(&stream[split..]), Ok(FeedOutcome::Complete), "split {split}");
    assert_eq!(inf.output(), data);
  }
}
