//! The chunk processor: signature, chunk walking, CRC verification,
//! metadata dispatch, IDAT streaming, and final expansion into the pixel
//! buffer.

use alloc::vec::Vec;

use log::{debug, trace};

use crate::{
  chunk::{ChunkType, PNG_SIGNATURE},
  crc32::Crc32,
  error::DecodeError,
  header::Header,
  inflate::Inflater,
  interlace::Interlace,
  metadata::{Background, Palette, PhysicalDims, Timestamp, Transparency},
  raster::{ColorMode, PixelBuffer},
  source::ByteSource,
};

/// How many payload bytes to pull from the source per batch.
const IO_CHUNK: usize = 4096;

/// Non-IDAT chunks the decoder retains are all small; a known chunk
/// declaring more than this is malformed.
const MAX_KEPT_PAYLOAD: u32 = 1024;

/// Progress of an incremental decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeProgress {
  /// The IEND chunk was processed and the pixel buffer is filled.
  Finished,
  /// The source ran dry mid-stream; feed again with more bytes.
  NeedsMoreInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Signature,
  ChunkHeader,
  Payload,
  Crc,
  Finished,
}

/// A single in-progress PNG decode.
///
/// [`feed`](Self::feed) may be called any number of times as bytes arrive;
/// state (including the partially-decoded zlib stream) carries across calls.
/// For whole-buffer decoding use [`load`].
///
/// A chunk's CRC is verified before any of its type-dependent effects are
/// applied, so corruption anywhere in a chunk's type or data surfaces as
/// [`DecodeError::CrcMismatch`] rather than as some downstream confusion.
#[derive(Debug)]
pub struct PngDecoder {
  phase: Phase,
  stash: Vec<u8>,
  scratch: Vec<u8>,
  chunk_ty: ChunkType,
  chunk_len: u32,
  remaining: u32,
  crc: Crc32,
  payload: Vec<u8>,
  keep_payload: bool,
  header: Option<Header>,
  interlace: Interlace,
  palette: Option<Palette>,
  gamma: Option<u32>,
  timestamp: Option<Timestamp>,
  background: Option<Background>,
  physical: Option<PhysicalDims>,
  transparency: Option<Transparency>,
  seen_idat: bool,
  inflater: Inflater,
  /// An inflater failure noticed while streaming a chunk whose CRC hasn't
  /// been checked yet; surfaced only once the CRC verifies.
  inflater_err: Option<DecodeError>,
  failed: Option<DecodeError>,
}

impl Default for PngDecoder {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl PngDecoder {
  /// A decoder expecting the PNG signature.
  #[must_use]
  pub fn new() -> Self {
    Self {
      phase: Phase::Signature,
      stash: Vec::new(),
      scratch: Vec::new(),
      chunk_ty: ChunkType([0; 4]),
      chunk_len: 0,
      remaining: 0,
      crc: Crc32::new(),
      payload: Vec::new(),
      keep_payload: false,
      header: None,
      interlace: Interlace::Null,
      palette: None,
      gamma: None,
      timestamp: None,
      background: None,
      physical: None,
      transparency: None,
      seen_idat: false,
      inflater: Inflater::new(),
      inflater_err: None,
      failed: None,
    }
  }

  /// The validated header, once IHDR has been processed.
  #[inline]
  #[must_use]
  pub fn header(&self) -> Option<Header> {
    self.header
  }

  /// Gamma times 100 000 from a gAMA chunk.
  #[inline]
  #[must_use]
  pub fn gamma(&self) -> Option<u32> {
    self.gamma
  }

  /// Modification time from a tIME chunk.
  #[inline]
  #[must_use]
  pub fn timestamp(&self) -> Option<Timestamp> {
    self.timestamp
  }

  /// Preferred background color from a bKGD chunk.
  #[inline]
  #[must_use]
  pub fn background(&self) -> Option<Background> {
    self.background
  }

  /// Physical pixel dimensions from a pHYs chunk.
  #[inline]
  #[must_use]
  pub fn physical_dimensions(&self) -> Option<PhysicalDims> {
    self.physical
  }

  /// Transparency info from a tRNS chunk.
  #[inline]
  #[must_use]
  pub fn transparency(&self) -> Option<Transparency> {
    self.transparency
  }

  /// Consumes bytes from `source` and advances the decode.
  ///
  /// Returns [`DecodeProgress::NeedsMoreInput`] when the source runs dry
  /// mid-stream; call again once it has more bytes. A fatal error latches
  /// and is returned by every subsequent call.
  pub fn feed<S, B>(
    &mut self, source: &mut S, buffer: &mut B,
  ) -> Result<DecodeProgress, DecodeError>
  where
    S: ByteSource + ?Sized,
    B: PixelBuffer + ?Sized,
  {
    if let Some(e) = self.failed {
      return Err(e);
    }
    let outcome = self.run(source, buffer);
    if let Err(e) = outcome {
      self.failed = Some(e);
    }
    outcome
  }

  fn run<S, B>(&mut self, source: &mut S, buffer: &mut B) -> Result<DecodeProgress, DecodeError>
  where
    S: ByteSource + ?Sized,
    B: PixelBuffer + ?Sized,
  {
    loop {
      match self.phase {
        Phase::Finished => return Ok(DecodeProgress::Finished),

        Phase::Signature => {
          if !self.fill_stash(source, 8) {
            return Ok(DecodeProgress::NeedsMoreInput);
          }
          if self.stash != PNG_SIGNATURE {
            return Err(DecodeError::BadSignature);
          }
          self.stash.clear();
          self.phase = Phase::ChunkHeader;
        }

        Phase::ChunkHeader => {
          if !self.fill_stash(source, 8) {
            return Ok(DecodeProgress::NeedsMoreInput);
          }
          let len = u32::from_be_bytes(self.stash[0..4].try_into().unwrap());
          let ty = ChunkType(self.stash[4..8].try_into().unwrap());
          self.stash.clear();
          if len > 0x7FFF_FFFF {
            return Err(DecodeError::Structural);
          }
          trace!("chunk {:?} ({} bytes)", ty, len);
          self.begin_chunk(ty, len)?;
          self.phase = if len == 0 { Phase::Crc } else { Phase::Payload };
        }

        Phase::Payload => {
          while self.remaining > 0 {
            let want = (self.remaining as usize).min(IO_CHUNK);
            self.scratch.clear();
            while self.scratch.len() < want {
              match source.read() {
                Some(b) => self.scratch.push(b),
                None => break,
              }
            }
            if self.scratch.is_empty() {
              return Ok(DecodeProgress::NeedsMoreInput);
            }
            self.crc.update(&self.scratch);
            self.remaining -= self.scratch.len() as u32;
            if self.chunk_ty == ChunkType::IDAT {
              // keep streaming through the CRC even if inflation already
              // failed: a corrupt chunk must fail its CRC check first.
              if self.inflater_err.is_none() {
                if let Err(e) = self.inflater.feed(&self.scratch) {
                  self.inflater_err = Some(e);
                }
              }
            } else if self.keep_payload {
              self.payload.extend_from_slice(&self.scratch);
            }
            // unknown ancillary payloads only pass through the CRC.
          }
          self.phase = Phase::Crc;
        }

        Phase::Crc => {
          if !self.fill_stash(source, 4) {
            return Ok(DecodeProgress::NeedsMoreInput);
          }
          let declared = u32::from_be_bytes(self.stash[0..4].try_into().unwrap());
          self.stash.clear();
          if self.crc.finish() != declared {
            return Err(DecodeError::CrcMismatch);
          }
          if let Some(e) = self.inflater_err.take() {
            return Err(e);
          }
          self.dispatch(buffer)?;
          if self.chunk_ty == ChunkType::IEND {
            self.phase = Phase::Finished;
            return Ok(DecodeProgress::Finished);
          }
          self.phase = Phase::ChunkHeader;
        }
      }
    }
  }

  /// Reads `need` bytes into the stash, or reports starvation.
  fn fill_stash<S: ByteSource + ?Sized>(&mut self, source: &mut S, need: usize) -> bool {
    while self.stash.len() < need {
      match source.read() {
        Some(b) => self.stash.push(b),
        None => return false,
      }
    }
    true
  }

  /// Sets up CRC and payload routing for a chunk. All type-dependent
  /// validation waits for the CRC.
  fn begin_chunk(&mut self, ty: ChunkType, len: u32) -> Result<(), DecodeError> {
    self.crc = Crc32::new();
    self.crc.update(&ty.0);
    self.chunk_ty = ty;
    self.chunk_len = len;
    self.remaining = len;
    self.payload.clear();
    self.keep_payload = matches!(
      ty,
      ChunkType::IHDR
        | ChunkType::PLTE
        | ChunkType::IEND
        | ChunkType::tRNS
        | ChunkType::bKGD
        | ChunkType::gAMA
        | ChunkType::pHYs
        | ChunkType::tIME
    );
    if self.keep_payload && len > MAX_KEPT_PAYLOAD {
      return Err(DecodeError::Structural);
    }
    Ok(())
  }

  /// Applies a chunk's effects. Runs only after its CRC verified.
  fn dispatch<B: PixelBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<(), DecodeError> {
    let ty = self.chunk_ty;

    // the header chunk comes first, exactly once.
    if self.header.is_none() && ty != ChunkType::IHDR {
      return Err(DecodeError::Structural);
    }
    // once image data starts, only more image data or the end chunk.
    if self.seen_idat && ty != ChunkType::IDAT && ty != ChunkType::IEND {
      return Err(DecodeError::Structural);
    }

    match ty {
      ChunkType::IHDR => {
        if self.header.is_some() {
          return Err(DecodeError::Structural);
        }
        let header = Header::from_ihdr(&self.payload)?;
        debug!(
          "IHDR {}x{} {:?} interlaced: {}",
          header.width, header.height, header.format, header.interlaced
        );
        self.interlace = if header.interlaced { Interlace::Adam7 } else { Interlace::Null };
        if !header.format.is_indexed() {
          let created = buffer.create(
            header.width,
            header.height,
            header.format.bit_depth(),
            header.format.color_mode(),
          );
          if !created {
            return Err(DecodeError::BufferFailed);
          }
        }
        self.header = Some(header);
      }

      ChunkType::PLTE => {
        let header = self.header.ok_or(DecodeError::Structural)?;
        if self.palette.is_some() {
          return Err(DecodeError::Structural);
        }
        // grayscale images have no business carrying a palette.
        if matches!(header.format.color_mode(), ColorMode::Y | ColorMode::Ya) {
          return Err(DecodeError::Structural);
        }
        let palette = Palette::from_plte(&self.payload)?;
        debug!("PLTE with {} entries", palette.len());
        if header.format.is_indexed() {
          // indexed output expands through the palette, so the buffer is
          // RGBA8 and only exists once the palette does.
          if !buffer.create(header.width, header.height, 8, ColorMode::Rgba) {
            return Err(DecodeError::BufferFailed);
          }
        }
        self.palette = Some(palette);
      }

      ChunkType::IDAT => {
        let header = self.header.ok_or(DecodeError::Structural)?;
        if header.format.is_indexed() && self.palette.is_none() {
          return Err(DecodeError::Structural);
        }
        self.seen_idat = true;
      }

      ChunkType::IEND => {
        if self.chunk_len != 0 {
          return Err(DecodeError::Structural);
        }
        self.finish_image(buffer)?;
      }

      ChunkType::gAMA => {
        if self.gamma.is_some() || self.payload.len() != 4 {
          return Err(DecodeError::Structural);
        }
        self.gamma = Some(u32::from_be_bytes(self.payload[..].try_into().unwrap()));
      }

      ChunkType::tIME => {
        if self.timestamp.is_some() {
          return Err(DecodeError::Structural);
        }
        self.timestamp = Some(Timestamp::from_payload(&self.payload)?);
      }

      ChunkType::bKGD => {
        let header = self.header.ok_or(DecodeError::Structural)?;
        if self.background.is_some() {
          return Err(DecodeError::Structural);
        }
        self.background = Some(Background::from_payload(&self.payload, header.format)?);
      }

      ChunkType::pHYs => {
        if self.physical.is_some() {
          return Err(DecodeError::Structural);
        }
        self.physical = Some(PhysicalDims::from_payload(&self.payload)?);
      }

      ChunkType::tRNS => {
        let header = self.header.ok_or(DecodeError::Structural)?;
        if self.transparency.is_some() {
          return Err(DecodeError::Structural);
        }
        self.transparency = Some(if header.format.is_indexed() {
          let palette = self.palette.as_mut().ok_or(DecodeError::Structural)?;
          palette.set_alphas(&self.payload)?;
          Transparency::PaletteAlpha
        } else {
          match (header.format.color_mode(), &self.payload[..]) {
            (ColorMode::Y, &[y0, y1]) => Transparency::Luma(u16::from_be_bytes([y0, y1])),
            (ColorMode::Rgb, &[r0, r1, g0, g1, b0, b1]) => Transparency::Rgb {
              r: u16::from_be_bytes([r0, r1]),
              g: u16::from_be_bytes([g0, g1]),
              b: u16::from_be_bytes([b0, b1]),
            },
            // formats with their own alpha channel never carry tRNS.
            _ => return Err(DecodeError::Structural),
          }
        });
      }

      _ => {
        if ty.is_critical() {
          return Err(DecodeError::Structural);
        }
        trace!("skipped ancillary chunk {:?}", ty);
      }
    }
    Ok(())
  }

  /// IEND: the inflater must be finished and its output must expand into
  /// exactly the pixel grid.
  fn finish_image<B: PixelBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<(), DecodeError> {
    let header = self.header.ok_or(DecodeError::Structural)?;
    if !self.seen_idat {
      return Err(DecodeError::Structural);
    }
    if !self.inflater.is_done() {
      return Err(DecodeError::InputTruncated);
    }
    let data = self.inflater.output();
    let expected = self.interlace.expected_stream_len(&header);
    if data.len() != expected {
      return Err(DecodeError::Structural);
    }

    let min_pitch = if header.format.is_indexed() {
      header.width as usize * 4
    } else {
      header.format.bytes_per_scanline(header.width)
    };
    let pitch = buffer.pitch();
    let needed = pitch.checked_mul(header.height as usize).ok_or(DecodeError::BufferFailed)?;
    if pitch < min_pitch {
      return Err(DecodeError::BufferFailed);
    }

    let palette = if header.format.is_indexed() { self.palette.as_ref() } else { None };
    let result = match buffer.lock_write() {
      None => Err(DecodeError::BufferFailed),
      Some(region) => {
        if region.len() < needed {
          Err(DecodeError::BufferFailed)
        } else {
          self.interlace.expand(&header, palette, data, region, pitch)
        }
      }
    };
    // the lock drops on every exit path, error or not.
    buffer.unlock_write();
    result
  }
}

/// Decodes one complete PNG from `source` into `buffer`.
///
/// This is the one-shot entry point: a source that ends early yields
/// [`DecodeError::InputTruncated`]. For resumable decoding keep a
/// [`PngDecoder`] and feed it as bytes arrive.
pub fn load<S, B>(source: &mut S, buffer: &mut B) -> Result<(), DecodeError>
where
  S: ByteSource + ?Sized,
  B: PixelBuffer + ?Sized,
{
  let mut decoder = PngDecoder::new();
  match decoder.feed(source, buffer)? {
    DecodeProgress::Finished => Ok(()),
    DecodeProgress::NeedsMoreInput => Err(DecodeError::InputTruncated),
  }
}
