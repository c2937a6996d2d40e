#![no_std]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

//! A streaming PNG decoder with its own zlib/DEFLATE engine.
//!
//! * [Portable Network Graphics (PNG) Specification][png-spec]
//! * [RFC 1950 (zlib)][rfc1950] / [RFC 1951 (DEFLATE)][rfc1951]
//!
//! [png-spec]: https://www.w3.org/TR/png/
//! [rfc1950]: https://www.rfc-editor.org/rfc/rfc1950
//! [rfc1951]: https://www.rfc-editor.org/rfc/rfc1951
//!
//! The decoder reads a PNG data stream from a [`ByteSource`], validates its
//! structure (signature, chunk ordering, per-chunk CRCs), inflates the image
//! data with the in-crate [`Inflater`], reconstructs the filtered scanlines,
//! and writes row-major pixels into a caller-supplied [`PixelBuffer`] (the
//! provided [`Raster`] or your own).
//!
//! ## One-shot decoding
//!
//! ```
//! # fn demo(png_bytes: &[u8]) -> Result<(), pngflow::DecodeError> {
//! use pngflow::{load, Raster, SliceSource};
//!
//! let mut source = SliceSource::new(png_bytes);
//! let mut raster = Raster::new();
//! load(&mut source, &mut raster)?;
//! # Ok(()) }
//! ```
//!
//! ## Streaming
//!
//! Input may arrive in pieces. Keep a [`PngDecoder`] and feed each piece;
//! all state, including the partially-inflated image data, carries across
//! calls:
//!
//! ```
//! # fn demo(first: &[u8], second: &[u8]) -> Result<(), pngflow::DecodeError> {
//! use pngflow::{DecodeProgress, PngDecoder, Raster, SliceSource};
//!
//! let mut decoder = PngDecoder::new();
//! let mut raster = Raster::new();
//! let progress = decoder.feed(&mut SliceSource::new(first), &mut raster)?;
//! assert_eq!(progress, DecodeProgress::NeedsMoreInput);
//! decoder.feed(&mut SliceSource::new(second), &mut raster)?;
//! # Ok(()) }
//! ```

extern crate alloc;

mod bits;
mod chunk;
mod crc32;
mod decoder;
mod error;
mod filters;
mod header;
mod huffman;
mod inflate;
mod interlace;
mod metadata;
mod raster;
mod source;

pub use crate::{
  chunk::ChunkType,
  crc32::{crc32, Crc32},
  decoder::{load, DecodeProgress, PngDecoder},
  error::{DecodeError, NeedMoreInput},
  header::{Header, PixelFormat, MAX_DIMENSION},
  inflate::{FeedOutcome, Inflater},
  metadata::{Background, Palette, PhysicalDims, Timestamp, Transparency},
  raster::{ColorMode, PixelBuffer, Raster},
  source::{ByteSource, SliceSource},
};
