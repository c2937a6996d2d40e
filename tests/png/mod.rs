#![allow(bad_style)]

use pngflow::{
  load, Background, ColorMode, Crc32, DecodeError, DecodeProgress, PhysicalDims, PngDecoder,
  Raster, SliceSource, Timestamp, Transparency, MAX_DIMENSION,
};

// stream construction helpers: these play the encoder's role.

fn chunk(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
  let mut v = Vec::new();
  v.extend_from_slice(&(payload.len() as u32).to_be_bytes());
  v.extend_from_slice(ty);
  v.extend_from_slice(payload);
  let mut crc = Crc32::new();
  crc.update(ty);
  crc.update(payload);
  v.extend_from_slice(&crc.finish().to_be_bytes());
  v
}

fn ihdr(width: u32, height: u32, depth: u8, color: u8, interlace: u8) -> Vec<u8> {
  let mut p = Vec::new();
  p.extend_from_slice(&width.to_be_bytes());
  p.extend_from_slice(&height.to_be_bytes());
  p.extend_from_slice(&[depth, color, 0, 0, interlace]);
  chunk(b"IHDR", &p)
}

fn idat(filtered: &[u8]) -> Vec<u8> {
  chunk(b"IDAT", &miniz_oxide::deflate::compress_to_vec_zlib(filtered, 6))
}

fn png_stream(chunks: &[Vec<u8>]) -> Vec<u8> {
  let mut v = vec![137, 80, 78, 71, 13, 10, 26, 10];
  for c in chunks {
    v.extend_from_slice(c);
  }
  v.extend_from_slice(&chunk(b"IEND", &[]));
  v
}

fn decode(stream: &[u8]) -> Result<Raster, DecodeError> {
  let mut raster = Raster::new();
  load(&mut SliceSource::new(stream), &mut raster)?;
  Ok(raster)
}

// encoder-side filtering, for round-trip tests.

fn paeth(a: u8, b: u8, c: u8) -> u8 {
  let (a_, b_, c_) = (i32::from(a), i32::from(b), i32::from(c));
  let p = a_ + b_ - c_;
  let (pa, pb, pc) = ((p - a_).abs(), (p - b_).abs(), (p - c_).abs());
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

fn filter_row(filter: u8, raw: &[u8], above: &[u8], unit: usize) -> Vec<u8> {
  let mut out = Vec::with_capacity(1 + raw.len());
  out.push(filter);
  for (i, &x) in raw.iter().enumerate() {
    let a = if i >= unit { raw[i - unit] } else { 0 };
    let b = above[i];
    let c = if i >= unit { above[i - unit] } else { 0 };
    out.push(match filter {
      0 => x,
      1 => x.wrapping_sub(a),
      2 => x.wrapping_sub(b),
      3 => x.wrapping_sub((u16::from(a) + u16::from(b)).wrapping_div(2) as u8),
      4 => x.wrapping_sub(paeth(a, b, c)),
      _ => unreachable!(),
    });
  }
  out
}

#[test]
fn test_rgba_2x2_no_filters() {
  let filtered = [
    0, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, //
    0, 0x11, 0x21, 0x31, 0x41, 0x51, 0x61, 0x71, 0x81,
  ];
  let stream = png_stream(&[ihdr(2, 2, 8, 6, 0), idat(&filtered)]);
  let raster = decode(&stream).unwrap();
  assert_eq!(raster.width(), 2);
  assert_eq!(raster.height(), 2);
  assert_eq!(raster.color_mode(), Some(ColorMode::Rgba));
  assert_eq!(raster.row(0), &filtered[1..9]);
  assert_eq!(raster.row(1), &filtered[10..18]);
}

#[test]
fn test_gray_3x1_sub_filter() {
  // 01 10 05 FA reconstructs to 10 15 0F.
  let stream = png_stream(&[ihdr(3, 1, 8, 0, 0), idat(&[0x01, 0x10, 0x05, 0xFA])]);
  let raster = decode(&stream).unwrap();
  assert_eq!(raster.row(0), &[0x10, 0x15, 0x0F]);
}

#[test]
fn test_gray_1x3_up_filter() {
  // rows 10, 15, 18 out of Up-filtered deltas.
  let stream =
    png_stream(&[ihdr(1, 3, 8, 0, 0), idat(&[0x00, 0x10, 0x02, 0x05, 0x02, 0x03])]);
  let raster = decode(&stream).unwrap();
  assert_eq!(raster.row(0), &[0x10]);
  assert_eq!(raster.row(1), &[0x15]);
  assert_eq!(raster.row(2), &[0x18]);
}

#[test]
fn test_all_filters_round_trip() {
  // a 4x5 RGB8 image exercising every filter type, one per row.
  let w = 4_usize;
  let unit = 3_usize;
  let mut rows: Vec<Vec<u8>> = Vec::new();
  for y in 0..5_usize {
    rows.push((0..w * unit).map(|i| (i * 17 + y * 61) as u8).collect());
  }
  let zero = vec![0_u8; w * unit];
  let mut filtered = Vec::new();
  for (y, row) in rows.iter().enumerate() {
    let above = if y == 0 { &zero } else { &rows[y - 1] };
    filtered.extend_from_slice(&filter_row(y as u8, row, above, unit));
  }
  let stream = png_stream(&[ihdr(w as u32, 5, 8, 2, 0), idat(&filtered)]);
  let raster = decode(&stream).unwrap();
  for (y, row) in rows.iter().enumerate() {
    assert_eq!(raster.row(y as u32), row.as_slice(), "row {y}");
  }
}

fn checkerboard(x: u32, y: u32) -> u8 {
  if (x + y) % 2 == 0 {
    0xFF
  } else {
    0x00
  }
}

fn adam7_scanlines(w: u32, h: u32, pixel: fn(u32, u32) -> u8) -> Vec<u8> {
  // (col_off, col_step, row_off, row_step) per pass.
  const PASSES: [(u32, u32, u32, u32); 7] =
    [(0, 8, 0, 8), (4, 8, 0, 8), (0, 4, 4, 8), (2, 4, 0, 4), (0, 2, 2, 4), (1, 2, 0, 2), (0, 1, 1, 2)];
  let mut out = Vec::new();
  for (co, cs, ro, rs) in PASSES {
    let sw = if w > co { (w - co + cs - 1) / cs } else { 0 };
    let sh = if h > ro { (h - ro + rs - 1) / rs } else { 0 };
    if sw == 0 || sh == 0 {
      continue;
    }
    for sy in 0..sh {
      out.push(0); // filter: None
      for sx in 0..sw {
        out.push(pixel(co + sx * cs, ro + sy * rs));
      }
    }
  }
  out
}

#[test]
fn test_adam7_checkerboard_matches_progressive() {
  let mut progressive = Vec::new();
  for y in 0..8 {
    progressive.push(0);
    for x in 0..8 {
      progressive.push(checkerboard(x, y));
    }
  }
  let plain = decode(&png_stream(&[ihdr(8, 8, 8, 0, 0), idat(&progressive)])).unwrap();

  let interlaced_data = adam7_scanlines(8, 8, checkerboard);
  let interlaced =
    decode(&png_stream(&[ihdr(8, 8, 8, 0, 1), idat(&interlaced_data)])).unwrap();

  assert_eq!(plain.data(), interlaced.data());
  assert_eq!(interlaced.row(0), &[0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0]);
}

#[test]
fn test_adam7_2x2_rgba() {
  // 2x2 interlaced RGBA: pass 1 carries (0,0), pass 6 (1,0), pass 7 the
  // bottom row.
  let px = |x: u32, y: u32| [0x10 + (x + 2 * y) as u8, 0x20, 0x30, 0x40];
  let mut data = Vec::new();
  data.push(0);
  data.extend_from_slice(&px(0, 0));
  data.push(0);
  data.extend_from_slice(&px(1, 0));
  data.push(0);
  data.extend_from_slice(&px(0, 1));
  data.extend_from_slice(&px(1, 1));
  let raster = decode(&png_stream(&[ihdr(2, 2, 8, 6, 1), idat(&data)])).unwrap();
  assert_eq!(&raster.row(0)[..4], &px(0, 0));
  assert_eq!(&raster.row(0)[4..], &px(1, 0));
  assert_eq!(&raster.row(1)[..4], &px(0, 1));
  assert_eq!(&raster.row(1)[4..], &px(1, 1));
}

#[test]
fn test_adam7_sub_byte_depth() {
  // 8x8 1-bit checkerboard, interlaced, against its progressive twin.
  let bit = |x: u32, y: u32| ((x + y) % 2) as u8;
  let mut progressive = Vec::new();
  for y in 0..8_u32 {
    progressive.push(0);
    let mut byte = 0_u8;
    for x in 0..8_u32 {
      byte = byte << 1 | bit(x, y);
    }
    progressive.push(byte);
  }
  let plain = decode(&png_stream(&[ihdr(8, 8, 1, 0, 0), idat(&progressive)])).unwrap();

  // interlaced passes for 1-bit data: pack each pass row MSB-first.
  const PASSES: [(u32, u32, u32, u32); 7] =
    [(0, 8, 0, 8), (4, 8, 0, 8), (0, 4, 4, 8), (2, 4, 0, 4), (0, 2, 2, 4), (1, 2, 0, 2), (0, 1, 1, 2)];
  let mut data = Vec::new();
  for (co, cs, ro, rs) in PASSES {
    let sw = if 8 > co { (8 - co + cs - 1) / cs } else { 0 };
    let sh = if 8 > ro { (8 - ro + rs - 1) / rs } else { 0 };
    if sw == 0 || sh == 0 {
      continue;
    }
    for sy in 0..sh {
      data.push(0);
      let mut byte = 0_u8;
      let mut used = 0;
      for sx in 0..sw {
        byte = byte << 1 | bit(co + sx * cs, ro + sy * rs);
        used += 1;
        if used == 8 {
          data.push(byte);
          byte = 0;
          used = 0;
        }
      }
      if used > 0 {
        data.push(byte << (8 - used));
      }
    }
  }
  let interlaced = decode(&png_stream(&[ihdr(8, 8, 1, 0, 1), idat(&data)])).unwrap();
  assert_eq!(plain.data(), interlaced.data());
}

#[test]
fn test_crc_corruption_detected_everywhere() {
  let good = png_stream(&[ihdr(2, 2, 8, 6, 0), idat(&[0; 18])]);
  // flip every byte of the IHDR chunk's type and payload in turn: offsets
  // 12..29 (after 8 signature + 4 length bytes).
  for at in 12..29 {
    let mut bad = good.clone();
    bad[at] ^= 0xFF;
    let mut raster = Raster::new();
    let err = load(&mut SliceSource::new(&bad), &mut raster).unwrap_err();
    assert_eq!(err, DecodeError::CrcMismatch, "offset {at}");
    assert!(!raster.is_created(), "offset {at}");
  }
  // flipping the declared CRC itself does the same.
  let mut bad = good;
  bad[29] ^= 0x01;
  let mut raster = Raster::new();
  assert_eq!(
    load(&mut SliceSource::new(&bad), &mut raster),
    Err(DecodeError::CrcMismatch)
  );
  assert!(!raster.is_created());
}

#[test]
fn test_truncated_idat_then_resume() {
  let filtered = [0x01, 0x10, 0x05, 0xFA];
  let stream = png_stream(&[ihdr(3, 1, 8, 0, 0), idat(&filtered)]);
  // cut inside the IDAT payload.
  let cut = stream.len() - 20;

  // one-shot decoding reports truncation.
  let mut raster = Raster::new();
  assert_eq!(
    load(&mut SliceSource::new(&stream[..cut]), &mut raster),
    Err(DecodeError::InputTruncated)
  );

  // the same in-progress decode picks up where it left off.
  let mut decoder = PngDecoder::new();
  let mut raster = Raster::new();
  let progress = decoder.feed(&mut SliceSource::new(&stream[..cut]), &mut raster).unwrap();
  assert_eq!(progress, DecodeProgress::NeedsMoreInput);
  let progress = decoder.feed(&mut SliceSource::new(&stream[cut..]), &mut raster).unwrap();
  assert_eq!(progress, DecodeProgress::Finished);
  assert_eq!(raster.row(0), &[0x10, 0x15, 0x0F]);
}

#[test]
fn test_idat_repacketization_equivalence() {
  let filtered = [0x01, 0x10, 0x05, 0xFA];
  let zlib = miniz_oxide::deflate::compress_to_vec_zlib(&filtered, 6);

  let single = png_stream(&[ihdr(3, 1, 8, 0, 0), chunk(b"IDAT", &zlib)]);
  let reference = decode(&single).unwrap();

  // the same zlib bytes as one IDAT chunk per byte.
  let mut chunks = vec![ihdr(3, 1, 8, 0, 0)];
  for b in &zlib {
    chunks.push(chunk(b"IDAT", &[*b]));
  }
  let shredded = decode(&png_stream(&chunks)).unwrap();
  assert_eq!(reference.data(), shredded.data());
}

#[test]
fn test_one_by_one_every_format() {
  // (depth, color type, filtered scanline, expected raster row)
  let cases: &[(u8, u8, &[u8], &[u8])] = &[
    (1, 0, &[0, 0x80], &[0x80]),
    (2, 0, &[0, 0x40], &[0x40]),
    (4, 0, &[0, 0x90], &[0x90]),
    (8, 0, &[0, 0x7F], &[0x7F]),
    (16, 0, &[0, 0x12, 0x34], &[0x12, 0x34]),
    (8, 2, &[0, 1, 2, 3], &[1, 2, 3]),
    (16, 2, &[0, 1, 2, 3, 4, 5, 6], &[1, 2, 3, 4, 5, 6]),
    (8, 4, &[0, 0x55, 0xAA], &[0x55, 0xAA]),
    (16, 4, &[0, 1, 2, 3, 4], &[1, 2, 3, 4]),
    (8, 6, &[0, 9, 8, 7, 6], &[9, 8, 7, 6]),
    (16, 6, &[0, 1, 2, 3, 4, 5, 6, 7, 8], &[1, 2, 3, 4, 5, 6, 7, 8]),
  ];
  for &(depth, color, filtered, expected) in cases {
    let stream = png_stream(&[ihdr(1, 1, depth, color, 0), idat(filtered)]);
    let raster = decode(&stream).unwrap();
    assert_eq!(raster.row(0), expected, "depth {depth} color {color}");
  }

  // indexed formats go through the palette into RGBA8.
  let palette = [10, 20, 30, 40, 50, 60]; // two RGB entries
  let indexed: &[(u8, &[u8])] = &[
    (1, &[0, 0x80]), // index 1 in the top bit
    (2, &[0, 0x40]), // index 1 in the top two bits
    (4, &[0, 0x10]), // index 1 in the top nibble
    (8, &[0, 0x01]),
  ];
  for &(depth, filtered) in indexed {
    let stream =
      png_stream(&[ihdr(1, 1, depth, 3, 0), chunk(b"PLTE", &palette), idat(filtered)]);
    let raster = decode(&stream).unwrap();
    assert_eq!(raster.row(0), &[40, 50, 60, 0xFF], "depth {depth}");
  }
}

#[test]
fn test_dimension_policy_bounds() {
  // 2^23 x 1 in 1-bit grayscale decodes (the row is a megabyte of zeros).
  let row_bytes = (MAX_DIMENSION / 8) as usize;
  let filtered = vec![0_u8; 1 + row_bytes];
  let stream = png_stream(&[ihdr(MAX_DIMENSION, 1, 1, 0, 0), idat(&filtered)]);
  let raster = decode(&stream).unwrap();
  assert_eq!(raster.width(), MAX_DIMENSION);

  // one more pixel is rejected at the header.
  let stream = png_stream(&[ihdr(MAX_DIMENSION + 1, 1, 1, 0, 0)]);
  assert_eq!(decode(&stream), Err(DecodeError::HeaderInvalid));
}

#[test]
fn test_sub_byte_trailing_bits_ignored() {
  // width 3 at 2 bits per pixel: samples 1, 2, 3 pack into the top six
  // bits; the trailing two bits are junk the decoder must mask out.
  let stream = png_stream(&[ihdr(3, 1, 2, 0, 0), idat(&[0, 0b01_10_11_11])]);
  let raster = decode(&stream).unwrap();
  assert_eq!(raster.row(0), &[0b01_10_11_00]);
}

#[test]
fn test_unknown_chunks() {
  let filtered = [0, 0x42];
  // an unknown ancillary chunk is skipped.
  let stream = png_stream(&[
    ihdr(1, 1, 8, 0, 0),
    chunk(b"juNk", &[1, 2, 3, 4, 5]),
    idat(&filtered),
  ]);
  assert_eq!(decode(&stream).unwrap().row(0), &[0x42]);

  // but its CRC still has to be right.
  let mut bad_crc = chunk(b"juNk", &[1, 2, 3, 4, 5]);
  let pos = bad_crc.len() - 1;
  bad_crc[pos] ^= 0xFF;
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0), bad_crc, idat(&filtered)]);
  assert_eq!(decode(&stream), Err(DecodeError::CrcMismatch));

  // an unknown critical chunk is fatal.
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0), chunk(b"JuNk", &[0]), idat(&filtered)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
}

#[test]
fn test_chunk_ordering_violations() {
  let filtered = [0, 0x42];
  // duplicate IHDR.
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0), ihdr(1, 1, 8, 0, 0), idat(&filtered)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));

  // duplicate gAMA.
  let gama = chunk(b"gAMA", &45455_u32.to_be_bytes());
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0), gama.clone(), gama.clone(), idat(&filtered)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));

  // a metadata chunk between two IDATs breaks the run.
  let zlib = miniz_oxide::deflate::compress_to_vec_zlib(&filtered, 6);
  let (a, b) = zlib.split_at(zlib.len() / 2);
  let stream =
    png_stream(&[ihdr(1, 1, 8, 0, 0), chunk(b"IDAT", a), gama, chunk(b"IDAT", b)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));

  // anything before IHDR is misordered.
  let stream = png_stream(&[chunk(b"gAMA", &45455_u32.to_be_bytes()), ihdr(1, 1, 8, 0, 0)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));

  // IEND with no image data at all.
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));

  // indexed color without a palette.
  let stream = png_stream(&[ihdr(1, 1, 8, 3, 0), idat(&filtered)]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
}

#[test]
fn test_indexed_with_transparency() {
  let palette = [1, 2, 3, 4, 5, 6, 7, 8, 9]; // three entries
  let trns = [0x11, 0x22]; // alpha for the first two
  let filtered = [0, 0, 1, 2, 0]; // indexes across a 4x1 row
  let stream = png_stream(&[
    ihdr(4, 1, 8, 3, 0),
    chunk(b"PLTE", &palette),
    chunk(b"tRNS", &trns),
    idat(&filtered),
  ]);
  let raster = decode(&stream).unwrap();
  assert_eq!(
    raster.row(0),
    &[1, 2, 3, 0x11, 4, 5, 6, 0x22, 7, 8, 9, 0xFF, 1, 2, 3, 0x11]
  );

  // an index past the palette is structural corruption.
  let stream = png_stream(&[
    ihdr(4, 1, 8, 3, 0),
    chunk(b"PLTE", &palette[..3]), // one entry only
    idat(&filtered),
  ]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
}

#[test]
fn test_16bit_bytes_preserved_big_endian() {
  // 2x2 Y16 with an Up-filtered second row; output rows carry the raw
  // big-endian sample bytes.
  let row0 = [0x12, 0x34, 0xAB, 0xCD];
  let delta = [0x01, 0x00, 0x00, 0x01];
  let mut filtered = vec![0];
  filtered.extend_from_slice(&row0);
  filtered.push(2);
  filtered.extend_from_slice(&delta);
  let stream = png_stream(&[ihdr(2, 2, 16, 0, 0), idat(&filtered)]);
  let raster = decode(&stream).unwrap();
  assert_eq!(raster.row(0), &row0);
  assert_eq!(raster.row(1), &[0x13, 0x34, 0xAB, 0xCE]);
}

#[test]
fn test_metadata_accessors() {
  let filtered = [0, 0x42];
  let mut time = Vec::new();
  time.extend_from_slice(&2003_u16.to_be_bytes());
  time.extend_from_slice(&[11, 10, 9, 8, 7]);
  let mut phys = Vec::new();
  phys.extend_from_slice(&2835_u32.to_be_bytes());
  phys.extend_from_slice(&2835_u32.to_be_bytes());
  phys.push(1);
  let stream = png_stream(&[
    ihdr(1, 1, 8, 0, 0),
    chunk(b"gAMA", &45455_u32.to_be_bytes()),
    chunk(b"tIME", &time),
    chunk(b"pHYs", &phys),
    chunk(b"bKGD", &[0x01, 0x00]),
    chunk(b"tRNS", &[0x00, 0x42]),
    idat(&filtered),
  ]);
  let mut decoder = PngDecoder::new();
  let mut raster = Raster::new();
  let progress = decoder.feed(&mut SliceSource::new(&stream), &mut raster).unwrap();
  assert_eq!(progress, DecodeProgress::Finished);

  assert_eq!(decoder.gamma(), Some(45455));
  assert_eq!(
    decoder.timestamp(),
    Some(Timestamp { year: 2003, month: 11, day: 10, hour: 9, minute: 8, second: 7 })
  );
  assert_eq!(
    decoder.physical_dimensions(),
    Some(PhysicalDims { ppu_x: 2835, ppu_y: 2835, is_meters: true })
  );
  assert_eq!(decoder.background(), Some(Background::Luma(256)));
  assert_eq!(decoder.transparency(), Some(Transparency::Luma(0x42)));
  let header = decoder.header().unwrap();
  assert_eq!((header.width, header.height), (1, 1));
}

#[test]
fn test_bad_signature() {
  let mut stream = png_stream(&[ihdr(1, 1, 8, 0, 0), idat(&[0, 0])]);
  stream[0] = b'J';
  assert_eq!(decode(&stream), Err(DecodeError::BadSignature));
}

#[test]
fn test_invalid_filter_byte() {
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0), idat(&[9, 0x42])]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
}

#[test]
fn test_scanline_stream_length_mismatch() {
  // one spare byte after the only scanline.
  let stream = png_stream(&[ihdr(1, 1, 8, 0, 0), idat(&[0, 0x42, 0x00])]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
  // a missing scanline.
  let stream = png_stream(&[ihdr(1, 2, 8, 0, 0), idat(&[0, 0x42])]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
}

#[test]
fn test_trns_rejected_for_alpha_formats() {
  let stream = png_stream(&[
    ihdr(1, 1, 8, 6, 0),
    chunk(b"tRNS", &[0, 0, 0, 0, 0, 0]),
    idat(&[0, 1, 2, 3, 4]),
  ]);
  assert_eq!(decode(&stream), Err(DecodeError::Structural));
}

#[test]
fn test_missing_iend_is_truncation() {
  let mut stream = png_stream(&[ihdr(1, 1, 8, 0, 0), idat(&[0, 0x42])]);
  stream.truncate(stream.len() - 12); // drop the IEND chunk
  assert_eq!(decode(&stream), Err(DecodeError::InputTruncated));
}
