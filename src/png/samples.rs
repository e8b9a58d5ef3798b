use super::*;

use bitfrob::u8_replicate_bits;

/// The gray ramp a grayscale image of `bit_depth` maps its samples through.
///
/// Depths below 8 scale up by replicating their bit pattern, so the largest
/// sample is always full white. 16-bit images are reduced to their high byte
/// before lookup, so they use the 8-bit ramp.
#[must_use]
pub fn grayscale_palette(bit_depth: u8) -> Vec<RGB8> {
  let depth = u32::from(bit_depth.min(8));
  (0..(1_u32 << depth)).map(|i| RGB8::gray(u8_replicate_bits(depth, i as u8))).collect()
}

/// Spreads the packed samples of one row out to one byte each.
fn unpack_row(bit_depth: u32, row: &[u8], count: usize, out: &mut Vec<u8>) {
  let mask = (1_u32 << bit_depth) - 1;
  let mut acc: u32 = 0;
  let mut acc_bits: u32 = 0;
  let mut bytes = row.iter().copied();
  for _ in 0..count {
    if acc_bits < bit_depth {
      acc = (acc << 8) | u32::from(bytes.next().unwrap_or(0));
      acc_bits += 8;
    }
    acc_bits -= bit_depth;
    out.push(((acc >> acc_bits) & mask) as u8);
  }
}

/// Turns an unfiltered indexed or grayscale raster into one index byte per
/// pixel.
///
/// * Sub-byte depths are expanded, high bits first.
/// * 16-bit samples keep their high byte.
/// * Gray + alpha keeps the gray sample.
///
/// ## Failure
/// * Truecolor modes have no index form.
/// * If `raster` is too short for the dimensions.
pub fn unpack_indices(mode: PixelMode, width: u32, height: u32, raster: &[u8]) -> Result<Vec<u8>> {
  if mode.is_truecolor() {
    return Err(FramecastError::UnsupportedPixelMode {
      color_type: mode.color_type(),
      bit_depth: mode.bit_depth(),
    });
  }
  let row_len = mode.bytes_per_row(width);
  if raster.len() < row_len * height as usize {
    return Err(FramecastError::UnexpectedEof);
  }
  let w = width as usize;
  let mut out = Vec::with_capacity(w * height as usize);
  for row in raster.chunks_exact(row_len).take(height as usize) {
    match mode {
      PixelMode::Y1 | PixelMode::Y2 | PixelMode::Y4
      | PixelMode::Index1 | PixelMode::Index2 | PixelMode::Index4 => {
        unpack_row(u32::from(mode.bit_depth()), row, w, &mut out)
      }
      PixelMode::Y8 | PixelMode::Index8 => out.extend_from_slice(row),
      PixelMode::Y16 => out.extend(row.chunks_exact(2).map(|s| s[0])),
      PixelMode::YA8 => out.extend(row.chunks_exact(2).map(|s| s[0])),
      PixelMode::YA16 => out.extend(row.chunks_exact(4).map(|s| s[0])),
      PixelMode::RGB8 | PixelMode::RGB16 | PixelMode::RGBA8 | PixelMode::RGBA16 => unreachable!(),
    }
  }
  Ok(out)
}

/// Turns an unfiltered raster of any mode into flat 8-bit RGB.
///
/// Indexed and grayscale samples go through `palette` (indexes past its end
/// come out black). Truecolor ignores `palette`, drops alpha, and keeps the
/// high byte of 16-bit channels.
///
/// ## Failure
/// * If `raster` is too short for the dimensions.
pub fn unpack_samples(
  mode: PixelMode, width: u32, height: u32, palette: &[RGB8], raster: &[u8],
) -> Result<Vec<u8>> {
  let pixel_count = width as usize * height as usize;
  if !mode.is_truecolor() {
    let indices = unpack_indices(mode, width, height, raster)?;
    let mut out = Vec::with_capacity(pixel_count * 3);
    for i in indices {
      let c = palette.get(usize::from(i)).copied().unwrap_or_default();
      out.extend_from_slice(&[c.r, c.g, c.b]);
    }
    return Ok(out);
  }
  let row_len = mode.bytes_per_row(width);
  if raster.len() < row_len * height as usize {
    return Err(FramecastError::UnexpectedEof);
  }
  let raster = &raster[..row_len * height as usize];
  let out = match mode {
    PixelMode::RGB8 => raster.to_vec(),
    PixelMode::RGBA8 => raster.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
    PixelMode::RGB16 => raster.chunks_exact(6).flat_map(|p| [p[0], p[2], p[4]]).collect(),
    PixelMode::RGBA16 => raster.chunks_exact(8).flat_map(|p| [p[0], p[2], p[4]]).collect(),
    _ => unreachable!(),
  };
  debug_assert_eq!(out.len(), pixel_count * 3);
  Ok(out)
}

#[test]
fn test_grayscale_palette() {
  let p1 = grayscale_palette(1);
  assert_eq!(p1, [RGB8::BLACK, RGB8::WHITE]);
  let p2 = grayscale_palette(2);
  assert_eq!(p2.iter().map(|c| c.r).collect::<Vec<_>>(), [0, 0x55, 0xAA, 0xFF]);
  assert_eq!(grayscale_palette(8).len(), 256);
  assert_eq!(grayscale_palette(16).len(), 256);
}

#[test]
fn test_unpack_sub_byte() {
  // 1-bit, width 10: the second byte of each row holds two pixels + padding
  let raster = [0b1010_0000, 0b1100_0000, 0b0000_0001, 0b0100_0000];
  let got = unpack_indices(PixelMode::Y1, 10, 2, &raster).unwrap();
  assert_eq!(got, [1, 0, 1, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1]);
  // 2-bit, width 5, crossing the byte boundary
  let raster = [0b00_01_10_11, 0b11_000000];
  assert_eq!(unpack_indices(PixelMode::Index2, 5, 1, &raster).unwrap(), [0, 1, 2, 3, 3]);
  // 4-bit
  assert_eq!(unpack_indices(PixelMode::Index4, 3, 1, &[0xAB, 0xC0]).unwrap(), [10, 11, 12]);
}

#[test]
fn test_unpack_to_rgb() {
  let palette = [RGB8::new(1, 2, 3), RGB8::new(4, 5, 6)];
  let rgb = unpack_samples(PixelMode::Index8, 3, 1, &palette, &[1, 0, 9]).unwrap();
  assert_eq!(rgb, [4, 5, 6, 1, 2, 3, 0, 0, 0]);

  let rgba16 = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
  assert_eq!(unpack_samples(PixelMode::RGBA16, 1, 1, &[], &rgba16).unwrap(), [0x12, 0x56, 0x9A]);

  let gray = grayscale_palette(8);
  let ya8 = [10, 255, 200, 0];
  assert_eq!(unpack_samples(PixelMode::YA8, 2, 1, &gray, &ya8).unwrap(), [10, 10, 10, 200, 200, 200]);

  assert!(unpack_indices(PixelMode::RGB8, 1, 1, &[0, 0, 0]).is_err());
  assert!(unpack_samples(PixelMode::RGB8, 2, 1, &[], &[0, 0, 0]).is_err());
}
