use super::*;

/// The pixel layouts a PNG can declare.
///
/// Each is one legal `(color_type, bit_depth)` pair from the PNG spec's table
/// of allowed combinations. Anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum PixelMode {
  Y1,
  Y2,
  Y4,
  Y8,
  Y16,
  YA8,
  YA16,
  Index1,
  Index2,
  Index4,
  Index8,
  RGB8,
  RGB16,
  RGBA8,
  RGBA16,
}
impl PixelMode {
  /// Derives the mode from IHDR's color type and bit depth.
  pub fn from_color_type_and_depth(color_type: u8, bit_depth: u8) -> Result<Self> {
    Ok(match (color_type, bit_depth) {
      (0, 1) => Self::Y1,
      (0, 2) => Self::Y2,
      (0, 4) => Self::Y4,
      (0, 8) => Self::Y8,
      (0, 16) => Self::Y16,
      (2, 8) => Self::RGB8,
      (2, 16) => Self::RGB16,
      (3, 1) => Self::Index1,
      (3, 2) => Self::Index2,
      (3, 4) => Self::Index4,
      (3, 8) => Self::Index8,
      (4, 8) => Self::YA8,
      (4, 16) => Self::YA16,
      (6, 8) => Self::RGBA8,
      (6, 16) => Self::RGBA16,
      _ => return Err(FramecastError::UnsupportedPixelMode { color_type, bit_depth }),
    })
  }

  #[inline]
  #[must_use]
  pub const fn color_type(self) -> u8 {
    match self {
      Self::Y1 | Self::Y2 | Self::Y4 | Self::Y8 | Self::Y16 => 0,
      Self::RGB8 | Self::RGB16 => 2,
      Self::Index1 | Self::Index2 | Self::Index4 | Self::Index8 => 3,
      Self::YA8 | Self::YA16 => 4,
      Self::RGBA8 | Self::RGBA16 => 6,
    }
  }

  /// Bits per channel.
  #[inline]
  #[must_use]
  pub const fn bit_depth(self) -> u8 {
    match self {
      Self::Y1 | Self::Index1 => 1,
      Self::Y2 | Self::Index2 => 2,
      Self::Y4 | Self::Index4 => 4,
      Self::Y8 | Self::Index8 | Self::YA8 | Self::RGB8 | Self::RGBA8 => 8,
      Self::Y16 | Self::YA16 | Self::RGB16 | Self::RGBA16 => 16,
    }
  }

  #[inline]
  #[must_use]
  pub const fn channel_count(self) -> usize {
    match self.color_type() {
      0 | 3 => 1,
      4 => 2,
      2 => 3,
      _ => 4,
    }
  }

  #[inline]
  #[must_use]
  pub const fn bits_per_pixel(self) -> usize {
    self.channel_count() * self.bit_depth() as usize
  }

  /// The byte distance filters look back by: one whole pixel, or one byte
  /// when pixels are smaller than a byte.
  #[inline]
  #[must_use]
  pub const fn filter_unit(self) -> usize {
    let bytes = self.bits_per_pixel() / 8;
    if bytes == 0 {
      1
    } else {
      bytes
    }
  }

  /// Bytes of pixel data in one row (not counting the filter byte). Rows with
  /// sub-byte pixels round up to a whole byte.
  #[inline]
  #[must_use]
  pub const fn bytes_per_row(self, width: u32) -> usize {
    (self.bits_per_pixel() * (width as usize) + 7) / 8
  }

  #[inline]
  #[must_use]
  pub const fn is_indexed(self) -> bool {
    self.color_type() == 3
  }

  /// Gray, with or without alpha.
  #[inline]
  #[must_use]
  pub const fn is_grayscale(self) -> bool {
    matches!(self.color_type(), 0 | 4)
  }

  /// RGB, with or without alpha. These are the modes that need quantizing.
  #[inline]
  #[must_use]
  pub const fn is_truecolor(self) -> bool {
    matches!(self.color_type(), 2 | 6)
  }
}

/// Image Header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IHDR {
  /// width in pixels
  pub width: u32,
  /// height in pixels
  pub height: u32,
  /// pixel layout
  pub pixel_mode: PixelMode,
  /// if the image data is stored interlaced.
  pub is_interlaced: bool,
}
impl IHDR {
  /// Payload length of an IHDR chunk.
  pub const LEN: usize = 13;

  /// Header of the 8-bit RGB stream the encoder writes.
  #[inline]
  #[must_use]
  pub const fn rgb8(width: u32, height: u32) -> Self {
    Self { width, height, pixel_mode: PixelMode::RGB8, is_interlaced: false }
  }

  /// Filter byte + pixel bytes for one row of a `width` pixel wide image.
  #[inline]
  #[must_use]
  pub const fn bytes_per_filterline(&self, width: u32) -> usize {
    1 + self.pixel_mode.bytes_per_row(width)
  }

  /// Size of the decompressed (still filtered) data for a frame.
  ///
  /// Fails with `InvalidDimensions` when the size doesn't fit in memory.
  pub fn filtered_len(&self, width: u32, height: u32) -> Result<usize> {
    self
      .pixel_mode
      .bits_per_pixel()
      .checked_mul(width as usize)
      .and_then(|bits| bits.checked_add(7))
      .map(|bits| 1 + bits / 8)
      .and_then(|line| line.checked_mul(height as usize))
      .filter(|&len| len <= isize::MAX as usize)
      .ok_or(FramecastError::InvalidDimensions { width, height })
  }

  #[must_use]
  pub fn to_bytes(&self) -> [u8; Self::LEN] {
    let mut out = [0_u8; Self::LEN];
    out[0..4].copy_from_slice(&self.width.to_be_bytes());
    out[4..8].copy_from_slice(&self.height.to_be_bytes());
    out[8] = self.pixel_mode.bit_depth();
    out[9] = self.pixel_mode.color_type();
    out[10] = 0; // compression: deflate
    out[11] = 0; // filter method: adaptive
    out[12] = self.is_interlaced as u8;
    out
  }
}
impl TryFrom<&[u8]> for IHDR {
  type Error = FramecastError;
  fn try_from(value: &[u8]) -> Result<Self> {
    match value {
      [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, compression_method, filter_method, interlace_method] =>
      {
        let width = u32::from_be_bytes([*w0, *w1, *w2, *w3]);
        let height = u32::from_be_bytes([*h0, *h1, *h2, *h3]);
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
          return Err(FramecastError::InvalidDimensions { width, height });
        }
        if *compression_method != 0 {
          return Err(FramecastError::InvalidHeader("unknown compression method"));
        }
        if *filter_method != 0 {
          return Err(FramecastError::InvalidHeader("unknown filter method"));
        }
        Ok(Self {
          width,
          height,
          pixel_mode: PixelMode::from_color_type_and_depth(*color_type, *bit_depth)?,
          is_interlaced: match interlace_method {
            0 => false,
            1 => true,
            _ => return Err(FramecastError::InvalidHeader("unknown interlace method")),
          },
        })
      }
      _ => Err(FramecastError::InvalidHeader("IHDR must be 13 bytes")),
    }
  }
}

#[test]
fn test_pixel_mode_table() {
  let legal: &[(u8, &[u8])] =
    &[(0, &[1, 2, 4, 8, 16]), (2, &[8, 16]), (3, &[1, 2, 4, 8]), (4, &[8, 16]), (6, &[8, 16])];
  for color_type in 0..=8_u8 {
    for bit_depth in [0_u8, 1, 2, 3, 4, 8, 12, 16, 32] {
      let expected_ok =
        legal.iter().any(|(ct, depths)| *ct == color_type && depths.contains(&bit_depth));
      let got = PixelMode::from_color_type_and_depth(color_type, bit_depth);
      assert_eq!(got.is_ok(), expected_ok, "ct {color_type} depth {bit_depth}");
      if let Ok(mode) = got {
        assert_eq!(mode.color_type(), color_type);
        assert_eq!(mode.bit_depth(), bit_depth);
      }
    }
  }
}

#[test]
fn test_row_sizes() {
  assert_eq!(PixelMode::Y1.bytes_per_row(9), 2);
  assert_eq!(PixelMode::Index2.bytes_per_row(5), 2);
  assert_eq!(PixelMode::Index4.bytes_per_row(3), 2);
  assert_eq!(PixelMode::RGB8.bytes_per_row(4), 12);
  assert_eq!(PixelMode::RGBA16.bytes_per_row(2), 16);
  assert_eq!(PixelMode::Y2.filter_unit(), 1);
  assert_eq!(PixelMode::YA16.filter_unit(), 4);
  assert_eq!(IHDR::rgb8(4, 4).filtered_len(4, 4).unwrap(), 52);
  let wide =
    IHDR { width: 60_000, height: 60_000, pixel_mode: PixelMode::RGBA16, is_interlaced: false };
  assert_eq!(wide.filtered_len(60_000, 60_000).unwrap(), 480_001 * 60_000);
  assert!(matches!(
    wide.filtered_len(i32::MAX as u32, i32::MAX as u32),
    Err(FramecastError::InvalidDimensions { .. })
  ));
}

#[test]
fn test_ihdr_bytes() {
  let ihdr = IHDR::rgb8(640, 480);
  let bytes = ihdr.to_bytes();
  assert_eq!(IHDR::try_from(&bytes[..]).unwrap(), ihdr);
  let mut bad = bytes;
  bad[9] = 5;
  assert!(matches!(
    IHDR::try_from(&bad[..]),
    Err(FramecastError::UnsupportedPixelMode { color_type: 5, bit_depth: 8 })
  ));
  assert!(IHDR::try_from(&bytes[..12]).is_err());
  let mut huge = bytes;
  huge[0] = 0x80;
  assert!(matches!(IHDR::try_from(&huge[..]), Err(FramecastError::InvalidDimensions { .. })));
}
