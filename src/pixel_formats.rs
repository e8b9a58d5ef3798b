//! Module for pixel formats.
//!
//! Everything past the decoder works in 8-bit RGB, so that's the only pixel
//! type the crate needs. Rasters are stored as flat `[u8]` with three bytes per
//! pixel, and [`bytemuck`] lets those be viewed as `[RGB8]` when that's nicer.
//!
//! ## Luma and Hue
//!
//! The accurate color metric compares colors by their RGB distance plus their
//! luma and hue distance.
//! ```text
//! Y = 0.299 * R + 0.587 * G + 0.114 * B
//! ```
//! Hue is the usual HSV hue in degrees, `0.0..360.0`, with gray values (all
//! three channels equal) having a hue of 0.

use bytemuck::{Pod, Zeroable};

/// An RGB value, 8-bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RGB8 {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}
impl RGB8 {
  /// Black.
  pub const BLACK: Self = Self::new(0, 0, 0);
  /// White.
  pub const WHITE: Self = Self::new(255, 255, 255);

  #[inline]
  #[must_use]
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b }
  }

  /// A gray value with all three channels equal.
  #[inline]
  #[must_use]
  pub const fn gray(y: u8) -> Self {
    Self { r: y, g: y, b: y }
  }

  /// Builds a color from the first three bytes of `bytes`.
  ///
  /// ## Panics
  /// * If `bytes` is shorter than 3.
  #[inline]
  #[must_use]
  pub fn from_slice(bytes: &[u8]) -> Self {
    Self { r: bytes[0], g: bytes[1], b: bytes[2] }
  }

  /// The index of this color within a 256³ RGB table.
  #[inline]
  #[must_use]
  pub const fn packed(self) -> usize {
    ((self.r as usize) << 16) | ((self.g as usize) << 8) | (self.b as usize)
  }

  /// Reverses [`packed`](Self::packed).
  #[inline]
  #[must_use]
  pub const fn from_packed(i: usize) -> Self {
    Self { r: (i >> 16) as u8, g: (i >> 8) as u8, b: i as u8 }
  }

  /// Rounded luma, `round(0.299r + 0.587g + 0.114b)`, clamped to 255.
  #[inline]
  #[must_use]
  pub fn luma(self) -> u8 {
    let y = 0.299 * f32::from(self.r) + 0.587 * f32::from(self.g) + 0.114 * f32::from(self.b);
    y.round().min(255.0) as u8
  }

  /// HSV hue in degrees.
  #[must_use]
  pub fn hue(self) -> f32 {
    let r = f32::from(self.r) / 255.0;
    let g = f32::from(self.g) / 255.0;
    let b = f32::from(self.b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if delta == 0.0 {
      return 0.0;
    }
    let h = if max == r {
      60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
      60.0 * ((b - r) / delta + 2.0)
    } else {
      60.0 * ((r - g) / delta + 4.0)
    };
    if h >= 360.0 {
      h - 360.0
    } else {
      h
    }
  }
}
impl From<[u8; 3]> for RGB8 {
  #[inline]
  fn from([r, g, b]: [u8; 3]) -> Self {
    Self { r, g, b }
  }
}
impl From<RGB8> for [u8; 3] {
  #[inline]
  fn from(RGB8 { r, g, b }: RGB8) -> Self {
    [r, g, b]
  }
}

#[test]
fn test_array_conversions() {
  let c: RGB8 = [1, 2, 3].into();
  assert_eq!(c, RGB8::new(1, 2, 3));
  assert_eq!(<[u8; 3]>::from(RGB8::WHITE), [255; 3]);
}

#[test]
fn test_luma() {
  assert_eq!(RGB8::BLACK.luma(), 0);
  assert_eq!(RGB8::WHITE.luma(), 255);
  assert_eq!(RGB8::new(255, 0, 0).luma(), 76);
  assert_eq!(RGB8::new(0, 255, 0).luma(), 150);
  assert_eq!(RGB8::new(0, 0, 255).luma(), 29);
}

#[test]
fn test_hue() {
  assert_eq!(RGB8::gray(77).hue(), 0.0);
  assert_eq!(RGB8::new(255, 0, 0).hue(), 0.0);
  assert_eq!(RGB8::new(0, 255, 0).hue(), 120.0);
  assert_eq!(RGB8::new(0, 0, 255).hue(), 240.0);
  assert_eq!(RGB8::new(255, 255, 0).hue(), 60.0);
  assert_eq!(RGB8::new(255, 0, 255).hue(), 300.0);
}

#[test]
fn test_packed() {
  let c = RGB8::new(1, 2, 3);
  assert_eq!(c.packed(), 0x010203);
  assert_eq!(RGB8::from_packed(0x010203), c);
}
