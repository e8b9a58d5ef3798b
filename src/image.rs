#![forbid(unsafe_code)]

//! Provides the heap-allocated RGB image type that frames travel in.

use crate::{
  error::{FramecastError, Result},
  pixel_formats::RGB8,
};

/// Converts an `(x,y)` position within a given `width` 2D space into a linear
/// index.
#[inline]
#[must_use]
pub const fn xy_width_to_index(x: u32, y: u32, width: u32) -> usize {
  (y as usize) * (width as usize) + (x as usize)
}

/// A direct-color image, three bytes per pixel, rows top to bottom.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RgbImage {
  width: u32,
  height: u32,
  data: Vec<u8>,
}
impl core::fmt::Debug for RgbImage {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("RgbImage")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("data", &(&self.data[..self.data.len().min(12)], self.data.len()))
      .finish()
  }
}
impl RgbImage {
  /// An all-black image.
  #[must_use]
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height, data: vec![0; (width as usize) * (height as usize) * 3] }
  }

  /// Wraps existing RGB bytes.
  ///
  /// ## Failure
  /// * If `data` isn't exactly `width * height * 3` bytes.
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
    if data.len() != (width as usize) * (height as usize) * 3 {
      return Err(FramecastError::InvalidDimensions { width, height });
    }
    Ok(Self { width, height, data })
  }

  /// Builds an image by calling `op(x, y)` for every pixel.
  #[must_use]
  pub fn from_fn(width: u32, height: u32, mut op: impl FnMut(u32, u32) -> RGB8) -> Self {
    let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
    for y in 0..height {
      for x in 0..width {
        data.extend_from_slice(&<[u8; 3]>::from(op(x, y)));
      }
    }
    Self { width, height, data }
  }

  #[inline]
  #[must_use]
  pub const fn width(&self) -> u32 {
    self.width
  }

  #[inline]
  #[must_use]
  pub const fn height(&self) -> u32 {
    self.height
  }

  /// The raw RGB bytes.
  #[inline]
  #[must_use]
  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  /// The raw RGB bytes, mutably.
  #[inline]
  #[must_use]
  pub fn as_bytes_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }

  /// The pixels as a slice of [`RGB8`].
  #[inline]
  #[must_use]
  pub fn pixels(&self) -> &[RGB8] {
    bytemuck::cast_slice(&self.data)
  }

  /// Unwraps the raw RGB bytes.
  #[inline]
  #[must_use]
  pub fn into_raw(self) -> Vec<u8> {
    self.data
  }

  /// The bytes of row `y`.
  ///
  /// ## Panics
  /// * If `y` is out of bounds.
  #[inline]
  #[must_use]
  pub fn row(&self, y: u32) -> &[u8] {
    let stride = self.width as usize * 3;
    &self.data[(y as usize) * stride..][..stride]
  }

  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get(&self, x: u32, y: u32) -> Option<RGB8> {
    if x < self.width && y < self.height {
      let i = xy_width_to_index(x, y, self.width) * 3;
      Some(RGB8::from_slice(&self.data[i..]))
    } else {
      None
    }
  }

  /// Sets the pixel at the position. Out of bounds positions are ignored.
  #[inline]
  pub fn put(&mut self, x: u32, y: u32, color: RGB8) {
    if x < self.width && y < self.height {
      let i = xy_width_to_index(x, y, self.width) * 3;
      self.data[i..i + 3].copy_from_slice(&<[u8; 3]>::from(color));
    }
  }
}

#[test]
fn test_rgb_image_access() {
  let mut img = RgbImage::new(3, 2);
  img.put(2, 1, RGB8::new(1, 2, 3));
  img.put(3, 1, RGB8::WHITE);
  assert_eq!(img.get(2, 1), Some(RGB8::new(1, 2, 3)));
  assert_eq!(img.get(3, 1), None);
  assert_eq!(img.row(1), &[0, 0, 0, 0, 0, 0, 1, 2, 3]);
  assert_eq!(img.pixels().len(), 6);
  assert!(RgbImage::from_raw(2, 2, vec![0; 11]).is_err());
}
