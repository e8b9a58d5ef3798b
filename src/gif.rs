//! Module for writing animated GIF89a streams.
//!
//! * [GIF89a Specification](https://www.w3.org/Graphics/GIF/spec-gif89a.txt)
//!
//! All frames share one global color table. Each frame is written as
//!
//! ```text
//! graphic control extension | image descriptor | min code size | LZW sub-blocks
//! ```
//!
//! and the stream ends with the `0x3B` trailer.

use std::io::Write;

use tracing::{debug, trace};

use crate::{
  error::{FramecastError, Result},
  pixel_formats::RGB8,
};

pub mod lzw;

/// The three bit size field of a color table: the table holds
/// `2^(size_code + 1)` entries.
///
/// This is the smallest such table that fits `len` colors, so 1 and 2 colors
/// give 0, 3 and 4 give 1, and so on up to 129 through 256 giving 7.
#[inline]
#[must_use]
pub const fn color_table_size_code(len: usize) -> u8 {
  let mut code = 0;
  while code < 7 && (2_usize << code) < len {
    code += 1;
  }
  code
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GifState {
  Created,
  Writing,
  Ended,
}

/// Writes indexed frames as a GIF89a stream.
///
/// The header, screen descriptor, and color table go out with the first
/// frame. After [`end`](Self::end) every call fails.
#[derive(Debug)]
pub struct GifEncoder<W: Write> {
  out: W,
  width: u16,
  height: u16,
  palette: Vec<RGB8>,
  size_code: u8,
  loop_count: Option<u16>,
  state: GifState,
  frame_count: u32,
  bytes_written: u64,
}
impl<W: Write> GifEncoder<W> {
  /// Makes an encoder for a `width` x `height` canvas.
  ///
  /// `loop_count` adds a NETSCAPE2.0 looping extension, where 0 means loop
  /// forever. With `None` the animation plays once.
  ///
  /// ## Failure
  /// * If the palette is empty or has more than 256 entries.
  /// * If the canvas is 0 pixels in either direction.
  pub fn new(
    out: W, width: u16, height: u16, palette: &[RGB8], loop_count: Option<u16>,
  ) -> Result<Self> {
    if palette.is_empty() || palette.len() > 256 {
      return Err(FramecastError::PaletteTooLarge(palette.len()));
    }
    if width == 0 || height == 0 {
      return Err(FramecastError::InvalidDimensions {
        width: u32::from(width),
        height: u32::from(height),
      });
    }
    Ok(Self {
      out,
      width,
      height,
      palette: palette.to_vec(),
      size_code: color_table_size_code(palette.len()),
      loop_count,
      state: GifState::Created,
      frame_count: 0,
      bytes_written: 0,
    })
  }

  /// Adds a frame covering the given rectangle of the canvas, shown for
  /// `delay_ms` (rounded to centiseconds).
  ///
  /// The first frame uses disposal "not specified" and later frames "do not
  /// dispose", so each frame draws over what came before.
  ///
  /// ## Failure
  /// * If `indices` isn't `width * height` long, or the rectangle leaves the
  ///   canvas.
  /// * If an index is past the end of the color table.
  /// * If [`end`](Self::end) was already called.
  pub fn add_frame(
    &mut self, x: u16, y: u16, width: u16, height: u16, delay_ms: u32, indices: &[u8],
  ) -> Result<()> {
    if self.state == GifState::Ended {
      return Err(FramecastError::EncoderState("GIF stream already ended"));
    }
    if width == 0
      || height == 0
      || u32::from(x) + u32::from(width) > u32::from(self.width)
      || u32::from(y) + u32::from(height) > u32::from(self.height)
      || indices.len() != usize::from(width) * usize::from(height)
    {
      return Err(FramecastError::InvalidDimensions {
        width: u32::from(width),
        height: u32::from(height),
      });
    }
    let table_len = 2_usize << self.size_code;
    if let Some(&bad) = indices.iter().find(|i| usize::from(**i) >= table_len) {
      return Err(FramecastError::IndexOutOfRange { index: bad, table_len });
    }
    if self.state == GifState::Created {
      self.write_header()?;
      self.state = GifState::Writing;
    }

    // graphic control extension
    let disposal: u8 = if self.frame_count == 0 { 0 } else { 1 };
    let delay_cs = (delay_ms.saturating_add(5) / 10).min(u32::from(u16::MAX)) as u16;
    let [d0, d1] = delay_cs.to_le_bytes();
    self.put(&[0x21, 0xF9, 0x04, disposal << 2, d0, d1, 0x00, 0x00])?;

    // image descriptor, no local color table
    let mut descriptor = [0_u8; 10];
    descriptor[0] = 0x2C;
    descriptor[1..3].copy_from_slice(&x.to_le_bytes());
    descriptor[3..5].copy_from_slice(&y.to_le_bytes());
    descriptor[5..7].copy_from_slice(&width.to_le_bytes());
    descriptor[7..9].copy_from_slice(&height.to_le_bytes());
    self.put(&descriptor)?;

    let min_code_size = (self.size_code + 1).max(2);
    self.put(&[min_code_size])?;
    let compressed = lzw::compress(indices, min_code_size);
    self.bytes_written += lzw::write_sub_blocks(&mut self.out, &compressed)?;

    self.frame_count += 1;
    trace!(
      "GIF frame {}: {}x{} at ({},{}), {} cs, {} LZW bytes",
      self.frame_count,
      width,
      height,
      x,
      y,
      delay_cs,
      compressed.len()
    );
    Ok(())
  }

  /// Writes the trailer and flushes.
  ///
  /// A stream with no frames still gets its header first, so the output is a
  /// well formed (empty) GIF.
  pub fn end(&mut self) -> Result<()> {
    match self.state {
      GifState::Ended => return Err(FramecastError::EncoderState("GIF stream already ended")),
      GifState::Created => self.write_header()?,
      GifState::Writing => (),
    }
    self.state = GifState::Ended;
    self.put(&[0x3B])?;
    self.out.flush()?;
    debug!("GIF stream ended: {} frames, {} bytes", self.frame_count, self.bytes_written);
    Ok(())
  }

  #[inline]
  #[must_use]
  pub const fn frame_count(&self) -> u32 {
    self.frame_count
  }

  #[inline]
  #[must_use]
  pub const fn bytes_written(&self) -> u64 {
    self.bytes_written
  }

  /// Entries in the global color table as written (a power of two).
  #[inline]
  #[must_use]
  pub const fn color_table_len(&self) -> usize {
    2 << self.size_code
  }

  #[inline]
  pub fn into_inner(self) -> W {
    self.out
  }

  fn put(&mut self, bytes: &[u8]) -> Result<()> {
    self.out.write_all(bytes)?;
    self.bytes_written += bytes.len() as u64;
    Ok(())
  }

  fn write_header(&mut self) -> Result<()> {
    self.put(b"GIF89a")?;
    let mut screen = [0_u8; 7];
    screen[0..2].copy_from_slice(&self.width.to_le_bytes());
    screen[2..4].copy_from_slice(&self.height.to_le_bytes());
    // global table present, 8 bits color resolution, unsorted
    screen[4] = 0x80 | (7 << 4) | self.size_code;
    self.put(&screen)?;

    let mut table = Vec::with_capacity(3 * self.color_table_len());
    for i in 0..self.color_table_len() {
      let c = self.palette.get(i).copied().unwrap_or_default();
      table.extend_from_slice(&[c.r, c.g, c.b]);
    }
    self.put(&table)?;

    if let Some(count) = self.loop_count {
      let [c0, c1] = count.to_le_bytes();
      self.put(&[0x21, 0xFF, 0x0B])?;
      self.put(b"NETSCAPE2.0")?;
      self.put(&[0x03, 0x01, c0, c1, 0x00])?;
    }
    Ok(())
  }
}
