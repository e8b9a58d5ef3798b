use super::*;

use std::io::{Seek, SeekFrom, Write};

use miniz_oxide::deflate::compress_to_vec_zlib;
use tracing::{debug, trace, warn};

use crate::{color_filter::ColorFilter, image::RgbImage};

/// zlib level used for all frame data.
const DEFLATE_LEVEL: u8 = 9;

/// Per-channel counts of every 8-bit value seen.
#[derive(Clone, PartialEq, Eq)]
pub struct ColorHistogram {
  /// `counts[c][v]` is how many pixels had value `v` in channel `c` (R, G, B).
  pub counts: [[u64; 256]; 3],
}
impl Default for ColorHistogram {
  #[inline]
  fn default() -> Self {
    Self { counts: [[0; 256]; 3] }
  }
}
impl core::fmt::Debug for ColorHistogram {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let distinct = |c: usize| self.counts[c].iter().filter(|n| **n > 0).count();
    f.debug_struct("ColorHistogram")
      .field("pixels", &self.pixel_count())
      .field("distinct", &[distinct(0), distinct(1), distinct(2)])
      .finish()
  }
}
impl ColorHistogram {
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn add(&mut self, color: RGB8) {
    self.counts[0][usize::from(color.r)] += 1;
    self.counts[1][usize::from(color.g)] += 1;
    self.counts[2][usize::from(color.b)] += 1;
  }

  /// Counts every pixel of a flat RGB raster.
  pub fn add_rgb_bytes(&mut self, rgb: &[u8]) {
    for px in rgb.chunks_exact(3) {
      self.add(RGB8::from_slice(px));
    }
  }

  /// Pixels counted so far.
  #[inline]
  #[must_use]
  pub fn pixel_count(&self) -> u64 {
    self.counts[0].iter().sum()
  }
}

/// What an encoder run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
  pub width: u32,
  pub height: u32,
  /// Frames actually written (identical frames merge into one).
  pub frame_count: u32,
  /// Size of one frame buffer, in bytes.
  pub buffer_size: usize,
  /// Total bytes of the finished stream.
  pub file_size: u64,
  /// Per-channel histogram of every frame added, if it was asked for.
  pub color_histogram: Option<ColorHistogram>,
}

/// A rectangle of a frame, as filtered scanlines ready to compress.
///
/// `data` holds `height` lines, each a filter byte (always 0, no filter)
/// followed by `3 * width` RGB bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePortion {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
  pub data: Vec<u8>,
}
impl core::fmt::Debug for ImagePortion {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("ImagePortion")
      .field("x", &self.x)
      .field("y", &self.y)
      .field("width", &self.width)
      .field("height", &self.height)
      .field("data", &self.data.len())
      .finish()
  }
}
impl ImagePortion {
  /// Bytes of filtered scanlines a `width` x `height` RGB portion takes.
  #[inline]
  #[must_use]
  pub const fn filtered_len(width: u32, height: u32) -> usize {
    (1 + 3 * width as usize) * height as usize
  }

  /// Cuts a portion out of a full frame buffer of filtered scanlines.
  ///
  /// ## Panics
  /// * If the rectangle is outside the frame.
  #[must_use]
  pub fn extract(
    frame: &[u8], frame_width: u32, x: u32, y: u32, width: u32, height: u32,
  ) -> Self {
    let stride = 1 + 3 * frame_width as usize;
    let row_len = 3 * width as usize;
    let mut data = Vec::with_capacity(Self::filtered_len(width, height));
    for line in frame.chunks_exact(stride).skip(y as usize).take(height as usize) {
      if x == 0 {
        // the frame's own filter byte lines up, so copy it along
        data.extend_from_slice(&line[..1 + row_len]);
      } else {
        let start = 1 + 3 * x as usize;
        data.push(0);
        data.extend_from_slice(&line[start..start + row_len]);
      }
    }
    Self { x, y, width, height, data }
  }
}

/// Encoder settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderOptions {
  /// Applied to every pixel before diffing. A filter with a fixed palette
  /// also gets that palette written as `PLTE`.
  pub color_filter: ColorFilter,
  /// Count a per-channel histogram of all frames.
  pub collect_histogram: bool,
  /// `tEXt` keyword/text pairs written after `acTL`.
  pub text: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
  Created,
  Started,
  Closed,
}

/// A frame waiting for the next different frame (or the close) before it's
/// written, since identical frames that follow it extend its delay.
#[derive(Debug)]
struct PendingFrame {
  portion: ImagePortion,
  delay_ms: u32,
}

/// Writes RGB frames as an APNG stream, storing only what changed.
///
/// Frames go through [`start`](Self::start), any number of
/// [`add_frame`](Self::add_frame) calls, then [`close`](Self::close).
///
/// * Each frame is compared against the previous one. Only the bounding
///   rectangle of the changed bytes is stored, unless that rectangle is at
///   least 75% of the frame, in which case the whole frame is stored.
/// * A frame identical to the previous one is not stored at all: its delay is
///   added onto the previous frame's.
/// * The frame count isn't known until the end, so `acTL` is written with a
///   count of 0 and patched by seeking back during `close`. This is why the
///   output must be `Seek`.
///
/// The encoder holds no locks itself; share it behind a `Mutex` if frames come
/// from another thread.
#[derive(Debug)]
pub struct ApngEncoder<W: Write + Seek> {
  out: ChunkWriter<W>,
  options: EncoderOptions,
  state: EncoderState,
  width: u32,
  height: u32,
  last: Vec<u8>,
  temp: Vec<u8>,
  has_last: bool,
  pending: Option<PendingFrame>,
  sequence_number: u32,
  frame_count: u32,
  stream_start: u64,
  actl_offset: u64,
  histogram: Option<ColorHistogram>,
}
impl<W: Write + Seek> ApngEncoder<W> {
  /// Makes an encoder that will write to `out` once started.
  #[inline]
  #[must_use]
  pub fn new(out: W, options: EncoderOptions) -> Self {
    Self {
      out: ChunkWriter::new(out),
      options,
      state: EncoderState::Created,
      width: 0,
      height: 0,
      last: Vec::new(),
      temp: Vec::new(),
      has_last: false,
      pending: None,
      sequence_number: 0,
      frame_count: 0,
      stream_start: 0,
      actl_offset: 0,
      histogram: None,
    }
  }

  /// Writes the stream header for frames of `width` x `height`.
  ///
  /// The header is the signature, `IHDR`, `PLTE` (if the color filter has a
  /// fixed palette), the placeholder `acTL`, then any `tEXt` entries.
  pub fn start(&mut self, width: u32, height: u32) -> Result<()> {
    if self.state != EncoderState::Created {
      return Err(FramecastError::EncoderState("start called twice"));
    }
    if width == 0 || height == 0 || width > (i32::MAX as u32) / 3 || height > i32::MAX as u32 {
      return Err(FramecastError::InvalidDimensions { width, height });
    }
    self.width = width;
    self.height = height;
    let buffer_size = ImagePortion::filtered_len(width, height);
    self.last = vec![0; buffer_size];
    self.temp = vec![0; buffer_size];
    self.histogram = self.options.collect_histogram.then(ColorHistogram::new);
    self.stream_start = self.out.get_mut().stream_position()?;

    self.out.write_signature()?;
    self.out.write_chunk(ChunkType::IHDR, &IHDR::rgb8(width, height).to_bytes())?;
    if let Some(palette) = self.options.color_filter.fixed_palette() {
      self.out.write_chunk(ChunkType::PLTE, bytemuck::cast_slice(&palette))?;
    }
    self.actl_offset = self.stream_start + self.out.bytes_written();
    self.out.write_chunk(ChunkType::acTL, &AnimationControl::default().to_bytes())?;
    for (keyword, text) in &self.options.text {
      self.out.write_chunk(ChunkType::tEXt, &text_payload(keyword, text))?;
    }
    self.state = EncoderState::Started;
    debug!(
      "APNG encoder started: {}x{}, filter {:?}, acTL at {}",
      width, height, self.options.color_filter, self.actl_offset
    );
    Ok(())
  }

  /// Adds a frame shown for `delay_ms`.
  ///
  /// With `force_whole_frame` the frame skips diffing and is stored whole,
  /// even if it matches the previous frame.
  ///
  /// Does nothing unless the encoder is started.
  pub fn add_frame(
    &mut self, image: &RgbImage, force_whole_frame: bool, delay_ms: u32,
  ) -> Result<()> {
    if self.state != EncoderState::Started {
      debug!("add_frame ignored, encoder is {:?}", self.state);
      return Ok(());
    }
    if image.width() != self.width || image.height() != self.height {
      return Err(FramecastError::InvalidDimensions {
        width: image.width(),
        height: image.height(),
      });
    }
    self.fill_temp(image);

    if !self.has_last || force_whole_frame {
      self.flush_pending()?;
      let portion = ImagePortion {
        x: 0,
        y: 0,
        width: self.width,
        height: self.height,
        data: self.temp.clone(),
      };
      self.pending = Some(PendingFrame { portion, delay_ms });
      core::mem::swap(&mut self.last, &mut self.temp);
      self.has_last = true;
      return Ok(());
    }

    match self.diff_portion() {
      None => {
        if let Some(pending) = self.pending.as_mut() {
          pending.delay_ms = pending.delay_ms.saturating_add(delay_ms);
          trace!("identical frame, pending delay now {} ms", pending.delay_ms);
        }
      }
      Some(portion) => {
        self.flush_pending()?;
        self.pending = Some(PendingFrame { portion, delay_ms });
        core::mem::swap(&mut self.last, &mut self.temp);
      }
    }
    Ok(())
  }

  /// Finishes the stream: writes the pending frame and `IEND`, then patches
  /// `acTL` with the frame count and `loop_count` (0 loops forever).
  ///
  /// The encoder counts as closed afterwards even if this fails.
  pub fn close(&mut self, loop_count: u32) -> Result<Statistics> {
    let previous = core::mem::replace(&mut self.state, EncoderState::Closed);
    match previous {
      EncoderState::Closed => return Err(FramecastError::EncoderState("close called twice")),
      EncoderState::Created => return Err(FramecastError::EncoderState("closed before start")),
      EncoderState::Started => (),
    }
    self.flush_pending()?;
    if self.frame_count == 0 {
      warn!("closing an APNG stream with no frames");
    }
    self.out.write_chunk(ChunkType::IEND, &[])?;

    let actl = AnimationControl { num_frames: self.frame_count, num_plays: loop_count };
    let end = self.stream_start + self.out.bytes_written();
    let sink = self.out.get_mut();
    sink.seek(SeekFrom::Start(self.actl_offset))?;
    sink.write_all(&encode_chunk(ChunkType::acTL, &actl.to_bytes()))?;
    sink.seek(SeekFrom::Start(end))?;
    sink.flush()?;

    let stats = Statistics {
      width: self.width,
      height: self.height,
      frame_count: self.frame_count,
      buffer_size: self.last.len(),
      file_size: self.out.bytes_written(),
      color_histogram: self.histogram.take(),
    };
    debug!("APNG encoder closed: {} frames, {} bytes", stats.frame_count, stats.file_size);
    Ok(stats)
  }

  /// If `start` has been called and `close` hasn't.
  #[inline]
  #[must_use]
  pub fn is_started(&self) -> bool {
    self.state == EncoderState::Started
  }

  /// Frames written so far (the pending frame isn't counted yet).
  #[inline]
  #[must_use]
  pub const fn frame_count(&self) -> u32 {
    self.frame_count
  }

  #[inline]
  pub fn get_ref(&self) -> &W {
    self.out.get_ref()
  }

  #[inline]
  pub fn into_inner(self) -> W {
    self.out.into_inner()
  }

  /// Writes `image` into `temp` as filtered scanlines, through the color
  /// filter, counting the histogram on the way.
  fn fill_temp(&mut self, image: &RgbImage) {
    let filter = self.options.color_filter;
    let stride = 1 + 3 * self.width as usize;
    for (y, line) in self.temp.chunks_exact_mut(stride).enumerate() {
      line[0] = 0;
      let src = image.row(y as u32);
      for (dst, px) in line[1..].chunks_exact_mut(3).zip(src.chunks_exact(3)) {
        let c = filter.apply(RGB8::from_slice(px));
        dst.copy_from_slice(&[c.r, c.g, c.b]);
        if let Some(histogram) = self.histogram.as_mut() {
          histogram.add(c);
        }
      }
    }
  }

  /// Compares `temp` against `last`.
  ///
  /// Gives `None` when they match, otherwise the changed rectangle of `temp`
  /// (or all of it, when the rectangle is too large to be worth cropping).
  fn diff_portion(&self) -> Option<ImagePortion> {
    let stride = 1 + 3 * self.width as usize;
    let mut min_x = usize::MAX;
    let mut max_x = 0;
    let mut min_y = usize::MAX;
    let mut max_y = 0;
    for (y, (old, new)) in self.last.chunks_exact(stride).zip(self.temp.chunks_exact(stride)).enumerate()
    {
      let (old, new) = (&old[1..], &new[1..]);
      if old == new {
        continue;
      }
      let first = old.iter().zip(new).position(|(a, b)| a != b)?;
      let last = old.iter().zip(new).rposition(|(a, b)| a != b)?;
      min_x = min_x.min(first);
      max_x = max_x.max(last);
      min_y = min_y.min(y);
      max_y = y;
    }
    if min_y == usize::MAX {
      return None;
    }
    let x = (min_x / 3) as u32;
    let width = (max_x / 3) as u32 - x + 1;
    let y = min_y as u32;
    let height = (max_y - min_y) as u32 + 1;

    let covers_all = width == self.width && height == self.height;
    let rect_bytes = ImagePortion::filtered_len(width, height);
    if covers_all || rect_bytes * 4 >= self.temp.len() * 3 {
      trace!("diff {}x{} at ({},{}) too large, storing whole frame", width, height, x, y);
      return Some(ImagePortion {
        x: 0,
        y: 0,
        width: self.width,
        height: self.height,
        data: self.temp.clone(),
      });
    }
    Some(ImagePortion::extract(&self.temp, self.width, x, y, width, height))
  }

  fn flush_pending(&mut self) -> Result<()> {
    if let Some(PendingFrame { portion, delay_ms }) = self.pending.take() {
      self.write_frame(&portion, delay_ms)?;
    }
    Ok(())
  }

  /// Writes `fcTL` then the compressed portion as `IDAT` (first frame) or
  /// `fdAT` (all others).
  fn write_frame(&mut self, portion: &ImagePortion, delay_ms: u32) -> Result<()> {
    let (delay_num, delay_den) = FrameControl::delay_fraction(delay_ms);
    let fctl = FrameControl {
      sequence_number: self.sequence_number,
      width: portion.width,
      height: portion.height,
      x_offset: portion.x,
      y_offset: portion.y,
      delay_num,
      delay_den,
      dispose_op: 0,
      blend_op: 0,
    };
    self.out.write_chunk(ChunkType::fcTL, &fctl.to_bytes())?;
    self.sequence_number += 1;

    let compressed = compress_to_vec_zlib(&portion.data, DEFLATE_LEVEL);
    if self.frame_count == 0 {
      self.out.write_chunk(ChunkType::IDAT, &compressed)?;
    } else {
      let mut payload = Vec::with_capacity(4 + compressed.len());
      payload.extend_from_slice(&self.sequence_number.to_be_bytes());
      payload.extend_from_slice(&compressed);
      self.out.write_chunk(ChunkType::fdAT, &payload)?;
      self.sequence_number += 1;
    }
    self.frame_count += 1;
    trace!(
      "frame {}: {}x{} at ({},{}), {} ms, {} bytes compressed",
      self.frame_count,
      portion.width,
      portion.height,
      portion.x,
      portion.y,
      delay_ms,
      compressed.len()
    );
    Ok(())
  }
}

/// `keyword NUL text`, both Latin-1. Characters outside Latin-1 become `?`.
fn text_payload(keyword: &str, text: &str) -> Vec<u8> {
  let latin1 = |c: char| u8::try_from(u32::from(c)).unwrap_or(b'?');
  let mut out: Vec<u8> = keyword.chars().take(79).map(latin1).collect();
  out.push(0);
  out.extend(text.chars().map(latin1));
  out
}
