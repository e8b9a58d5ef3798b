//! Settings for recording and converting.
//!
//! These are plain values: build one, pass it in, and nothing else in the
//! crate changes it.

use std::{path::PathBuf, time::Duration};

use crate::{
  color_filter::ColorFilter,
  pixel_formats::RGB8,
  quantize::{NamedPalette, Palette},
};

/// Which palette a GIF conversion maps colors onto.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PaletteChoice {
  /// A built-in palette.
  Named(NamedPalette),
  /// Built from the color frequencies of the source frames.
  #[default]
  Auto,
  /// The source file's own `PLTE`. Falls back to `Auto` when there is none.
  Source,
  /// A palette the caller already has.
  Custom(Palette),
}

/// What a recording is saved as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
  #[default]
  Apng,
  Gif,
}
impl OutputFormat {
  /// Guesses from a file extension, case insensitive.
  #[must_use]
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_ascii_lowercase().as_str() {
      "png" | "apng" => Some(Self::Apng),
      "gif" => Some(Self::Gif),
      _ => None,
    }
  }
}

/// Options for converting an APNG (or PNG) stream into a GIF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
  pub palette: PaletteChoice,
  /// Floyd–Steinberg dithering of truecolor frames.
  pub dither: bool,
  /// Use the luma and hue aware color metric.
  pub accurate: bool,
  /// GIF loop count (0 is forever). `None` copies the source's `acTL`.
  pub loop_count: Option<u16>,
  /// Fail on chunks with a bad CRC.
  pub verify_crc: bool,
  /// Worker threads for the LUT build. `None` uses the global pool.
  pub lut_threads: Option<usize>,
}
impl Default for ConvertOptions {
  #[inline]
  fn default() -> Self {
    Self {
      palette: PaletteChoice::Auto,
      dither: true,
      accurate: false,
      loop_count: None,
      verify_crc: true,
      lut_threads: None,
    }
  }
}
impl ConvertOptions {
  #[inline]
  #[must_use]
  pub fn with_palette(mut self, palette: PaletteChoice) -> Self {
    self.palette = palette;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_dither(mut self, dither: bool) -> Self {
    self.dither = dither;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_accurate(mut self, accurate: bool) -> Self {
    self.accurate = accurate;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_loop_count(mut self, loop_count: Option<u16>) -> Self {
    self.loop_count = loop_count;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_verify_crc(mut self, verify_crc: bool) -> Self {
    self.verify_crc = verify_crc;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_lut_threads(mut self, lut_threads: Option<usize>) -> Self {
    self.lut_threads = lut_threads;
    self
  }
}

/// Options for a screen recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
  /// Time between grabbed frames, also each frame's delay.
  pub frame_delay: Duration,
  /// Wait before the first grab.
  pub capture_delay: Duration,
  /// Store every frame whole instead of only what changed.
  pub force_whole_frame: bool,
  pub color_filter: ColorFilter,
  /// APNG plays (0 is forever).
  pub loop_count: u32,
  /// `tEXt` entries written into the recording.
  pub text: Vec<(String, String)>,
  /// Where the in-progress recording goes. `None` is the system temp dir.
  pub temp_dir: Option<PathBuf>,
}
impl Default for CaptureConfig {
  #[inline]
  fn default() -> Self {
    Self {
      frame_delay: Duration::from_millis(100),
      capture_delay: Duration::ZERO,
      force_whole_frame: false,
      color_filter: ColorFilter::Rgb,
      loop_count: 0,
      text: vec![("Software".to_string(), format!("framecast {}", env!("CARGO_PKG_VERSION")))],
      temp_dir: None,
    }
  }
}
impl CaptureConfig {
  #[inline]
  #[must_use]
  pub fn with_frame_delay(mut self, frame_delay: Duration) -> Self {
    self.frame_delay = frame_delay;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_capture_delay(mut self, capture_delay: Duration) -> Self {
    self.capture_delay = capture_delay;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_force_whole_frame(mut self, force_whole_frame: bool) -> Self {
    self.force_whole_frame = force_whole_frame;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_color_filter(mut self, color_filter: ColorFilter) -> Self {
    self.color_filter = color_filter;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_loop_count(mut self, loop_count: u32) -> Self {
    self.loop_count = loop_count;
    self
  }

  #[inline]
  #[must_use]
  pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
    self.temp_dir = Some(temp_dir.into());
    self
  }

  /// The frame delay in whole milliseconds, saturating.
  #[inline]
  #[must_use]
  pub fn frame_delay_ms(&self) -> u32 {
    u32::try_from(self.frame_delay.as_millis()).unwrap_or(u32::MAX)
  }

  /// The palette a GIF made from this recording should default to: the color
  /// filter's own palette if it has one.
  #[must_use]
  pub fn preferred_palette(&self) -> Option<Vec<RGB8>> {
    self.color_filter.fixed_palette()
  }
}
