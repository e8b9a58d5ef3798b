//! APNG (or PNG) to GIF conversion.
//!
//! [`convert`] runs on the calling thread and reports progress through a
//! callback. [`spawn_convert`] runs the same thing on a worker thread and
//! turns its progress and outcome into [`ProgressEvent`]s on a channel.
//!
//! Indexed and grayscale sources keep their own samples as GIF indexes. Only
//! truecolor sources go through the quantizer.

use std::{
  fs::File,
  io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
  path::{Path, PathBuf},
  sync::mpsc::{channel, Receiver},
  thread::JoinHandle,
};

use tracing::{debug, info, warn};

use crate::{
  cancel::CancelToken,
  config::{ConvertOptions, PaletteChoice},
  error::{FramecastError, Result},
  gif::GifEncoder,
  png::{AnimationControl, ApngDecoder, ColorHistogram, DecodeOptions},
  quantize::{floyd_steinberg, ColorMapper, Metric, Palette},
};

/// Scalar progress value meaning the conversion finished.
pub const FINISHED_SENTINEL: f32 = 101.0;

/// Scalar progress value meaning the conversion failed or was cancelled.
pub const FAILED_SENTINEL: f32 = -1.0;

/// What a finished conversion wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifSummary {
  pub width: u16,
  pub height: u16,
  pub frame_count: u32,
  /// Entries in the palette used (before padding to a power of two).
  pub palette_len: usize,
  /// If frames went through the quantizer.
  pub quantized: bool,
  pub bytes_written: u64,
}

/// A message from a background conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
  /// Percent done, `0.0..=100.0`.
  Progress(f32),
  Finished(GifSummary),
  Failed(String),
  Cancelled,
}
impl ProgressEvent {
  /// The event as a single number: the percentage while running, then
  /// [`FINISHED_SENTINEL`] or [`FAILED_SENTINEL`].
  #[must_use]
  pub fn sentinel(&self) -> f32 {
    match self {
      Self::Progress(p) => p.clamp(0.0, 100.0),
      Self::Finished(_) => FINISHED_SENTINEL,
      Self::Failed(_) | Self::Cancelled => FAILED_SENTINEL,
    }
  }

  /// If no more events follow this one.
  #[inline]
  #[must_use]
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Progress(_))
  }
}

/// How the frames of a source become GIF indexes.
enum Plan {
  /// Samples are already indexes into `palette`.
  Passthrough,
  /// Truecolor frames get mapped onto the palette.
  Quantize { mapper: ColorMapper, dither: bool },
}

/// Maps the byte position of one decoding pass onto its share of the total
/// progress, and only reports whole percent changes.
struct ProgressScale<F> {
  report: F,
  total: u64,
  base: f32,
  span: f32,
  last: i32,
}
impl<F: FnMut(f32)> ProgressScale<F> {
  fn update(&mut self, bytes_read: u64) {
    let fraction = if self.total == 0 { 1.0 } else { bytes_read as f32 / self.total as f32 };
    let percent = self.base + self.span * fraction.min(1.0);
    if percent as i32 != self.last {
      self.last = percent as i32;
      (self.report)(percent);
    }
  }
}

/// APNG plays to a NETSCAPE2.0 loop count: 0 stays forever, a single play
/// needs no loop extension, and `n` plays is `n - 1` repeats.
#[must_use]
pub fn loop_count_from_plays(animation: Option<AnimationControl>) -> Option<u16> {
  match animation?.num_plays {
    0 => Some(0),
    1 => None,
    n => Some((n - 1).min(u32::from(u16::MAX)) as u16),
  }
}

/// Converts a PNG or APNG stream into a GIF.
///
/// `progress` gets percentages from 0 to 100 as the input is read. When the
/// palette is [`PaletteChoice::Auto`] for a truecolor source, the input is
/// read twice (once for the histogram), which is why it must be `Seek`.
///
/// Each source frame becomes one GIF frame at the same position with the
/// same delay, drawn over the previous frames. APNG dispose and blend ops
/// other than the defaults aren't reproduced.
///
/// ## Failure
/// * Any decoding error, or the canvas being wider or taller than 65535.
/// * `Cancelled` if `cancel` is set while the conversion runs.
pub fn convert<R: Read + Seek, W: Write>(
  mut input: R, output: W, options: &ConvertOptions, cancel: &CancelToken,
  progress: impl FnMut(f32),
) -> Result<GifSummary> {
  let total = input.seek(SeekFrom::End(0))?;
  input.seek(SeekFrom::Start(0))?;
  let decode_options = DecodeOptions { verify_crc: options.verify_crc };
  let mut decoder = ApngDecoder::new(BufReader::new(&mut input), decode_options)?;
  let header = *decoder.header();
  let (Ok(width), Ok(height)) = (u16::try_from(header.width), u16::try_from(header.height)) else {
    return Err(FramecastError::InvalidDimensions { width: header.width, height: header.height });
  };
  let mut progress = ProgressScale { report: progress, total, base: 0.0, span: 100.0, last: -1 };
  let loop_count = options.loop_count.or_else(|| loop_count_from_plays(decoder.animation()));
  let mode = header.pixel_mode;

  let (palette, plan) = if mode.is_truecolor() {
    let palette = match &options.palette {
      PaletteChoice::Named(name) => Some(Palette::named(*name)),
      PaletteChoice::Custom(palette) => Some(palette.clone()),
      PaletteChoice::Source => match decoder.palette() {
        Some(colors) => Some(Palette::new(colors.to_vec())?),
        None => {
          debug!("source has no PLTE, building a palette instead");
          None
        }
      },
      PaletteChoice::Auto => None,
    };
    let palette = match palette {
      Some(palette) => palette,
      None => {
        // histogram pass over the whole input, then start over
        progress.span = 50.0;
        let mut histogram = ColorHistogram::new();
        while let Some(frame) = decoder.next_frame()? {
          cancel.check()?;
          histogram.add_rgb_bytes(&frame.to_rgb(&[])?);
          progress.update(decoder.bytes_read());
        }
        drop(decoder);
        input.seek(SeekFrom::Start(0))?;
        decoder = ApngDecoder::new(BufReader::new(&mut input), decode_options)?;
        progress.base = 50.0;
        Palette::auto(&histogram)
      }
    };
    let frames = decoder.animation().map_or(1, |a| u64::from(a.num_frames.max(1)));
    let pixel_count = frames * u64::from(header.width) * u64::from(header.height);
    let mapper = ColorMapper::new(
      &palette,
      Metric::new(options.accurate),
      pixel_count,
      cancel,
      options.lut_threads,
    )?;
    (palette, Plan::Quantize { mapper, dither: options.dither })
  } else {
    if options.palette != PaletteChoice::Auto {
      debug!("{:?} source keeps its own palette", mode);
    }
    (Palette::new(decoder.sample_palette())?, Plan::Passthrough)
  };
  info!(
    "converting {}x{} {:?} to GIF with {} colors{}",
    width,
    height,
    mode,
    palette.len(),
    if matches!(plan, Plan::Quantize { .. }) { ", quantized" } else { "" }
  );

  let mut gif = GifEncoder::new(output, width, height, palette.colors(), loop_count)?;
  let mut warned_compositing = false;
  while let Some(frame) = decoder.next_frame()? {
    cancel.check()?;
    let c = frame.control;
    if (c.dispose_op != 0 || c.blend_op != 0) && !warned_compositing {
      warn!("APNG dispose/blend ops are drawn as plain overwrites");
      warned_compositing = true;
    }
    let indices = match &plan {
      Plan::Passthrough => frame.to_indices()?,
      Plan::Quantize { mapper, dither } => {
        let mut rgb = frame.to_rgb(&[])?;
        if *dither {
          floyd_steinberg(&mut rgb, c.width, c.height, &palette, mapper)
        } else {
          mapper.map_rgb(&rgb)
        }
      }
    };
    gif.add_frame(
      c.x_offset as u16,
      c.y_offset as u16,
      c.width as u16,
      c.height as u16,
      c.duration_ms(),
      &indices,
    )?;
    progress.update(decoder.bytes_read());
  }
  gif.end()?;
  progress.base = 100.0;
  progress.span = 0.0;
  progress.update(total);

  let summary = GifSummary {
    width,
    height,
    frame_count: gif.frame_count(),
    palette_len: palette.len(),
    quantized: matches!(plan, Plan::Quantize { .. }),
    bytes_written: gif.bytes_written(),
  };
  info!("wrote {} GIF frames, {} bytes", summary.frame_count, summary.bytes_written);
  Ok(summary)
}

/// [`convert`] between two files. A partly written output is removed if the
/// conversion fails.
pub fn convert_file(
  src: &Path, dst: &Path, options: &ConvertOptions, cancel: &CancelToken,
  progress: impl FnMut(f32),
) -> Result<GifSummary> {
  let input = File::open(src)?;
  let output = BufWriter::new(File::create(dst)?);
  let result = convert(input, output, options, cancel, progress);
  if let Err(e) = &result {
    debug!("conversion stopped ({e}), removing {}", dst.display());
    if let Err(remove_err) = std::fs::remove_file(dst) {
      warn!("couldn't remove partial output {}: {remove_err}", dst.display());
    }
  }
  result
}

/// A conversion running on its own thread.
#[derive(Debug)]
pub struct ConvertTask {
  cancel: CancelToken,
  events: Receiver<ProgressEvent>,
  handle: Option<JoinHandle<()>>,
}
impl ConvertTask {
  /// Asks the conversion to stop. It ends with [`ProgressEvent::Cancelled`].
  #[inline]
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  #[inline]
  #[must_use]
  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  /// The event stream. It ends after the first terminal event.
  #[inline]
  #[must_use]
  pub fn events(&self) -> &Receiver<ProgressEvent> {
    &self.events
  }

  /// Blocks until the conversion is over, giving its terminal event.
  pub fn wait(mut self) -> ProgressEvent {
    let outcome = self
      .events
      .iter()
      .find(ProgressEvent::is_terminal)
      .unwrap_or_else(|| ProgressEvent::Failed("conversion thread stopped unexpectedly".into()));
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        return ProgressEvent::Failed("conversion thread panicked".into());
      }
    }
    outcome
  }
}

/// Starts converting `src` into the GIF file `dst` on a worker thread.
pub fn spawn_convert(src: PathBuf, dst: PathBuf, options: ConvertOptions) -> Result<ConvertTask> {
  let cancel = CancelToken::new();
  let (tx, events) = channel();
  let worker_cancel = cancel.clone();
  let handle = std::thread::Builder::new().name("framecast-convert".into()).spawn(move || {
    let progress_tx = tx.clone();
    let result = convert_file(&src, &dst, &options, &worker_cancel, |p| {
      // a closed channel only means nobody is listening any more
      let _ = progress_tx.send(ProgressEvent::Progress(p));
    });
    let event = match result {
      Ok(summary) => ProgressEvent::Finished(summary),
      Err(e) if e.is_cancelled() => ProgressEvent::Cancelled,
      Err(e) => ProgressEvent::Failed(e.to_string()),
    };
    let _ = tx.send(event);
  })?;
  Ok(ConvertTask { cancel, events, handle: Some(handle) })
}
