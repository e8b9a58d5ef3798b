//! Recording frames from a screen grabber into an APNG file.
//!
//! A [`Recorder`] owns a capture thread that grabs a frame from a
//! [`FrameSource`] every frame delay and feeds it to an [`ApngEncoder`]
//! writing into a temporary file. Stopping the recorder closes the encoder and
//! gives a [`Recording`], which can then be saved as APNG, converted to GIF,
//! or thrown away.
//!
//! The encoder sits behind a `Mutex`, so frame adds and the final close never
//! overlap.

use std::{
  fs::{self, File},
  io::{BufWriter, ErrorKind},
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  thread::JoinHandle,
  time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};

use crate::{
  cancel::CancelToken,
  color_filter::ColorFilter,
  config::{CaptureConfig, ConvertOptions, OutputFormat, PaletteChoice},
  error::{FramecastError, Result},
  image::RgbImage,
  png::{ApngEncoder, EncoderOptions, Statistics},
  quantize::Palette,
  transcode::{convert_file, GifSummary},
};

/// Times a temp file delete is tried before giving up.
const DELETE_ATTEMPTS: u32 = 5;

/// Longest single sleep of the capture thread, so a stop is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Something that can produce screen frames.
pub trait FrameSource: Send + 'static {
  /// Width and height of every frame [`grab`](Self::grab) gives.
  fn size(&self) -> (u32, u32);

  /// Takes the current frame.
  fn grab(&mut self) -> Result<RgbImage>;
}

type SharedEncoder = Arc<Mutex<ApngEncoder<BufWriter<File>>>>;

fn lock_poisoned<T>(_: T) -> FramecastError {
  FramecastError::EncoderState("encoder lock poisoned")
}

/// Sleeps for `duration`, waking early if `stop` gets set.
fn sleep_unless_stopped(duration: Duration, stop: &CancelToken) {
  let deadline = Instant::now() + duration;
  while !stop.is_cancelled() {
    let now = Instant::now();
    if now >= deadline {
      break;
    }
    std::thread::sleep((deadline - now).min(SLEEP_SLICE));
  }
}

/// Deletes a file, retrying with a growing backoff. A file that's already gone
/// counts as deleted.
fn remove_with_retries(path: &Path) -> bool {
  for attempt in 0..DELETE_ATTEMPTS {
    match fs::remove_file(path) {
      Ok(()) => return true,
      Err(e) if e.kind() == ErrorKind::NotFound => return true,
      Err(e) => {
        debug!("deleting {} failed (attempt {}): {e}", path.display(), attempt + 1);
        std::thread::sleep(Duration::from_millis(10 << attempt));
      }
    }
  }
  warn!("couldn't delete {} after {DELETE_ATTEMPTS} attempts", path.display());
  false
}

/// The capture thread body. Returns how many frames it grabbed.
fn capture_loop<S: FrameSource>(
  mut source: S, encoder: SharedEncoder, stop: CancelToken, config: CaptureConfig,
) -> Result<u32> {
  let delay_ms = config.frame_delay_ms();
  sleep_unless_stopped(config.capture_delay, &stop);
  let mut grabbed = 0;
  while !stop.is_cancelled() {
    let started = Instant::now();
    let image = source.grab()?;
    encoder.lock().map_err(lock_poisoned)?.add_frame(&image, config.force_whole_frame, delay_ms)?;
    grabbed += 1;
    let elapsed = started.elapsed();
    if elapsed < config.frame_delay {
      sleep_unless_stopped(config.frame_delay - elapsed, &stop);
    } else {
      trace!("frame {grabbed} took {elapsed:?}, longer than the frame delay");
    }
  }
  Ok(grabbed)
}

/// A recording in progress.
///
/// Dropping a recorder without calling [`stop`](Self::stop) stops the capture
/// thread and deletes the temporary file.
#[derive(Debug)]
pub struct Recorder {
  encoder: Option<SharedEncoder>,
  stop: CancelToken,
  handle: Option<JoinHandle<Result<u32>>>,
  path: PathBuf,
  config: CaptureConfig,
}
impl Recorder {
  /// Opens the temporary file, writes the APNG header, and starts grabbing.
  pub fn start<S: FrameSource>(source: S, config: CaptureConfig) -> Result<Self> {
    let (width, height) = source.size();
    let dir = config.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
    let (file, path) = tempfile::Builder::new()
      .prefix("framecast-")
      .suffix(".png")
      .tempfile_in(&dir)?
      .keep()
      .map_err(|e| FramecastError::Io(e.error))?;
    let options = EncoderOptions {
      color_filter: config.color_filter,
      collect_histogram: true,
      text: config.text.clone(),
    };
    let mut encoder = ApngEncoder::new(BufWriter::new(file), options);
    if let Err(e) = encoder.start(width, height) {
      remove_with_retries(&path);
      return Err(e);
    }
    let encoder = Arc::new(Mutex::new(encoder));
    let stop = CancelToken::new();

    let thread_encoder = Arc::clone(&encoder);
    let thread_stop = stop.clone();
    let thread_config = config.clone();
    let spawned = std::thread::Builder::new()
      .name("framecast-capture".into())
      .spawn(move || capture_loop(source, thread_encoder, thread_stop, thread_config));
    let handle = match spawned {
      Ok(handle) => handle,
      Err(e) => {
        remove_with_retries(&path);
        return Err(e.into());
      }
    };
    info!(
      "recording {}x{} every {:?} into {}",
      width,
      height,
      config.frame_delay,
      path.display()
    );
    Ok(Self { encoder: Some(encoder), stop, handle: Some(handle), path, config })
  }

  /// The temporary file being written.
  #[inline]
  #[must_use]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Frames written to the file so far.
  pub fn frames_written(&self) -> Result<u32> {
    match &self.encoder {
      Some(encoder) => Ok(encoder.lock().map_err(lock_poisoned)?.frame_count()),
      None => Ok(0),
    }
  }

  /// Stops capturing and finishes the file.
  ///
  /// If the capture thread hit an error, that error is returned here and the
  /// temporary file is deleted.
  pub fn stop(mut self) -> Result<Recording> {
    let grabbed = self.join_capture();
    let closed = self.close_encoder();
    let path = core::mem::take(&mut self.path);
    let (grabbed, stats) = match (grabbed, closed) {
      (Ok(grabbed), Ok(stats)) => (grabbed, stats),
      (Err(e), _) | (_, Err(e)) => {
        remove_with_retries(&path);
        return Err(e);
      }
    };
    info!("recording stopped: {} grabbed, {} frames written", grabbed, stats.frame_count);
    Ok(Recording { path, stats, color_filter: self.config.color_filter, removed: false })
  }

  fn join_capture(&mut self) -> Result<u32> {
    self.stop.cancel();
    match self.handle.take().map(JoinHandle::join) {
      Some(Ok(result)) => result,
      Some(Err(_)) => Err(FramecastError::EncoderState("capture thread panicked")),
      None => Ok(0),
    }
  }

  /// Closes the encoder and releases the file handle.
  fn close_encoder(&mut self) -> Result<Statistics> {
    let Some(shared) = self.encoder.take() else {
      return Err(FramecastError::EncoderState("recorder already stopped"));
    };
    let mutex = Arc::try_unwrap(shared)
      .map_err(|_| FramecastError::EncoderState("encoder still shared after the capture thread ended"))?;
    let mut encoder = mutex.into_inner().map_err(lock_poisoned)?;
    let stats = encoder.close(self.config.loop_count)?;
    encoder.into_inner().into_inner().map_err(|e| FramecastError::Io(e.into_error()))?;
    Ok(stats)
  }
}
impl Drop for Recorder {
  fn drop(&mut self) {
    if self.handle.is_none() && self.encoder.is_none() {
      return;
    }
    debug!("recorder dropped while running, discarding {}", self.path.display());
    if let Err(e) = self.join_capture() {
      debug!("capture thread ended with: {e}");
    }
    // release the file before deleting it
    self.encoder = None;
    remove_with_retries(&self.path);
  }
}

/// A finished recording, still in its temporary file.
///
/// The temporary file is deleted by a successful [`save_apng`](Self::save_apng)
/// (which moves it) or [`save`](Self::save), by [`discard`](Self::discard), or
/// failing those, on drop. A failed save leaves the file in place so it can be
/// tried again.
#[derive(Debug)]
pub struct Recording {
  path: PathBuf,
  stats: Statistics,
  color_filter: ColorFilter,
  removed: bool,
}
impl Recording {
  #[inline]
  #[must_use]
  pub fn statistics(&self) -> &Statistics {
    &self.stats
  }

  #[inline]
  #[must_use]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Moves the APNG to `dest`, copying when a rename isn't possible (such as
  /// across file systems).
  pub fn save_apng(&mut self, dest: &Path) -> Result<()> {
    if self.removed {
      return Err(FramecastError::EncoderState("recording already saved"));
    }
    if let Err(e) = fs::rename(&self.path, dest) {
      debug!("rename to {} failed ({e}), copying instead", dest.display());
      fs::copy(&self.path, dest)?;
      self.removed = remove_with_retries(&self.path);
    } else {
      self.removed = true;
    }
    info!("saved APNG to {}", dest.display());
    Ok(())
  }

  /// Writes a GIF version of the recording to `dest`.
  ///
  /// With [`PaletteChoice::Auto`], a recording made through a color filter
  /// with a fixed palette uses that palette, and any other recording uses the
  /// histogram gathered while recording (so the file isn't read twice).
  pub fn convert_to_gif(
    &self, dest: &Path, options: &ConvertOptions, cancel: &CancelToken, progress: impl FnMut(f32),
  ) -> Result<GifSummary> {
    let mut options = options.clone();
    if options.palette == PaletteChoice::Auto {
      if let Some(name) = self.color_filter.named_palette() {
        options.palette = PaletteChoice::Named(name);
      } else if let Some(histogram) = &self.stats.color_histogram {
        options.palette = PaletteChoice::Custom(Palette::auto(histogram));
      }
    }
    convert_file(&self.path, dest, &options, cancel, progress)
  }

  /// Saves in the given format, then deletes the temporary file.
  ///
  /// On failure or cancellation the temporary file is kept.
  pub fn save(
    &mut self, dest: &Path, format: OutputFormat, options: &ConvertOptions, cancel: &CancelToken,
    progress: impl FnMut(f32),
  ) -> Result<()> {
    match format {
      OutputFormat::Apng => self.save_apng(dest),
      OutputFormat::Gif => {
        if self.removed {
          return Err(FramecastError::EncoderState("recording already saved"));
        }
        self.convert_to_gif(dest, options, cancel, progress)?;
        self.removed = remove_with_retries(&self.path);
        Ok(())
      }
    }
  }

  /// Deletes the temporary file. Gives `false` if that kept failing, in which
  /// case the delete is tried once more on drop.
  pub fn discard(mut self) -> bool {
    self.removed = remove_with_retries(&self.path);
    self.removed
  }
}
impl Drop for Recording {
  fn drop(&mut self) {
    if self.removed {
      return;
    }
    match fs::remove_file(&self.path) {
      Ok(()) => (),
      Err(e) if e.kind() == ErrorKind::NotFound => (),
      Err(e) => warn!("leaving {} behind: {e}", self.path.display()),
    }
  }
}
