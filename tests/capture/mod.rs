use super::parse_gif;
use framecast::{
  png::{ApngDecoder, DecodeOptions},
  CancelToken, CaptureConfig, ColorFilter, ConvertOptions, FrameSource, FramecastError,
  OutputFormat, Recorder, RgbImage, RGB8,
};
use std::{
  fs::File,
  io::BufReader,
  path::Path,
  sync::mpsc::{channel, Receiver, Sender},
  time::Duration,
};

/// Gives a different frame on every grab and reports each grab on a channel.
struct CountingSource {
  grabs: u32,
  fail_after: Option<u32>,
  tx: Sender<u32>,
}
impl FrameSource for CountingSource {
  fn size(&self) -> (u32, u32) {
    (6, 4)
  }

  fn grab(&mut self) -> framecast::Result<RgbImage> {
    if self.fail_after == Some(self.grabs) {
      return Err(FramecastError::EncoderState("screen went away"));
    }
    self.grabs += 1;
    let n = self.grabs;
    let _ = self.tx.send(n);
    Ok(RgbImage::from_fn(6, 4, |x, y| RGB8::new((x * 40) as u8, (y * 60) as u8, (n * 17) as u8)))
  }
}

fn make_source(fail_after: Option<u32>) -> (CountingSource, Receiver<u32>) {
  let (tx, rx) = channel();
  (CountingSource { grabs: 0, fail_after, tx }, rx)
}

fn wait_for_grabs(rx: &Receiver<u32>, count: u32) {
  while rx.recv_timeout(Duration::from_secs(10)).unwrap() < count {}
}

fn frames_in(path: &Path) -> u32 {
  let file = BufReader::new(File::open(path).unwrap());
  let mut decoder = ApngDecoder::new(file, DecodeOptions::default()).unwrap();
  let mut frames = 0;
  while decoder.next_frame().unwrap().is_some() {
    frames += 1;
  }
  assert_eq!(decoder.animation().unwrap().num_frames, frames);
  frames
}

fn config(dir: &Path) -> CaptureConfig {
  CaptureConfig::default().with_frame_delay(Duration::from_millis(5)).with_temp_dir(dir)
}

#[test]
fn test_record_and_save_apng() {
  let dir = tempfile::tempdir().unwrap();
  let (source, rx) = make_source(None);
  let recorder = Recorder::start(source, config(dir.path()).with_loop_count(4)).unwrap();
  let temp = recorder.path().to_path_buf();
  assert!(temp.exists());
  wait_for_grabs(&rx, 3);
  let mut recording = recorder.stop().unwrap();

  let stats = recording.statistics().clone();
  assert!(stats.frame_count >= 3);
  assert_eq!((stats.width, stats.height), (6, 4));
  assert!(stats.color_histogram.as_ref().unwrap().pixel_count() >= 3 * 24);

  let dest = dir.path().join("saved.png");
  recording.save_apng(&dest).unwrap();
  assert!(!temp.exists());
  assert_eq!(frames_in(&dest), stats.frame_count);
  assert!(recording.save_apng(&dir.path().join("again.png")).is_err());
  drop(recording);
  assert!(dest.exists());

  let decoder = ApngDecoder::new(File::open(&dest).unwrap(), DecodeOptions::default()).unwrap();
  assert_eq!(decoder.animation().unwrap().num_plays, 4);
  assert!(decoder.text().iter().any(|(k, _)| k == "Software"));
}

#[test]
fn test_record_to_gif() {
  let dir = tempfile::tempdir().unwrap();
  let (source, rx) = make_source(None);
  let config = config(dir.path()).with_color_filter(ColorFilter::Green);
  let recorder = Recorder::start(source, config).unwrap();
  wait_for_grabs(&rx, 2);
  let recording = recorder.stop().unwrap();
  let temp = recording.path().to_path_buf();
  let frames = recording.statistics().frame_count;

  let dest = dir.path().join("out.gif");
  let summary = recording
    .convert_to_gif(&dest, &ConvertOptions::default(), &CancelToken::new(), |_| ())
    .unwrap();
  assert_eq!(summary.frame_count, frames);
  // the green filter's own palette was used, so every color is a green tint
  let gif = parse_gif(&std::fs::read(&dest).unwrap());
  assert!(gif.global_table.iter().all(|[r, g, b]| g >= r && g >= b));

  assert!(temp.exists());
  assert!(recording.discard());
  assert!(!temp.exists());
}

#[test]
fn test_save_by_format() {
  let dir = tempfile::tempdir().unwrap();
  let (source, rx) = make_source(None);
  let recorder = Recorder::start(source, config(dir.path())).unwrap();
  wait_for_grabs(&rx, 1);
  let mut recording = recorder.stop().unwrap();
  let temp = recording.path().to_path_buf();
  let dest = dir.path().join("clip.gif");
  let format = OutputFormat::from_extension("gif").unwrap();
  recording
    .save(&dest, format, &ConvertOptions::default(), &CancelToken::new(), |_| ())
    .unwrap();
  assert!(dest.exists());
  assert!(!temp.exists());
}

#[test]
fn test_failed_save_keeps_recording() {
  let dir = tempfile::tempdir().unwrap();
  let (source, rx) = make_source(None);
  let recorder = Recorder::start(source, config(dir.path())).unwrap();
  wait_for_grabs(&rx, 2);
  let mut recording = recorder.stop().unwrap();
  let temp = recording.path().to_path_buf();
  let frames = recording.statistics().frame_count;

  let nowhere = dir.path().join("missing").join("clip.gif");
  let options = ConvertOptions::default();
  let result = recording.save(&nowhere, OutputFormat::Gif, &options, &CancelToken::new(), |_| ());
  assert!(matches!(result, Err(FramecastError::Io(_))));
  assert!(temp.exists());

  let cancel = CancelToken::new();
  cancel.cancel();
  let dest = dir.path().join("clip.gif");
  let result = recording.save(&dest, OutputFormat::Gif, &options, &cancel, |_| ());
  assert!(result.unwrap_err().is_cancelled());
  assert!(temp.exists());
  assert!(!dest.exists());

  let nowhere_png = nowhere.with_extension("png");
  let result = recording.save(&nowhere_png, OutputFormat::Apng, &options, &cancel, |_| ());
  assert!(result.is_err());
  assert!(temp.exists());

  // the capture is still whole, so saving again works
  recording.save(&dest, OutputFormat::Gif, &options, &CancelToken::new(), |_| ()).unwrap();
  assert!(!temp.exists());
  assert_eq!(parse_gif(&std::fs::read(&dest).unwrap()).frames.len() as u32, frames);
}

#[test]
fn test_grab_failure_removes_temp_file() {
  let dir = tempfile::tempdir().unwrap();
  let (source, rx) = make_source(Some(2));
  let recorder = Recorder::start(source, config(dir.path())).unwrap();
  let temp = recorder.path().to_path_buf();
  wait_for_grabs(&rx, 2);
  // give the capture thread time to hit the failing grab
  std::thread::sleep(Duration::from_millis(100));
  assert!(matches!(recorder.stop(), Err(FramecastError::EncoderState(_))));
  assert!(!temp.exists());
}

#[test]
fn test_dropped_recorder_and_recording_clean_up() {
  let dir = tempfile::tempdir().unwrap();
  let (source, rx) = make_source(None);
  let recorder = Recorder::start(source, config(dir.path())).unwrap();
  let temp = recorder.path().to_path_buf();
  wait_for_grabs(&rx, 1);
  drop(recorder);
  assert!(!temp.exists());

  let (source, rx) = make_source(None);
  let recorder = Recorder::start(source, config(dir.path())).unwrap();
  wait_for_grabs(&rx, 1);
  let recording = recorder.stop().unwrap();
  let temp = recording.path().to_path_buf();
  drop(recording);
  assert!(!temp.exists());
}
