use super::{build_png, encode_apng, parse_gif, ParsedGif};
use framecast::{
  png::{ChunkType, PixelMode, IHDR},
  quantize::NamedPalette,
  spawn_convert, CancelToken, ConvertOptions, FramecastError, PaletteChoice, ProgressEvent,
  RgbImage, RGB8,
};
use miniz_oxide::deflate::compress_to_vec_zlib;
use std::io::Cursor;

/// Two 4x4 gray frames that differ only at (1,1).
fn two_frames() -> Vec<(RgbImage, u32)> {
  let a = RgbImage::from_fn(4, 4, |x, y| RGB8::gray(((x + 4 * y) * 10) as u8));
  let mut b = a.clone();
  b.put(1, 1, RGB8::gray(250));
  vec![(a, 100), (b, 250)]
}

fn run(apng: &[u8], options: &ConvertOptions) -> (framecast::GifSummary, ParsedGif) {
  let mut gif = Vec::new();
  let summary =
    framecast::convert(Cursor::new(apng), &mut gif, options, &CancelToken::new(), |_| ()).unwrap();
  (summary, parse_gif(&gif))
}

/// Replays the frames onto a canvas of palette colors.
fn composite(gif: &ParsedGif) -> Vec<Vec<[u8; 3]>> {
  let mut canvas = vec![[0_u8; 3]; usize::from(gif.width) * usize::from(gif.height)];
  let mut out = Vec::new();
  for frame in &gif.frames {
    for (i, index) in frame.indices.iter().enumerate() {
      let x = usize::from(frame.x) + i % usize::from(frame.width);
      let y = usize::from(frame.y) + i / usize::from(frame.width);
      canvas[y * usize::from(gif.width) + x] = gif.global_table[usize::from(*index)];
    }
    out.push(canvas.clone());
  }
  out
}

fn as_triples(image: &RgbImage) -> Vec<[u8; 3]> {
  image.pixels().iter().map(|c| [c.r, c.g, c.b]).collect()
}

#[test]
fn test_two_frames_named_palette() {
  let apng = encode_apng(&two_frames(), 0);
  let options = ConvertOptions::default()
    .with_palette(PaletteChoice::Named(NamedPalette::Grayscale))
    .with_dither(false);
  let (summary, gif) = run(&apng, &options);

  assert_eq!(summary.frame_count, 2);
  assert!(summary.quantized);
  assert_eq!(summary.palette_len, 256);
  assert_eq!(gif.global_table.len(), 256);
  assert_eq!(gif.loop_count, Some(0));
  assert_eq!(gif.frames.len(), 2);

  let first = &gif.frames[0];
  assert_eq!((first.width, first.height), (4, 4));
  assert_eq!(first.delay_cs, 10);
  let expected: Vec<u8> = (0..16).map(|i| (i * 10) as u8).collect();
  assert_eq!(first.indices, expected);

  let second = &gif.frames[1];
  assert_eq!((second.x, second.y, second.width, second.height), (1, 1, 1, 1));
  assert_eq!(second.delay_cs, 25);
  assert_eq!(second.disposal, 1);
  assert_eq!(second.indices, [250]);
}

#[test]
fn test_auto_palette_keeps_exact_colors() {
  let frames = two_frames();
  let apng = encode_apng(&frames, 2);
  let (summary, gif) = run(&apng, &ConvertOptions::default());
  assert!(summary.quantized);
  // 2 plays is 1 repeat
  assert_eq!(gif.loop_count, Some(1));
  let canvases = composite(&gif);
  for ((expected, _), got) in frames.iter().zip(&canvases) {
    assert_eq!(&as_triples(expected), got);
  }
}

/// A 2x2 truecolor PNG, with the given suggested palette if any.
fn rgb_png(plte: Option<&[[u8; 3]]>) -> (RgbImage, Vec<u8>) {
  let pixels = [[250, 0, 0], [0, 0, 250], [10, 240, 10], [0, 10, 200]];
  let image = RgbImage::from_fn(2, 2, |x, y| {
    let [r, g, b] = pixels[(y * 2 + x) as usize];
    RGB8::new(r, g, b)
  });
  let mut filtered = Vec::new();
  for row in pixels.chunks(2) {
    filtered.push(0);
    filtered.extend(row.concat());
  }
  let mut chunks = vec![(ChunkType::IHDR, IHDR::rgb8(2, 2).to_bytes().to_vec())];
  if let Some(plte) = plte {
    chunks.push((ChunkType::PLTE, plte.concat()));
  }
  chunks.push((ChunkType::IDAT, compress_to_vec_zlib(&filtered, 6)));
  chunks.push((ChunkType::IEND, Vec::new()));
  (image, build_png(&chunks))
}

#[test]
fn test_source_palette() {
  let plte = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
  let (_, png) = rgb_png(Some(&plte));
  let options = ConvertOptions::default().with_palette(PaletteChoice::Source).with_dither(false);
  let (summary, gif) = run(&png, &options);
  assert!(summary.quantized);
  assert_eq!(summary.palette_len, 3);
  // padded up to a power of two
  assert_eq!(gif.global_table.len(), 4);
  assert_eq!(gif.global_table[..3], plte);
  assert_eq!(gif.frames[0].indices, [0, 2, 1, 2]);

  // no PLTE: a palette is built from the colors instead
  let (image, png) = rgb_png(None);
  let (summary, gif) = run(&png, &options);
  assert!(summary.quantized);
  assert_eq!(composite(&gif), [as_triples(&image)]);
}

#[test]
fn test_loop_count_override() {
  let apng = encode_apng(&two_frames(), 1);
  let (_, gif) = run(&apng, &ConvertOptions::default());
  assert_eq!(gif.loop_count, None);
  let (_, gif) = run(&apng, &ConvertOptions::default().with_loop_count(Some(5)));
  assert_eq!(gif.loop_count, Some(5));
}

#[test]
fn test_grayscale_source_passes_through() {
  let header = IHDR { width: 3, height: 2, pixel_mode: PixelMode::Y8, is_interlaced: false };
  let filtered = [0, 5, 100, 200, 0, 255, 0, 7];
  let png = build_png(&[
    (ChunkType::IHDR, header.to_bytes().to_vec()),
    (ChunkType::IDAT, compress_to_vec_zlib(&filtered, 6)),
    (ChunkType::IEND, Vec::new()),
  ]);
  let (summary, gif) = run(&png, &ConvertOptions::default());
  assert!(!summary.quantized);
  assert_eq!(summary.frame_count, 1);
  assert_eq!(gif.global_table.len(), 256);
  assert_eq!(gif.global_table[200], [200, 200, 200]);
  assert_eq!(gif.frames[0].indices, [5, 100, 200, 255, 0, 7]);
  // a still image has no acTL, so it plays once
  assert_eq!(gif.loop_count, None);
}

#[test]
fn test_cancelled_conversion() {
  let apng = encode_apng(&two_frames(), 0);
  let cancel = CancelToken::new();
  cancel.cancel();
  let mut gif = Vec::new();
  let result = framecast::convert(
    Cursor::new(&apng),
    &mut gif,
    &ConvertOptions::default().with_palette(PaletteChoice::Named(NamedPalette::Vga16)),
    &cancel,
    |_| (),
  );
  assert!(matches!(result, Err(FramecastError::Cancelled)));

  let dir = tempfile::tempdir().unwrap();
  let src = dir.path().join("in.png");
  let dst = dir.path().join("out.gif");
  std::fs::write(&src, &apng).unwrap();
  let result = framecast::convert_file(&src, &dst, &ConvertOptions::default(), &cancel, |_| ());
  assert!(result.unwrap_err().is_cancelled());
  assert!(!dst.exists());
}

#[test]
fn test_background_conversion_events() {
  let dir = tempfile::tempdir().unwrap();
  let src = dir.path().join("in.png");
  let dst = dir.path().join("out.gif");
  std::fs::write(&src, encode_apng(&two_frames(), 0)).unwrap();

  let task = spawn_convert(src, dst.clone(), ConvertOptions::default()).unwrap();
  let mut events = Vec::new();
  for event in task.events().iter() {
    let done = event.is_terminal();
    events.push(event);
    if done {
      break;
    }
  }
  let Some(ProgressEvent::Finished(summary)) = events.last() else {
    panic!("conversion didn't finish: {events:?}");
  };
  assert_eq!(summary.frame_count, 2);
  assert_eq!(events.last().unwrap().sentinel(), 101.0);

  let percents: Vec<f32> = events
    .iter()
    .filter_map(|e| match e {
      ProgressEvent::Progress(p) => Some(*p),
      _ => None,
    })
    .collect();
  assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
  assert_eq!(percents.last().copied(), Some(100.0));

  let gif = parse_gif(&std::fs::read(&dst).unwrap());
  assert_eq!(gif.frames.len(), 2);
}

#[test]
fn test_missing_input_fails_in_background() {
  let dir = tempfile::tempdir().unwrap();
  let task =
    spawn_convert(dir.path().join("nope.png"), dir.path().join("out.gif"), ConvertOptions::default())
      .unwrap();
  let event = task.wait();
  assert!(matches!(event, ProgressEvent::Failed(_)));
  assert_eq!(event.sentinel(), -1.0);
}
