use super::{build_png, encode_apng, rand_bytes};
use framecast::{
  png::{
    AnimationControl, ApngDecoder, ChunkReader, ChunkType, DecodeOptions, FrameControl, PixelMode,
    IHDR, PNG_SIGNATURE,
  },
  FramecastError, RgbImage, RGB8,
};
use miniz_oxide::deflate::compress_to_vec_zlib;

fn decode_all(bytes: &[u8]) -> (ApngDecoder<&[u8]>, Vec<framecast::png::DecodedFrame>) {
  let mut decoder = ApngDecoder::new(bytes, DecodeOptions::default()).unwrap();
  let mut frames = Vec::new();
  while let Some(frame) = decoder.next_frame().unwrap() {
    frames.push(frame);
  }
  (decoder, frames)
}

/// Draws each decoded frame onto a canvas, giving the canvas after each one.
fn composite(width: u32, height: u32, frames: &[framecast::png::DecodedFrame]) -> Vec<RgbImage> {
  let mut canvas = RgbImage::new(width, height);
  let mut out = Vec::new();
  for frame in frames {
    let c = frame.control;
    let rgb = frame.to_rgb(&[]).unwrap();
    for y in 0..c.height {
      for x in 0..c.width {
        let i = ((y * c.width + x) * 3) as usize;
        canvas.put(c.x_offset + x, c.y_offset + y, RGB8::from_slice(&rgb[i..i + 3]));
      }
    }
    out.push(canvas.clone());
  }
  out
}

#[test]
fn test_ChunkReader_random_data_no_panics() {
  for _ in 0..20 {
    let mut v = PNG_SIGNATURE.to_vec();
    v.extend(rand_bytes(512));
    for chunk in ChunkReader::new(v.as_slice()).unwrap() {
      if chunk.is_err() {
        break;
      }
    }
  }
  assert!(matches!(ChunkReader::new(&b"GIF89a.."[..]), Err(FramecastError::NoPngSignature)));
}

#[test]
fn test_decode_what_the_encoder_writes() {
  let frames: Vec<(RgbImage, u32)> = (0..4_u8)
    .map(|n| {
      let image = RgbImage::from_fn(9, 7, |x, y| {
        if x >= u32::from(n) && x < u32::from(n) + 3 && y >= 2 && y < 4 {
          RGB8::new(200, 10 * n, 40)
        } else {
          RGB8::new(x as u8 * 20, y as u8 * 30, 7)
        }
      });
      (image, 40 + u32::from(n) * 10)
    })
    .collect();
  let bytes = encode_apng(&frames, 3);

  let (decoder, decoded) = decode_all(&bytes);
  assert_eq!(decoder.header().width, 9);
  assert_eq!(decoder.header().pixel_mode, PixelMode::RGB8);
  let animation = decoder.animation().unwrap();
  assert_eq!(animation.num_frames, 4);
  assert_eq!(animation.num_plays, 3);
  assert_eq!(decoded.len(), 4);

  // after the first, frames only hold the part that moved
  assert_eq!((decoded[0].control.width, decoded[0].control.height), (9, 7));
  assert!(decoded[1].control.width < 9);
  assert_eq!(decoded[1].control.y_offset, 2);
  assert_eq!(decoded[1].control.height, 2);

  for (n, frame) in decoded.iter().enumerate() {
    assert_eq!(frame.control.duration_ms(), 40 + n as u32 * 10);
  }
  let canvases = composite(9, 7, &decoded);
  for ((expected, _), got) in frames.iter().zip(&canvases) {
    assert_eq!(expected, got);
  }
}

#[test]
fn test_random_frames_survive_encoding() {
  let frames: Vec<(RgbImage, u32)> = (0..3)
    .map(|_| (RgbImage::from_raw(16, 5, rand_bytes(16 * 5 * 3)).unwrap(), 100))
    .collect();
  let bytes = encode_apng(&frames, 0);
  let (_, decoded) = decode_all(&bytes);
  let canvases = composite(16, 5, &decoded);
  assert_eq!(canvases.len(), 3);
  for ((expected, _), got) in frames.iter().zip(&canvases) {
    assert_eq!(expected, got);
  }
}

#[test]
fn test_identical_frames_merge() {
  let a = RgbImage::from_fn(4, 4, |x, _| RGB8::gray(x as u8 * 60));
  let b = RgbImage::from_fn(4, 4, |_, y| RGB8::gray(y as u8 * 60));
  let bytes = encode_apng(&[(a.clone(), 100), (a, 100), (b.clone(), 50), (b, 70)], 0);
  let (decoder, decoded) = decode_all(&bytes);
  assert_eq!(decoder.animation().unwrap().num_frames, 2);
  assert_eq!(decoded[0].control.duration_ms(), 200);
  assert_eq!(decoded[1].control.duration_ms(), 120);
}

fn gray_png(width: u32, height: u32, rows: &[&[u8]], split_into: usize) -> Vec<u8> {
  let header = IHDR { width, height, pixel_mode: PixelMode::Y8, is_interlaced: false };
  let mut filtered = Vec::new();
  for row in rows {
    // sub filter: each byte is stored as the difference from its left neighbor
    filtered.push(1);
    let mut left = 0_u8;
    for &b in *row {
      filtered.push(b.wrapping_sub(left));
      left = b;
    }
  }
  let zlib = compress_to_vec_zlib(&filtered, 6);
  let mut chunks = vec![(ChunkType::IHDR, header.to_bytes().to_vec())];
  let piece = (zlib.len() + split_into - 1) / split_into;
  for part in zlib.chunks(piece.max(1)) {
    chunks.push((ChunkType::IDAT, part.to_vec()));
  }
  chunks.push((ChunkType::IEND, Vec::new()));
  build_png(&chunks)
}

#[test]
fn test_zlib_stream_split_over_many_chunks() {
  let rows: [&[u8]; 3] = [&[0, 10, 20, 30], &[255, 128, 64, 32], &[9, 9, 9, 9]];
  for split in [1, 2, 5, 1000] {
    let bytes = gray_png(4, 3, &rows, split);
    let (decoder, decoded) = decode_all(&bytes);
    assert!(decoder.animation().is_none());
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].control.width, 4);
    assert_eq!(decoded[0].to_indices().unwrap(), rows.concat());
    assert_eq!(decoder.sample_palette().len(), 256);
  }
}

#[test]
fn test_crc_checking() {
  let rows: [&[u8]; 1] = [&[1, 2]];
  let mut bytes = gray_png(2, 1, &rows, 1);
  // flip a bit in the IHDR CRC
  bytes[8 + 8 + 13] ^= 1;
  assert!(matches!(
    ApngDecoder::new(bytes.as_slice(), DecodeOptions::default()),
    Err(FramecastError::CrcMismatch { .. })
  ));
  let mut decoder = ApngDecoder::new(bytes.as_slice(), DecodeOptions { verify_crc: false }).unwrap();
  assert_eq!(decoder.next_frame().unwrap().unwrap().to_indices().unwrap(), [1, 2]);
}

#[test]
fn test_stream_errors() {
  let rows: [&[u8]; 1] = [&[1, 2]];
  let good = gray_png(2, 1, &rows, 1);

  // cut off in the middle of the IDAT
  let cut = &good[..good.len() - 16];
  let result = ApngDecoder::new(cut, DecodeOptions::default())
    .and_then(|mut decoder| decoder.next_frame().map(|_| ()));
  assert!(matches!(result, Err(FramecastError::UnexpectedEof)));

  let no_header = build_png(&[(ChunkType::IEND, Vec::new())]);
  assert!(matches!(
    ApngDecoder::new(no_header.as_slice(), DecodeOptions::default()),
    Err(FramecastError::ChunkBeforeIhdr { .. })
  ));

  let header = IHDR { width: 2, height: 1, pixel_mode: PixelMode::Index8, is_interlaced: false };
  let no_palette = build_png(&[
    (ChunkType::IHDR, header.to_bytes().to_vec()),
    (ChunkType::IDAT, compress_to_vec_zlib(&[0, 0, 0], 6)),
    (ChunkType::IEND, Vec::new()),
  ]);
  assert!(matches!(
    ApngDecoder::new(no_palette.as_slice(), DecodeOptions::default()),
    Err(FramecastError::MissingPalette)
  ));
}

#[test]
fn test_one_chunk_holds_two_frames() {
  let header = IHDR { width: 2, height: 1, pixel_mode: PixelMode::Y8, is_interlaced: false };
  let mut zlib = compress_to_vec_zlib(&[0, 1, 2], 6);
  let first_len = zlib.len();
  zlib.extend(compress_to_vec_zlib(&[0, 3, 4], 6));
  for sequence_number in [0, u32::MAX] {
    let fctl = FrameControl {
      sequence_number,
      width: 2,
      height: 1,
      x_offset: 0,
      y_offset: 0,
      delay_num: 30,
      delay_den: 1000,
      dispose_op: 0,
      blend_op: 0,
    };
    // split so the middle chunk holds the tail of one stream and the head of the next
    for split in [zlib.len(), first_len + 2] {
      let mut chunks = vec![
        (ChunkType::IHDR, header.to_bytes().to_vec()),
        (ChunkType::acTL, AnimationControl { num_frames: 2, num_plays: 0 }.to_bytes().to_vec()),
        (ChunkType::fcTL, fctl.to_bytes().to_vec()),
        (ChunkType::IDAT, zlib[..first_len - 3].to_vec()),
        (ChunkType::IDAT, zlib[first_len - 3..split].to_vec()),
      ];
      if split < zlib.len() {
        chunks.push((ChunkType::IDAT, zlib[split..].to_vec()));
      }
      chunks.push((ChunkType::IEND, Vec::new()));
      let (_, decoded) = decode_all(&build_png(&chunks));
      assert_eq!(decoded.len(), 2);
      assert_eq!(decoded[0].to_indices().unwrap(), [1, 2]);
      assert_eq!(decoded[1].to_indices().unwrap(), [3, 4]);
      assert_eq!(decoded[0].control, fctl);
      assert_eq!(decoded[1].control.sequence_number, sequence_number.wrapping_add(1));
      assert_eq!(decoded[1].control.duration_ms(), 30);
    }
  }
}

#[test]
fn test_interlaced_is_rejected() {
  let header = IHDR { width: 2, height: 1, pixel_mode: PixelMode::Y8, is_interlaced: true };
  let png = build_png(&[
    (ChunkType::IHDR, header.to_bytes().to_vec()),
    (ChunkType::IDAT, compress_to_vec_zlib(&[0, 1, 2], 6)),
    (ChunkType::IEND, Vec::new()),
  ]);
  assert!(matches!(
    ApngDecoder::new(png.as_slice(), DecodeOptions::default()),
    Err(FramecastError::InvalidHeader(_))
  ));
}

#[test]
fn test_huge_header_with_little_data() {
  for size in [60_000, i32::MAX as u32] {
    let header =
      IHDR { width: size, height: size, pixel_mode: PixelMode::RGBA16, is_interlaced: false };
    let png = build_png(&[
      (ChunkType::IHDR, header.to_bytes().to_vec()),
      (ChunkType::IDAT, compress_to_vec_zlib(&[0; 64], 6)),
      (ChunkType::IEND, Vec::new()),
    ]);
    let mut decoder = ApngDecoder::new(png.as_slice(), DecodeOptions::default()).unwrap();
    let result = decoder.next_frame();
    assert!(
      matches!(
        result,
        Err(FramecastError::Decompress(_) | FramecastError::InvalidDimensions { .. })
      ),
      "{size}: {result:?}"
    );
  }
}
