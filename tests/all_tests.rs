#![allow(bad_style)]

mod capture;
mod gif;
mod png;
mod transcode;

use framecast::{
  png::{encode_chunk, ApngEncoder, ChunkType, EncoderOptions, PNG_SIGNATURE},
  RgbImage,
};
use std::io::Cursor;

fn rand_bytes(count: usize) -> Vec<u8> {
  let mut buffer = vec![0; count];
  getrandom::getrandom(&mut buffer).unwrap();
  buffer
}

/// Runs frames through the APNG encoder, each shown for its delay.
fn encode_apng(frames: &[(RgbImage, u32)], loop_count: u32) -> Vec<u8> {
  let (first, _) = &frames[0];
  let mut encoder = ApngEncoder::new(Cursor::new(Vec::new()), EncoderOptions::default());
  encoder.start(first.width(), first.height()).unwrap();
  for (image, delay_ms) in frames {
    encoder.add_frame(image, false, *delay_ms).unwrap();
  }
  encoder.close(loop_count).unwrap();
  encoder.into_inner().into_inner()
}

/// Builds a PNG stream from `(type, payload)` pairs.
fn build_png(chunks: &[(ChunkType, Vec<u8>)]) -> Vec<u8> {
  let mut out = PNG_SIGNATURE.to_vec();
  for (kind, payload) in chunks {
    out.extend(encode_chunk(*kind, payload));
  }
  out
}

/// What the test side GIF reader found in a stream.
#[derive(Debug, Default)]
struct ParsedGif {
  width: u16,
  height: u16,
  global_table: Vec<[u8; 3]>,
  loop_count: Option<u16>,
  frames: Vec<ParsedFrame>,
}

#[derive(Debug, Default, Clone)]
struct ParsedFrame {
  x: u16,
  y: u16,
  width: u16,
  height: u16,
  delay_cs: u16,
  disposal: u8,
  min_code_size: u8,
  indices: Vec<u8>,
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
  u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Concatenates sub-blocks starting at `pos`, giving the data and the position
/// after the terminator.
fn read_sub_blocks(bytes: &[u8], mut pos: usize) -> (Vec<u8>, usize) {
  let mut data = Vec::new();
  loop {
    let len = bytes[pos] as usize;
    pos += 1;
    if len == 0 {
      return (data, pos);
    }
    data.extend_from_slice(&bytes[pos..pos + len]);
    pos += len;
  }
}

/// A plain GIF LZW decoder.
fn lzw_decode(data: &[u8], min_code_size: u8) -> Vec<u8> {
  let clear = 1_usize << min_code_size;
  let end = clear + 1;
  let reset_bits = u32::from(min_code_size) + 1;
  let reset_table = || -> Vec<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = (0..clear).map(|i| vec![i as u8]).collect();
    table.push(Vec::new());
    table.push(Vec::new());
    table
  };
  let mut table = reset_table();
  let mut bits = reset_bits;
  let mut prev: Option<Vec<u8>> = None;
  let mut out = Vec::new();
  let (mut acc, mut acc_bits, mut pos) = (0_u32, 0_u32, 0_usize);
  loop {
    while acc_bits < bits {
      assert!(pos < data.len(), "code stream ended without an end code");
      acc |= u32::from(data[pos]) << acc_bits;
      acc_bits += 8;
      pos += 1;
    }
    let code = (acc & ((1 << bits) - 1)) as usize;
    acc >>= bits;
    acc_bits -= bits;
    if code == clear {
      table = reset_table();
      bits = reset_bits;
      prev = None;
      continue;
    }
    if code == end {
      break;
    }
    let entry = if code < table.len() {
      table[code].clone()
    } else {
      assert_eq!(code, table.len(), "code past the next free code");
      let mut e = prev.clone().expect("KwKwK code with no previous code");
      e.push(e[0]);
      e
    };
    out.extend_from_slice(&entry);
    if let Some(mut p) = prev.take() {
      if table.len() < 4096 {
        p.push(entry[0]);
        table.push(p);
      }
    }
    if table.len() == (1 << bits) && bits < 12 {
      bits += 1;
    }
    prev = Some(entry);
  }
  out
}

fn parse_gif(bytes: &[u8]) -> ParsedGif {
  assert_eq!(&bytes[..6], b"GIF89a");
  let mut gif = ParsedGif { width: read_u16(bytes, 6), height: read_u16(bytes, 8), ..Default::default() };
  let packed = bytes[10];
  assert!(packed & 0x80 != 0, "no global color table");
  let table_len = 2_usize << (packed & 0b111);
  let mut pos = 13;
  for _ in 0..table_len {
    gif.global_table.push([bytes[pos], bytes[pos + 1], bytes[pos + 2]]);
    pos += 3;
  }
  let mut control = ParsedFrame::default();
  loop {
    match bytes[pos] {
      0x21 => {
        let label = bytes[pos + 1];
        let (data, next) = read_sub_blocks(bytes, pos + 2);
        match label {
          0xF9 => {
            control.disposal = (data[0] >> 2) & 0b111;
            control.delay_cs = read_u16(&data, 1);
          }
          0xFF => {
            assert_eq!(&data[..11], b"NETSCAPE2.0");
            assert_eq!(data[11], 1);
            gif.loop_count = Some(read_u16(&data, 12));
          }
          _ => (),
        }
        pos = next;
      }
      0x2C => {
        let mut frame = control.clone();
        frame.x = read_u16(bytes, pos + 1);
        frame.y = read_u16(bytes, pos + 3);
        frame.width = read_u16(bytes, pos + 5);
        frame.height = read_u16(bytes, pos + 7);
        assert_eq!(bytes[pos + 9] & 0x80, 0, "unexpected local color table");
        frame.min_code_size = bytes[pos + 10];
        let (data, next) = read_sub_blocks(bytes, pos + 11);
        frame.indices = lzw_decode(&data, frame.min_code_size);
        gif.frames.push(frame);
        pos = next;
      }
      0x3B => {
        assert_eq!(pos + 1, bytes.len(), "bytes after the trailer");
        return gif;
      }
      other => panic!("unexpected block 0x{other:02X} at {pos}"),
    }
  }
}
