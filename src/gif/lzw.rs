//! GIF flavored LZW compression.
//!
//! Codes are 3 to 12 bits wide, packed least significant bit first. The
//! dictionary lives in an open addressed hash table keyed by
//! `(pixel << 12) | prefix`, probed with a secondary hash, the same layout
//! the classic `compress`-derived GIF encoders use.

use std::io::Write;

/// Largest code width.
const MAX_BITS: u32 = 12;

/// Codes available at `MAX_BITS`.
const MAX_CODES: u32 = 1 << MAX_BITS;

/// Hash table size: a prime comfortably above `MAX_CODES`.
const HSIZE: usize = 5003;

/// How far the pixel is shifted when hashing.
const HSHIFT: u32 = 4;

/// Packs variable width codes into bytes, low bits first.
#[derive(Debug, Default)]
struct BitPacker {
  out: Vec<u8>,
  acc: u32,
  acc_bits: u32,
}
impl BitPacker {
  #[inline]
  fn push(&mut self, code: u32, bits: u32) {
    self.acc |= code << self.acc_bits;
    self.acc_bits += bits;
    while self.acc_bits >= 8 {
      self.out.push(self.acc as u8);
      self.acc >>= 8;
      self.acc_bits -= 8;
    }
  }

  fn finish(mut self) -> Vec<u8> {
    if self.acc_bits > 0 {
      self.out.push(self.acc as u8);
    }
    self.out
  }
}

/// The dictionary: `(pixel, prefix)` keys to codes.
struct CodeTable {
  keys: Vec<i32>,
  codes: Vec<u16>,
}
impl CodeTable {
  fn new() -> Self {
    Self { keys: vec![-1; HSIZE], codes: vec![0; HSIZE] }
  }

  fn clear(&mut self) {
    self.keys.fill(-1);
  }

  /// Looks up a key, giving either its code or the empty slot it would go in.
  #[inline]
  fn find(&self, pixel: u8, prefix: u32) -> Result<u16, usize> {
    let key = ((u32::from(pixel) << MAX_BITS) | prefix) as i32;
    let mut i = ((u32::from(pixel) << HSHIFT) ^ prefix) as usize;
    let disp = if i == 0 { 1 } else { HSIZE - i };
    loop {
      match self.keys[i] {
        k if k == key => return Ok(self.codes[i]),
        k if k < 0 => return Err(i),
        _ => {
          i = if i >= disp { i - disp } else { i + HSIZE - disp };
        }
      }
    }
  }

  #[inline]
  fn insert(&mut self, slot: usize, pixel: u8, prefix: u32, code: u32) {
    self.keys[slot] = ((u32::from(pixel) << MAX_BITS) | prefix) as i32;
    self.codes[slot] = code as u16;
  }
}

/// Compresses `indices` into a raw GIF LZW code stream (no sub-blocks).
///
/// `min_code_size` is the value written before the image data, 2 to 8, and
/// every index must be below `1 << min_code_size`.
///
/// The stream starts with a clear code and ends with the end code. When the
/// dictionary fills up a clear code is sent and it starts over.
#[must_use]
pub fn compress(indices: &[u8], min_code_size: u8) -> Vec<u8> {
  debug_assert!((2..=8).contains(&min_code_size));
  let clear_code = 1_u32 << min_code_size;
  let end_code = clear_code + 1;
  let first_free = clear_code + 2;
  let reset_bits = u32::from(min_code_size) + 1;

  let mut packer = BitPacker::default();
  let mut table = CodeTable::new();
  let mut bits = reset_bits;
  let mut next_code = first_free;

  packer.push(clear_code, bits);
  let Some((&first, rest)) = indices.split_first() else {
    packer.push(end_code, bits);
    return packer.finish();
  };
  let mut prefix = u32::from(first);
  for &pixel in rest {
    match table.find(pixel, prefix) {
      Ok(code) => prefix = u32::from(code),
      Err(slot) => {
        packer.push(prefix, bits);
        if next_code < MAX_CODES {
          table.insert(slot, pixel, prefix, next_code);
          next_code += 1;
          // the decoder widens one code later, once it has added this entry
          if next_code > (1 << bits) && bits < MAX_BITS {
            bits += 1;
          }
        } else {
          packer.push(clear_code, bits);
          table.clear();
          bits = reset_bits;
          next_code = first_free;
        }
        prefix = u32::from(pixel);
      }
    }
  }
  packer.push(prefix, bits);
  // the decoder still adds an entry for that last code
  if next_code == (1 << bits) && bits < MAX_BITS {
    bits += 1;
  }
  packer.push(end_code, bits);
  packer.finish()
}

/// Writes `data` as GIF sub-blocks: runs of at most 255 bytes, each with a
/// length byte in front, then a zero-length terminator block.
///
/// Returns the number of bytes written.
pub fn write_sub_blocks<W: Write>(out: &mut W, data: &[u8]) -> std::io::Result<u64> {
  let mut written = 0;
  for block in data.chunks(255) {
    out.write_all(&[block.len() as u8])?;
    out.write_all(block)?;
    written += 1 + block.len() as u64;
  }
  out.write_all(&[0])?;
  Ok(written + 1)
}
