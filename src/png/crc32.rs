//! The CRC-32 used by PNG chunks (polynomial `0xEDB88320`, reflected).

const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
  let mut out = [0; 256];
  let mut n = 0;
  while n < 256 {
    let mut c = n as u32;
    let mut k = 0;
    while k < 8 {
      if (c & 1) != 0 {
        c = 0xEDB8_8320_u32 ^ (c >> 1);
      } else {
        c >>= 1;
      }
      k += 1;
    }
    out[n] = c;
    n += 1;
  }
  out
}

/// A running CRC-32.
///
/// Chunk CRCs cover the chunk type and then the payload, so the hasher is fed
/// in two steps rather than from a joined buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32(u32);
impl Default for Crc32 {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
impl Crc32 {
  #[inline]
  #[must_use]
  pub const fn new() -> Self {
    Self(u32::MAX)
  }

  #[inline]
  pub fn update(&mut self, bytes: &[u8]) {
    let mut crc = self.0;
    for &byte in bytes {
      let i = (crc ^ u32::from(byte)) as u8 as usize;
      crc = CRC_TABLE[i] ^ (crc >> 8);
    }
    self.0 = crc;
  }

  #[inline]
  #[must_use]
  pub const fn finish(self) -> u32 {
    self.0 ^ u32::MAX
  }
}

/// CRC of a chunk: computed over `type ‖ payload`.
#[inline]
#[must_use]
pub fn chunk_crc(chunk_type: [u8; 4], payload: &[u8]) -> u32 {
  let mut crc = Crc32::new();
  crc.update(&chunk_type);
  crc.update(payload);
  crc.finish()
}

#[test]
fn test_chunk_crc_known_values() {
  assert_eq!(chunk_crc(*b"IEND", &[]), 0xAE42_6082);
  // the check value of CRC-32/ISO-HDLC
  let mut crc = Crc32::new();
  crc.update(b"123456789");
  assert_eq!(crc.finish(), 0xCBF4_3926);
}
