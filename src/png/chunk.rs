//! Length-prefixed, CRC-checked chunks: the container primitive shared by the
//! decoder and the encoder.
//!
//! Every chunk on the wire is
//! ```text
//! length: u32 BE | type: [u8; 4] | payload: [u8; length] | crc32: u32 BE
//! ```
//! with the CRC computed over `type ‖ payload`.

use core::fmt::{Debug, Write as _};
use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use super::crc32::{chunk_crc, Crc32};
use crate::error::{FramecastError, Result};

/// The 8 bytes every PNG stream starts with.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Largest length a chunk may declare.
pub const MAX_CHUNK_LEN: u32 = (1 << 31) - 1;

/// Length + type + CRC.
pub const CHUNK_OVERHEAD: usize = 12;

/// Checks if the stream's initial 8 bytes are correct.
#[inline]
#[must_use]
pub const fn is_png_header_correct(bytes: &[u8]) -> bool {
  matches!(bytes, [137, 80, 78, 71, 13, 10, 26, 10, ..])
}

/// A chunk's 4-byte type tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChunkType(pub [u8; 4]);
#[allow(nonstandard_style)]
impl ChunkType {
  pub const IHDR: Self = Self(*b"IHDR");
  pub const PLTE: Self = Self(*b"PLTE");
  pub const IDAT: Self = Self(*b"IDAT");
  pub const IEND: Self = Self(*b"IEND");
  pub const tRNS: Self = Self(*b"tRNS");
  pub const tEXt: Self = Self(*b"tEXt");
  pub const acTL: Self = Self(*b"acTL");
  pub const fcTL: Self = Self(*b"fcTL");
  pub const fdAT: Self = Self(*b"fdAT");

  /// Critical chunks have an uppercase first letter.
  #[inline]
  #[must_use]
  pub const fn is_critical(self) -> bool {
    self.0[0].is_ascii_uppercase()
  }
}
impl Debug for ChunkType {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_char(self.0[0] as char)?;
    f.write_char(self.0[1] as char)?;
    f.write_char(self.0[2] as char)?;
    f.write_char(self.0[3] as char)?;
    Ok(())
  }
}

/// An owned chunk.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
  pub kind: ChunkType,
  pub payload: Vec<u8>,
  /// The CRC as declared in the stream (or as computed, for new chunks).
  pub crc: u32,
}
impl Debug for Chunk {
  #[inline]
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Chunk")
      .field("kind", &self.kind)
      .field("payload", &(&self.payload[..self.payload.len().min(12)], self.payload.len()))
      .field("crc", &self.crc)
      .finish()
  }
}
impl Chunk {
  /// Makes a chunk, computing its CRC.
  #[must_use]
  pub fn new(kind: ChunkType, payload: Vec<u8>) -> Self {
    let crc = chunk_crc(kind.0, &payload);
    Self { kind, payload, crc }
  }

  /// The CRC of the chunk's current contents.
  #[inline]
  #[must_use]
  pub fn actual_crc(&self) -> u32 {
    chunk_crc(self.kind.0, &self.payload)
  }

  /// Bytes this chunk takes up in a stream.
  #[inline]
  #[must_use]
  pub fn encoded_len(&self) -> usize {
    CHUNK_OVERHEAD + self.payload.len()
  }

  /// Serializes the chunk (recomputing the CRC).
  #[must_use]
  pub fn to_bytes(&self) -> Vec<u8> {
    encode_chunk(self.kind, &self.payload)
  }
}

/// Serializes a chunk into one buffer: length, type, payload, CRC.
#[must_use]
pub fn encode_chunk(kind: ChunkType, payload: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(CHUNK_OVERHEAD + payload.len());
  out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
  out.extend_from_slice(&kind.0);
  out.extend_from_slice(payload);
  let mut crc = Crc32::new();
  crc.update(&kind.0);
  crc.update(payload);
  out.extend_from_slice(&crc.finish().to_be_bytes());
  out
}

/// Writes whole chunks to a sink, keeping count of the bytes written.
///
/// Each chunk is assembled in memory (with its CRC) before a single
/// `write_all`, so a failed write never leaves half a header behind in the
/// buffer layer above.
#[derive(Debug)]
pub struct ChunkWriter<W> {
  inner: W,
  bytes_written: u64,
}
impl<W: Write> ChunkWriter<W> {
  #[inline]
  pub const fn new(inner: W) -> Self {
    Self { inner, bytes_written: 0 }
  }

  /// Writes the PNG signature.
  pub fn write_signature(&mut self) -> Result<()> {
    self.inner.write_all(&PNG_SIGNATURE)?;
    self.bytes_written += PNG_SIGNATURE.len() as u64;
    Ok(())
  }

  /// Writes one chunk, returning its encoded length.
  pub fn write_chunk(&mut self, kind: ChunkType, payload: &[u8]) -> Result<usize> {
    if payload.len() > MAX_CHUNK_LEN as usize {
      return Err(FramecastError::InvalidChunk { kind, reason: "payload too long" });
    }
    let bytes = encode_chunk(kind, payload);
    self.inner.write_all(&bytes)?;
    self.bytes_written += bytes.len() as u64;
    trace!("wrote {:?} chunk, {} payload bytes", kind, payload.len());
    Ok(bytes.len())
  }

  #[inline]
  #[must_use]
  pub const fn bytes_written(&self) -> u64 {
    self.bytes_written
  }

  #[inline]
  pub fn get_mut(&mut self) -> &mut W {
    &mut self.inner
  }

  #[inline]
  pub fn get_ref(&self) -> &W {
    &self.inner
  }

  #[inline]
  pub fn into_inner(self) -> W {
    self.inner
  }
}

/// Lazily reads chunks out of a PNG stream.
///
/// The signature is checked when the reader is made. Each call to `next`
/// reads exactly one chunk, and [`bytes_read`](Self::bytes_read) tracks how
/// far into the stream the reader has gotten (for progress reports).
#[derive(Debug)]
pub struct ChunkReader<R> {
  inner: R,
  bytes_read: u64,
  verify_crc: bool,
  done: bool,
}
impl<R: Read> ChunkReader<R> {
  /// Reads and checks the PNG signature.
  pub fn new(mut inner: R) -> Result<Self> {
    let mut signature = [0_u8; 8];
    inner.read_exact(&mut signature).map_err(eof_as_format)?;
    if !is_png_header_correct(&signature) {
      return Err(FramecastError::NoPngSignature);
    }
    Ok(Self { inner, bytes_read: 8, verify_crc: true, done: false })
  }

  /// Sets if declared CRCs must match (on by default).
  #[inline]
  #[must_use]
  pub fn verify_crc(mut self, verify: bool) -> Self {
    self.verify_crc = verify;
    self
  }

  /// Bytes consumed so far, signature included.
  #[inline]
  #[must_use]
  pub const fn bytes_read(&self) -> u64 {
    self.bytes_read
  }

  #[inline]
  pub fn into_inner(self) -> R {
    self.inner
  }

  fn read_chunk(&mut self) -> Result<Option<Chunk>> {
    let mut len_bytes = [0_u8; 4];
    // A clean end of stream is only allowed at a chunk boundary.
    let got = read_up_to(&mut self.inner, &mut len_bytes)?;
    if got == 0 {
      return Ok(None);
    } else if got < 4 {
      return Err(FramecastError::UnexpectedEof);
    }
    let length = u32::from_be_bytes(len_bytes);
    let mut type_bytes = [0_u8; 4];
    self.inner.read_exact(&mut type_bytes).map_err(eof_as_format)?;
    let kind = ChunkType(type_bytes);
    if length > MAX_CHUNK_LEN {
      return Err(FramecastError::InvalidChunk { kind, reason: "declared length too large" });
    }
    let mut payload = Vec::new();
    let got = (&mut self.inner).take(u64::from(length)).read_to_end(&mut payload)?;
    if got != length as usize {
      return Err(FramecastError::UnexpectedEof);
    }
    let mut crc_bytes = [0_u8; 4];
    self.inner.read_exact(&mut crc_bytes).map_err(eof_as_format)?;
    let declared = u32::from_be_bytes(crc_bytes);
    self.bytes_read += CHUNK_OVERHEAD as u64 + u64::from(length);

    let chunk = Chunk { kind, payload, crc: declared };
    if self.verify_crc {
      let actual = chunk.actual_crc();
      if actual != declared {
        return Err(FramecastError::CrcMismatch { kind, declared, actual });
      }
    }
    trace!("read {:?} chunk, {} payload bytes", kind, length);
    Ok(Some(chunk))
  }
}
impl<R: Read> Iterator for ChunkReader<R> {
  type Item = Result<Chunk>;
  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    match self.read_chunk() {
      Ok(Some(chunk)) => {
        if chunk.kind == ChunkType::IEND {
          self.done = true;
        }
        Some(Ok(chunk))
      }
      Ok(None) => {
        self.done = true;
        None
      }
      Err(e) => {
        self.done = true;
        Some(Err(e))
      }
    }
  }
}

/// Like `read_exact`, but a zero-byte read at the very start is not an error.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
  let mut total = 0;
  while total < buf.len() {
    match r.read(&mut buf[total..]) {
      Ok(0) => break,
      Ok(n) => total += n,
      Err(e) if e.kind() == ErrorKind::Interrupted => continue,
      Err(e) => return Err(e.into()),
    }
  }
  Ok(total)
}

fn eof_as_format(e: std::io::Error) -> FramecastError {
  if e.kind() == ErrorKind::UnexpectedEof {
    FramecastError::UnexpectedEof
  } else {
    FramecastError::Io(e)
  }
}
