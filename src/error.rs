//! The crate's error type.

use thiserror::Error;

use crate::png::ChunkType;

/// An error from the `framecast` crate.
#[derive(Error, Debug)]
pub enum FramecastError {
  /// The first 8 bytes of the stream are not the PNG signature.
  #[error("missing PNG signature")]
  NoPngSignature,

  /// The stream ended in the middle of a chunk.
  #[error("unexpected end of input")]
  UnexpectedEof,

  /// A chunk's declared CRC doesn't match its contents.
  #[error("CRC mismatch in {kind:?} chunk: declared 0x{declared:08X}, actual 0x{actual:08X}")]
  CrcMismatch {
    /// chunk type
    kind: ChunkType,
    /// CRC stored in the stream
    declared: u32,
    /// CRC computed over type and payload
    actual: u32,
  },

  /// The (color type, bit depth) pair doesn't name a PNG pixel mode.
  #[error("unsupported pixel mode: color type {color_type}, bit depth {bit_depth}")]
  UnsupportedPixelMode {
    /// IHDR color type
    color_type: u8,
    /// IHDR bit depth
    bit_depth: u8,
  },

  /// The IHDR payload is malformed.
  #[error("invalid image header: {0}")]
  InvalidHeader(&'static str),

  /// A chunk that needs the image header appeared before it.
  #[error("{kind:?} chunk appeared before IHDR")]
  ChunkBeforeIhdr {
    /// offending chunk type
    kind: ChunkType,
  },

  /// The stream ended without ever giving an IHDR.
  #[error("IHDR chunk missing")]
  MissingIhdr,

  /// An indexed image has no PLTE chunk.
  #[error("indexed image without a palette")]
  MissingPalette,

  /// A chunk's payload doesn't fit its type.
  #[error("invalid {kind:?} chunk: {reason}")]
  InvalidChunk {
    /// chunk type
    kind: ChunkType,
    /// what was wrong
    reason: &'static str,
  },

  /// Scanline data couldn't be reconstructed.
  #[error("bad filter type {filter} on row {row}")]
  BadFilter {
    /// filter byte found
    filter: u8,
    /// row index within the frame
    row: u32,
  },

  /// The zlib stream of a frame is corrupt.
  #[error("decompression failed: {0}")]
  Decompress(String),

  /// Image dimensions are zero, or don't match what the encoder expects.
  #[error("invalid dimensions: {width}x{height}")]
  InvalidDimensions {
    /// width in pixels
    width: u32,
    /// height in pixels
    height: u32,
  },

  /// Palettes hold at most 256 entries.
  #[error("palette has {0} entries, at most 256 are allowed")]
  PaletteTooLarge(usize),

  /// A frame uses a color index past the end of the color table.
  #[error("color index {index} is outside the {table_len} entry color table")]
  IndexOutOfRange {
    /// offending index
    index: u8,
    /// entries in the table
    table_len: usize,
  },

  /// An encoder method was called in the wrong state.
  #[error("encoder state: {0}")]
  EncoderState(&'static str),

  /// The operation was cancelled by its owner.
  #[error("operation cancelled")]
  Cancelled,

  /// I/O error.
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl FramecastError {
  /// If this error is a user cancellation rather than a failure.
  #[inline]
  #[must_use]
  pub const fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }
}

/// Result type of this crate.
pub type Result<T> = std::result::Result<T, FramecastError>;
