#![forbid(unsafe_code)]

//! Module for reading and writing PNG and APNG streams.
//!
//! * [Portable Network Graphics Specification (Second Edition)][png-spec]
//! * [APNG Specification][apng-spec]
//!
//! [png-spec]: https://www.w3.org/TR/2003/REC-PNG-20031110/
//! [apng-spec]: https://wiki.mozilla.org/APNG_Specification
//!
//! ## Decoding
//!
//! [`ApngDecoder`] reads from any [`Read`] and decodes one frame at a time.
//! The compressed data of a frame may be split over any number of `IDAT` or
//! `fdAT` chunks, and one chunk may even hold the end of one frame's zlib
//! stream and the start of the next. The decoder carries a [`FrameInflater`]
//! across chunk boundaries to handle this.
//!
//! Each decoded frame keeps the source's pixel layout. Call
//! [`DecodedFrame::to_rgb`] for 8-bit RGB, or [`DecodedFrame::to_indices`] to
//! keep indexed and grayscale samples as one byte per pixel.
//!
//! Interlaced images are rejected. All five scanline filters are supported.
//!
//! ## Encoding
//!
//! [`ApngEncoder`] writes RGB frames, storing only the changed rectangle of
//! each frame. It always writes 8-bit RGB with no scanline filter, and needs
//! a [`Seek`](std::io::Seek) output so the frame count can be patched in at
//! the end.
//!
//! ## Chunks
//!
//! Both sides are built on [`ChunkReader`] and [`ChunkWriter`], which can also
//! be used directly to list or copy the chunks of a stream.

use std::io::Read;

use crate::{
  error::{FramecastError, Result},
  pixel_formats::RGB8,
};

mod crc32;
pub use crc32::*;

mod chunk;
pub use chunk::*;

mod header;
pub use header::*;

mod animation;
pub use animation::*;

mod unfilter;
pub use unfilter::*;

mod samples;
pub use samples::*;

mod decoder;
pub use decoder::*;

mod encoder;
pub use encoder::*;
