//! Module for reducing RGB frames to a palette of at most 256 colors.
//!
//! * [`Palette`] is the target color set, either a [`NamedPalette`] or one
//!   derived from a [`ColorHistogram`] with [`Palette::auto`].
//! * [`NearestColor`] finds the closest palette entry to a color under a
//!   [`Metric`].
//! * [`Lut`] precomputes that answer for all 2²⁴ RGB values, in parallel.
//! * [`ColorMapper`] picks between the two based on how many pixels need
//!   mapping.
//! * [`dither_frame`] maps a frame with Floyd–Steinberg error diffusion.
//!
//! ## Ties
//!
//! When two palette entries are equally close, the one with the lower index
//! wins. Every search path in this module uses the same strict `<` comparison,
//! so a LUT and a direct search always give the same index.

use crate::{
  cancel::CancelToken,
  error::{FramecastError, Result},
  pixel_formats::RGB8,
  png::ColorHistogram,
};

mod metric;
pub use metric::*;

mod palette;
pub use palette::*;

mod lut;
pub use lut::*;

mod dither;
pub use dither::*;
