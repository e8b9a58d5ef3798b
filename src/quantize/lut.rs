use super::*;

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

/// Entries in a full RGB lookup table.
pub const LUT_LEN: usize = 1 << 24;

/// Entries in one red plane of the table.
const PLANE_LEN: usize = 1 << 16;

/// Nearest palette index for every 24-bit RGB value.
///
/// The table is `r << 16 | g << 8 | b` indexed, 16 MiB, and immutable once
/// built.
#[derive(Clone)]
pub struct Lut {
  table: Box<[u8]>,
}
impl core::fmt::Debug for Lut {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Lut").field("len", &self.table.len()).finish()
  }
}
impl Lut {
  /// Builds the table on the global rayon pool.
  ///
  /// Each of the 256 red planes is its own task. Tasks check `cancel` before
  /// they start and after every row, and once one of them sees the token set
  /// no further planes are started.
  ///
  /// ## Failure
  /// * `Cancelled` if `cancel` was set before the table was done. No partial
  ///   table is ever returned.
  pub fn build(palette: &Palette, metric: Metric, cancel: &CancelToken) -> Result<Self> {
    let search = NearestColor::new(palette, metric);
    let start = Instant::now();
    let mut table = vec![0_u8; LUT_LEN].into_boxed_slice();
    table.par_chunks_mut(PLANE_LEN).enumerate().try_for_each(|(r, plane)| {
      cancel.check()?;
      for (g, row) in plane.chunks_exact_mut(256).enumerate() {
        for (b, out) in row.iter_mut().enumerate() {
          *out = search.nearest(RGB8::new(r as u8, g as u8, b as u8));
        }
        cancel.check()?;
      }
      Ok::<(), FramecastError>(())
    })?;
    debug!(
      "built {:?} LUT for {} colors in {:.2?}",
      metric,
      palette.len(),
      start.elapsed()
    );
    Ok(Self { table })
  }

  /// Like [`build`](Self::build), on a dedicated pool of `threads` workers.
  ///
  /// If the pool can't be made, the global pool is used instead.
  pub fn build_with_threads(
    palette: &Palette, metric: Metric, cancel: &CancelToken, threads: usize,
  ) -> Result<Self> {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
      Ok(pool) => pool.install(|| Self::build(palette, metric, cancel)),
      Err(e) => {
        warn!("couldn't make a {threads} thread pool ({e}), using the global pool");
        Self::build(palette, metric, cancel)
      }
    }
  }

  #[inline]
  #[must_use]
  pub fn index(&self, c: RGB8) -> u8 {
    self.table[c.packed()]
  }

  #[inline]
  #[must_use]
  pub fn as_slice(&self) -> &[u8] {
    &self.table
  }
}

/// Maps colors to palette indexes, through a [`Lut`] or by direct search.
///
/// Both give the same answers. A LUT costs a search for all 2²⁴ colors up
/// front, so it only pays off when more pixels than that will be mapped.
#[derive(Debug, Clone)]
pub enum ColorMapper {
  Direct(NearestColor),
  Lut(Lut),
}
impl ColorMapper {
  /// Pixel count at which a LUT gets built.
  pub const LUT_THRESHOLD: u64 = LUT_LEN as u64;

  /// Picks a mapper for mapping `pixel_count` pixels in total.
  ///
  /// `threads` sizes a dedicated LUT pool; `None` uses the global pool.
  pub fn new(
    palette: &Palette, metric: Metric, pixel_count: u64, cancel: &CancelToken,
    threads: Option<usize>,
  ) -> Result<Self> {
    if pixel_count < Self::LUT_THRESHOLD {
      debug!("mapping {} pixels by direct search", pixel_count);
      return Ok(Self::Direct(NearestColor::new(palette, metric)));
    }
    let lut = match threads {
      Some(n) => Lut::build_with_threads(palette, metric, cancel, n)?,
      None => Lut::build(palette, metric, cancel)?,
    };
    Ok(Self::Lut(lut))
  }

  #[inline]
  #[must_use]
  pub fn index_of(&self, c: RGB8) -> u8 {
    match self {
      Self::Direct(search) => search.nearest(c),
      Self::Lut(lut) => lut.index(c),
    }
  }

  /// Maps a flat RGB raster to one index per pixel.
  #[must_use]
  pub fn map_rgb(&self, rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3).map(|px| self.index_of(RGB8::from_slice(px))).collect()
  }
}
