use super::*;

/// How color distance is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Metric {
  /// Squared RGB distance.
  #[default]
  Fast,
  /// Squared RGB distance plus squared luma and hue distance.
  ///
  /// Hue distance is the plain difference of the two hue angles, it doesn't
  /// wrap around at 360.
  Accurate,
}
impl Metric {
  #[inline]
  #[must_use]
  pub const fn new(accurate: bool) -> Self {
    if accurate {
      Self::Accurate
    } else {
      Self::Fast
    }
  }

  /// Distance between two colors.
  #[inline]
  #[must_use]
  pub fn distance(self, a: RGB8, b: RGB8) -> f32 {
    match self {
      Self::Fast => rgb_distance(a, b) as f32,
      Self::Accurate => {
        let dl = i32::from(a.luma()) - i32::from(b.luma());
        let dh = a.hue() - b.hue();
        rgb_distance(a, b) as f32 + (dl * dl) as f32 + dh * dh
      }
    }
  }
}

/// `dr² + dg² + db²`
#[inline]
#[must_use]
pub const fn rgb_distance(a: RGB8, b: RGB8) -> u32 {
  let dr = a.r as i32 - b.r as i32;
  let dg = a.g as i32 - b.g as i32;
  let db = a.b as i32 - b.b as i32;
  (dr * dr + dg * dg + db * db) as u32
}

/// Nearest-entry search over a palette.
///
/// Luma and hue of the entries are computed once up front, so accurate
/// searches only compute them for the query color.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestColor {
  metric: Metric,
  colors: Vec<RGB8>,
  lumas: Vec<i32>,
  hues: Vec<f32>,
}
impl NearestColor {
  #[must_use]
  pub fn new(palette: &Palette, metric: Metric) -> Self {
    let colors = palette.colors().to_vec();
    let (lumas, hues) = match metric {
      Metric::Fast => (Vec::new(), Vec::new()),
      Metric::Accurate => (
        colors.iter().map(|c| i32::from(c.luma())).collect(),
        colors.iter().map(|c| c.hue()).collect(),
      ),
    };
    Self { metric, colors, lumas, hues }
  }

  #[inline]
  #[must_use]
  pub const fn metric(&self) -> Metric {
    self.metric
  }

  /// Index of the closest entry (the lowest index among equals).
  #[must_use]
  pub fn nearest(&self, c: RGB8) -> u8 {
    let mut best_index = 0;
    match self.metric {
      Metric::Fast => {
        let mut best = u32::MAX;
        for (i, p) in self.colors.iter().enumerate() {
          let d = rgb_distance(c, *p);
          if d < best {
            best = d;
            best_index = i;
          }
        }
      }
      Metric::Accurate => {
        let luma = i32::from(c.luma());
        let hue = c.hue();
        let mut best = f32::INFINITY;
        for (i, p) in self.colors.iter().enumerate() {
          let dl = luma - self.lumas[i];
          let dh = hue - self.hues[i];
          let d = rgb_distance(c, *p) as f32 + (dl * dl) as f32 + dh * dh;
          if d < best {
            best = d;
            best_index = i;
          }
        }
      }
    }
    best_index as u8
  }
}
