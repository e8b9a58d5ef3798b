use super::*;

use core::str::FromStr;

use crate::color_filter::{tint, AMBER, GREEN};

/// An ordered list of 1 to 256 colors.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Palette {
  colors: Vec<RGB8>,
}
impl core::fmt::Debug for Palette {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Palette")
      .field("len", &self.colors.len())
      .field("colors", &&self.colors[..self.colors.len().min(4)])
      .finish()
  }
}
impl Palette {
  /// ## Failure
  /// * If there are no colors, or more than 256.
  pub fn new(colors: Vec<RGB8>) -> Result<Self> {
    match colors.len() {
      0 => Err(FramecastError::PaletteTooLarge(0)),
      1..=256 => Ok(Self { colors }),
      n => Err(FramecastError::PaletteTooLarge(n)),
    }
  }

  #[inline]
  #[must_use]
  pub fn named(name: NamedPalette) -> Self {
    Self { colors: name.colors() }
  }

  #[inline]
  #[must_use]
  pub fn colors(&self) -> &[RGB8] {
    &self.colors
  }

  #[inline]
  #[must_use]
  #[allow(clippy::len_without_is_empty)]
  pub fn len(&self) -> usize {
    self.colors.len()
  }

  #[inline]
  #[must_use]
  pub fn get(&self, index: u8) -> Option<RGB8> {
    self.colors.get(usize::from(index)).copied()
  }

  /// Builds a 256 entry palette out of per-channel value frequencies.
  ///
  /// Each channel's values are ranked separately, most frequent first (ties
  /// go to the lower value), and values that never occur are left out. Entry
  /// `i` then takes the `i`-th ranked value of every channel. A channel with
  /// fewer ranked values than the longest ranking starts over from its top.
  /// Past the longest ranking, the whole sequence of entries repeats.
  ///
  /// The channels don't get combined in any smarter way, so this is only a
  /// good palette when the channels move together (gray or tinted sources).
  #[must_use]
  pub fn auto(histogram: &ColorHistogram) -> Self {
    let ranked: [Vec<u8>; 3] = [0, 1, 2].map(|c| {
      let counts = &histogram.counts[c];
      let mut values: Vec<u8> = (0..=255).filter(|v| counts[usize::from(*v)] > 0).collect();
      values.sort_by(|a, b| counts[usize::from(*b)].cmp(&counts[usize::from(*a)]).then(a.cmp(b)));
      values
    });
    let filled = ranked.iter().map(Vec::len).max().unwrap_or(0);
    if filled == 0 {
      return Self { colors: vec![RGB8::BLACK; 256] };
    }
    let pick = |channel: &[u8], slot: usize| match channel.len() {
      0 => 0,
      n => channel[slot % n],
    };
    let colors = (0..256)
      .map(|i| {
        let slot = i % filled;
        RGB8::new(pick(&ranked[0], slot), pick(&ranked[1], slot), pick(&ranked[2], slot))
      })
      .collect();
    Self { colors }
  }

  /// Index of the first entry exactly equal to `c`.
  #[inline]
  #[must_use]
  pub fn position(&self, c: RGB8) -> Option<u8> {
    self.colors.iter().position(|p| *p == c).map(|i| i as u8)
  }
}

/// Built-in palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamedPalette {
  /// 256 grays, black to white.
  Grayscale,
  /// Black and white.
  BlackWhite,
  /// The 216 color web cube followed by 40 grays.
  WebSafe,
  /// The 16 VGA text mode colors.
  Vga16,
  /// 256 steps of an amber tint.
  Amber,
  /// 256 steps of a green tint.
  Green,
}
impl NamedPalette {
  pub const ALL: [Self; 6] =
    [Self::Grayscale, Self::BlackWhite, Self::WebSafe, Self::Vga16, Self::Amber, Self::Green];

  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Grayscale => "grayscale",
      Self::BlackWhite => "black-white",
      Self::WebSafe => "web-safe",
      Self::Vga16 => "vga16",
      Self::Amber => "amber",
      Self::Green => "green",
    }
  }

  #[must_use]
  pub fn colors(self) -> Vec<RGB8> {
    match self {
      Self::Grayscale => (0..=255).map(RGB8::gray).collect(),
      Self::BlackWhite => vec![RGB8::BLACK, RGB8::WHITE],
      Self::WebSafe => {
        let mut out = Vec::with_capacity(256);
        for r in 0..6_u8 {
          for g in 0..6_u8 {
            for b in 0..6_u8 {
              out.push(RGB8::new(r * 51, g * 51, b * 51));
            }
          }
        }
        out.extend((1..=40_u32).map(|i| RGB8::gray((i * 255 / 41) as u8)));
        out
      }
      Self::Vga16 => VGA16.to_vec(),
      Self::Amber => (0..=255).map(|i| tint(i, AMBER)).collect(),
      Self::Green => (0..=255).map(|i| tint(i, GREEN)).collect(),
    }
  }
}
impl FromStr for NamedPalette {
  type Err = String;
  fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
    let lower = s.to_ascii_lowercase();
    Self::ALL.into_iter().find(|p| p.name() == lower).ok_or_else(|| {
      let names: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
      format!("unknown palette `{s}`, expected one of: {}", names.join(", "))
    })
  }
}

const VGA16: [RGB8; 16] = [
  RGB8::new(0x00, 0x00, 0x00),
  RGB8::new(0x00, 0x00, 0xAA),
  RGB8::new(0x00, 0xAA, 0x00),
  RGB8::new(0x00, 0xAA, 0xAA),
  RGB8::new(0xAA, 0x00, 0x00),
  RGB8::new(0xAA, 0x00, 0xAA),
  RGB8::new(0xAA, 0x55, 0x00),
  RGB8::new(0xAA, 0xAA, 0xAA),
  RGB8::new(0x55, 0x55, 0x55),
  RGB8::new(0x55, 0x55, 0xFF),
  RGB8::new(0x55, 0xFF, 0x55),
  RGB8::new(0x55, 0xFF, 0xFF),
  RGB8::new(0xFF, 0x55, 0x55),
  RGB8::new(0xFF, 0x55, 0xFF),
  RGB8::new(0xFF, 0xFF, 0x55),
  RGB8::new(0xFF, 0xFF, 0xFF),
];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_named_sizes() {
    let sizes: Vec<usize> = NamedPalette::ALL.iter().map(|p| p.colors().len()).collect();
    assert_eq!(sizes, [256, 2, 256, 16, 256, 256]);
    for p in NamedPalette::ALL {
      assert_eq!(p.name().parse::<NamedPalette>().unwrap(), p);
      assert!(Palette::new(p.colors()).is_ok());
    }
    assert!("rainbow".parse::<NamedPalette>().unwrap_err().contains("vga16"));
  }

  #[test]
  fn test_palette_bounds() {
    assert!(matches!(Palette::new(vec![]), Err(FramecastError::PaletteTooLarge(0))));
    assert!(matches!(Palette::new(vec![RGB8::BLACK; 257]), Err(FramecastError::PaletteTooLarge(257))));
    let p = Palette::named(NamedPalette::Vga16);
    assert_eq!(p.position(RGB8::WHITE), Some(15));
    assert_eq!(p.get(16), None);
  }

  #[test]
  fn test_auto_palette() {
    let mut h = ColorHistogram::new();
    // red: 10 x3, 20 x1 ; green: 5 x2, 6 x1, 7 x1 ; blue: 0 x4
    for c in [(10, 5, 0), (10, 5, 0), (10, 6, 0), (20, 7, 0)] {
      h.add(RGB8::new(c.0, c.1, c.2));
    }
    let p = Palette::auto(&h);
    assert_eq!(p.len(), 256);
    let c = p.colors();
    assert_eq!(c[0], RGB8::new(10, 5, 0));
    assert_eq!(c[1], RGB8::new(20, 6, 0));
    // red has only 2 values, so it wraps before green does
    assert_eq!(c[2], RGB8::new(10, 7, 0));
    // the green ranking is the longest (3), so the whole thing repeats
    assert_eq!(c[3], c[0]);
    assert_eq!(c[255], c[255 % 3]);

    let empty = Palette::auto(&ColorHistogram::new());
    assert_eq!(empty.colors(), &[RGB8::BLACK; 256][..]);
  }
}
