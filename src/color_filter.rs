//! Color filters applied to captured frames before they're encoded.
//!
//! Each filter is a row in a fixed table: if it's monochrome, the palette its
//! output is limited to (if any), and a transform run once per pass over each
//! pixel. Multi-pass filters feed each pass's output into the next.

use core::str::FromStr;

use crate::{pixel_formats::RGB8, quantize::NamedPalette};

/// Color of the amber phosphor tint at full brightness.
pub const AMBER: RGB8 = RGB8::new(255, 176, 0);

/// Color of the green phosphor tint at full brightness.
pub const GREEN: RGB8 = RGB8::new(51, 255, 51);

/// Scales `tint` by `level / 255`.
#[inline]
#[must_use]
pub fn tint(level: u8, tint: RGB8) -> RGB8 {
  let scale = |c: u8| ((level as u32 * c as u32 + 127) / 255) as u8;
  RGB8::new(scale(tint.r), scale(tint.g), scale(tint.b))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColorFilter {
  /// Frames are kept as they are.
  #[default]
  Rgb,
  /// Gray by luma.
  Monochrome,
  /// Pure black or white, split at luma 128.
  BlackWhite,
  /// Luma mapped onto an amber ramp.
  Amber,
  /// Luma mapped onto a green ramp.
  Green,
}

/// One row of the filter table.
struct FilterSpec {
  name: &'static str,
  is_monochrome: bool,
  fixed_palette: Option<NamedPalette>,
  pass_count: u8,
  transform: fn(u8, RGB8) -> RGB8,
}

fn identity(_pass: u8, c: RGB8) -> RGB8 {
  c
}

fn to_gray(_pass: u8, c: RGB8) -> RGB8 {
  RGB8::gray(c.luma())
}

fn to_black_white(_pass: u8, c: RGB8) -> RGB8 {
  if c.luma() >= 128 {
    RGB8::WHITE
  } else {
    RGB8::BLACK
  }
}

fn to_amber(pass: u8, c: RGB8) -> RGB8 {
  match pass {
    0 => to_gray(pass, c),
    _ => tint(c.r, AMBER),
  }
}

fn to_green(pass: u8, c: RGB8) -> RGB8 {
  match pass {
    0 => to_gray(pass, c),
    _ => tint(c.r, GREEN),
  }
}

const FILTER_TABLE: [FilterSpec; 5] = [
  FilterSpec {
    name: "rgb",
    is_monochrome: false,
    fixed_palette: None,
    pass_count: 1,
    transform: identity,
  },
  FilterSpec {
    name: "monochrome",
    is_monochrome: true,
    fixed_palette: Some(NamedPalette::Grayscale),
    pass_count: 1,
    transform: to_gray,
  },
  FilterSpec {
    name: "black-white",
    is_monochrome: true,
    fixed_palette: Some(NamedPalette::BlackWhite),
    pass_count: 1,
    transform: to_black_white,
  },
  FilterSpec {
    name: "amber",
    is_monochrome: true,
    fixed_palette: Some(NamedPalette::Amber),
    pass_count: 2,
    transform: to_amber,
  },
  FilterSpec {
    name: "green",
    is_monochrome: true,
    fixed_palette: Some(NamedPalette::Green),
    pass_count: 2,
    transform: to_green,
  },
];

impl ColorFilter {
  /// Every filter, in table order.
  pub const ALL: [Self; 5] = [Self::Rgb, Self::Monochrome, Self::BlackWhite, Self::Amber, Self::Green];

  #[inline]
  fn spec(self) -> &'static FilterSpec {
    &FILTER_TABLE[self as usize]
  }

  #[inline]
  #[must_use]
  pub fn name(self) -> &'static str {
    self.spec().name
  }

  /// If the filter reduces frames to one brightness channel.
  #[inline]
  #[must_use]
  pub fn is_monochrome(self) -> bool {
    self.spec().is_monochrome
  }

  /// The palette every filtered pixel is a member of, if there is one.
  #[inline]
  #[must_use]
  pub fn fixed_palette(self) -> Option<Vec<RGB8>> {
    self.spec().fixed_palette.map(NamedPalette::colors)
  }

  /// The named palette behind [`fixed_palette`](Self::fixed_palette).
  #[inline]
  #[must_use]
  pub fn named_palette(self) -> Option<NamedPalette> {
    self.spec().fixed_palette
  }

  #[inline]
  #[must_use]
  pub fn pass_count(self) -> u8 {
    self.spec().pass_count
  }

  /// Runs a single pass of the filter.
  #[inline]
  #[must_use]
  pub fn transform(self, pass: u8, color: RGB8) -> RGB8 {
    (self.spec().transform)(pass, color)
  }

  /// Runs every pass of the filter.
  #[inline]
  #[must_use]
  pub fn apply(self, color: RGB8) -> RGB8 {
    if self == Self::Rgb {
      return color;
    }
    (0..self.pass_count()).fold(color, |c, pass| self.transform(pass, c))
  }
}

impl FromStr for ColorFilter {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|f| f.name() == lower)
      .or(match lower.as_str() {
        "mono" | "gray" | "grey" => Some(Self::Monochrome),
        "bw" => Some(Self::BlackWhite),
        _ => None,
      })
      .ok_or_else(|| format!("unknown color filter `{s}`"))
  }
}
