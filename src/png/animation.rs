use super::*;

/// Animation Control (`acTL`)
///
/// Must come before the first image data. The encoder writes this with a frame
/// count of 0 at the start of the stream and patches it once the real count is
/// known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AnimationControl {
  /// Number of frames in the animation.
  pub num_frames: u32,
  /// Times to loop; 0 is forever.
  pub num_plays: u32,
}
impl AnimationControl {
  /// Payload length of an acTL chunk.
  pub const LEN: usize = 8;

  #[must_use]
  pub fn to_bytes(&self) -> [u8; Self::LEN] {
    let mut out = [0_u8; Self::LEN];
    out[0..4].copy_from_slice(&self.num_frames.to_be_bytes());
    out[4..8].copy_from_slice(&self.num_plays.to_be_bytes());
    out
  }
}
impl TryFrom<&[u8]> for AnimationControl {
  type Error = FramecastError;
  fn try_from(value: &[u8]) -> Result<Self> {
    match value {
      [f0, f1, f2, f3, p0, p1, p2, p3] => Ok(Self {
        num_frames: u32::from_be_bytes([*f0, *f1, *f2, *f3]),
        num_plays: u32::from_be_bytes([*p0, *p1, *p2, *p3]),
      }),
      _ => Err(FramecastError::InvalidChunk { kind: ChunkType::acTL, reason: "must be 8 bytes" }),
    }
  }
}

/// Frame Control (`fcTL`)
///
/// One of these comes before each frame's data and says where the frame goes
/// and how long it's shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameControl {
  pub sequence_number: u32,
  pub width: u32,
  pub height: u32,
  pub x_offset: u32,
  pub y_offset: u32,
  pub delay_num: u16,
  pub delay_den: u16,
  pub dispose_op: u8,
  pub blend_op: u8,
}
impl FrameControl {
  /// Payload length of an fcTL chunk.
  pub const LEN: usize = 26;

  /// Control for a frame that had no fcTL: the whole image, shown for 1/100th
  /// of a second.
  #[inline]
  #[must_use]
  pub const fn implicit(width: u32, height: u32) -> Self {
    Self {
      sequence_number: 0,
      width,
      height,
      x_offset: 0,
      y_offset: 0,
      delay_num: 1,
      delay_den: 100,
      dispose_op: 0,
      blend_op: 0,
    }
  }

  /// Expresses a millisecond delay as a delay fraction.
  ///
  /// Delays that fit in a `u16` are stored exactly as `ms/1000`, longer ones
  /// fall back to centiseconds.
  #[inline]
  #[must_use]
  pub fn delay_fraction(delay_ms: u32) -> (u16, u16) {
    match u16::try_from(delay_ms) {
      Ok(ms) => (ms, 1000),
      Err(_) => {
        let cs = delay_ms / 10 + u32::from(delay_ms % 10 >= 5);
        (cs.min(u32::from(u16::MAX)) as u16, 100)
      }
    }
  }

  /// How long the frame is shown, in milliseconds.
  ///
  /// A denominator of 0 means 100, per the APNG spec.
  #[inline]
  #[must_use]
  pub fn duration_ms(&self) -> u32 {
    let den = if self.delay_den == 0 { 100 } else { u32::from(self.delay_den) };
    (1000 * u32::from(self.delay_num) + den / 2) / den
  }

  #[must_use]
  pub fn to_bytes(&self) -> [u8; Self::LEN] {
    let mut out = [0_u8; Self::LEN];
    out[0..4].copy_from_slice(&self.sequence_number.to_be_bytes());
    out[4..8].copy_from_slice(&self.width.to_be_bytes());
    out[8..12].copy_from_slice(&self.height.to_be_bytes());
    out[12..16].copy_from_slice(&self.x_offset.to_be_bytes());
    out[16..20].copy_from_slice(&self.y_offset.to_be_bytes());
    out[20..22].copy_from_slice(&self.delay_num.to_be_bytes());
    out[22..24].copy_from_slice(&self.delay_den.to_be_bytes());
    out[24] = self.dispose_op;
    out[25] = self.blend_op;
    out
  }

  /// If the frame's rectangle lies within a `width` x `height` canvas.
  #[inline]
  #[must_use]
  pub fn fits_within(&self, width: u32, height: u32) -> bool {
    self.width > 0
      && self.height > 0
      && u64::from(self.x_offset) + u64::from(self.width) <= u64::from(width)
      && u64::from(self.y_offset) + u64::from(self.height) <= u64::from(height)
  }
}
impl TryFrom<&[u8]> for FrameControl {
  type Error = FramecastError;
  fn try_from(value: &[u8]) -> Result<Self> {
    let bad = |reason| FramecastError::InvalidChunk { kind: ChunkType::fcTL, reason };
    if value.len() != Self::LEN {
      return Err(bad("must be 26 bytes"));
    }
    let u32_at = |i: usize| u32::from_be_bytes([value[i], value[i + 1], value[i + 2], value[i + 3]]);
    let u16_at = |i: usize| u16::from_be_bytes([value[i], value[i + 1]]);
    let out = Self {
      sequence_number: u32_at(0),
      width: u32_at(4),
      height: u32_at(8),
      x_offset: u32_at(12),
      y_offset: u32_at(16),
      delay_num: u16_at(20),
      delay_den: u16_at(22),
      dispose_op: value[24],
      blend_op: value[25],
    };
    if out.dispose_op > 2 {
      return Err(bad("unknown dispose op"));
    }
    if out.blend_op > 1 {
      return Err(bad("unknown blend op"));
    }
    Ok(out)
  }
}

#[test]
fn test_duration_rounding() {
  let mut fc = FrameControl::implicit(1, 1);
  assert_eq!(fc.duration_ms(), 10);
  fc.delay_num = 1;
  fc.delay_den = 3;
  assert_eq!(fc.duration_ms(), 333);
  fc.delay_num = 2;
  assert_eq!(fc.duration_ms(), 667);
  fc.delay_num = 7;
  fc.delay_den = 0;
  assert_eq!(fc.duration_ms(), 70);
  fc.delay_num = 250;
  fc.delay_den = 1000;
  assert_eq!(fc.duration_ms(), 250);
}

#[test]
fn test_delay_fraction() {
  assert_eq!(FrameControl::delay_fraction(40), (40, 1000));
  assert_eq!(FrameControl::delay_fraction(65_535), (65_535, 1000));
  assert_eq!(FrameControl::delay_fraction(100_004), (10_000, 100));
  assert_eq!(FrameControl::delay_fraction(u32::MAX), (u16::MAX, 100));
  assert_eq!(FrameControl::delay_fraction(u32::MAX - 4), (u16::MAX, 100));
  assert_eq!(FrameControl::delay_fraction(65_545), (6_555, 100));
}

#[test]
fn test_fctl_bytes() {
  let fc = FrameControl {
    sequence_number: 3,
    width: 10,
    height: 20,
    x_offset: 1,
    y_offset: 2,
    delay_num: 40,
    delay_den: 1000,
    dispose_op: 0,
    blend_op: 0,
  };
  assert_eq!(FrameControl::try_from(&fc.to_bytes()[..]).unwrap(), fc);
  assert!(fc.fits_within(11, 22));
  assert!(!fc.fits_within(10, 22));
  let mut bytes = fc.to_bytes();
  bytes[24] = 3;
  assert!(FrameControl::try_from(&bytes[..]).is_err());
}
