use super::*;

/// Floyd–Steinberg neighbors: `(dx, dy, weight / 16)`.
const DIFFUSION: [(isize, usize, i32); 4] = [(1, 0, 7), (1, 1, 1), (0, 1, 5), (-1, 1, 3)];

/// Maps a frame to palette indexes, diffusing each pixel's error onto the
/// pixels not yet visited.
///
/// `rgb` is the working raster and gets the diffused error written into it.
/// Pixels are visited in raster order. Each neighbor channel becomes
/// `clamp(old + round(error * weight / 16))`, and neighbors outside the frame
/// are skipped.
///
/// ## Panics
/// * If `rgb` is shorter than `width * height * 3`.
pub fn floyd_steinberg(
  rgb: &mut [u8], width: u32, height: u32, palette: &Palette, mapper: &ColorMapper,
) -> Vec<u8> {
  let w = width as usize;
  let h = height as usize;
  let mut out = Vec::with_capacity(w * h);
  for y in 0..h {
    for x in 0..w {
      let i = (y * w + x) * 3;
      let old = RGB8::from_slice(&rgb[i..]);
      let index = mapper.index_of(old);
      out.push(index);
      let new = palette.get(index).unwrap_or_default();
      let err = [
        i32::from(old.r) - i32::from(new.r),
        i32::from(old.g) - i32::from(new.g),
        i32::from(old.b) - i32::from(new.b),
      ];
      if err == [0; 3] {
        continue;
      }
      for (dx, dy, weight) in DIFFUSION {
        let nx = x as isize + dx;
        let ny = y + dy;
        if nx < 0 || nx as usize >= w || ny >= h {
          continue;
        }
        let j = (ny * w + nx as usize) * 3;
        for (c, e) in err.iter().enumerate() {
          let delta = (*e as f32 * weight as f32 / 16.0).round() as i32;
          rgb[j + c] = (i32::from(rgb[j + c]) + delta).clamp(0, 255) as u8;
        }
      }
    }
  }
  out
}

/// Dithers a frame against `palette` without touching the caller's raster.
#[must_use]
pub fn dither_frame(rgb: &[u8], width: u32, height: u32, palette: &Palette, accurate: bool) -> Vec<u8> {
  let mapper = ColorMapper::Direct(NearestColor::new(palette, Metric::new(accurate)));
  let mut working = rgb.to_vec();
  floyd_steinberg(&mut working, width, height, palette, &mapper)
}
