use super::*;

/// The five PNG filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FilterType {
  None = 0,
  Sub = 1,
  Up = 2,
  Average = 3,
  Paeth = 4,
}
impl TryFrom<u8> for FilterType {
  type Error = u8;
  #[inline]
  fn try_from(value: u8) -> core::result::Result<Self, u8> {
    Ok(match value {
      0 => Self::None,
      1 => Self::Sub,
      2 => Self::Up,
      3 => Self::Average,
      4 => Self::Paeth,
      other => return Err(other),
    })
  }
}

const fn paeth_predict(a: u8, b: u8, c: u8) -> u8 {
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p: i32 = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  // The order of these tests is fixed by the PNG spec, don't rearrange them.
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

/// Reconstructs one row in place.
///
/// `prev` is the already reconstructed row above (all zeros for the first
/// row), and `unit` is the filter's byte distance to the "left" neighbor.
pub fn unfilter_row(filter: FilterType, row: &mut [u8], prev: &[u8], unit: usize) {
  debug_assert_eq!(row.len(), prev.len());
  match filter {
    FilterType::None => (),
    FilterType::Sub => {
      for i in unit..row.len() {
        row[i] = row[i].wrapping_add(row[i - unit]);
      }
    }
    FilterType::Up => {
      row.iter_mut().zip(prev.iter().copied()).for_each(|(p, b)| *p = p.wrapping_add(b));
    }
    FilterType::Average => {
      for i in 0..row.len() {
        let a = if i >= unit { u32::from(row[i - unit]) } else { 0 };
        let b = u32::from(prev[i]);
        row[i] = row[i].wrapping_add(((a + b) / 2) as u8);
      }
    }
    FilterType::Paeth => {
      for i in 0..row.len() {
        let (a, c) = if i >= unit { (row[i - unit], prev[i - unit]) } else { (0, 0) };
        row[i] = row[i].wrapping_add(paeth_predict(a, prev[i], c));
      }
    }
  }
}

/// Undoes the per-row filtering of a decompressed frame.
///
/// `filtered` holds `height` lines of one filter byte plus the row's pixel
/// bytes. The output is the same rows without their filter bytes.
///
/// ## Failure
/// * If `filtered` is too short for the dimensions.
/// * If a row uses a filter type other than 0 through 4.
pub fn defilter(mode: PixelMode, width: u32, height: u32, filtered: &[u8]) -> Result<Vec<u8>> {
  let row_len = mode.bytes_per_row(width);
  let line_len = row_len + 1;
  let needed = line_len * height as usize;
  if filtered.len() < needed {
    return Err(FramecastError::UnexpectedEof);
  }
  let unit = mode.filter_unit();
  let mut out = vec![0_u8; row_len * height as usize];
  let zero_row = vec![0_u8; row_len];
  for (y, line) in filtered[..needed].chunks_exact(line_len).enumerate() {
    let filter = FilterType::try_from(line[0])
      .map_err(|filter| FramecastError::BadFilter { filter, row: y as u32 })?;
    let (done, rest) = out.split_at_mut(y * row_len);
    let row = &mut rest[..row_len];
    row.copy_from_slice(&line[1..]);
    let prev = if y == 0 { &zero_row[..] } else { &done[(y - 1) * row_len..] };
    unfilter_row(filter, row, prev, unit);
  }
  Ok(out)
}
