use super::{lzw_decode, parse_gif, rand_bytes};
use framecast::{
  gif::{color_table_size_code, lzw, GifEncoder},
  RGB8,
};
use proptest::prelude::*;

fn four_colors() -> Vec<RGB8> {
  vec![RGB8::new(255, 0, 0), RGB8::new(0, 255, 0), RGB8::new(0, 0, 255), RGB8::WHITE]
}

#[test]
fn test_four_color_round_trip() {
  let indices: Vec<u8> = (0..256_u32).map(|i| ((i / 16 + i % 16) % 4) as u8).collect();
  let mut gif = GifEncoder::new(Vec::new(), 16, 16, &four_colors(), Some(0)).unwrap();
  gif.add_frame(0, 0, 16, 16, 100, &indices).unwrap();
  gif.add_frame(2, 3, 4, 1, 35, &[3, 2, 1, 0]).unwrap();
  gif.end().unwrap();
  let bytes = gif.into_inner();

  let parsed = parse_gif(&bytes);
  assert_eq!((parsed.width, parsed.height), (16, 16));
  assert_eq!(parsed.global_table.len(), 4);
  assert_eq!(parsed.global_table[2], [0, 0, 255]);
  assert_eq!(parsed.loop_count, Some(0));
  assert_eq!(parsed.frames.len(), 2);

  let first = &parsed.frames[0];
  assert_eq!(first.min_code_size, 2);
  assert_eq!(first.disposal, 0);
  assert_eq!(first.delay_cs, 10);
  assert_eq!(first.indices, indices);

  let second = &parsed.frames[1];
  assert_eq!((second.x, second.y, second.width, second.height), (2, 3, 4, 1));
  assert_eq!(second.disposal, 1);
  assert_eq!(second.delay_cs, 4);
  assert_eq!(second.indices, [3, 2, 1, 0]);
}

#[test]
fn test_dictionary_reset_on_noise() {
  // random 8-bit data fills the 4096 entry dictionary several times over
  let indices = rand_bytes(200 * 200);
  let palette: Vec<RGB8> = (0..=255).map(RGB8::gray).collect();
  let mut gif = GifEncoder::new(Vec::new(), 200, 200, &palette, None).unwrap();
  gif.add_frame(0, 0, 200, 200, 0, &indices).unwrap();
  gif.end().unwrap();
  let parsed = parse_gif(&gif.into_inner());
  assert_eq!(parsed.loop_count, None);
  assert_eq!(parsed.frames[0].min_code_size, 8);
  assert_eq!(parsed.frames[0].indices, indices);
}

#[test]
fn test_long_runs() {
  // one color runs build long strings, exercising the KwKwK case
  let mut indices = vec![1_u8; 5000];
  indices.extend(std::iter::repeat(0).take(3000));
  let data = lzw::compress(&indices, 2);
  assert!(data.len() < 300);
  assert_eq!(lzw_decode(&data, 2), indices);
}

#[test]
fn test_no_frames_is_still_a_gif() {
  let mut gif = GifEncoder::new(Vec::new(), 1, 1, &[RGB8::BLACK], None).unwrap();
  gif.end().unwrap();
  let parsed = parse_gif(&gif.into_inner());
  assert_eq!(parsed.global_table.len(), 2);
  assert!(parsed.frames.is_empty());
}

proptest! {
  #[test]
  fn roundtrip_random_indices(
    table_len in 1_usize..=256,
    width in 1_u16..40,
    height in 1_u16..40,
    seed in any::<u64>(),
  ) {
    let palette: Vec<RGB8> = (0..table_len).map(|i| RGB8::gray(i as u8)).collect();
    let table_entries = 2_usize << color_table_size_code(table_len);
    // a small LCG keeps the indices reproducible from the seed
    let mut state = seed;
    let indices: Vec<u8> = (0..usize::from(width) * usize::from(height))
      .map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as usize % table_len.min(table_entries)) as u8
      })
      .collect();

    let mut gif = GifEncoder::new(Vec::new(), width, height, &palette, None).unwrap();
    gif.add_frame(0, 0, width, height, 20, &indices).unwrap();
    gif.end().unwrap();
    let parsed = parse_gif(&gif.into_inner());
    prop_assert_eq!(parsed.global_table.len(), table_entries);
    prop_assert_eq!(&parsed.frames[0].indices, &indices);
  }
}
