use super::*;

use std::collections::VecDeque;

use miniz_oxide::{
  inflate::stream::{inflate, InflateState},
  DataFormat, MZError, MZFlush, MZStatus,
};
use tracing::{debug, trace, warn};

/// Most an inflater reserves before any data arrives.
const MAX_RESERVE: usize = 1 << 20;

const SCRATCH_LEN: usize = 32 * 1024;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeOptions {
  /// Fail on chunks whose declared CRC is wrong.
  pub verify_crc: bool,
}
impl Default for DecodeOptions {
  #[inline]
  fn default() -> Self {
    Self { verify_crc: true }
  }
}

/// One frame's zlib stream, possibly spread over many data chunks.
///
/// The inflater keeps its state between calls to [`feed`](Self::feed), so the
/// frame's compressed bytes can arrive split at any point. Once the zlib
/// stream ends, `feed` stops consuming and returns how much of the last input
/// it used: anything left over belongs to the next frame.
pub struct FrameInflater {
  state: Box<InflateState>,
  scratch: Vec<u8>,
  out: Vec<u8>,
  expected: usize,
  finished: bool,
}
impl core::fmt::Debug for FrameInflater {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("FrameInflater")
      .field("out", &self.out.len())
      .field("expected", &self.expected)
      .field("finished", &self.finished)
      .finish()
  }
}
impl FrameInflater {
  /// Makes an inflater for a frame that will decompress to `expected` bytes.
  ///
  /// Only a bounded amount is reserved up front, since `expected` comes from
  /// the file and the stream may well be shorter.
  #[must_use]
  pub fn new(expected: usize) -> Self {
    Self {
      state: InflateState::new_boxed(DataFormat::Zlib),
      scratch: vec![0; SCRATCH_LEN],
      out: Vec::with_capacity(expected.min(MAX_RESERVE)),
      expected,
      finished: false,
    }
  }

  /// If the zlib stream has reached its end.
  #[inline]
  #[must_use]
  pub const fn is_finished(&self) -> bool {
    self.finished
  }

  /// Decompressed bytes so far.
  #[inline]
  #[must_use]
  pub fn decompressed_len(&self) -> usize {
    self.out.len()
  }

  /// Pushes more compressed bytes in, returning how many were consumed.
  ///
  /// Less than all of `input` is consumed only when the stream ended partway
  /// through it.
  pub fn feed(&mut self, mut input: &[u8]) -> Result<usize> {
    let start_len = input.len();
    while !self.finished {
      let res = inflate(&mut self.state, input, &mut self.scratch, MZFlush::None);
      self.out.extend_from_slice(&self.scratch[..res.bytes_written]);
      input = &input[res.bytes_consumed..];
      match res.status {
        Ok(MZStatus::StreamEnd) => self.finished = true,
        Ok(MZStatus::Ok) => {
          if res.bytes_consumed == 0 && res.bytes_written == 0 {
            if input.is_empty() {
              break;
            }
            return Err(FramecastError::Decompress("inflate made no progress".into()));
          }
        }
        Ok(MZStatus::NeedDict) => {
          return Err(FramecastError::Decompress("preset dictionaries are not allowed".into()))
        }
        // no progress possible without more input
        Err(MZError::Buf) if input.is_empty() => break,
        Err(e) => return Err(FramecastError::Decompress(format!("{e:?}"))),
      }
      if self.out.len() > self.expected {
        return Err(FramecastError::Decompress("frame data is longer than the frame".into()));
      }
    }
    Ok(start_len - input.len())
  }

  /// Gives back the decompressed (still filtered) bytes.
  ///
  /// ## Failure
  /// * If fewer bytes than the frame needs came out.
  pub fn finish(self) -> Result<Vec<u8>> {
    if self.out.len() < self.expected {
      return Err(FramecastError::Decompress(format!(
        "frame data ended after {} of {} bytes",
        self.out.len(),
        self.expected
      )));
    }
    if !self.finished {
      warn!("frame zlib stream has no end marker, using the {} bytes decoded", self.out.len());
    }
    Ok(self.out)
  }
}

/// A decoded frame: the unfiltered raster plus its placement and timing.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedFrame {
  pub control: FrameControl,
  pub pixel_mode: PixelMode,
  /// Unfiltered rows, `pixel_mode.bytes_per_row(control.width)` bytes each.
  pub raster: Vec<u8>,
}
impl core::fmt::Debug for DecodedFrame {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("DecodedFrame")
      .field("control", &self.control)
      .field("pixel_mode", &self.pixel_mode)
      .field("raster", &(&self.raster[..self.raster.len().min(12)], self.raster.len()))
      .finish()
  }
}
impl DecodedFrame {
  /// The frame as flat RGB, with indexed/gray samples looked up in `palette`.
  pub fn to_rgb(&self, palette: &[RGB8]) -> Result<Vec<u8>> {
    unpack_samples(self.pixel_mode, self.control.width, self.control.height, palette, &self.raster)
  }

  /// The frame as one index per pixel (indexed and grayscale modes only).
  pub fn to_indices(&self) -> Result<Vec<u8>> {
    unpack_indices(self.pixel_mode, self.control.width, self.control.height, &self.raster)
  }
}

/// Lazily decodes the frames of a PNG or APNG stream.
///
/// Making the decoder reads everything up to the first frame's data, so the
/// header, palette, and animation info are known before any frame is pulled.
/// Each [`next_frame`](Self::next_frame) call then reads only as many chunks
/// as it needs.
///
/// An image data chunk with no `fcTL` before it becomes a frame with
/// [`FrameControl::implicit`] timing, so plain PNG files decode as a single
/// frame.
pub struct ApngDecoder<R> {
  chunks: ChunkReader<R>,
  header: IHDR,
  palette: Option<Vec<RGB8>>,
  animation: Option<AnimationControl>,
  text: Vec<(String, String)>,
  lookahead: Option<Chunk>,
  pending_control: Option<FrameControl>,
  last_control: Option<FrameControl>,
  inflater: Option<(FrameControl, FrameInflater)>,
  ready: VecDeque<DecodedFrame>,
  frames_decoded: u32,
  ended: bool,
}
impl<R> core::fmt::Debug for ApngDecoder<R> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("ApngDecoder")
      .field("header", &self.header)
      .field("palette", &self.palette.as_ref().map(Vec::len))
      .field("animation", &self.animation)
      .field("frames_decoded", &self.frames_decoded)
      .field("ended", &self.ended)
      .finish()
  }
}
impl<R: Read> ApngDecoder<R> {
  /// Checks the signature and reads up to the first frame.
  pub fn new(reader: R, options: DecodeOptions) -> Result<Self> {
    let mut chunks = ChunkReader::new(reader)?.verify_crc(options.verify_crc);
    let first = chunks.next().ok_or(FramecastError::MissingIhdr)??;
    if first.kind != ChunkType::IHDR {
      return Err(FramecastError::ChunkBeforeIhdr { kind: first.kind });
    }
    let header = IHDR::try_from(first.payload.as_slice())?;
    if header.is_interlaced {
      return Err(FramecastError::InvalidHeader("interlaced images are not supported"));
    }
    debug!("decoding {}x{} {:?}", header.width, header.height, header.pixel_mode);
    let mut out = Self {
      chunks,
      header,
      palette: None,
      animation: None,
      text: Vec::new(),
      lookahead: None,
      pending_control: None,
      last_control: None,
      inflater: None,
      ready: VecDeque::new(),
      frames_decoded: 0,
      ended: false,
    };
    // Read the metadata chunks, stopping at the first frame-related chunk.
    while let Some(chunk) = out.chunks.next() {
      let chunk = chunk?;
      if matches!(chunk.kind, ChunkType::IDAT | ChunkType::fdAT | ChunkType::fcTL | ChunkType::IEND)
      {
        out.lookahead = Some(chunk);
        break;
      }
      out.process(chunk)?;
    }
    if header.pixel_mode.is_indexed() && out.palette.is_none() {
      return Err(FramecastError::MissingPalette);
    }
    Ok(out)
  }

  #[inline]
  #[must_use]
  pub const fn header(&self) -> &IHDR {
    &self.header
  }

  /// The `PLTE` entries, if the stream had one.
  #[inline]
  #[must_use]
  pub fn palette(&self) -> Option<&[RGB8]> {
    self.palette.as_deref()
  }

  /// The `acTL` info, if this is an animated stream.
  #[inline]
  #[must_use]
  pub const fn animation(&self) -> Option<AnimationControl> {
    self.animation
  }

  /// `tEXt` keyword/text pairs seen so far.
  #[inline]
  #[must_use]
  pub fn text(&self) -> &[(String, String)] {
    &self.text
  }

  /// Stream bytes consumed so far.
  #[inline]
  #[must_use]
  pub const fn bytes_read(&self) -> u64 {
    self.chunks.bytes_read()
  }

  /// The palette samples of this image are looked up in: the `PLTE` for
  /// indexed images, a gray ramp for grayscale, and nothing for truecolor.
  #[must_use]
  pub fn sample_palette(&self) -> Vec<RGB8> {
    let mode = self.header.pixel_mode;
    if mode.is_indexed() {
      self.palette.clone().unwrap_or_default()
    } else if mode.is_grayscale() {
      grayscale_palette(mode.bit_depth())
    } else {
      Vec::new()
    }
  }

  /// Decodes the next frame, or gives `None` after the last one.
  pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
    loop {
      if let Some(frame) = self.ready.pop_front() {
        self.frames_decoded += 1;
        return Ok(Some(frame));
      }
      if self.ended {
        return Ok(None);
      }
      let chunk = match self.lookahead.take() {
        Some(chunk) => chunk,
        None => match self.chunks.next() {
          Some(chunk) => chunk?,
          None => {
            warn!("stream ended without IEND");
            self.finish_current_frame()?;
            self.ended = true;
            continue;
          }
        },
      };
      self.process(chunk)?;
    }
  }

  fn process(&mut self, chunk: Chunk) -> Result<()> {
    match chunk.kind {
      ChunkType::IHDR => {
        return Err(FramecastError::InvalidChunk { kind: chunk.kind, reason: "duplicate IHDR" });
      }
      ChunkType::PLTE => {
        let payload = &chunk.payload;
        if payload.len() % 3 != 0 || payload.is_empty() {
          return Err(FramecastError::InvalidChunk {
            kind: chunk.kind,
            reason: "length must be a non-zero multiple of 3",
          });
        }
        if payload.len() / 3 > 256 {
          return Err(FramecastError::PaletteTooLarge(payload.len() / 3));
        }
        let entries: &[RGB8] = bytemuck::cast_slice(payload);
        self.palette = Some(entries.to_vec());
      }
      ChunkType::acTL => {
        let actl = AnimationControl::try_from(chunk.payload.as_slice())?;
        debug!("animation: {} frames, {} plays", actl.num_frames, actl.num_plays);
        self.animation = Some(actl);
      }
      ChunkType::fcTL => {
        let fctl = FrameControl::try_from(chunk.payload.as_slice())?;
        if !fctl.fits_within(self.header.width, self.header.height) {
          return Err(FramecastError::InvalidChunk {
            kind: chunk.kind,
            reason: "frame lies outside the image",
          });
        }
        self.finish_current_frame()?;
        self.pending_control = Some(fctl);
      }
      ChunkType::IDAT => self.feed_frame_data(&chunk.payload)?,
      ChunkType::fdAT => {
        if chunk.payload.len() < 4 {
          return Err(FramecastError::InvalidChunk { kind: chunk.kind, reason: "no sequence number" });
        }
        let (sequence, data) = chunk.payload.split_at(4);
        trace!("fdAT #{}", u32::from_be_bytes([sequence[0], sequence[1], sequence[2], sequence[3]]));
        self.feed_frame_data(data)?;
      }
      ChunkType::tEXt => {
        let mut parts = chunk.payload.splitn(2, |&b| b == 0);
        let keyword: String = parts.next().unwrap_or_default().iter().map(|&b| b as char).collect();
        let text: String = parts.next().unwrap_or_default().iter().map(|&b| b as char).collect();
        self.text.push((keyword, text));
      }
      ChunkType::IEND => {
        self.finish_current_frame()?;
        self.ended = true;
      }
      other if other.is_critical() => {
        return Err(FramecastError::InvalidChunk { kind: other, reason: "unknown critical chunk" });
      }
      other => trace!("skipping {:?} chunk", other),
    }
    Ok(())
  }

  fn feed_frame_data(&mut self, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
      if self.inflater.is_none() {
        let control = self.next_control();
        let expected = self.header.filtered_len(control.width, control.height)?;
        self.inflater = Some((control, FrameInflater::new(expected)));
      }
      let Some((control, inflater)) = self.inflater.as_mut() else { break };
      let sequence_number = control.sequence_number;
      let consumed = inflater.feed(data)?;
      data = &data[consumed..];
      if inflater.is_finished() {
        trace!("frame #{} zlib stream complete", sequence_number);
        self.finish_current_frame()?;
      } else {
        debug_assert!(data.is_empty());
        break;
      }
    }
    Ok(())
  }

  /// The control for a frame whose data is starting now.
  fn next_control(&mut self) -> FrameControl {
    let control = match self.pending_control.take() {
      Some(control) => control,
      None => match self.last_control {
        // data for a second frame in the same run of chunks
        Some(last) => {
          FrameControl { sequence_number: last.sequence_number.wrapping_add(1), ..last }
        }
        None => FrameControl::implicit(self.header.width, self.header.height),
      },
    };
    self.last_control = Some(control);
    control
  }

  fn finish_current_frame(&mut self) -> Result<()> {
    if let Some((control, inflater)) = self.inflater.take() {
      let filtered = inflater.finish()?;
      let raster = defilter(self.header.pixel_mode, control.width, control.height, &filtered)?;
      trace!(
        "frame at ({},{}) {}x{}, {} ms",
        control.x_offset,
        control.y_offset,
        control.width,
        control.height,
        control.duration_ms()
      );
      self.ready.push_back(DecodedFrame { control, pixel_mode: self.header.pixel_mode, raster });
    }
    Ok(())
  }
}
impl<R: Read> Iterator for ApngDecoder<R> {
  type Item = Result<DecodedFrame>;
  #[inline]
  fn next(&mut self) -> Option<Self::Item> {
    self.next_frame().transpose()
  }
}
