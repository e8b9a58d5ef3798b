#![cfg_attr(docs_rs, feature(doc_cfg))]

//! The codec core of a screen recorder.
//!
//! Frames come in as RGB images and are written to an animated PNG as they
//! arrive, storing only the rectangle that changed since the previous frame.
//! A finished APNG can then be turned into an animated GIF: frames are
//! decoded one at a time, reduced to a palette of at most 256 colors
//! (optionally with dithering), and LZW compressed.
//!
//! * [`png`] reads and writes the PNG/APNG container.
//! * [`quantize`] holds palettes, color metrics, the lookup table, and the
//!   ditherer.
//! * [`gif`] writes GIF89a streams.
//! * [`transcode`] ties the decoder, quantizer, and GIF writer together,
//!   with progress reports and cancellation.
//! * [`capture`] runs a recording: a timer thread grabbing frames into a
//!   temporary APNG.

#[cfg(target_pointer_width = "16")]
compile_error!("this crate assumes 32-bit or bigger pointers!");

pub mod error;
pub use error::{FramecastError, Result};

pub mod pixel_formats;
pub use pixel_formats::*;

pub mod image;
pub use image::RgbImage;

pub mod png;

pub mod color_filter;
pub use color_filter::ColorFilter;

pub mod quantize;

pub mod gif;

pub mod cancel;
pub use cancel::CancelToken;

pub mod config;
pub use config::{CaptureConfig, ConvertOptions, OutputFormat, PaletteChoice};

pub mod transcode;
pub use transcode::{convert, convert_file, spawn_convert, GifSummary, ProgressEvent};

pub mod capture;
pub use capture::{FrameSource, Recorder, Recording};
