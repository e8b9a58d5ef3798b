//! Command line front end: inspect APNG files and convert them to GIF.

use std::{
  fs::File,
  io::{BufReader, Write},
  path::PathBuf,
  process::ExitCode,
};

use clap::{Parser, Subcommand};
use framecast::{
  png::{ApngDecoder, ChunkReader, DecodeOptions},
  quantize::NamedPalette,
  CancelToken, ConvertOptions, PaletteChoice,
};
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(name = "framecast")]
#[command(version)]
#[command(about = "Inspect animated PNG files and convert them to GIF")]
struct Args {
  /// Log debug output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the chunks and frames of a PNG or APNG file
  Info {
    input: PathBuf,
  },
  /// Convert a PNG or APNG file to an animated GIF
  Convert {
    input: PathBuf,
    output: PathBuf,

    /// auto, source, or a built-in palette (grayscale, black-white, web-safe, vga16, amber, green)
    #[arg(short, long, default_value = "auto", value_parser = parse_palette)]
    palette: PaletteChoice,

    /// Map colors without Floyd-Steinberg dithering
    #[arg(long)]
    no_dither: bool,

    /// Compare colors by luma and hue as well as RGB distance
    #[arg(long)]
    accurate: bool,

    /// GIF loop count, 0 loops forever (default: taken from the APNG)
    #[arg(short, long = "loop")]
    loop_count: Option<u16>,

    /// Accept chunks whose CRC doesn't match
    #[arg(long)]
    no_verify_crc: bool,

    /// Threads for building the color lookup table (default: all cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Don't print progress
    #[arg(short, long)]
    quiet: bool,
  },
}

fn parse_palette(s: &str) -> Result<PaletteChoice, String> {
  match s.to_ascii_lowercase().as_str() {
    "auto" => Ok(PaletteChoice::Auto),
    "source" => Ok(PaletteChoice::Source),
    _ => s.parse::<NamedPalette>().map(PaletteChoice::Named),
  }
}

fn main() -> ExitCode {
  let args = Args::parse();

  let subscriber = tracing_subscriber::fmt()
    .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
    .with_target(false)
    .with_writer(std::io::stderr)
    .finish();
  let _ = tracing::subscriber::set_global_default(subscriber);
  debug!("{:?}", args);

  let result = match args.command {
    Command::Info { input } => info(input),
    Command::Convert {
      input,
      output,
      palette,
      no_dither,
      accurate,
      loop_count,
      no_verify_crc,
      threads,
      quiet,
    } => {
      let options = ConvertOptions::default()
        .with_palette(palette)
        .with_dither(!no_dither)
        .with_accurate(accurate)
        .with_loop_count(loop_count)
        .with_verify_crc(!no_verify_crc)
        .with_lut_threads(threads);
      convert(input, output, &options, quiet)
    }
  };
  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{e}");
      ExitCode::FAILURE
    }
  }
}

fn info(input: PathBuf) -> framecast::Result<()> {
  println!("{}", input.display());
  let reader = ChunkReader::new(BufReader::new(File::open(&input)?))?.verify_crc(false);
  println!("{:<6} {:>10} {:>10}  crc", "chunk", "length", "crc32");
  let mut bad_crcs = 0;
  for chunk in reader {
    let chunk = chunk?;
    let ok = chunk.crc == chunk.actual_crc();
    if !ok {
      bad_crcs += 1;
    }
    println!(
      "{:<6} {:>10} {:>#10x}  {}",
      format!("{:?}", chunk.kind),
      chunk.payload.len(),
      chunk.crc,
      if ok { "ok" } else { "BAD" }
    );
  }
  if bad_crcs > 0 {
    println!("{bad_crcs} chunk(s) with a bad CRC");
  }

  let options = DecodeOptions { verify_crc: false };
  let mut decoder = ApngDecoder::new(BufReader::new(File::open(&input)?), options)?;
  let header = *decoder.header();
  println!();
  println!("{}x{} {:?}", header.width, header.height, header.pixel_mode);
  match decoder.animation() {
    Some(a) => println!("{} frames, {} plays (0 is forever)", a.num_frames, a.num_plays),
    None => println!("not animated"),
  }
  for (keyword, text) in decoder.text() {
    println!("{keyword}: {text}");
  }
  println!();
  println!("{:>5} {:>11} {:>11} {:>8} {:>7} {:>5}", "frame", "size", "offset", "delay", "dispose", "blend");
  let mut index = 0;
  let mut total_ms = 0_u64;
  while let Some(frame) = decoder.next_frame()? {
    let c = frame.control;
    total_ms += u64::from(c.duration_ms());
    println!(
      "{:>5} {:>11} {:>11} {:>6}ms {:>7} {:>5}",
      index,
      format!("{}x{}", c.width, c.height),
      format!("{},{}", c.x_offset, c.y_offset),
      c.duration_ms(),
      c.dispose_op,
      c.blend_op
    );
    index += 1;
  }
  println!("{index} frames decoded, {total_ms}ms total");
  Ok(())
}

fn convert(
  input: PathBuf, output: PathBuf, options: &ConvertOptions, quiet: bool,
) -> framecast::Result<()> {
  let cancel = CancelToken::new();
  let mut last_shown = -1_i32;
  let summary = framecast::convert_file(&input, &output, options, &cancel, |percent| {
    let whole = percent as i32;
    if !quiet && whole != last_shown {
      last_shown = whole;
      let mut err = std::io::stderr();
      let _ = write!(err, "\r{whole:>3}%");
      let _ = err.flush();
    }
  })?;
  if !quiet {
    eprintln!();
  }
  println!(
    "{}: {}x{}, {} frames, {} colors{}, {} bytes",
    output.display(),
    summary.width,
    summary.height,
    summary.frame_count,
    summary.palette_len,
    if summary.quantized { " (quantized)" } else { "" },
    summary.bytes_written
  );
  Ok(())
}
