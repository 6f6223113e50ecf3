//! Decode command - turn one frame file back into an image.

use std::path::PathBuf;

use texblock::session::{DecoderConfig, DecoderSession};
use tracing::debug;

use super::common::CodecArg;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the decode command.
pub struct DecodeArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub codec: Option<CodecArg>,
    pub width: u32,
    pub height: u32,
}

/// Run the decode command.
pub fn run(args: DecodeArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("decode");
    let codec = args
        .codec
        .map(Into::into)
        .unwrap_or(runner.config().encoder.codec);

    let data = std::fs::read(&args.input).map_err(|e| CliError::io(&args.input, e))?;
    let config = DecoderConfig::new(codec, args.width, args.height)
        .with_worker_threads(runner.config().worker_threads())
        .with_slicing(runner.config().pipeline.slicing)
        .with_simd(runner.config().pipeline.simd);
    let decoder = DecoderSession::create(config)?;
    let pixels = decoder.decode_to_vec(&data)?;
    debug!(metrics = %decoder.metrics(), "Frame decoded");
    decoder.close();

    let image = image::RgbaImage::from_raw(args.width, args.height, pixels)
        .ok_or_else(|| CliError::InvalidInput("decoded buffer has the wrong size".to_string()))?;
    image.save(&args.output).map_err(|source| CliError::ImageWrite {
        path: args.output.clone(),
        source,
    })?;

    println!(
        "Decoded {} ({}×{}, {}) to {}",
        args.input.display(),
        args.width,
        args.height,
        codec,
        args.output.display()
    );
    Ok(())
}
