//! Encode command - compress a sequence of images into frame files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use texblock::session::{EncoderSession, FrameSink, SourceFrame};
use texblock::CodecError;
use tracing::{info, warn};

use super::common::{format_size, frame_path, CodecArg, QualityArg, StageArg, StrategyArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the encode command.
pub struct EncodeArgs {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub codec: Option<CodecArg>,
    pub alpha: bool,
    pub strategy: Option<StrategyArg>,
    pub quality: Option<QualityArg>,
    pub second_stage: Option<StageArg>,
    pub max_concurrent: Option<usize>,
    pub no_slicing: bool,
}

/// Writes every emitted frame to its own file.
struct FileSink {
    dir: PathBuf,
    progress: ProgressBar,
    written: Mutex<u64>,
    failures: Mutex<Vec<(u64, String)>>,
}

impl FileSink {
    fn new(dir: PathBuf, progress: ProgressBar) -> Self {
        Self {
            dir,
            progress,
            written: Mutex::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }
}

impl FrameSink for FileSink {
    fn frame_encoded(&self, sequence: u64, data: &[u8]) {
        let path = frame_path(&self.dir, sequence);
        match std::fs::write(&path, data) {
            Ok(()) => *self.written.lock() += data.len() as u64,
            Err(e) => {
                warn!(sequence, path = %path.display(), error = %e, "Failed to write frame");
                self.failures.lock().push((sequence, e.to_string()));
            }
        }
        self.progress.inc(1);
    }

    fn frame_dropped(&self, sequence: u64, error: &CodecError) {
        self.failures.lock().push((sequence, error.to_string()));
        self.progress.inc(1);
    }
}

fn load_frame(path: &Path, sequence: u64) -> Result<SourceFrame, CliError> {
    let image = image::open(path).map_err(|source| CliError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SourceFrame::from_rgba_image(image.to_rgba8(), sequence))
}

/// Run the encode command.
pub fn run(args: EncodeArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("encode");
    let settings = runner.config();

    let first_path = args
        .inputs
        .first()
        .ok_or_else(|| CliError::InvalidInput("no input images".to_string()))?;
    let first = load_frame(first_path, 1)?;

    let mut config = settings.to_encoder_config(first.width, first.height);
    if let Some(codec) = args.codec {
        config.codec = codec.into();
    }
    if args.alpha {
        config.alpha = true;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    if let Some(quality) = args.quality {
        config.quality = quality.into();
    }
    if let Some(stage) = args.second_stage {
        config.second_stage = stage.into();
    }
    if let Some(max) = args.max_concurrent {
        config.max_concurrent = max;
    }
    if args.no_slicing {
        config.slicing = false;
    }

    std::fs::create_dir_all(&args.output).map_err(|e| CliError::io(&args.output, e))?;

    let total = args.inputs.len();
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} frames {per_sec} ({eta})")
            .map_err(|e| CliError::Config(e.to_string()))?
            .progress_chars("=> "),
    );

    let sink = Arc::new(FileSink::new(args.output.clone(), progress.clone()));
    let (width, height) = (config.width, config.height);
    let codec = config.codec;
    let encoder = EncoderSession::create(config, sink.clone())?;
    info!(
        frames = total,
        width,
        height,
        planes = ?encoder.plane_formats(),
        strategies = ?encoder.strategy_names(),
        "Encoding"
    );

    encoder.submit(first)?;
    for (index, path) in args.inputs.iter().enumerate().skip(1) {
        let sequence = index as u64 + 1;
        let frame = load_frame(path, sequence)?;
        if let Err(e) = encoder.submit(frame) {
            // The session already skipped this sequence number.
            warn!(sequence, path = %path.display(), error = %e, "Frame rejected");
            sink.failures.lock().push((sequence, e.to_string()));
            progress.inc(1);
        }
    }
    encoder.flush()?;
    let metrics = encoder.metrics();
    encoder.close()?;
    progress.finish_and_clear();

    let failures = sink.failures.lock();
    let written = *sink.written.lock();
    println!(
        "Encoded {} of {} frames into {} ({}, ratio {:.2}:1)",
        total - failures.len(),
        total,
        args.output.display(),
        format_size(written),
        metrics.compression_ratio()
    );
    println!("Average encode time: {:.2} ms", metrics.average_encode_time().as_secs_f64() * 1000.0);
    println!(
        "Decode with: texblock decode <frame> --codec {} --width {} --height {}",
        codec, width, height
    );

    for (sequence, error) in failures.iter() {
        eprintln!("  frame {}: {}", sequence, error);
    }
    if !failures.is_empty() {
        return Err(CliError::FramesDropped(failures.len(), total));
    }
    Ok(())
}
