//! texblock CLI - command-line host for the texblock compression engine.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::common::{CodecArg, QualityArg, StageArg, StrategyArg};
use commands::config::ConfigCommands;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "texblock", version, about = "DXT / YCoCg-DXT5 frame compression")]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compress images into frame files, one frame per image
    Encode {
        /// Input images in frame order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the frame files
        #[arg(short, long)]
        output: PathBuf,

        /// Codec (default from config)
        #[arg(long, value_enum)]
        codec: Option<CodecArg>,

        /// Keep the alpha channel
        #[arg(long)]
        alpha: bool,

        /// Compression backend (default from config)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Software fitter effort (default from config)
        #[arg(long, value_enum)]
        quality: Option<QualityArg>,

        /// Lossless stage after block compression (default from config)
        #[arg(long, value_enum)]
        second_stage: Option<StageArg>,

        /// Frames in flight before reading the next image blocks
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Compress each frame as one slice
        #[arg(long)]
        no_slicing: bool,
    },

    /// Decode one frame file into an image
    Decode {
        /// Frame file
        input: PathBuf,

        /// Output image; the format follows the extension
        #[arg(short, long)]
        output: PathBuf,

        /// Codec the frame was written with (default from config)
        #[arg(long, value_enum)]
        codec: Option<CodecArg>,

        /// Frame width in pixels
        #[arg(long)]
        width: u32,

        /// Frame height in pixels
        #[arg(long)]
        height: u32,
    },

    /// Show the planes of a frame file
    Info {
        /// Frame file
        input: PathBuf,

        /// Frame width, to show per-plane ratios
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Frame height, to show per-plane ratios
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// View or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Encode {
            inputs,
            output,
            codec,
            alpha,
            strategy,
            quality,
            second_stage,
            max_concurrent,
            no_slicing,
        } => {
            let runner = CliRunner::new(cli.verbose)?;
            commands::encode::run(
                commands::encode::EncodeArgs {
                    inputs,
                    output,
                    codec,
                    alpha,
                    strategy,
                    quality,
                    second_stage,
                    max_concurrent,
                    no_slicing,
                },
                &runner,
            )
        }
        Commands::Decode {
            input,
            output,
            codec,
            width,
            height,
        } => {
            let runner = CliRunner::new(cli.verbose)?;
            commands::decode::run(
                commands::decode::DecodeArgs {
                    input,
                    output,
                    codec,
                    width,
                    height,
                },
                &runner,
            )
        }
        Commands::Info {
            input,
            width,
            height,
        } => commands::info::run(input, width.zip(height)),
        Commands::Init { force } => commands::init::run(force),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
