//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use texblock::frame::StageKind;
use texblock::session::CodecKind;
use texblock::strategy::{Quality, StrategyKind};

/// Extension of encoded frame files.
pub const FRAME_EXTENSION: &str = "txb";

/// Codec selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CodecArg {
    /// One DXT1 plane, or DXT5 with --alpha
    Dxt,
    /// One YCoCg-DXT5 plane, plus an RGTC1 plane with --alpha
    Ycocg,
}

impl From<CodecArg> for CodecKind {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Dxt => CodecKind::Dxt,
            CodecArg::Ycocg => CodecKind::YCoCg,
        }
    }
}

/// Compression backend for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StrategyArg {
    /// Graphics-card texture compression (falls back to software)
    Gpu,
    /// Software endpoint fitting
    Vq,
    /// Software YCoCg-DXT5 (ycocg codec only)
    Ycocg,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Gpu => StrategyKind::Gpu,
            StrategyArg::Vq => StrategyKind::VectorQuantization,
            StrategyArg::Ycocg => StrategyKind::YCoCg,
        }
    }
}

/// Software fitter effort for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum QualityArg {
    Fast,
    Normal,
    High,
}

impl From<QualityArg> for Quality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Fast => Quality::Fast,
            QualityArg::Normal => Quality::Normal,
            QualityArg::High => Quality::High,
        }
    }
}

/// Second stage for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StageArg {
    /// Raw block planes
    Stored,
    /// Deflate each plane
    Deflate,
}

impl From<StageArg> for StageKind {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Stored => StageKind::Stored,
            StageArg::Deflate => StageKind::Deflate,
        }
    }
}

/// File name of frame `sequence` inside `dir`.
pub fn frame_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("frame-{:06}.{}", sequence, FRAME_EXTENSION))
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_path() {
        let path = frame_path(Path::new("/out"), 42);
        assert_eq!(path, PathBuf::from("/out/frame-000042.txb"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(CodecKind::from(CodecArg::Ycocg), CodecKind::YCoCg);
        assert_eq!(StrategyKind::from(StrategyArg::Vq), StrategyKind::VectorQuantization);
        assert_eq!(StageKind::from(StageArg::Stored), StageKind::Stored);
    }
}
