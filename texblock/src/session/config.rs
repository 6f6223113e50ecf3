//! Session configuration.
//!
//! Both configs carry public fields with documented defaults plus `with_*`
//! builders for the common overrides.

use std::fmt;
use std::str::FromStr;

use crate::color::PixelFormat;
use crate::frame::{Deflate, StageKind};
use crate::strategy::{Quality, StrategyKind};
use crate::texture::TextureFormat;

// ==================== Pipeline Defaults ====================

/// Default admission limit for in-flight frames.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default sequence number of the first frame.
pub const DEFAULT_FIRST_SEQUENCE: u64 = 1;

/// Default worker count: one per available core.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// Which codec a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecKind {
    /// One RGB_DXT1 or RGBA_DXT5 plane.
    #[default]
    Dxt,
    /// One YCoCg_DXT5 plane plus an optional RGTC1 alpha plane.
    YCoCg,
}

impl CodecKind {
    pub fn name(self) -> &'static str {
        match self {
            CodecKind::Dxt => "dxt",
            CodecKind::YCoCg => "ycocg",
        }
    }

    /// Plane formats in frame order.
    pub fn planes(self, alpha: bool) -> Vec<TextureFormat> {
        match (self, alpha) {
            (CodecKind::Dxt, false) => vec![TextureFormat::RgbDxt1],
            (CodecKind::Dxt, true) => vec![TextureFormat::RgbaDxt5],
            (CodecKind::YCoCg, false) => vec![TextureFormat::YCoCgDxt5],
            (CodecKind::YCoCg, true) => vec![TextureFormat::YCoCgDxt5, TextureFormat::AlphaRgtc1],
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dxt" => Ok(CodecKind::Dxt),
            "ycocg" | "ycocg-dxt5" => Ok(CodecKind::YCoCg),
            other => Err(format!("unknown codec '{}'", other)),
        }
    }
}

/// Encoder session settings.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub codec: CodecKind,
    pub width: u32,
    pub height: u32,

    /// Carry alpha: RGBA_DXT5 for the DXT codec, an extra RGTC1 plane for
    /// YCoCg. Default: false.
    pub alpha: bool,

    // ==================== Compression ====================
    /// Backend for DXT planes (and the YCoCg codec's alpha plane).
    /// Default: vector quantization.
    pub strategy: StrategyKind,

    /// Software fitter effort. Default: normal.
    pub quality: Quality,

    /// Fall back to software when the GPU cannot be opened. Default: true.
    pub gpu_fallback: bool,

    /// Lossless stage applied to each plane. Default: deflate.
    pub second_stage: StageKind,

    /// Deflate level 0..=9. Default: 6.
    pub deflate_level: u32,

    // ==================== Pipeline ====================
    /// Frames admitted before `submit` blocks. Default: 8.
    pub max_concurrent: usize,

    /// Worker pool size. Default: available cores.
    pub worker_threads: usize,

    /// Split frames into block-row slices. Default: true.
    pub slicing: bool,

    /// Use SSE2 block routines when the CPU has them. Default: true.
    pub simd: bool,

    /// Sequence number of the first frame. Default: 1.
    pub first_sequence: u64,
}

impl EncoderConfig {
    pub fn new(codec: CodecKind, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
            alpha: false,
            strategy: StrategyKind::VectorQuantization,
            quality: Quality::default(),
            gpu_fallback: true,
            second_stage: StageKind::default(),
            deflate_level: Deflate::DEFAULT_LEVEL,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            worker_threads: default_worker_threads(),
            slicing: true,
            simd: true,
            first_sequence: DEFAULT_FIRST_SEQUENCE,
        }
    }

    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_gpu_fallback(mut self, fallback: bool) -> Self {
        self.gpu_fallback = fallback;
        self
    }

    pub fn with_second_stage(mut self, stage: StageKind, level: u32) -> Self {
        self.second_stage = stage;
        self.deflate_level = level;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    pub fn with_slicing(mut self, slicing: bool) -> Self {
        self.slicing = slicing;
        self
    }

    pub fn with_simd(mut self, simd: bool) -> Self {
        self.simd = simd;
        self
    }

    pub fn with_first_sequence(mut self, first: u64) -> Self {
        self.first_sequence = first;
        self
    }

    /// Plane formats every frame of this session carries.
    pub fn planes(&self) -> Vec<TextureFormat> {
        self.codec.planes(self.alpha)
    }
}

/// Decoder session settings.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub codec: CodecKind,
    pub width: u32,
    pub height: u32,

    /// Layout written into destination buffers. Default: RGBA.
    pub output_format: PixelFormat,

    /// Decode slices in parallel. Default: true.
    pub slicing: bool,

    /// Use SSE2 block routines when the CPU has them. Default: true.
    pub simd: bool,

    /// Worker pool size. Default: available cores.
    pub worker_threads: usize,
}

impl DecoderConfig {
    pub fn new(codec: CodecKind, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
            output_format: PixelFormat::Rgba8,
            slicing: true,
            simd: true,
            worker_threads: default_worker_threads(),
        }
    }

    pub fn with_output_format(mut self, format: PixelFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_slicing(mut self, slicing: bool) -> Self {
        self.slicing = slicing;
        self
    }

    pub fn with_simd(mut self, simd: bool) -> Self {
        self.simd = simd;
        self
    }

    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }
}

impl From<&EncoderConfig> for DecoderConfig {
    fn from(config: &EncoderConfig) -> Self {
        Self::new(config.codec, config.width, config.height)
            .with_slicing(config.slicing)
            .with_simd(config.simd)
            .with_worker_threads(config.worker_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_defaults() {
        let config = EncoderConfig::new(CodecKind::YCoCg, 64, 32);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.first_sequence, 1);
        assert_eq!(config.second_stage, StageKind::Deflate);
        assert!(config.slicing);
        assert!(config.worker_threads >= 1);
        assert_eq!(config.planes(), vec![TextureFormat::YCoCgDxt5]);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EncoderConfig::new(CodecKind::Dxt, 8, 8)
            .with_alpha(true)
            .with_quality(Quality::High)
            .with_max_concurrent(2)
            .with_first_sequence(10);
        assert_eq!(config.planes(), vec![TextureFormat::RgbaDxt5]);
        assert_eq!(config.quality, Quality::High);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.first_sequence, 10);
    }

    #[test]
    fn test_codec_planes() {
        assert_eq!(
            CodecKind::YCoCg.planes(true),
            vec![TextureFormat::YCoCgDxt5, TextureFormat::AlphaRgtc1]
        );
        assert_eq!(CodecKind::Dxt.planes(false), vec![TextureFormat::RgbDxt1]);
        assert_eq!("YCoCg".parse::<CodecKind>().unwrap(), CodecKind::YCoCg);
        assert!("h264".parse::<CodecKind>().is_err());
    }

    #[test]
    fn test_decoder_from_encoder() {
        let enc = EncoderConfig::new(CodecKind::YCoCg, 18, 18).with_slicing(false);
        let dec = DecoderConfig::from(&enc);
        assert_eq!(dec.codec, CodecKind::YCoCg);
        assert_eq!((dec.width, dec.height), (18, 18));
        assert!(!dec.slicing);
        assert_eq!(dec.output_format, PixelFormat::Rgba8);
    }
}
