//! Interchangeable DXT block-compression strategies.
//!
//! A [`DxtStrategy`] turns a [`Surface`] of pixels into a stream of 4×4
//! compressed blocks and back. Sessions pick one strategy per plane at setup
//! and hold it as `Arc<dyn DxtStrategy>`, so the per-frame path never
//! branches on the strategy kind.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────────┐
//!                │  Arc<dyn DxtStrategy> │
//!                └──────────┬───────────┘
//!          ┌────────────────┼─────────────────┐
//!          ▼                ▼                 ▼
//!   ┌─────────────┐  ┌─────────────┐  ┌──────────────┐
//!   │ GpuStrategy │  │ VqStrategy  │  │ YCoCgStrategy│
//!   │ (tiled,     │  │ (range /    │  │ (CoCgAY8 in, │
//!   │  serialized)│  │  cluster)   │  │  YCoCg-DXT5) │
//!   └─────────────┘  └─────────────┘  └──────────────┘
//! ```
//!
//! Every strategy decodes with the shared software decoders in
//! [`decode_blocks`].

mod fit;
pub mod gpu;
mod vq;
mod ycocg;

pub use gpu::{GpuStrategy, TextureUnit};
pub use vq::VqStrategy;
pub use ycocg::YCoCgStrategy;

use std::fmt;
use std::str::FromStr;

use crate::block::{self, alpha, color565, Accel, PixelBlock};
use crate::color::PixelFormat;
use crate::error::{CodecError, CodecResult};
use crate::surface::{Surface, SurfaceMut};
use crate::texture::TextureFormat;

/// Which family a strategy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Hardware texture-unit compression.
    Gpu,
    /// Software endpoint fitting.
    VectorQuantization,
    /// Software YCoCg-DXT5.
    YCoCg,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Gpu => "gpu",
            StrategyKind::VectorQuantization => "vq",
            StrategyKind::YCoCg => "ycocg",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" | "hardware" => Ok(StrategyKind::Gpu),
            "vq" | "software" | "vector-quantization" => Ok(StrategyKind::VectorQuantization),
            "ycocg" => Ok(StrategyKind::YCoCg),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Encoder effort for the software fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    /// Range fit only.
    Fast,
    /// Range fit refined by two least-squares passes.
    #[default]
    Normal,
    /// Up to eight least-squares passes, best result kept; alpha blocks
    /// also try the 6-value ramp.
    High,
}

impl Quality {
    pub fn name(self) -> &'static str {
        match self {
            Quality::Fast => "fast",
            Quality::Normal => "normal",
            Quality::High => "high",
        }
    }

    /// Least-squares refinement passes.
    pub(crate) fn refine_passes(self) -> usize {
        match self {
            Quality::Fast => 0,
            Quality::Normal => 2,
            Quality::High => 8,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Quality::Fast),
            "normal" => Ok(Quality::Normal),
            "high" => Ok(Quality::High),
            other => Err(format!("unknown quality '{}'", other)),
        }
    }
}

/// A block-compression backend.
///
/// `encode` writes exactly `target.encoded_size(width, height)` bytes for
/// the given surface; `decode` reads that many and fills the destination.
/// Texels past the right and bottom edges are replicated from the last
/// in-bounds texel, never taken from neighboring blocks.
pub trait DxtStrategy: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// True if `target` can be produced.
    fn supports(&self, target: TextureFormat) -> bool;

    /// Pixel layout the strategy wants to ingest for `target`.
    fn input_format(&self, target: TextureFormat) -> PixelFormat;

    /// True if a source in `format` can be encoded to `target` without an
    /// upstream conversion.
    fn accepts(&self, target: TextureFormat, format: PixelFormat) -> bool {
        format == self.input_format(target)
    }

    /// True if independent horizontal slices may be encoded concurrently.
    fn is_sliceable(&self) -> bool;

    /// Compresses `source` into `out`.
    fn encode(&self, source: &Surface<'_>, target: TextureFormat, out: &mut [u8]) -> CodecResult<()>;

    /// Decompresses `blocks` into `dest`, which must be tagged with
    /// [`input_format`](Self::input_format) (any layout for single-channel
    /// targets, whose value lands in the alpha channel).
    fn decode(&self, blocks: &[u8], target: TextureFormat, dest: &mut SurfaceMut<'_>) -> CodecResult<()>;
}

/// Fails with `UnsupportedFormat` unless `strategy` handles `target`.
pub(crate) fn ensure_supported(strategy: &dyn DxtStrategy, target: TextureFormat) -> CodecResult<()> {
    if strategy.supports(target) {
        Ok(())
    } else {
        Err(CodecError::unsupported(format!(
            "{} strategy cannot produce {}",
            strategy.name(),
            target
        )))
    }
}

/// Checks the source layout and output size for an encode call.
pub(crate) fn ensure_encode_args(
    strategy: &dyn DxtStrategy,
    source: &Surface<'_>,
    target: TextureFormat,
    out: &[u8],
) -> CodecResult<usize> {
    ensure_supported(strategy, target)?;
    if !strategy.accepts(target, source.format()) {
        return Err(CodecError::unsupported(format!(
            "{} strategy wants {} input for {}, got {}",
            strategy.name(),
            strategy.input_format(target),
            target,
            source.format()
        )));
    }
    let size = target.encoded_size(source.width(), source.height());
    if out.len() < size {
        return Err(CodecError::internal(format!(
            "output holds {} bytes, {} needs {}",
            out.len(),
            target,
            size
        )));
    }
    Ok(size)
}

/// Runs `encode_one` for every block of `source` in block-row-major order.
pub(crate) fn encode_blocks<F>(
    source: &Surface<'_>,
    target: TextureFormat,
    out: &mut [u8],
    accel: Accel,
    mut encode_one: F,
) where
    F: FnMut(&PixelBlock, &mut [u8]),
{
    let bpb = target.bytes_per_block();
    let blocks_wide = source.blocks_wide();
    let size = target.encoded_size(source.width(), source.height());

    for (i, dst) in out[..size].chunks_exact_mut(bpb).enumerate() {
        let bx = i as u32 % blocks_wide;
        let by = i as u32 / blocks_wide;
        let block = block::extract_block(source, bx, by, accel);
        encode_one(&block, dst);
    }
}

/// Software decoder shared by every strategy.
pub fn decode_blocks(
    blocks: &[u8],
    target: TextureFormat,
    dest: &mut SurfaceMut<'_>,
    accel: Accel,
) -> CodecResult<()> {
    let size = target.encoded_size(dest.width(), dest.height());
    if blocks.len() < size {
        return Err(CodecError::bad_frame(format!(
            "{} plane holds {} bytes, {}×{} needs {}",
            target,
            blocks.len(),
            dest.width(),
            dest.height(),
            size
        )));
    }

    let expected = match target {
        TextureFormat::RgbDxt1 | TextureFormat::RgbaDxt5 => Some(PixelFormat::Rgba8),
        TextureFormat::YCoCgDxt5 => Some(PixelFormat::CoCgAY8),
        TextureFormat::AlphaRgtc1 => None,
    };
    if let Some(expected) = expected {
        if dest.format() != expected {
            return Err(CodecError::unsupported(format!(
                "{} decodes to {}, destination is {}",
                target,
                expected,
                dest.format()
            )));
        }
    }

    let bpb = target.bytes_per_block();
    let blocks_wide = dest.width().div_ceil(4);
    let alpha_index = dest.format().alpha_index();

    for (i, src) in blocks[..size].chunks_exact(bpb).enumerate() {
        let bx = i as u32 % blocks_wide;
        let by = i as u32 / blocks_wide;
        match target {
            TextureFormat::RgbDxt1 => {
                let px = color565::decode_color_block(src, false);
                block::store_block(dest, bx, by, &px, accel);
            }
            TextureFormat::RgbaDxt5 => {
                let mut px = color565::decode_color_block(&src[8..16], true);
                let a = alpha::decode_block(&src[0..8]);
                for (texel, &value) in px.chunks_exact_mut(4).zip(a.iter()) {
                    texel[3] = value;
                }
                block::store_block(dest, bx, by, &px, accel);
            }
            TextureFormat::YCoCgDxt5 => {
                let px = block::ycocg::decode_block(src);
                block::store_block(dest, bx, by, &px, accel);
            }
            TextureFormat::AlphaRgtc1 => {
                let values = alpha::decode_block(src);
                block::store_channel(dest, bx, by, alpha_index, &values);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("GPU".parse::<StrategyKind>().unwrap(), StrategyKind::Gpu);
        assert_eq!("vq".parse::<StrategyKind>().unwrap(), StrategyKind::VectorQuantization);
        assert_eq!("ycocg".parse::<StrategyKind>().unwrap(), StrategyKind::YCoCg);
        assert!("bc7".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_quality_parse_and_passes() {
        assert_eq!(" High ".parse::<Quality>().unwrap(), Quality::High);
        assert_eq!(Quality::default(), Quality::Normal);
        assert_eq!(Quality::Fast.refine_passes(), 0);
        assert_eq!(Quality::Normal.refine_passes(), 2);
        assert_eq!(Quality::High.refine_passes(), 8);
    }

    #[test]
    fn test_decode_rejects_short_plane() {
        let mut data = vec![0u8; 8 * 8 * 4];
        let mut dest = SurfaceMut::packed(&mut data, 8, 8, PixelFormat::Rgba8).unwrap();
        let err = decode_blocks(&[0u8; 16], TextureFormat::RgbDxt1, &mut dest, Accel::Scalar);
        assert!(matches!(err, Err(CodecError::BadFrame(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_destination_layout() {
        let mut data = vec![0u8; 4 * 4 * 4];
        let mut dest = SurfaceMut::packed(&mut data, 4, 4, PixelFormat::Bgra8).unwrap();
        let err = decode_blocks(&[0u8; 16], TextureFormat::YCoCgDxt5, &mut dest, Accel::Scalar);
        assert!(matches!(err, Err(CodecError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_decode_alpha_into_any_layout() {
        let mut data = vec![0u8; 4 * 4 * 4];
        let mut dest = SurfaceMut::packed(&mut data, 4, 4, PixelFormat::CoCgAY8).unwrap();
        let block = alpha::encode_block(&[99u8; 16], false);
        decode_blocks(&block, TextureFormat::AlphaRgtc1, &mut dest, Accel::Scalar).unwrap();
        // CoCgAY8 keeps alpha in channel 2.
        assert!(data.chunks_exact(4).all(|px| px == [0, 0, 99, 0]));
    }
}
