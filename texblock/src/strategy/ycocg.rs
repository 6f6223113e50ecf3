//! YCoCg-DXT5 strategy.

use tracing::trace;

use super::{decode_blocks, encode_blocks, ensure_encode_args, ensure_supported};
use super::{DxtStrategy, StrategyKind};
use crate::block::{ycocg, Accel};
use crate::color::PixelFormat;
use crate::error::CodecResult;
use crate::surface::{Surface, SurfaceMut};
use crate::texture::TextureFormat;

/// Real-time YCoCg-DXT5 compressor over `CoCgAY8` input.
///
/// Callers convert RGB sources with
/// [`ColorTransform`](crate::color::ColorTransform) first; decoded frames
/// come back as `CoCgAY8` with alpha 255.
#[derive(Debug, Clone)]
pub struct YCoCgStrategy {
    accel: Accel,
}

impl YCoCgStrategy {
    pub fn new() -> Self {
        Self {
            accel: Accel::detect(),
        }
    }

    /// Overrides the block-routine instruction set.
    pub fn with_accel(mut self, accel: Accel) -> Self {
        self.accel = accel;
        self
    }
}

impl Default for YCoCgStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl DxtStrategy for YCoCgStrategy {
    fn name(&self) -> &str {
        "ycocg-dxt5"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::YCoCg
    }

    fn supports(&self, target: TextureFormat) -> bool {
        target == TextureFormat::YCoCgDxt5
    }

    fn input_format(&self, _target: TextureFormat) -> PixelFormat {
        PixelFormat::CoCgAY8
    }

    fn is_sliceable(&self) -> bool {
        true
    }

    fn encode(&self, source: &Surface<'_>, target: TextureFormat, out: &mut [u8]) -> CodecResult<()> {
        ensure_encode_args(self, source, target, out)?;
        trace!(
            width = source.width(),
            height = source.height(),
            accel = self.accel.name(),
            "YCoCg encode"
        );

        let accel = self.accel;
        encode_blocks(source, target, out, accel, |block, dst| {
            dst.copy_from_slice(&ycocg::encode_block(block, accel));
        });
        Ok(())
    }

    fn decode(&self, blocks: &[u8], target: TextureFormat, dest: &mut SurfaceMut<'_>) -> CodecResult<()> {
        ensure_supported(self, target)?;
        decode_blocks(blocks, target, dest, self.accel)
    }
}
