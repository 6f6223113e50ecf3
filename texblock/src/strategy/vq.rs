//! Software vector-quantization strategy.

use tracing::trace;

use super::fit::fit_color_block;
use super::{decode_blocks, encode_blocks, ensure_encode_args, ensure_supported};
use super::{DxtStrategy, Quality, StrategyKind};
use crate::block::{alpha, channel, Accel};
use crate::color::PixelFormat;
use crate::error::{CodecError, CodecResult};
use crate::surface::{Surface, SurfaceMut};
use crate::texture::TextureFormat;

/// Per-block endpoint fitting for DXT1, DXT5 and RGTC1.
///
/// Every block is independent, so frames can be sliced freely.
///
/// # Example
///
/// ```
/// use texblock::color::PixelFormat;
/// use texblock::strategy::{DxtStrategy, Quality, VqStrategy};
/// use texblock::surface::Surface;
/// use texblock::texture::TextureFormat;
///
/// let strategy = VqStrategy::new(Quality::Fast);
/// let pixels = vec![255u8; 8 * 8 * 4];
/// let surface = Surface::packed(&pixels, 8, 8, PixelFormat::Rgba8).unwrap();
/// let mut out = vec![0u8; TextureFormat::RgbDxt1.encoded_size(8, 8)];
/// strategy.encode(&surface, TextureFormat::RgbDxt1, &mut out).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct VqStrategy {
    quality: Quality,
    accel: Accel,
}

impl VqStrategy {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            accel: Accel::detect(),
        }
    }

    /// Overrides the block-routine instruction set.
    pub fn with_accel(mut self, accel: Accel) -> Self {
        self.accel = accel;
        self
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

impl Default for VqStrategy {
    fn default() -> Self {
        Self::new(Quality::default())
    }
}

impl DxtStrategy for VqStrategy {
    fn name(&self) -> &str {
        "vector-quantization"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::VectorQuantization
    }

    fn supports(&self, target: TextureFormat) -> bool {
        matches!(
            target,
            TextureFormat::RgbDxt1 | TextureFormat::RgbaDxt5 | TextureFormat::AlphaRgtc1
        )
    }

    fn input_format(&self, _target: TextureFormat) -> PixelFormat {
        PixelFormat::Rgba8
    }

    fn accepts(&self, target: TextureFormat, format: PixelFormat) -> bool {
        // Single-channel blocks read the alpha channel of any layout.
        target.is_single_channel() || format == PixelFormat::Rgba8
    }

    fn is_sliceable(&self) -> bool {
        true
    }

    fn encode(&self, source: &Surface<'_>, target: TextureFormat, out: &mut [u8]) -> CodecResult<()> {
        ensure_encode_args(self, source, target, out)?;
        trace!(
            width = source.width(),
            height = source.height(),
            format = %target,
            quality = %self.quality,
            "VQ encode"
        );

        let quality = self.quality;
        let exhaustive_alpha = quality == Quality::High;
        let alpha_index = source.format().alpha_index();

        match target {
            TextureFormat::RgbDxt1 => {
                encode_blocks(source, target, out, self.accel, |block, dst| {
                    dst.copy_from_slice(&fit_color_block(block, quality));
                });
            }
            TextureFormat::RgbaDxt5 => {
                encode_blocks(source, target, out, self.accel, |block, dst| {
                    let a = channel(block, alpha_index);
                    dst[0..8].copy_from_slice(&alpha::encode_block(&a, exhaustive_alpha));
                    dst[8..16].copy_from_slice(&fit_color_block(block, quality));
                });
            }
            TextureFormat::AlphaRgtc1 => {
                encode_blocks(source, target, out, self.accel, |block, dst| {
                    let a = channel(block, alpha_index);
                    dst.copy_from_slice(&alpha::encode_block(&a, exhaustive_alpha));
                });
            }
            TextureFormat::YCoCgDxt5 => {
                return Err(CodecError::unsupported("YCoCg_DXT5 needs the YCoCg strategy"));
            }
        }
        Ok(())
    }

    fn decode(&self, blocks: &[u8], target: TextureFormat, dest: &mut SurfaceMut<'_>) -> CodecResult<()> {
        ensure_supported(self, target)?;
        decode_blocks(blocks, target, dest, self.accel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    (x * 4) as u8,
                    (y * 4) as u8,
                    128,
                    ((x + y) * 8).min(255) as u8,
                ]);
            }
        }
        data
    }

    fn max_error(a: &[u8], b: &[u8], channels: std::ops::Range<usize>) -> i32 {
        a.chunks_exact(4)
            .zip(b.chunks_exact(4))
            .flat_map(|(x, y)| channels.clone().map(move |c| (x[c] as i32 - y[c] as i32).abs()))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_dxt5_roundtrip_within_tolerance() {
        let (w, h) = (13, 9);
        let src = image(w, h);
        let strategy = VqStrategy::new(Quality::Normal);
        let surface = Surface::packed(&src, w, h, PixelFormat::Rgba8).unwrap();
        let mut blocks = vec![0u8; TextureFormat::RgbaDxt5.encoded_size(w, h)];
        strategy.encode(&surface, TextureFormat::RgbaDxt5, &mut blocks).unwrap();

        let mut out = vec![0u8; src.len()];
        let mut dest = SurfaceMut::packed(&mut out, w, h, PixelFormat::Rgba8).unwrap();
        strategy.decode(&blocks, TextureFormat::RgbaDxt5, &mut dest).unwrap();

        assert!(max_error(&src, &out, 0..3) <= 40);
        assert!(max_error(&src, &out, 3..4) <= 8);
    }

    #[test]
    fn test_dxt1_decodes_opaque() {
        let (w, h) = (8, 8);
        let src = image(w, h);
        let strategy = VqStrategy::new(Quality::Fast);
        let surface = Surface::packed(&src, w, h, PixelFormat::Rgba8).unwrap();
        let mut blocks = vec![0u8; TextureFormat::RgbDxt1.encoded_size(w, h)];
        strategy.encode(&surface, TextureFormat::RgbDxt1, &mut blocks).unwrap();

        let mut out = vec![0u8; src.len()];
        let mut dest = SurfaceMut::packed(&mut out, w, h, PixelFormat::Rgba8).unwrap();
        strategy.decode(&blocks, TextureFormat::RgbDxt1, &mut dest).unwrap();
        assert!(out.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_alpha_plane_reads_alpha_of_any_layout() {
        let mut src = vec![0u8; 4 * 4 * 4];
        for px in src.chunks_exact_mut(4) {
            px[2] = 150; // alpha slot of CoCgAY8
        }
        let strategy = VqStrategy::default();
        let surface = Surface::packed(&src, 4, 4, PixelFormat::CoCgAY8).unwrap();
        let mut blocks = [0u8; 8];
        strategy.encode(&surface, TextureFormat::AlphaRgtc1, &mut blocks).unwrap();
        assert_eq!(&blocks[..2], &[150, 150]);
    }

    #[test]
    fn test_rejects_ycocg_target() {
        let src = vec![0u8; 64];
        let surface = Surface::packed(&src, 4, 4, PixelFormat::Rgba8).unwrap();
        let mut out = [0u8; 16];
        let err = VqStrategy::default().encode(&surface, TextureFormat::YCoCgDxt5, &mut out);
        assert!(matches!(err, Err(CodecError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_rejects_bgra_color_input() {
        let src = vec![0u8; 64];
        let surface = Surface::packed(&src, 4, 4, PixelFormat::Bgra8).unwrap();
        let mut out = [0u8; 8];
        let err = VqStrategy::default().encode(&surface, TextureFormat::RgbDxt1, &mut out);
        assert!(matches!(err, Err(CodecError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_rejects_short_output() {
        let src = vec![0u8; 8 * 4 * 4];
        let surface = Surface::packed(&src, 8, 4, PixelFormat::Rgba8).unwrap();
        let mut out = [0u8; 8];
        let err = VqStrategy::default().encode(&surface, TextureFormat::RgbDxt1, &mut out);
        assert!(matches!(err, Err(CodecError::Internal(_))));
    }
}
