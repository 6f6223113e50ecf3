//! Data-parallel frame slicing.
//!
//! A frame is cut into horizontal slices that each cover a whole number of
//! block rows. Every slice is converted and compressed independently on the
//! `rayon` pool, so a 4×4 block never straddles two slices and the output
//! is byte-identical to an unsliced encode.
//!
//! ```text
//!  block rows ┌──────────────┐
//!        0..3 │   slice 0    │──► out[0 .. n)
//!        4..7 │   slice 1    │──► out[n .. 2n)
//!        ...  │     ...      │
//!             └──────────────┘
//! ```

use rayon::prelude::*;
use tracing::trace;

use crate::color::ColorTransform;
use crate::error::{CodecError, CodecResult};
use crate::strategy::DxtStrategy;
use crate::surface::{Surface, SurfaceMut};
use crate::texture::TextureFormat;

/// Upper bound on the number of slices per frame.
pub const MAX_SLICES: u32 = 32;

/// How a frame of a given height is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicePlan {
    block_rows: u32,
    slices: u32,
}

impl SlicePlan {
    /// The largest slice count up to [`MAX_SLICES`] that divides the block
    /// rows of a `height`-pixel frame evenly.
    pub fn for_height(height: u32) -> Self {
        let block_rows = height.div_ceil(4).max(1);
        let mut slices = block_rows.min(MAX_SLICES);
        while block_rows % slices != 0 {
            slices -= 1;
        }
        Self { block_rows, slices }
    }

    /// A plan that processes the frame as one unit.
    pub fn single(height: u32) -> Self {
        Self {
            block_rows: height.div_ceil(4).max(1),
            slices: 1,
        }
    }

    pub fn slices(&self) -> u32 {
        self.slices
    }

    pub fn block_rows(&self) -> u32 {
        self.block_rows
    }

    pub fn block_rows_per_slice(&self) -> u32 {
        self.block_rows / self.slices
    }

    /// Pixel rows per slice; the last slice may hold fewer.
    pub fn rows_per_slice(&self) -> u32 {
        self.block_rows_per_slice() * 4
    }
}

fn plan_for(strategy: &dyn DxtStrategy, height: u32, slicing: bool) -> SlicePlan {
    if slicing && strategy.is_sliceable() {
        SlicePlan::for_height(height)
    } else {
        SlicePlan::single(height)
    }
}

/// Compresses `source` into `out`, slicing when the strategy allows it.
///
/// Sources the strategy cannot ingest directly are first converted into
/// `scratch`, which must hold a packed frame (`width * height * 4` bytes).
/// Returns the number of bytes written.
pub fn encode_frame(
    strategy: &dyn DxtStrategy,
    target: TextureFormat,
    source: &Surface<'_>,
    scratch: &mut [u8],
    out: &mut [u8],
    slicing: bool,
) -> CodecResult<usize> {
    let (width, height) = (source.width(), source.height());
    let size = target.encoded_size(width, height);
    if out.len() < size {
        return Err(CodecError::internal(format!(
            "output holds {} bytes, {}×{} {} needs {}",
            out.len(),
            width,
            height,
            target,
            size
        )));
    }

    let plan = plan_for(strategy, height, slicing);
    let rows = plan.rows_per_slice();
    let slice_bytes = plan.block_rows_per_slice() as usize * target.block_row_bytes(width);

    let wanted = strategy.input_format(target);
    let transform = if strategy.accepts(target, source.format()) {
        None
    } else {
        Some(ColorTransform::between(source.format(), wanted))
    };

    trace!(
        width,
        height,
        slices = plan.slices(),
        convert = transform.is_some(),
        "Encoding frame"
    );

    let outputs = out[..size].chunks_mut(slice_bytes);
    match transform {
        None => {
            let jobs: Vec<(Surface<'_>, &mut [u8])> = (0..plan.slices())
                .map(|i| source.rows(i * rows, rows))
                .zip(outputs)
                .collect();
            jobs.into_par_iter()
                .try_for_each(|(band, dst)| strategy.encode(&band, target, dst))?;
        }
        Some(transform) => {
            let packed = width as usize * height as usize * 4;
            if scratch.len() < packed {
                return Err(CodecError::internal(format!(
                    "conversion buffer holds {} bytes, {}×{} needs {}",
                    scratch.len(),
                    width,
                    height,
                    packed
                )));
            }
            let converted = SurfaceMut::packed(&mut scratch[..packed], width, height, wanted)?;
            let jobs: Vec<((Surface<'_>, SurfaceMut<'_>), &mut [u8])> = (0..plan.slices())
                .map(|i| source.rows(i * rows, rows))
                .zip(converted.split_rows(rows))
                .zip(outputs)
                .collect();
            jobs.into_par_iter().try_for_each(|((band, mut scratch_band), dst)| {
                transform.convert(&band, &mut scratch_band)?;
                strategy.encode(&scratch_band.as_surface(), target, dst)
            })?;
        }
    }
    Ok(size)
}

/// Decompresses `blocks` into `dest`, converting to the destination's pixel
/// format after each slice is decoded.
///
/// Single-channel targets only write the alpha channel of `dest`.
pub fn decode_frame(
    strategy: &dyn DxtStrategy,
    target: TextureFormat,
    blocks: &[u8],
    dest: SurfaceMut<'_>,
    slicing: bool,
) -> CodecResult<()> {
    let (width, height) = (dest.width(), dest.height());
    let size = target.encoded_size(width, height);
    if blocks.len() < size {
        return Err(CodecError::bad_frame(format!(
            "{} plane holds {} bytes, {}×{} needs {}",
            target,
            blocks.len(),
            width,
            height,
            size
        )));
    }

    let plan = plan_for(strategy, height, slicing);
    let slice_bytes = plan.block_rows_per_slice() as usize * target.block_row_bytes(width);
    let desired = dest.format();
    let native = if target.is_single_channel() {
        desired
    } else {
        strategy.input_format(target)
    };
    let transform = ColorTransform::between(native, desired);

    let jobs: Vec<(SurfaceMut<'_>, &[u8])> = dest
        .split_rows(plan.rows_per_slice())
        .into_iter()
        .zip(blocks[..size].chunks(slice_bytes))
        .collect();

    jobs.into_par_iter().try_for_each(|(mut band, src)| {
        band.set_format(native);
        strategy.decode(src, target, &mut band)?;
        transform.convert_in_place(&mut band, desired);
        Ok::<(), CodecError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PixelFormat;
    use crate::strategy::{Quality, VqStrategy, YCoCgStrategy};
    use proptest::prelude::*;

    fn image(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 5 + y) as u8, (y * 3) as u8, ((x ^ y) * 4) as u8, 200]);
            }
        }
        data
    }

    fn encode(strategy: &dyn DxtStrategy, target: TextureFormat, format: PixelFormat, w: u32, h: u32, slicing: bool) -> Vec<u8> {
        let data = image(w, h);
        let source = Surface::packed(&data, w, h, format).unwrap();
        let mut scratch = vec![0u8; (w * h * 4) as usize];
        let mut out = vec![0u8; target.encoded_size(w, h)];
        let written = encode_frame(strategy, target, &source, &mut scratch, &mut out, slicing).unwrap();
        assert_eq!(written, out.len());
        out
    }

    #[test]
    fn test_plan_examples() {
        assert_eq!(SlicePlan::for_height(18).slices(), 5);
        assert_eq!(SlicePlan::for_height(720).slices(), 30);
        assert_eq!(SlicePlan::for_height(1080).slices(), 30);
        assert_eq!(SlicePlan::for_height(4 * 37).slices(), 1);
        assert_eq!(SlicePlan::for_height(3).slices(), 1);
        assert_eq!(SlicePlan::single(1080).slices(), 1);
    }

    proptest! {
        #[test]
        fn prop_plan_divides_block_rows(height in 1u32..5000) {
            let plan = SlicePlan::for_height(height);
            prop_assert!(plan.slices() >= 1);
            prop_assert!(plan.slices() <= MAX_SLICES);
            prop_assert_eq!(plan.block_rows() % plan.slices(), 0);
            prop_assert!(plan.rows_per_slice() % 4 == 0);
            prop_assert!(plan.rows_per_slice() * plan.slices() >= height);
        }
    }

    #[test]
    fn test_sliced_equals_unsliced_vq() {
        let strategy = VqStrategy::new(Quality::Normal);
        for (w, h) in [(37, 41), (64, 64), (5, 130)] {
            for target in [TextureFormat::RgbDxt1, TextureFormat::RgbaDxt5, TextureFormat::AlphaRgtc1] {
                let sliced = encode(&strategy, target, PixelFormat::Rgba8, w, h, true);
                let whole = encode(&strategy, target, PixelFormat::Rgba8, w, h, false);
                assert_eq!(sliced, whole, "{target} {w}×{h}");
            }
        }
    }

    #[test]
    fn test_sliced_equals_unsliced_ycocg_with_conversion() {
        let strategy = YCoCgStrategy::new();
        let sliced = encode(&strategy, TextureFormat::YCoCgDxt5, PixelFormat::Bgra8, 50, 70, true);
        let whole = encode(&strategy, TextureFormat::YCoCgDxt5, PixelFormat::Bgra8, 50, 70, false);
        assert_eq!(sliced, whole);
    }

    #[test]
    fn test_bgra_source_is_converted_for_vq() {
        let (w, h) = (8, 8);
        let rgba = image(w, h);
        let mut bgra = rgba.clone();
        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
        }

        let strategy = VqStrategy::new(Quality::Fast);
        let mut out_rgba = vec![0u8; TextureFormat::RgbDxt1.encoded_size(w, h)];
        let mut out_bgra = out_rgba.clone();
        let mut scratch = vec![0u8; rgba.len()];
        let src = Surface::packed(&rgba, w, h, PixelFormat::Rgba8).unwrap();
        encode_frame(&strategy, TextureFormat::RgbDxt1, &src, &mut scratch, &mut out_rgba, true).unwrap();
        let src = Surface::packed(&bgra, w, h, PixelFormat::Bgra8).unwrap();
        encode_frame(&strategy, TextureFormat::RgbDxt1, &src, &mut scratch, &mut out_bgra, true).unwrap();
        assert_eq!(out_rgba, out_bgra);
    }

    #[test]
    fn test_short_scratch_is_rejected() {
        let data = image(8, 8);
        let src = Surface::packed(&data, 8, 8, PixelFormat::Rgba8).unwrap();
        let mut out = vec![0u8; TextureFormat::YCoCgDxt5.encoded_size(8, 8)];
        let err = encode_frame(&YCoCgStrategy::new(), TextureFormat::YCoCgDxt5, &src, &mut [], &mut out, true);
        assert!(matches!(err, Err(CodecError::Internal(_))));
    }

    #[test]
    fn test_decode_sliced_matches_unsliced_and_converts() {
        let (w, h) = (18, 18);
        let strategy = YCoCgStrategy::new();
        let blocks = encode(&strategy, TextureFormat::YCoCgDxt5, PixelFormat::Rgba8, w, h, true);

        let mut a = vec![0u8; (w * h * 4) as usize];
        let mut b = a.clone();
        let dest = SurfaceMut::packed(&mut a, w, h, PixelFormat::Bgra8).unwrap();
        decode_frame(&strategy, TextureFormat::YCoCgDxt5, &blocks, dest, true).unwrap();
        let dest = SurfaceMut::packed(&mut b, w, h, PixelFormat::Bgra8).unwrap();
        decode_frame(&strategy, TextureFormat::YCoCgDxt5, &blocks, dest, false).unwrap();
        assert_eq!(a, b);
        assert!(a.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_decode_rejects_short_plane() {
        let mut data = vec![0u8; 8 * 8 * 4];
        let dest = SurfaceMut::packed(&mut data, 8, 8, PixelFormat::Rgba8).unwrap();
        let err = decode_frame(&VqStrategy::default(), TextureFormat::RgbaDxt5, &[0u8; 10], dest, true);
        assert!(matches!(err, Err(CodecError::BadFrame(_))));
    }
}
