//! 4×4 block primitives shared by every strategy.
//!
//! A block is 16 pixels of 4 bytes each, stored row-major in a `[u8; 64]`.
//! Blocks that hang over the right or bottom edge of a surface are filled by
//! replicating the nearest in-bounds texel, so a partial block never reads a
//! neighbor's pixels.
//!
//! Interior blocks take an SSE2 path when [`Accel::Sse2`] is selected; the
//! scalar path is the reference and both produce identical bytes.

pub mod alpha;
pub mod color565;
#[cfg(target_arch = "x86_64")]
mod simd;
pub mod ycocg;

use crate::surface::{Surface, SurfaceMut};

/// Bytes in one uncompressed 4×4 block.
pub const BLOCK_BYTES: usize = 64;

/// Pixels in one 4×4 block.
pub const BLOCK_PIXELS: usize = 16;

/// An uncompressed 4×4 block.
pub type PixelBlock = [u8; BLOCK_BYTES];

/// Instruction-set selection for block routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accel {
    /// Portable scalar code.
    #[default]
    Scalar,
    /// 128-bit SSE2 loads, stores and byte min/max.
    Sse2,
}

impl Accel {
    /// Picks the best path supported by the running CPU.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("sse2") {
                return Accel::Sse2;
            }
        }
        Accel::Scalar
    }

    /// Returns `self` if `enabled`, otherwise [`Accel::Scalar`].
    pub fn or_scalar(self, enabled: bool) -> Self {
        if enabled {
            self
        } else {
            Accel::Scalar
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Accel::Scalar => "scalar",
            Accel::Sse2 => "sse2",
        }
    }
}

#[inline]
fn is_interior(width: u32, height: u32, bx: u32, by: u32) -> bool {
    bx * 4 + 4 <= width && by * 4 + 4 <= height
}

/// Reads block `(bx, by)` from `surface`, replicating edge texels.
pub fn extract_block(surface: &Surface<'_>, bx: u32, by: u32, accel: Accel) -> PixelBlock {
    let mut block = [0u8; BLOCK_BYTES];

    #[cfg(target_arch = "x86_64")]
    if accel == Accel::Sse2 && is_interior(surface.width(), surface.height(), bx, by) {
        simd::extract_interior(surface, bx * 4, by * 4, &mut block);
        return block;
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = accel;

    let max_x = surface.width() - 1;
    let max_y = surface.height() - 1;
    for row in 0..4u32 {
        let y = (by * 4 + row).min(max_y);
        let src = surface.row(y);
        for col in 0..4u32 {
            let x = (bx * 4 + col).min(max_x) as usize;
            let dst = (row * 4 + col) as usize * 4;
            block[dst..dst + 4].copy_from_slice(&src[x * 4..x * 4 + 4]);
        }
    }
    block
}

/// Writes block `(bx, by)` into `surface`, dropping texels past the edges.
pub fn store_block(surface: &mut SurfaceMut<'_>, bx: u32, by: u32, block: &PixelBlock, accel: Accel) {
    #[cfg(target_arch = "x86_64")]
    if accel == Accel::Sse2 && is_interior(surface.width(), surface.height(), bx, by) {
        simd::store_interior(surface, bx * 4, by * 4, block);
        return;
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = accel;

    let x0 = bx * 4;
    let y0 = by * 4;
    let cols = 4.min(surface.width() - x0) as usize;
    let rows = 4.min(surface.height() - y0);
    for row in 0..rows {
        let dst = surface.row_mut(y0 + row);
        let start = x0 as usize * 4;
        let src = row as usize * 16;
        dst[start..start + cols * 4].copy_from_slice(&block[src..src + cols * 4]);
    }
}

/// Writes one channel of block `(bx, by)`, leaving the other channels alone.
pub fn store_channel(surface: &mut SurfaceMut<'_>, bx: u32, by: u32, channel: usize, values: &[u8; 16]) {
    let x0 = bx * 4;
    let y0 = by * 4;
    let cols = 4.min(surface.width() - x0);
    let rows = 4.min(surface.height() - y0);
    for row in 0..rows {
        let dst = surface.row_mut(y0 + row);
        for col in 0..cols {
            dst[(x0 + col) as usize * 4 + channel] = values[(row * 4 + col) as usize];
        }
    }
}

/// One channel of a block.
pub fn channel(block: &PixelBlock, channel: usize) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (i, v) in out.iter_mut().enumerate() {
        *v = block[i * 4 + channel];
    }
    out
}

/// Per-channel minimum and maximum over a block.
pub fn min_max(block: &PixelBlock, accel: Accel) -> ([u8; 4], [u8; 4]) {
    #[cfg(target_arch = "x86_64")]
    if accel == Accel::Sse2 {
        return simd::min_max(block);
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = accel;

    min_max_scalar(block)
}

fn min_max_scalar(block: &PixelBlock) -> ([u8; 4], [u8; 4]) {
    let mut lo = [255u8; 4];
    let mut hi = [0u8; 4];
    for px in block.chunks_exact(4) {
        for c in 0..4 {
            lo[c] = lo[c].min(px[c]);
            hi[c] = hi[c].max(px[c]);
        }
    }
    (lo, hi)
}

/// Pixel `i` of a block as an array.
#[inline]
pub fn texel(block: &PixelBlock, i: usize) -> [u8; 4] {
    [block[i * 4], block[i * 4 + 1], block[i * 4 + 2], block[i * 4 + 3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PixelFormat;
    use rand::{Rng, SeedableRng};

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, (x + y) as u8, 255]);
            }
        }
        data
    }

    #[test]
    fn test_extract_interior_block() {
        let data = gradient(8, 8);
        let surface = Surface::packed(&data, 8, 8, PixelFormat::Rgba8).unwrap();
        let block = extract_block(&surface, 1, 1, Accel::Scalar);
        assert_eq!(texel(&block, 0), [4, 4, 8, 255]);
        assert_eq!(texel(&block, 15), [7, 7, 14, 255]);
    }

    #[test]
    fn test_extract_replicates_edge_texels() {
        let data = gradient(6, 5);
        let surface = Surface::packed(&data, 6, 5, PixelFormat::Rgba8).unwrap();
        let block = extract_block(&surface, 1, 1, Accel::Scalar);
        // Columns 6 and 7 repeat column 5; rows 5..7 repeat row 4.
        assert_eq!(texel(&block, 0), [4, 4, 8, 255]);
        assert_eq!(texel(&block, 1), [5, 4, 9, 255]);
        assert_eq!(texel(&block, 2), [5, 4, 9, 255]);
        assert_eq!(texel(&block, 3), [5, 4, 9, 255]);
        assert_eq!(texel(&block, 15), [5, 4, 9, 255]);
    }

    #[test]
    fn test_store_clips_to_surface() {
        let mut data = vec![0u8; 6 * 5 * 4];
        let mut surface = SurfaceMut::packed(&mut data, 6, 5, PixelFormat::Rgba8).unwrap();
        store_block(&mut surface, 1, 1, &[9u8; BLOCK_BYTES], Accel::Scalar);
        let written = data.iter().filter(|&&b| b == 9).count();
        // 2 columns × 1 row × 4 bytes
        assert_eq!(written, 8);
    }

    #[test]
    fn test_min_max_scalar() {
        let mut block = [100u8; BLOCK_BYTES];
        block[4..8].copy_from_slice(&[0, 200, 50, 255]);
        let (lo, hi) = min_max(&block, Accel::Scalar);
        assert_eq!(lo, [0, 100, 50, 100]);
        assert_eq!(hi, [100, 200, 100, 255]);
    }

    #[test]
    fn test_accel_paths_agree() {
        let accel = Accel::detect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let (w, h) = (13u32, 11u32);
        let data: Vec<u8> = (0..w * h * 4).map(|_| rng.random()).collect();
        let surface = Surface::packed(&data, w, h, PixelFormat::Rgba8).unwrap();

        let mut out_scalar = vec![0u8; data.len()];
        let mut out_accel = vec![0u8; data.len()];
        {
            let mut a = SurfaceMut::packed(&mut out_scalar, w, h, PixelFormat::Rgba8).unwrap();
            let mut b = SurfaceMut::packed(&mut out_accel, w, h, PixelFormat::Rgba8).unwrap();
            for by in 0..surface.blocks_high() {
                for bx in 0..surface.blocks_wide() {
                    let s = extract_block(&surface, bx, by, Accel::Scalar);
                    let v = extract_block(&surface, bx, by, accel);
                    assert_eq!(s, v, "extract mismatch at block ({bx}, {by})");
                    assert_eq!(min_max(&s, Accel::Scalar), min_max(&v, accel));
                    store_block(&mut a, bx, by, &s, Accel::Scalar);
                    store_block(&mut b, bx, by, &v, accel);
                }
            }
        }
        assert_eq!(out_scalar, data);
        assert_eq!(out_accel, data);
    }

    #[test]
    fn test_store_channel_touches_one_channel() {
        let mut data = vec![7u8; 5 * 5 * 4];
        let mut surface = SurfaceMut::packed(&mut data, 5, 5, PixelFormat::Rgba8).unwrap();
        store_channel(&mut surface, 1, 1, 3, &[200u8; 16]);
        // Only pixel (4, 4) lies inside block (1, 1).
        assert_eq!(&data[(4 * 5 + 4) * 4..], &[7, 7, 7, 200]);
        assert_eq!(data.iter().filter(|&&b| b == 200).count(), 1);
    }

    #[test]
    fn test_channel_extracts_plane() {
        let mut block = [0u8; BLOCK_BYTES];
        for (i, px) in block.chunks_exact_mut(4).enumerate() {
            px[2] = i as u8;
        }
        let plane = channel(&block, 2);
        assert_eq!(plane[0], 0);
        assert_eq!(plane[15], 15);
    }

    #[test]
    fn test_or_scalar() {
        assert_eq!(Accel::Sse2.or_scalar(false), Accel::Scalar);
        assert_eq!(Accel::Sse2.or_scalar(true), Accel::Sse2);
    }
}
