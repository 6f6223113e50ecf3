//! YCoCg-DXT5 block codec.
//!
//! Input texels are `CoCgAY8`: Co and Cg go through the DXT5 color block,
//! luma rides in the DXT5 alpha block where it gets eight interpolation
//! levels. Chroma is scaled up by 1, 2 or 4 when the block is close to
//! neutral gray, and the scale is stored in the blue bits of both color
//! endpoints.
//!
//! ```text
//! bytes 0..2    luma endpoints (max, min)
//! bytes 2..8    sixteen 3-bit luma indices
//! bytes 8..12   565 chroma endpoints (max, min), blue = scale - 1
//! bytes 12..16  sixteen 2-bit chroma indices
//! ```
//!
//! The encoder is bit-exact with the reference real-time YCoCg-DXT5
//! compressor, including its diagonal-swap suppression when both Co
//! endpoints are equal.

use super::{alpha, color565, min_max, Accel, PixelBlock, BLOCK_BYTES};

const INSET_COLOR_SHIFT: i32 = 4;
const INSET_ALPHA_SHIFT: i32 = 5;

const C565_5_MASK: u8 = 0xF8;
const C565_6_MASK: u8 = 0xFC;

/// Bytes in one encoded block.
pub const ENCODED_BYTES: usize = 16;

const CO: usize = 0;
const CG: usize = 1;
const SCALE: usize = 2;
const Y: usize = 3;

#[inline]
fn requantize_5(v: u8) -> u8 {
    (v & C565_5_MASK) | (v >> 5)
}

#[inline]
fn requantize_6(v: u8) -> u8 {
    (v & C565_6_MASK) | (v >> 6)
}

/// Scales chroma away from 128 when the block's chroma range allows it.
fn scale_chroma(block: &mut PixelBlock, lo: &mut [u8; 4], hi: &mut [u8; 4]) {
    let m0 = (lo[CO] as i32 - 128).abs();
    let m1 = (lo[CG] as i32 - 128).abs();
    let m2 = (hi[CO] as i32 - 128).abs();
    let m3 = (hi[CG] as i32 - 128).abs();
    let m = m0.max(m1).max(m2).max(m3);

    let mut scale = 1;
    if m <= 63 {
        scale += 1;
    }
    if m <= 31 {
        scale += 2;
    }

    let apply = |v: u8| -> u8 { ((v as i32 - 128) * scale + 128) as u8 };

    lo[CO] = apply(lo[CO]);
    lo[CG] = apply(lo[CG]);
    lo[SCALE] = ((scale - 1) << 3) as u8;
    hi[CO] = apply(hi[CO]);
    hi[CG] = apply(hi[CG]);
    hi[SCALE] = ((scale - 1) << 3) as u8;

    for px in block.chunks_exact_mut(4) {
        px[CO] = apply(px[CO]);
        px[CG] = apply(px[CG]);
    }
}

/// Pulls the bounding box in by 1/16 (chroma) and 1/32 (luma) of its
/// extent, then snaps chroma to 565 precision.
fn inset_bbox(lo: &mut [u8; 4], hi: &mut [u8; 4]) {
    let inset = |lo: u8, hi: u8, shift: i32| -> (u8, u8) {
        let amount = (hi as i32 - lo as i32) - ((1 << (shift - 1)) - 1);
        let mini = (((lo as i32) << shift) + amount) >> shift;
        let maxi = (((hi as i32) << shift) - amount) >> shift;
        (mini.clamp(0, 255) as u8, maxi.clamp(0, 255) as u8)
    };

    let (co_lo, co_hi) = inset(lo[CO], hi[CO], INSET_COLOR_SHIFT);
    let (cg_lo, cg_hi) = inset(lo[CG], hi[CG], INSET_COLOR_SHIFT);
    let (y_lo, y_hi) = inset(lo[Y], hi[Y], INSET_ALPHA_SHIFT);

    lo[CO] = requantize_5(co_lo);
    lo[CG] = requantize_6(cg_lo);
    lo[Y] = y_lo;
    hi[CO] = requantize_5(co_hi);
    hi[CG] = requantize_6(cg_hi);
    hi[Y] = y_hi;
}

/// Flips the Cg endpoints when most texels lie on the other diagonal.
fn select_diagonal(block: &PixelBlock, lo: &mut [u8; 4], hi: &mut [u8; 4]) {
    let mid_co = (lo[CO] as u32 + hi[CO] as u32 + 1) >> 1;
    let mid_cg = (lo[CG] as u32 + hi[CG] as u32 + 1) >> 1;

    let side = block
        .chunks_exact(4)
        .filter(|px| (px[CO] as u32 >= mid_co) ^ (px[CG] as u32 >= mid_cg))
        .count();

    if side > 8 && lo[CO] != hi[CO] {
        std::mem::swap(&mut lo[CG], &mut hi[CG]);
    }
}

#[inline]
fn to_565(c: &[u8; 4]) -> u16 {
    ((c[CO] as u16 >> 3) << 11) | ((c[CG] as u16 >> 2) << 5) | (c[SCALE] as u16 >> 3)
}

fn luma_indices(block: &PixelBlock, lo: u8, hi: u8) -> [u8; 16] {
    let (min, max) = (lo as u32, hi as u32);
    let mid = (max - min) / 14;

    let mut thresholds = [0u32; 7];
    thresholds[0] = min + mid;
    for (k, t) in thresholds.iter_mut().enumerate().skip(1) {
        let k = k as u32;
        *t = ((7 - k) * max + k * min) / 7 + mid;
    }

    let mut indices = [0u8; 16];
    for (i, px) in block.chunks_exact(4).enumerate() {
        let a = px[Y] as u32;
        let below = thresholds.iter().filter(|&&t| a <= t).count() as u8;
        let index = (below + 1) & 7;
        indices[i] = index ^ u8::from(2 > index);
    }
    indices
}

fn chroma_indices(block: &PixelBlock, lo: &[u8; 4], hi: &[u8; 4]) -> u32 {
    let c0 = [requantize_5(hi[CO]) as i32, requantize_6(hi[CG]) as i32];
    let c1 = [requantize_5(lo[CO]) as i32, requantize_6(lo[CG]) as i32];
    let colors = [
        c0,
        c1,
        [(2 * c0[0] + c1[0]) / 3, (2 * c0[1] + c1[1]) / 3],
        [(c0[0] + 2 * c1[0]) / 3, (c0[1] + 2 * c1[1]) / 3],
    ];

    let mut result = 0u32;
    for i in (0..16).rev() {
        let co = block[i * 4 + CO] as i32;
        let cg = block[i * 4 + CG] as i32;
        let d = colors.map(|c| (c[0] - co).abs() + (c[1] - cg).abs());

        let b0 = d[0] > d[3];
        let b1 = d[1] > d[2];
        let b2 = d[0] > d[2];
        let b3 = d[1] > d[3];
        let b4 = d[2] > d[3];

        let x0 = b1 & b2;
        let x1 = b0 & b3;
        let x2 = b0 & b4;

        let idx = u32::from(x2) | (u32::from(x0 | x1) << 1);
        result |= idx << (i << 1);
    }
    result
}

/// Encodes one `CoCgAY8` block.
pub fn encode_block(block: &PixelBlock, accel: Accel) -> [u8; ENCODED_BYTES] {
    let mut texels = *block;
    let (mut lo, mut hi) = min_max(&texels, accel);

    scale_chroma(&mut texels, &mut lo, &mut hi);
    inset_bbox(&mut lo, &mut hi);
    select_diagonal(&texels, &mut lo, &mut hi);

    let mut out = [0u8; ENCODED_BYTES];
    out[0] = hi[Y];
    out[1] = lo[Y];
    out[2..8].copy_from_slice(&alpha::pack_indices(&luma_indices(&texels, lo[Y], hi[Y])));
    color565::write_color_block(
        to_565(&hi),
        to_565(&lo),
        chroma_indices(&texels, &lo, &hi),
        &mut out[8..16],
    );
    out
}

/// Rescales a chroma value back toward 128, rounding to nearest.
#[inline]
fn unscale(v: u8, scale: i32) -> u8 {
    let d = v as i32 - 128;
    let half = scale / 2;
    let d = if d >= 0 { (d + half) / scale } else { (d - half) / scale };
    (d + 128).clamp(0, 255) as u8
}

/// Decodes one block back to `CoCgAY8` with alpha 255.
pub fn decode_block(encoded: &[u8]) -> PixelBlock {
    let luma = alpha::decode_block(&encoded[0..8]);
    let chroma = color565::decode_color_block(&encoded[8..16], true);
    let color0 = u16::from_le_bytes([encoded[8], encoded[9]]);
    let scale = (color0 & 0x1f) as i32 + 1;

    let mut out = [0u8; BLOCK_BYTES];
    for i in 0..16 {
        let px = &mut out[i * 4..i * 4 + 4];
        px[CO] = unscale(chroma[i * 4], scale);
        px[CG] = unscale(chroma[i * 4 + 1], scale);
        px[SCALE] = 255;
        px[Y] = luma[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorTransform, PixelFormat};

    fn cocg_block(rgba: [u8; 4]) -> PixelBlock {
        let px = ColorTransform::between(PixelFormat::Rgba8, PixelFormat::CoCgAY8).apply(rgba);
        let mut block = [0u8; BLOCK_BYTES];
        for texel in block.chunks_exact_mut(4) {
            texel.copy_from_slice(&px);
        }
        block
    }

    fn to_rgba(px: &[u8]) -> [u8; 4] {
        ColorTransform::between(PixelFormat::CoCgAY8, PixelFormat::Rgba8)
            .apply([px[0], px[1], px[2], px[3]])
    }

    #[test]
    fn test_solid_black_vector() {
        let encoded = encode_block(&cocg_block([0, 0, 0, 255]), Accel::Scalar);
        assert_eq!(
            encoded,
            [
                0x00, 0x00, 0x49, 0x92, 0x24, 0x49, 0x92, 0x24, 0x03, 0x84, 0xE3, 0x7B, 0xAA, 0xAA,
                0xAA, 0xAA
            ]
        );
    }

    #[test]
    fn test_solid_black_decodes_exactly() {
        let encoded = encode_block(&cocg_block([0, 0, 0, 255]), Accel::Scalar);
        let decoded = decode_block(&encoded);
        for px in decoded.chunks_exact(4) {
            assert_eq!(to_rgba(px), [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_solid_colors_within_tolerance() {
        for rgba in [
            [255, 255, 255, 255],
            [200, 30, 60, 255],
            [12, 140, 250, 255],
            [128, 128, 128, 255],
            [90, 200, 90, 255],
        ] {
            let decoded = decode_block(&encode_block(&cocg_block(rgba), Accel::Scalar));
            for px in decoded.chunks_exact(4) {
                let out = to_rgba(px);
                for c in 0..3 {
                    let err = (out[c] as i32 - rgba[c] as i32).abs();
                    assert!(err <= 10, "{rgba:?} decoded to {out:?}");
                }
                assert_eq!(out[3], 255);
            }
        }
    }

    #[test]
    fn test_scale_is_stored_in_blue_bits() {
        // Neutral block: maximum scale of 4.
        let encoded = encode_block(&cocg_block([128, 128, 128, 255]), Accel::Scalar);
        let color0 = u16::from_le_bytes([encoded[8], encoded[9]]);
        let color1 = u16::from_le_bytes([encoded[10], encoded[11]]);
        assert_eq!(color0 & 0x1f, 3);
        assert_eq!(color1 & 0x1f, 3);

        // Saturated chroma: scale 1.
        let encoded = encode_block(&cocg_block([255, 0, 0, 255]), Accel::Scalar);
        let color0 = u16::from_le_bytes([encoded[8], encoded[9]]);
        assert_eq!(color0 & 0x1f, 0);
    }

    #[test]
    fn test_diagonal_swap_suppressed_when_co_flat() {
        // Co constant and 12 of 16 texels on the far side of the Cg midpoint.
        let mut block = [0u8; BLOCK_BYTES];
        for (i, px) in block.chunks_exact_mut(4).enumerate() {
            let cg = if i < 12 { 0 } else { 240 };
            px.copy_from_slice(&[128, cg, 255, 100]);
        }
        let mut lo = [128, 0, 0, 100];
        let mut hi = [128, 240, 0, 100];
        select_diagonal(&block, &mut lo, &mut hi);
        assert_eq!(lo[CG], 0);
        assert_eq!(hi[CG], 240);
    }

    #[test]
    fn test_diagonal_swap_on_anti_diagonal() {
        // Co rises while Cg falls: every texel sits on the other diagonal.
        let mut block = [0u8; BLOCK_BYTES];
        for (i, px) in block.chunks_exact_mut(4).enumerate() {
            let t = if i % 2 == 0 { 0u8 } else { 200 };
            px.copy_from_slice(&[t, 200 - t, 255, 100]);
        }
        let mut lo = [0, 0, 0, 100];
        let mut hi = [200, 200, 0, 100];
        select_diagonal(&block, &mut lo, &mut hi);
        assert_eq!(lo[CG], 200);
        assert_eq!(hi[CG], 0);
    }

    #[test]
    fn test_luma_indices_map_extremes() {
        let mut block = [0u8; BLOCK_BYTES];
        for (i, px) in block.chunks_exact_mut(4).enumerate() {
            px[Y] = if i < 8 { 20 } else { 220 };
        }
        let idx = luma_indices(&block, 20, 220);
        assert!(idx[..8].iter().all(|&i| i == 1));
        assert!(idx[8..].iter().all(|&i| i == 0));
    }

    #[test]
    fn test_unscale_rounds_to_nearest() {
        assert_eq!(unscale(128, 4), 128);
        assert_eq!(unscale(134, 4), 130);
        assert_eq!(unscale(122, 4), 126);
        assert_eq!(unscale(200, 1), 200);
    }

    #[test]
    fn test_accel_paths_encode_identically() {
        let mut block = [0u8; BLOCK_BYTES];
        for (i, b) in block.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        assert_eq!(
            encode_block(&block, Accel::Scalar),
            encode_block(&block, Accel::detect())
        );
    }
}
