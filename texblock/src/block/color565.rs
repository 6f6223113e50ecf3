//! RGB 5:6:5 endpoints and DXT1/DXT5 color blocks.
//!
//! An 8-byte color block is two little-endian 565 endpoints followed by
//! sixteen 2-bit palette indices, texel 0 in the lowest bits.

use super::{PixelBlock, BLOCK_BYTES};

/// Packs an RGB triple into 565 by truncating the low bits.
#[inline]
pub fn pack_565(rgb: [u8; 3]) -> u16 {
    ((rgb[0] as u16 >> 3) << 11) | ((rgb[1] as u16 >> 2) << 5) | (rgb[2] as u16 >> 3)
}

/// Expands a 565 color to 8 bits per channel by replicating the top bits.
#[inline]
pub fn unpack_565(c: u16) -> [u8; 3] {
    let r5 = ((c >> 11) & 0x1f) as u8;
    let g6 = ((c >> 5) & 0x3f) as u8;
    let b5 = (c & 0x1f) as u8;
    [(r5 << 3) | (r5 >> 2), (g6 << 2) | (g6 >> 4), (b5 << 3) | (b5 >> 2)]
}

/// Rounds an 8-bit channel value to the nearest value representable in
/// 565 after expansion. Used when picking endpoints from float fits.
#[inline]
pub fn quantize_565(rgb: [f32; 3]) -> u16 {
    let q = |v: f32, bits: u32| -> u16 {
        let max = ((1u32 << bits) - 1) as f32;
        (v.clamp(0.0, 255.0) * max / 255.0 + 0.5) as u16
    };
    (q(rgb[0], 5) << 11) | (q(rgb[1], 6) << 5) | q(rgb[2], 5)
}

/// Builds the 4-entry RGB palette for a pair of endpoints.
///
/// With `four_color` set (always for DXT5, and for DXT1 when
/// `color0 > color1`) entries 2 and 3 are the 1/3 and 2/3 blends. Otherwise
/// entry 2 is the midpoint and entry 3 is transparent black.
pub fn palette(color0: u16, color1: u16, four_color: bool) -> [[u8; 4]; 4] {
    let c0 = unpack_565(color0);
    let c1 = unpack_565(color1);
    let mut out = [[0u8; 4]; 4];
    out[0] = [c0[0], c0[1], c0[2], 255];
    out[1] = [c1[0], c1[1], c1[2], 255];

    if four_color || color0 > color1 {
        for c in 0..3 {
            let a = c0[c] as u16;
            let b = c1[c] as u16;
            out[2][c] = ((2 * a + b) / 3) as u8;
            out[3][c] = ((a + 2 * b) / 3) as u8;
        }
        out[2][3] = 255;
        out[3][3] = 255;
    } else {
        for c in 0..3 {
            out[2][c] = ((c0[c] as u16 + c1[c] as u16) / 2) as u8;
        }
        out[2][3] = 255;
        // out[3] stays transparent black
    }
    out
}

/// Assembles an 8-byte color block.
pub fn write_color_block(color0: u16, color1: u16, indices: u32, out: &mut [u8]) {
    out[0..2].copy_from_slice(&color0.to_le_bytes());
    out[2..4].copy_from_slice(&color1.to_le_bytes());
    out[4..8].copy_from_slice(&indices.to_le_bytes());
}

/// Decodes an 8-byte color block into RGBA texels.
///
/// `dxt5` selects the always-four-color rule used inside DXT5 blocks.
/// Alpha comes from the palette (255, or 0 for DXT1 transparent texels).
pub fn decode_color_block(block: &[u8], dxt5: bool) -> PixelBlock {
    let color0 = u16::from_le_bytes([block[0], block[1]]);
    let color1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let palette = palette(color0, color1, dxt5);

    let mut out = [0u8; BLOCK_BYTES];
    for i in 0..16 {
        let idx = ((indices >> (2 * i)) & 0b11) as usize;
        out[i * 4..i * 4 + 4].copy_from_slice(&palette[idx]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_extremes() {
        assert_eq!(pack_565([255, 255, 255]), 0xFFFF);
        assert_eq!(pack_565([0, 0, 0]), 0);
        assert_eq!(unpack_565(0xFFFF), [255, 255, 255]);
        assert_eq!(unpack_565(0), [0, 0, 0]);
    }

    #[test]
    fn test_pack_truncates() {
        // 0x87 >> 3 = 16, 0x87 >> 2 = 33
        assert_eq!(pack_565([0x87, 0x87, 0x87]), (16 << 11) | (33 << 5) | 16);
    }

    #[test]
    fn test_unpack_replicates_high_bits() {
        assert_eq!(unpack_565(16 << 11), [132, 0, 0]);
        assert_eq!(unpack_565(32 << 5), [0, 130, 0]);
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        assert_eq!(quantize_565([255.0, 255.0, 255.0]), 0xFFFF);
        assert_eq!(quantize_565([-5.0, 0.0, 0.0]), 0);
        // 132 sits exactly on the 5-bit level 16.
        assert_eq!(quantize_565([132.0, 0.0, 0.0]) >> 11, 16);
    }

    #[test]
    fn test_four_color_palette() {
        let p = palette(pack_565([255, 255, 255]), 0, false);
        assert_eq!(p[2], [170, 170, 170, 255]);
        assert_eq!(p[3], [85, 85, 85, 255]);
    }

    #[test]
    fn test_three_color_palette_for_dxt1() {
        let p = palette(0, pack_565([255, 255, 255]), false);
        assert_eq!(p[2], [127, 127, 127, 255]);
        assert_eq!(p[3], [0, 0, 0, 0]);
    }

    #[test]
    fn test_dxt5_color_is_always_four_color() {
        let p = palette(0, pack_565([255, 255, 255]), true);
        assert_eq!(p[2], [85, 85, 85, 255]);
        assert_eq!(p[3], [170, 170, 170, 255]);
    }

    #[test]
    fn test_decode_color_block_indices() {
        let mut block = [0u8; 8];
        // index 1 for texel 0, index 3 for texel 15
        write_color_block(0xFFFF, 0x0000, 0b01 | (0b11 << 30), &mut block);
        let px = decode_color_block(&block, false);
        assert_eq!(&px[0..4], &[0, 0, 0, 255]);
        assert_eq!(&px[4..8], &[255, 255, 255, 255]);
        assert_eq!(&px[60..64], &[85, 85, 85, 255]);
    }
}
