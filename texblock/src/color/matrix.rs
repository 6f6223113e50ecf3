//! Integer 4×4 color matrices.
//!
//! A [`ColorMatrix`] converts one 4-channel pixel into another with exact
//! integer arithmetic:
//!
//! ```text
//! out[o] = clamp( (Σ_i (in[i] + pre_bias[i]) * m[o][i]) / divisor + post_bias[o], 0, 255 )
//! ```
//!
//! Division truncates toward zero. The YCoCg matrices use divisor 4 so the
//! forward transform is exact whenever every channel sum is a multiple of 4.

use super::pixel::PixelFormat;

/// Canonical RGBA -> Co, Cg, A, Y.
const FORWARD_COCG_AY: [[i32; 4]; 4] = [
    [2, 0, -2, 0],  // Co
    [-1, 2, -1, 0], // Cg
    [0, 0, 0, 4],   // A
    [1, 2, 1, 0],   // Y
];

/// Canonical Co, Cg, A, Y -> RGBA (after removing the chroma bias).
const INVERSE_COCG_AY: [[i32; 4]; 4] = [
    [1, -1, 0, 1],  // R
    [0, 1, 0, 1],   // G
    [-1, -1, 0, 1], // B
    [0, 0, 1, 0],   // A
];

const IDENTITY: [[i32; 4]; 4] = [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]];

/// An exact integer color transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMatrix {
    /// Coefficients indexed `[output][input]`.
    coefficients: [[i32; 4]; 4],
    divisor: i32,
    pre_bias: [i32; 4],
    post_bias: [i32; 4],
}

impl ColorMatrix {
    /// Builds a matrix from raw parts.
    ///
    /// # Panics
    ///
    /// Panics if `divisor` is not positive.
    pub fn new(
        coefficients: [[i32; 4]; 4],
        divisor: i32,
        pre_bias: [i32; 4],
        post_bias: [i32; 4],
    ) -> Self {
        assert!(divisor > 0, "divisor must be positive");
        Self {
            coefficients,
            divisor,
            pre_bias,
            post_bias,
        }
    }

    /// RGBA -> CoCgAY (luma in the last channel).
    pub fn rgba_to_cocg_ay() -> Self {
        Self::new(FORWARD_COCG_AY, 4, [0; 4], [128, 128, 0, 0])
    }

    /// CoCgAY -> RGBA, the inverse of [`rgba_to_cocg_ay`](Self::rgba_to_cocg_ay).
    pub fn cocg_ay_to_rgba() -> Self {
        Self::new(INVERSE_COCG_AY, 1, [-128, -128, 0, 0], [0; 4])
    }

    /// RGBA -> YCoCgA (luma in the first channel).
    pub fn rgba_to_ycocg_a() -> Self {
        Self::rgba_to_cocg_ay().reordered(PixelFormat::Rgba8, PixelFormat::YCoCgA8)
    }

    /// YCoCgA -> RGBA, the inverse of [`rgba_to_ycocg_a`](Self::rgba_to_ycocg_a).
    pub fn ycocg_a_to_rgba() -> Self {
        Self::cocg_ay_to_rgba().reordered(PixelFormat::YCoCgA8, PixelFormat::Rgba8)
    }

    /// A pure channel permutation between two layouts of the same family.
    pub fn permutation(from: PixelFormat, to: PixelFormat) -> Self {
        Self::new(IDENTITY, 1, [0; 4], [0; 4]).reordered(from, to)
    }

    /// Re-expresses a canonical-space matrix for concrete storage layouts.
    ///
    /// `self` must map canonical channels of `from`'s family to canonical
    /// channels of `to`'s family.
    pub(crate) fn reordered(&self, from: PixelFormat, to: PixelFormat) -> Self {
        let in_order = from.canonical_order();
        let out_order = to.canonical_order();

        let mut coefficients = [[0i32; 4]; 4];
        let mut pre_bias = [0i32; 4];
        let mut post_bias = [0i32; 4];

        for (out_pos, &out_channel) in out_order.iter().enumerate() {
            for (in_pos, &in_channel) in in_order.iter().enumerate() {
                coefficients[out_pos][in_pos] = self.coefficients[out_channel][in_channel];
            }
            post_bias[out_pos] = self.post_bias[out_channel];
        }
        for (in_pos, &in_channel) in in_order.iter().enumerate() {
            pre_bias[in_pos] = self.pre_bias[in_channel];
        }

        Self {
            coefficients,
            divisor: self.divisor,
            pre_bias,
            post_bias,
        }
    }

    /// Converts a single pixel.
    #[inline]
    pub fn apply(&self, px: [u8; 4]) -> [u8; 4] {
        let biased = [
            px[0] as i32 + self.pre_bias[0],
            px[1] as i32 + self.pre_bias[1],
            px[2] as i32 + self.pre_bias[2],
            px[3] as i32 + self.pre_bias[3],
        ];

        let mut out = [0u8; 4];
        for (o, value) in out.iter_mut().enumerate() {
            let row = &self.coefficients[o];
            let sum = biased[0] * row[0] + biased[1] * row[1] + biased[2] * row[2] + biased[3] * row[3];
            *value = (sum / self.divisor + self.post_bias[o]).clamp(0, 255) as u8;
        }
        out
    }

    /// Converts `width` pixels from `src` into `dst`.
    pub fn apply_row(&self, src: &[u8], dst: &mut [u8], width: usize) {
        for (s, d) in src[..width * 4]
            .chunks_exact(4)
            .zip(dst[..width * 4].chunks_exact_mut(4))
        {
            d.copy_from_slice(&self.apply([s[0], s[1], s[2], s[3]]));
        }
    }

    /// Converts `width` pixels in place.
    pub fn apply_row_in_place(&self, row: &mut [u8], width: usize) {
        for px in row[..width * 4].chunks_exact_mut(4) {
            let out = self.apply([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&out);
        }
    }

    /// The divisor applied after the multiply.
    pub fn divisor(&self) -> i32 {
        self.divisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rgba_roundtrip(px: [u8; 4]) -> [u8; 4] {
        let forward = ColorMatrix::rgba_to_cocg_ay();
        let inverse = ColorMatrix::cocg_ay_to_rgba();
        inverse.apply(forward.apply(px))
    }

    #[test]
    fn test_forward_neutral_gray() {
        let out = ColorMatrix::rgba_to_cocg_ay().apply([100, 100, 100, 200]);
        // Co = 0 + 128, Cg = 0 + 128, A passes through, Y = 100
        assert_eq!(out, [128, 128, 200, 100]);
    }

    #[test]
    fn test_forward_primary_red() {
        let out = ColorMatrix::rgba_to_cocg_ay().apply([252, 0, 0, 255]);
        // Co = 504/4 + 128 = 254, Cg = -252/4 + 128 = 65, Y = 252/4 = 63
        assert_eq!(out, [254, 65, 255, 63]);
    }

    #[test]
    fn test_exact_roundtrip_for_multiples_of_four() {
        for r in (0..=252).step_by(12) {
            for g in (0..=252).step_by(12) {
                for b in (0..=252).step_by(12) {
                    let px = [r as u8, g as u8, b as u8, 77];
                    assert_eq!(rgba_roundtrip(px), px, "roundtrip failed for {px:?}");
                }
            }
        }
    }

    #[test]
    fn test_ycocg_a_pair_matches_cocg_ay_pair() {
        let px = [40, 180, 96, 12];
        let a = ColorMatrix::rgba_to_cocg_ay().apply(px);
        let b = ColorMatrix::rgba_to_ycocg_a().apply(px);
        // Same channels, luma moved to the front.
        assert_eq!(b, [a[3], a[0], a[1], a[2]]);
        assert_eq!(ColorMatrix::ycocg_a_to_rgba().apply(b), px);
    }

    #[test]
    fn test_permutation_rgba_to_bgra() {
        let swap = ColorMatrix::permutation(PixelFormat::Rgba8, PixelFormat::Bgra8);
        assert_eq!(swap.apply([1, 2, 3, 4]), [3, 2, 1, 4]);
    }

    #[test]
    fn test_reordered_bgra_input() {
        let from_bgra = ColorMatrix::rgba_to_cocg_ay().reordered(PixelFormat::Bgra8, PixelFormat::CoCgAY8);
        let from_rgba = ColorMatrix::rgba_to_cocg_ay();
        assert_eq!(from_bgra.apply([30, 60, 90, 255]), from_rgba.apply([90, 60, 30, 255]));
    }

    #[test]
    fn test_apply_row() {
        let m = ColorMatrix::rgba_to_cocg_ay();
        let src = [8u8, 8, 8, 255, 16, 16, 16, 255];
        let mut dst = [0u8; 8];
        m.apply_row(&src, &mut dst, 2);
        assert_eq!(dst, [128, 128, 255, 8, 128, 128, 255, 16]);
    }

    #[test]
    #[should_panic(expected = "divisor must be positive")]
    fn test_zero_divisor_panics() {
        let _ = ColorMatrix::new(IDENTITY, 0, [0; 4], [0; 4]);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_exact_when_divisible(r in 0u8..=63, g in 0u8..=63, b in 0u8..=63, a in any::<u8>()) {
            let px = [r * 4, g * 4, b * 4, a];
            prop_assert_eq!(rgba_roundtrip(px), px);
        }

        #[test]
        fn prop_roundtrip_within_two(r in any::<u8>(), g in any::<u8>(), b in any::<u8>(), a in any::<u8>()) {
            let px = [r, g, b, a];
            let out = rgba_roundtrip(px);
            for c in 0..3 {
                prop_assert!((out[c] as i32 - px[c] as i32).abs() <= 2, "{:?} -> {:?}", px, out);
            }
            prop_assert_eq!(out[3], a);
        }
    }
}
