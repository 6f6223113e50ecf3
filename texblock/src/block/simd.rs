//! SSE2 block routines for x86_64.
//!
//! SSE2 is part of the x86_64 baseline, so these never need a runtime
//! fallback on that architecture; [`super::Accel`] still gates them so the
//! scalar path can be forced for comparison.

use std::arch::x86_64::*;

use super::{PixelBlock, BLOCK_BYTES};
use crate::surface::{Surface, SurfaceMut};

/// Copies four 16-byte rows starting at pixel `(x, y)`.
///
/// The caller guarantees the block lies fully inside the surface.
pub(super) fn extract_interior(surface: &Surface<'_>, x: u32, y: u32, out: &mut PixelBlock) {
    let start = x as usize * 4;
    for row in 0..4u32 {
        let src = &surface.row(y + row)[start..start + 16];
        let dst = &mut out[row as usize * 16..row as usize * 16 + 16];
        // SAFETY: both slices are exactly 16 bytes; unaligned load/store.
        unsafe {
            let v = _mm_loadu_si128(src.as_ptr() as *const __m128i);
            _mm_storeu_si128(dst.as_mut_ptr() as *mut __m128i, v);
        }
    }
}

/// Writes four 16-byte rows starting at pixel `(x, y)`.
///
/// The caller guarantees the block lies fully inside the surface.
pub(super) fn store_interior(surface: &mut SurfaceMut<'_>, x: u32, y: u32, block: &PixelBlock) {
    let start = x as usize * 4;
    for row in 0..4u32 {
        let src = &block[row as usize * 16..row as usize * 16 + 16];
        let dst = &mut surface.row_mut(y + row)[start..start + 16];
        // SAFETY: both slices are exactly 16 bytes; unaligned load/store.
        unsafe {
            let v = _mm_loadu_si128(src.as_ptr() as *const __m128i);
            _mm_storeu_si128(dst.as_mut_ptr() as *mut __m128i, v);
        }
    }
}

/// Per-channel min/max with `pminub` / `pmaxub`.
pub(super) fn min_max(block: &PixelBlock) -> ([u8; 4], [u8; 4]) {
    debug_assert_eq!(block.len(), BLOCK_BYTES);
    // SAFETY: the block is 64 bytes, read as four unaligned 16-byte lanes.
    unsafe {
        let p = block.as_ptr() as *const __m128i;
        let r0 = _mm_loadu_si128(p);
        let r1 = _mm_loadu_si128(p.add(1));
        let r2 = _mm_loadu_si128(p.add(2));
        let r3 = _mm_loadu_si128(p.add(3));

        let mut lo = _mm_min_epu8(_mm_min_epu8(r0, r1), _mm_min_epu8(r2, r3));
        let mut hi = _mm_max_epu8(_mm_max_epu8(r0, r1), _mm_max_epu8(r2, r3));

        // Fold the four pixels of each lane down to one.
        lo = _mm_min_epu8(lo, _mm_srli_si128::<8>(lo));
        lo = _mm_min_epu8(lo, _mm_srli_si128::<4>(lo));
        hi = _mm_max_epu8(hi, _mm_srli_si128::<8>(hi));
        hi = _mm_max_epu8(hi, _mm_srli_si128::<4>(hi));

        let lo = _mm_cvtsi128_si32(lo).to_le_bytes();
        let hi = _mm_cvtsi128_si32(hi).to_le_bytes();
        (lo, hi)
    }
}
