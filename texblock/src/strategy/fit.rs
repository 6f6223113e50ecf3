//! Endpoint fitting for 4-color DXT color blocks.
//!
//! The range fit projects the block onto its principal axis and takes the
//! extremes as endpoints. The cluster fit then alternates between assigning
//! each texel to the nearest palette entry and solving the least-squares
//! problem for the two endpoints given that assignment.
//!
//! Output blocks always use the 4-color interpretation (`color0 > color1`),
//! which both DXT1 and DXT5 decoders agree on.

use crate::block::{color565, PixelBlock};
use crate::strategy::Quality;

/// Blend weight toward `color1` for each palette index.
const INDEX_WEIGHTS: [f32; 4] = [0.0, 1.0, 1.0 / 3.0, 2.0 / 3.0];

#[derive(Debug, Clone, Copy)]
struct Candidate {
    color0: u16,
    color1: u16,
    indices: [u8; 16],
    error: u32,
}

fn rgb(block: &PixelBlock) -> [[f32; 3]; 16] {
    let mut out = [[0.0f32; 3]; 16];
    for (i, px) in block.chunks_exact(4).enumerate() {
        out[i] = [px[0] as f32, px[1] as f32, px[2] as f32];
    }
    out
}

/// Picks the nearest palette entry for every texel.
fn assign(block: &PixelBlock, color0: u16, color1: u16) -> Candidate {
    let palette = color565::palette(color0, color1, true);
    let mut indices = [0u8; 16];
    let mut error = 0u32;

    for (i, px) in block.chunks_exact(4).enumerate() {
        let mut best = 0usize;
        let mut best_err = u32::MAX;
        for (j, entry) in palette.iter().enumerate() {
            let err: u32 = (0..3)
                .map(|c| {
                    let d = px[c] as i32 - entry[c] as i32;
                    (d * d) as u32
                })
                .sum();
            if err < best_err {
                best_err = err;
                best = j;
            }
        }
        indices[i] = best as u8;
        error += best_err;
    }

    Candidate {
        color0,
        color1,
        indices,
        error,
    }
}

/// Dominant direction of the block's color distribution.
fn principal_axis(points: &[[f32; 3]; 16], mean: [f32; 3]) -> [f32; 3] {
    let mut cov = [[0.0f32; 3]; 3];
    for p in points {
        let d = [p[0] - mean[0], p[1] - mean[1], p[2] - mean[2]];
        for r in 0..3 {
            for c in 0..3 {
                cov[r][c] += d[r] * d[c];
            }
        }
    }

    let mut axis = [1.0f32, 1.0, 1.0];
    for _ in 0..8 {
        let next = [
            cov[0][0] * axis[0] + cov[0][1] * axis[1] + cov[0][2] * axis[2],
            cov[1][0] * axis[0] + cov[1][1] * axis[1] + cov[1][2] * axis[2],
            cov[2][0] * axis[0] + cov[2][1] * axis[1] + cov[2][2] * axis[2],
        ];
        let norm = next.iter().map(|v| v.abs()).fold(0.0f32, f32::max);
        if norm < 1e-6 {
            break;
        }
        axis = [next[0] / norm, next[1] / norm, next[2] / norm];
    }
    axis
}

fn range_fit(block: &PixelBlock, points: &[[f32; 3]; 16]) -> Candidate {
    let mut mean = [0.0f32; 3];
    for p in points {
        for c in 0..3 {
            mean[c] += p[c] / 16.0;
        }
    }

    let axis = principal_axis(points, mean);
    let project = |p: &[f32; 3]| (p[0] - mean[0]) * axis[0] + (p[1] - mean[1]) * axis[1] + (p[2] - mean[2]) * axis[2];

    let mut lo = points[0];
    let mut hi = points[0];
    let mut lo_t = project(&points[0]);
    let mut hi_t = lo_t;
    for p in points.iter().skip(1) {
        let t = project(p);
        if t < lo_t {
            lo_t = t;
            lo = *p;
        }
        if t > hi_t {
            hi_t = t;
            hi = *p;
        }
    }

    assign(block, color565::quantize_565(hi), color565::quantize_565(lo))
}

/// Solves for the endpoints that best explain the current assignment.
fn least_squares(points: &[[f32; 3]; 16], indices: &[u8; 16]) -> Option<([f32; 3], [f32; 3])> {
    let (mut aa, mut bb, mut ab) = (0.0f32, 0.0f32, 0.0f32);
    let mut ax = [0.0f32; 3];
    let mut bx = [0.0f32; 3];

    for (p, &idx) in points.iter().zip(indices.iter()) {
        let beta = INDEX_WEIGHTS[idx as usize];
        let alpha = 1.0 - beta;
        aa += alpha * alpha;
        bb += beta * beta;
        ab += alpha * beta;
        for c in 0..3 {
            ax[c] += alpha * p[c];
            bx[c] += beta * p[c];
        }
    }

    let det = aa * bb - ab * ab;
    if det.abs() < 1e-6 {
        return None;
    }

    let mut a = [0.0f32; 3];
    let mut b = [0.0f32; 3];
    for c in 0..3 {
        a[c] = (ax[c] * bb - bx[c] * ab) / det;
        b[c] = (bx[c] * aa - ax[c] * ab) / det;
    }
    Some((a, b))
}

fn cluster_fit(block: &PixelBlock, points: &[[f32; 3]; 16], start: Candidate, passes: usize) -> Candidate {
    let mut best = start;
    let mut current = start;

    for _ in 0..passes {
        if best.error == 0 {
            break;
        }
        let Some((a, b)) = least_squares(points, &current.indices) else {
            break;
        };
        let next = assign(block, color565::quantize_565(a), color565::quantize_565(b));
        let improved = next.error < best.error;
        if improved {
            best = next;
        }
        if next.indices == current.indices {
            break;
        }
        current = next;
        if !improved && passes > 2 {
            break;
        }
    }
    best
}

/// Forces 4-color ordering and packs the block.
fn finish(candidate: Candidate) -> [u8; 8] {
    let Candidate {
        mut color0,
        mut color1,
        mut indices,
        ..
    } = candidate;

    if color0 < color1 {
        std::mem::swap(&mut color0, &mut color1);
        for idx in indices.iter_mut() {
            *idx ^= 1;
        }
    } else if color0 == color1 {
        indices = [0u8; 16];
    }

    let mut packed = 0u32;
    for (i, &idx) in indices.iter().enumerate() {
        packed |= (idx as u32) << (2 * i);
    }

    let mut out = [0u8; 8];
    color565::write_color_block(color0, color1, packed, &mut out);
    out
}

/// Encodes the RGB channels of an RGBA block into an 8-byte color block.
pub(crate) fn fit_color_block(block: &PixelBlock, quality: Quality) -> [u8; 8] {
    let points = rgb(block);

    let first = points[0];
    if points.iter().all(|p| *p == first) {
        let c = color565::quantize_565(first);
        return finish(assign(block, c, c));
    }

    let range = range_fit(block, &points);
    let best = cluster_fit(block, &points, range, quality.refine_passes());
    finish(best)
}
