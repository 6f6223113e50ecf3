//! Single-channel 8-byte blocks (DXT5 alpha, RGTC1/BC4).
//!
//! Layout: two endpoint bytes followed by sixteen 3-bit indices packed into
//! a 48-bit little-endian integer, texel 0 in the lowest bits.

/// Builds the 8-entry ramp for a pair of endpoints.
///
/// `a0 > a1` selects eight interpolated values; otherwise six interpolated
/// values plus explicit 0 and 255.
pub fn ramp(a0: u8, a1: u8) -> [u8; 8] {
    let (a, b) = (a0 as u32, a1 as u32);
    let mut out = [0u8; 8];
    out[0] = a0;
    out[1] = a1;
    if a0 > a1 {
        for i in 1..7u32 {
            out[i as usize + 1] = (((7 - i) * a + i * b) / 7) as u8;
        }
    } else {
        for i in 1..5u32 {
            out[i as usize + 1] = (((5 - i) * a + i * b) / 5) as u8;
        }
        out[6] = 0;
        out[7] = 255;
    }
    out
}

/// Packs sixteen 3-bit indices.
pub fn pack_indices(indices: &[u8; 16]) -> [u8; 6] {
    let mut bits = 0u64;
    for (i, &idx) in indices.iter().enumerate() {
        bits |= ((idx & 7) as u64) << (3 * i);
    }
    let bytes = bits.to_le_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
}

/// Unpacks sixteen 3-bit indices.
pub fn unpack_indices(packed: &[u8]) -> [u8; 16] {
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&packed[..6]);
    let bits = u64::from_le_bytes(bytes);
    let mut out = [0u8; 16];
    for (i, idx) in out.iter_mut().enumerate() {
        *idx = ((bits >> (3 * i)) & 7) as u8;
    }
    out
}

fn fit_indices(values: &[u8; 16], ramp: &[u8; 8]) -> ([u8; 16], u32) {
    let mut indices = [0u8; 16];
    let mut error = 0u32;
    for (i, &v) in values.iter().enumerate() {
        let mut best = 0usize;
        let mut best_err = u32::MAX;
        for (j, &r) in ramp.iter().enumerate() {
            let d = (v as i32 - r as i32).unsigned_abs();
            if d < best_err {
                best_err = d;
                best = j;
            }
        }
        indices[i] = best as u8;
        error += best_err * best_err;
    }
    (indices, error)
}

fn emit(a0: u8, a1: u8, indices: &[u8; 16]) -> [u8; 8] {
    let packed = pack_indices(indices);
    let mut out = [0u8; 8];
    out[0] = a0;
    out[1] = a1;
    out[2..8].copy_from_slice(&packed);
    out
}

/// Encodes sixteen values into an 8-byte block.
///
/// The 8-value ramp spans the block's min and max. With `exhaustive` the
/// 6-value ramp is also tried, with endpoints fitted to the values that are
/// neither 0 nor 255, and the lower-error block wins.
pub fn encode_block(values: &[u8; 16], exhaustive: bool) -> [u8; 8] {
    let lo = values.iter().copied().min().unwrap_or(0);
    let hi = values.iter().copied().max().unwrap_or(0);

    if lo == hi {
        return emit(hi, lo, &[0u8; 16]);
    }

    let eight = ramp(hi, lo);
    let (idx8, err8) = fit_indices(values, &eight);
    if !exhaustive || err8 == 0 {
        return emit(hi, lo, &idx8);
    }

    let inner = values.iter().copied().filter(|&v| v != 0 && v != 255);
    let inner_lo = inner.clone().min();
    let inner_hi = inner.max();
    let (a0, a1) = match (inner_lo, inner_hi) {
        (Some(l), Some(h)) => (l, h),
        // Only 0 and 255 present: the 6-value ramp represents both exactly.
        _ => (0, 0),
    };
    let six = ramp(a0, a1);
    let (idx6, err6) = fit_indices(values, &six);

    if err6 < err8 {
        emit(a0, a1, &idx6)
    } else {
        emit(hi, lo, &idx8)
    }
}

/// Decodes an 8-byte block into sixteen values.
pub fn decode_block(block: &[u8]) -> [u8; 16] {
    let ramp = ramp(block[0], block[1]);
    let indices = unpack_indices(&block[2..8]);
    let mut out = [0u8; 16];
    for (v, &idx) in out.iter_mut().zip(indices.iter()) {
        *v = ramp[idx as usize];
    }
    out
}
