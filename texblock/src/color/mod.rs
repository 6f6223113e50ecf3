//! Color-space conversion.
//!
//! Every conversion the engine performs, RGB↔YCoCg or a plain RGBA↔BGRA
//! swizzle, is an exact integer [`ColorMatrix`] applied per pixel.
//! [`ColorTransform`] picks the right matrix for a pair of [`PixelFormat`]s
//! and runs it over whole surfaces.
//!
//! ```text
//! Rgba8 / Bgra8 ──(divisor 4)──► CoCgAY8 / YCoCgA8
//!       ▲                                │
//!       └─────(pre-bias −128, divisor 1)─┘
//! ```

mod matrix;
mod pixel;

pub use matrix::ColorMatrix;
pub use pixel::{ColorSpace, PixelFormat};

use crate::error::CodecError;
use crate::surface::{Surface, SurfaceMut};

/// A resolved conversion between two pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTransform {
    /// Source and destination layouts are identical.
    Identity,
    /// Any other pair, expressed as a matrix.
    Matrix(ColorMatrix),
}

impl ColorTransform {
    /// Resolves the conversion from `from` to `to`.
    pub fn between(from: PixelFormat, to: PixelFormat) -> Self {
        if from == to {
            return ColorTransform::Identity;
        }

        let matrix = match (from.color_space(), to.color_space()) {
            (ColorSpace::Rgb, ColorSpace::Rgb) | (ColorSpace::YCoCg, ColorSpace::YCoCg) => {
                ColorMatrix::permutation(from, to)
            }
            (ColorSpace::Rgb, ColorSpace::YCoCg) => {
                ColorMatrix::rgba_to_cocg_ay().reordered(from, to)
            }
            (ColorSpace::YCoCg, ColorSpace::Rgb) => {
                ColorMatrix::cocg_ay_to_rgba().reordered(from, to)
            }
        };
        ColorTransform::Matrix(matrix)
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, ColorTransform::Identity)
    }

    /// Converts one pixel.
    pub fn apply(&self, px: [u8; 4]) -> [u8; 4] {
        match self {
            ColorTransform::Identity => px,
            ColorTransform::Matrix(m) => m.apply(px),
        }
    }

    /// Converts `src` into `dst`. Both surfaces must have equal dimensions.
    pub fn convert(&self, src: &Surface<'_>, dst: &mut SurfaceMut<'_>) -> Result<(), CodecError> {
        if src.width() != dst.width() || src.height() != dst.height() {
            return Err(CodecError::internal(format!(
                "color conversion size mismatch: {}×{} into {}×{}",
                src.width(),
                src.height(),
                dst.width(),
                dst.height()
            )));
        }

        let width = src.width() as usize;
        for y in 0..src.height() {
            let src_row = src.row(y);
            let dst_row = dst.row_mut(y);
            match self {
                ColorTransform::Identity => dst_row.copy_from_slice(src_row),
                ColorTransform::Matrix(m) => m.apply_row(src_row, dst_row, width),
            }
        }
        Ok(())
    }

    /// Converts a surface in place, retagging it with `to`.
    pub fn convert_in_place(&self, surface: &mut SurfaceMut<'_>, to: PixelFormat) {
        if let ColorTransform::Matrix(m) = self {
            let width = surface.width() as usize;
            for y in 0..surface.height() {
                m.apply_row_in_place(surface.row_mut(y), width);
            }
        }
        surface.set_format(to);
    }
}
