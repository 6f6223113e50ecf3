//! Pixel layouts understood by the engine.

use std::fmt;

/// Channel family of a [`PixelFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Red, green, blue, alpha.
    Rgb,
    /// Luma plus orange and green chroma, alpha carried alongside.
    YCoCg,
}

/// An interleaved 8-bit-per-channel pixel layout.
///
/// Every format is four bytes per pixel. The YCoCg formats differ only in
/// which channel carries luma: [`PixelFormat::CoCgAY8`] keeps luma last so
/// the YCoCg-DXT5 block codec can store it in the DXT5 alpha block, while
/// [`PixelFormat::YCoCgA8`] keeps luma first for hosts that supply planar
/// style YCoCg ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// R, G, B, A.
    Rgba8,
    /// B, G, R, A.
    Bgra8,
    /// Co, Cg, A, Y.
    CoCgAY8,
    /// Y, Co, Cg, A.
    YCoCgA8,
}

impl PixelFormat {
    /// Bytes used by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Channel family of this layout.
    pub const fn color_space(self) -> ColorSpace {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => ColorSpace::Rgb,
            PixelFormat::CoCgAY8 | PixelFormat::YCoCgA8 => ColorSpace::YCoCg,
        }
    }

    /// For each storage position, the canonical channel it holds.
    ///
    /// Canonical RGB order is `[R, G, B, A]`; canonical YCoCg order is
    /// `[Co, Cg, A, Y]`.
    pub(crate) const fn canonical_order(self) -> [usize; 4] {
        match self {
            PixelFormat::Rgba8 => [0, 1, 2, 3],
            PixelFormat::Bgra8 => [2, 1, 0, 3],
            PixelFormat::CoCgAY8 => [0, 1, 2, 3],
            PixelFormat::YCoCgA8 => [3, 0, 1, 2],
        }
    }

    /// Storage position of the alpha channel.
    pub const fn alpha_index(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 3,
            PixelFormat::CoCgAY8 => 2,
            PixelFormat::YCoCgA8 => 3,
        }
    }

    /// Short lowercase name used in logs and configuration.
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Bgra8 => "bgra8",
            PixelFormat::CoCgAY8 => "cocgay8",
            PixelFormat::YCoCgA8 => "ycocga8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
