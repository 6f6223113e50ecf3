//! Compressed texture formats produced by the engine.
//!
//! Every format stores 4×4 texel blocks in block-row-major order. A frame of
//! `w × h` pixels therefore occupies
//! `ceil(w / 4) * ceil(h / 4) * bytes_per_block` bytes, and dimensions that
//! are not multiples of 4 are padded up to the next block.
//!
//! # Example
//!
//! ```
//! use texblock::texture::TextureFormat;
//!
//! let format = TextureFormat::YCoCgDxt5;
//! assert_eq!(format.bytes_per_block(), 16);
//! // 18×18 pixels are stored as a 5×5 grid of blocks.
//! assert_eq!(format.encoded_size(18, 18), 25 * 16);
//! ```

use std::fmt;

use crate::error::CodecError;

/// A DXT-family block format.
///
/// The discriminant is the 4-bit tag stored in frame plane headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureFormat {
    /// Opaque RGB, 8 bytes per block (DXT1 / BC1).
    RgbDxt1 = 0xB,
    /// RGBA with interpolated alpha, 16 bytes per block (DXT5 / BC3).
    RgbaDxt5 = 0xE,
    /// Chroma in the color block, luma in the alpha block, 16 bytes per block.
    YCoCgDxt5 = 0xF,
    /// Single channel, 8 bytes per block (RGTC1 / BC4).
    AlphaRgtc1 = 0x1,
}

impl TextureFormat {
    /// Every format, in tag order.
    pub const ALL: [TextureFormat; 4] = [
        TextureFormat::AlphaRgtc1,
        TextureFormat::RgbDxt1,
        TextureFormat::RgbaDxt5,
        TextureFormat::YCoCgDxt5,
    ];

    /// Size of one encoded 4×4 block.
    pub const fn bytes_per_block(self) -> usize {
        match self {
            TextureFormat::RgbDxt1 | TextureFormat::AlphaRgtc1 => 8,
            TextureFormat::RgbaDxt5 | TextureFormat::YCoCgDxt5 => 16,
        }
    }

    /// Bytes of one row of blocks for an image `width` pixels wide.
    pub fn block_row_bytes(self, width: u32) -> usize {
        width.div_ceil(4) as usize * self.bytes_per_block()
    }

    /// Encoded size of a `width × height` image.
    pub fn encoded_size(self, width: u32, height: u32) -> usize {
        height.div_ceil(4) as usize * self.block_row_bytes(width)
    }

    /// The plane-header tag.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Looks up a format by plane-header tag.
    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0xB => Ok(TextureFormat::RgbDxt1),
            0xE => Ok(TextureFormat::RgbaDxt5),
            0xF => Ok(TextureFormat::YCoCgDxt5),
            0x1 => Ok(TextureFormat::AlphaRgtc1),
            other => Err(CodecError::bad_frame(format!(
                "unknown texture format tag {:#x}",
                other
            ))),
        }
    }

    /// True for formats that carry a single channel.
    pub const fn is_single_channel(self) -> bool {
        matches!(self, TextureFormat::AlphaRgtc1)
    }

    pub const fn name(self) -> &'static str {
        match self {
            TextureFormat::RgbDxt1 => "RGB_DXT1",
            TextureFormat::RgbaDxt5 => "RGBA_DXT5",
            TextureFormat::YCoCgDxt5 => "YCoCg_DXT5",
            TextureFormat::AlphaRgtc1 => "ALPHA_RGTC1",
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_block() {
        assert_eq!(TextureFormat::RgbDxt1.bytes_per_block(), 8);
        assert_eq!(TextureFormat::RgbaDxt5.bytes_per_block(), 16);
        assert_eq!(TextureFormat::YCoCgDxt5.bytes_per_block(), 16);
        assert_eq!(TextureFormat::AlphaRgtc1.bytes_per_block(), 8);
    }

    #[test]
    fn test_encoded_size_rounds_up() {
        assert_eq!(TextureFormat::RgbDxt1.encoded_size(4, 4), 8);
        assert_eq!(TextureFormat::RgbDxt1.encoded_size(5, 4), 16);
        assert_eq!(TextureFormat::RgbaDxt5.encoded_size(1, 1), 16);
        assert_eq!(TextureFormat::YCoCgDxt5.encoded_size(1920, 1080), 480 * 270 * 16);
    }

    #[test]
    fn test_tags_roundtrip() {
        for format in TextureFormat::ALL {
            assert_eq!(TextureFormat::from_tag(format.tag()).unwrap(), format);
        }
        assert_eq!(TextureFormat::YCoCgDxt5.tag(), 0xF);
    }

    #[test]
    fn test_unknown_tag_is_bad_frame() {
        assert!(matches!(
            TextureFormat::from_tag(0x7),
            Err(CodecError::BadFrame(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(TextureFormat::AlphaRgtc1.to_string(), "ALPHA_RGTC1");
    }
}
