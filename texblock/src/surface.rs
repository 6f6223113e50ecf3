//! Borrowed views over interleaved pixel buffers.
//!
//! A [`Surface`] is a read-only window onto host or pooled pixel memory with
//! an explicit row stride. [`SurfaceMut`] is its writable counterpart and can
//! be split into disjoint row bands for data-parallel work.

use crate::color::PixelFormat;
use crate::error::CodecError;

/// Minimum byte length of a buffer holding `height` rows of `width` pixels.
pub fn required_len(width: u32, height: u32, stride: usize) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    stride * (height as usize - 1) + width as usize * 4
}

fn validate(width: u32, height: u32, stride: usize, len: usize) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::internal(format!(
            "invalid surface dimensions {}×{}",
            width, height
        )));
    }
    if stride < width as usize * 4 {
        return Err(CodecError::internal(format!(
            "stride {} is smaller than a {}-pixel row",
            stride, width
        )));
    }
    let needed = required_len(width, height, stride);
    if len < needed {
        return Err(CodecError::internal(format!(
            "surface buffer holds {} bytes, {}×{} with stride {} needs {}",
            len, width, height, stride, needed
        )));
    }
    Ok(())
}

/// Read-only pixel view.
#[derive(Debug, Clone, Copy)]
pub struct Surface<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> Surface<'a> {
    /// Wraps `data` after checking that it can hold the described image.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, CodecError> {
        validate(width, height, stride, data.len())?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    /// Wraps a tightly packed buffer (`stride == width * 4`).
    pub fn packed(
        data: &'a [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, CodecError> {
        Self::new(data, width, height, width as usize * 4, format)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The `width * 4` meaningful bytes of row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * 4]
    }

    /// The four bytes of pixel `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = y as usize * self.stride + x as usize * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// A view of `count` rows starting at `first`, clipped to the surface.
    pub fn rows(&self, first: u32, count: u32) -> Surface<'a> {
        let first = first.min(self.height.saturating_sub(1));
        let count = count.min(self.height - first).max(1);
        let start = first as usize * self.stride;
        let end = start + required_len(self.width, count, self.stride);
        Surface {
            data: &self.data[start..end],
            width: self.width,
            height: count,
            stride: self.stride,
            format: self.format,
        }
    }

    /// Reinterprets the same bytes with another pixel layout.
    pub fn with_format(&self, format: PixelFormat) -> Surface<'a> {
        Surface { format, ..*self }
    }

    /// Number of 4×4 blocks across.
    pub fn blocks_wide(&self) -> u32 {
        self.width.div_ceil(4)
    }

    /// Number of 4×4 blocks down.
    pub fn blocks_high(&self) -> u32 {
        self.height.div_ceil(4)
    }
}

/// Writable pixel view.
#[derive(Debug)]
pub struct SurfaceMut<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> SurfaceMut<'a> {
    /// Wraps `data` after checking that it can hold the described image.
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, CodecError> {
        validate(width, height, stride, data.len())?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    /// Wraps a tightly packed buffer (`stride == width * 4`).
    pub fn packed(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, CodecError> {
        Self::new(data, width, height, width as usize * 4, format)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Mutable access to the `width * 4` meaningful bytes of row `y`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.width as usize * 4;
        &mut self.data[start..start + len]
    }

    /// Read-only view of the same pixels.
    pub fn as_surface(&self) -> Surface<'_> {
        Surface {
            data: &*self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
        }
    }

    /// A shorter-lived handle to the same pixels.
    pub fn reborrow(&mut self) -> SurfaceMut<'_> {
        SurfaceMut {
            data: &mut *self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
        }
    }

    /// Reinterprets the same bytes with another pixel layout.
    pub fn set_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    /// Splits the surface into consecutive bands of `rows_per_band` rows.
    ///
    /// The last band holds whatever rows remain.
    pub fn split_rows(self, rows_per_band: u32) -> Vec<SurfaceMut<'a>> {
        let rows_per_band = rows_per_band.max(1);
        let band_bytes = self.stride * rows_per_band as usize;
        let needed = required_len(self.width, self.height, self.stride);
        let (width, height, stride, format) = (self.width, self.height, self.stride, self.format);
        let data = self.data;

        data[..needed]
            .chunks_mut(band_bytes)
            .enumerate()
            .map(|(i, chunk)| {
                let first = i as u32 * rows_per_band;
                let rows = rows_per_band.min(height - first);
                SurfaceMut {
                    data: chunk,
                    width,
                    height: rows,
                    stride,
                    format,
                }
            })
            .collect()
    }
}
