//! Frames in and tasks in flight.

use bytes::Bytes;

use crate::color::PixelFormat;
use crate::error::{CodecError, CodecResult};
use crate::executor::Sequenced;
use crate::pool::PooledBuffer;
use crate::surface::Surface;

/// One uncompressed frame handed to an encoder session.
///
/// The pixel bytes are shared, so the host can keep its own handle while
/// the frame is in flight.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub sequence: u64,
}

impl SourceFrame {
    /// A tightly packed frame.
    pub fn packed(data: impl Into<Bytes>, width: u32, height: u32, format: PixelFormat, sequence: u64) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width as usize * 4,
            format,
            sequence,
        }
    }

    /// Takes over a decoded image's pixels.
    pub fn from_rgba_image(image: image::RgbaImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::packed(image.into_raw(), width, height, PixelFormat::Rgba8, sequence)
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Validated pixel view.
    pub fn surface(&self) -> CodecResult<Surface<'_>> {
        Surface::new(&self.data, self.width, self.height, self.stride, self.format)
    }
}

/// Where a task ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskStatus {
    Pending,
    Encoded,
    Failed(CodecError),
    /// Rejected at submission after taking a sequence number; emitted as
    /// nothing so later frames are not held back.
    Skipped,
}

/// A frame moving through the encoder.
///
/// Buffers go back to their pools when the task is dropped after emission.
#[derive(Debug)]
pub(crate) struct CompressTask {
    pub sequence: u64,
    pub source: Option<SourceFrame>,
    pub output: Option<PooledBuffer>,
    pub blocks: Option<PooledBuffer>,
    pub convert: Option<PooledBuffer>,
    pub encoded_len: usize,
    pub status: TaskStatus,
}

impl CompressTask {
    pub fn new(source: SourceFrame, output: PooledBuffer, blocks: PooledBuffer, convert: Option<PooledBuffer>) -> Self {
        Self {
            sequence: source.sequence,
            source: Some(source),
            output: Some(output),
            blocks: Some(blocks),
            convert,
            encoded_len: 0,
            status: TaskStatus::Pending,
        }
    }

    pub fn skipped(sequence: u64) -> Self {
        Self {
            sequence,
            source: None,
            output: None,
            blocks: None,
            convert: None,
            encoded_len: 0,
            status: TaskStatus::Skipped,
        }
    }

    /// The encoded frame, if encoding succeeded.
    pub fn payload(&self) -> Option<&[u8]> {
        match (&self.status, &self.output) {
            (TaskStatus::Encoded, Some(out)) => Some(&out[..self.encoded_len]),
            _ => None,
        }
    }
}

impl Sequenced for CompressTask {
    fn sequence(&self) -> u64 {
        self.sequence
    }
}
