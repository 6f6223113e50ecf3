//! Compressed frame layout.
//!
//! ```text
//! offset 0      u8   plane count (1..=4)
//! per plane     u8   tag   high nibble: second stage, low nibble: texture format
//!               u32  LE offset of the plane payload from the frame start
//!               u32  LE length of the payload
//! then          plane payloads
//! ```
//!
//! Frame dimensions are not stored; both ends learn them at session setup.

mod second_stage;

pub use second_stage::{stage_for, Deflate, SecondStage, StageError, StageKind, Stored};

use bytes::{Buf, BufMut};
use tracing::trace;

use crate::error::{CodecError, CodecResult};
use crate::texture::TextureFormat;

/// Most planes a frame may carry.
pub const MAX_PLANES: usize = 4;

/// Header bytes per plane.
pub const PLANE_ENTRY_BYTES: usize = 9;

/// Header length for a frame with `planes` planes.
pub const fn header_len(planes: usize) -> usize {
    1 + planes * PLANE_ENTRY_BYTES
}

/// Upper bound on the encoded size of a frame whose raw planes have the
/// given lengths.
pub fn max_frame_len(raw_lengths: &[usize]) -> usize {
    header_len(raw_lengths.len()) + raw_lengths.iter().sum::<usize>()
}

/// One plane's header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneEntry {
    pub format: TextureFormat,
    pub stage: StageKind,
    pub offset: u32,
    pub length: u32,
}

impl PlaneEntry {
    pub fn tag(&self) -> u8 {
        (self.stage.nibble() << 4) | self.format.tag()
    }

    fn from_tag(tag: u8, offset: u32, length: u32) -> CodecResult<Self> {
        Ok(Self {
            stage: StageKind::from_nibble(tag >> 4)?,
            format: TextureFormat::from_tag(tag & 0x0F)?,
            offset,
            length,
        })
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.offset as usize + self.length as usize
    }
}

/// Parsed frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    planes: Vec<PlaneEntry>,
}

impl FrameHeader {
    pub fn new(planes: Vec<PlaneEntry>) -> CodecResult<Self> {
        if planes.is_empty() || planes.len() > MAX_PLANES {
            return Err(CodecError::internal(format!(
                "a frame carries 1 to {} planes, got {}",
                MAX_PLANES,
                planes.len()
            )));
        }
        Ok(Self { planes })
    }

    pub fn planes(&self) -> &[PlaneEntry] {
        &self.planes
    }

    pub fn len(&self) -> usize {
        header_len(self.planes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Total frame length implied by the header.
    pub fn frame_len(&self) -> usize {
        self.planes
            .iter()
            .map(|p| p.offset as usize + p.length as usize)
            .max()
            .unwrap_or(0)
            .max(self.len())
    }

    /// Serializes the header.
    pub fn write(&self, out: &mut impl BufMut) {
        out.put_u8(self.planes.len() as u8);
        for plane in &self.planes {
            out.put_u8(plane.tag());
            out.put_u32_le(plane.offset);
            out.put_u32_le(plane.length);
        }
    }

    /// Parses and validates the header at the start of `frame`.
    ///
    /// Every plane must lie after the header and inside the frame.
    pub fn parse(frame: &[u8]) -> CodecResult<Self> {
        let mut buf = frame;
        if !buf.has_remaining() {
            return Err(CodecError::bad_frame("empty frame"));
        }
        let count = buf.get_u8() as usize;
        if count == 0 || count > MAX_PLANES {
            return Err(CodecError::bad_frame(format!("invalid plane count {}", count)));
        }
        let header = header_len(count);
        if frame.len() < header {
            return Err(CodecError::bad_frame(format!(
                "frame of {} bytes is shorter than its {}-byte header",
                frame.len(),
                header
            )));
        }

        let mut planes = Vec::with_capacity(count);
        for index in 0..count {
            let tag = buf.get_u8();
            let offset = buf.get_u32_le();
            let length = buf.get_u32_le();
            let entry = PlaneEntry::from_tag(tag, offset, length)?;

            let end = offset as u64 + length as u64;
            if (offset as usize) < header || end > frame.len() as u64 {
                return Err(CodecError::bad_frame(format!(
                    "plane {} ({}..{}) lies outside the {}-byte frame",
                    index,
                    offset,
                    end,
                    frame.len()
                )));
            }
            planes.push(entry);
        }
        Ok(Self { planes })
    }

    /// Payload bytes of `plane` within `frame`.
    pub fn payload<'a>(&self, frame: &'a [u8], plane: usize) -> CodecResult<&'a [u8]> {
        let entry = self
            .planes
            .get(plane)
            .ok_or_else(|| CodecError::bad_frame(format!("frame has no plane {}", plane)))?;
        frame
            .get(entry.range())
            .ok_or_else(|| CodecError::bad_frame(format!("plane {} is truncated", plane)))
    }
}

/// An uncompressed plane about to be packed into a frame.
#[derive(Debug, Clone, Copy)]
pub struct RawPlane<'a> {
    pub format: TextureFormat,
    pub blocks: &'a [u8],
}

/// Packs `planes` into `out` behind a header and returns the frame length.
///
/// Each plane goes through `stage`; a plane that does not shrink is stored
/// raw instead. `out` must hold [`max_frame_len`] bytes.
pub fn assemble(planes: &[RawPlane<'_>], stage: &dyn SecondStage, out: &mut [u8]) -> CodecResult<usize> {
    let lengths: Vec<usize> = planes.iter().map(|p| p.blocks.len()).collect();
    let needed = max_frame_len(&lengths);
    if out.len() < needed {
        return Err(CodecError::internal(format!(
            "frame buffer holds {} bytes, {} planes need up to {}",
            out.len(),
            planes.len(),
            needed
        )));
    }

    let mut entries = Vec::with_capacity(planes.len());
    let mut cursor = header_len(planes.len());
    for plane in planes {
        let raw = plane.blocks.len();
        let region = &mut out[cursor..cursor + raw];
        let (kind, written) = match stage.compress(plane.blocks, region) {
            Ok(n) if n < raw => (stage.kind(), n),
            Ok(_) | Err(StageError::DoesNotFit(_)) => {
                region.copy_from_slice(plane.blocks);
                (StageKind::Stored, raw)
            }
            Err(StageError::Codec(e)) => return Err(e),
        };
        trace!(format = %plane.format, stage = %kind, raw, written, "Packed plane");

        entries.push(PlaneEntry {
            format: plane.format,
            stage: kind,
            offset: u32::try_from(cursor).map_err(|_| CodecError::internal("frame exceeds 4 GiB"))?,
            length: u32::try_from(written).map_err(|_| CodecError::internal("plane exceeds 4 GiB"))?,
        });
        cursor += written;
    }

    let header = FrameHeader::new(entries)?;
    let mut head = &mut out[..header.len()];
    header.write(&mut head);
    Ok(cursor)
}

/// Restores plane `index` of `frame` into `out`, which must be exactly the
/// plane's uncompressed size.
pub fn unpack_plane(header: &FrameHeader, frame: &[u8], index: usize, deflate: &Deflate, out: &mut [u8]) -> CodecResult<()> {
    let payload = header.payload(frame, index)?;
    match header.planes()[index].stage {
        StageKind::Stored => Stored.decompress(payload, out),
        StageKind::Deflate => deflate.decompress(payload, out),
    }
}
