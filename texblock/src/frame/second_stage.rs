//! Lossless second-stage plane compression.

use std::fmt;
use std::str::FromStr;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use thiserror::Error;

use crate::error::{CodecError, CodecResult};

/// Which second stage a plane went through; stored in the high nibble of
/// the plane tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum StageKind {
    /// Raw block stream.
    Stored = 0xA,
    /// Raw deflate (RFC 1951, no zlib wrapper).
    #[default]
    Deflate = 0xB,
}

impl StageKind {
    pub fn nibble(self) -> u8 {
        self as u8
    }

    pub fn from_nibble(nibble: u8) -> CodecResult<Self> {
        match nibble {
            0xA => Ok(StageKind::Stored),
            0xB => Ok(StageKind::Deflate),
            other => Err(CodecError::bad_frame(format!(
                "unknown second-stage tag {:#x}",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Stored => "stored",
            StageKind::Deflate => "deflate",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stored" | "none" => Ok(StageKind::Stored),
            "deflate" => Ok(StageKind::Deflate),
            other => Err(format!("unknown second stage '{}'", other)),
        }
    }
}

/// Why a plane could not be compressed into the space given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("compressed plane does not fit in {0} bytes")]
    DoesNotFit(usize),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A lossless byte-stream transform applied to each plane.
pub trait SecondStage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Compresses `input` into `output`, whose length is the most the result
    /// may occupy. Returns the compressed length.
    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, StageError>;

    /// Decompresses `input` into exactly `output.len()` bytes.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CodecResult<()>;
}

/// Identity stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stored;

impl SecondStage for Stored {
    fn kind(&self) -> StageKind {
        StageKind::Stored
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, StageError> {
        if input.len() > output.len() {
            return Err(StageError::DoesNotFit(output.len()));
        }
        output[..input.len()].copy_from_slice(input);
        Ok(input.len())
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CodecResult<()> {
        if input.len() != output.len() {
            return Err(CodecError::bad_frame(format!(
                "stored plane holds {} bytes, expected {}",
                input.len(),
                output.len()
            )));
        }
        output.copy_from_slice(input);
        Ok(())
    }
}

/// Raw deflate via `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: u32,
}

impl Deflate {
    /// Default compression level.
    pub const DEFAULT_LEVEL: u32 = 6;

    /// Creates a stage at `level`, clamped to 0..=9.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl SecondStage for Deflate {
    fn kind(&self) -> StageKind {
        StageKind::Deflate
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, StageError> {
        let mut stream = Compress::new(Compression::new(self.level), false);
        let status = stream
            .compress(input, output, FlushCompress::Finish)
            .map_err(|e| CodecError::internal(format!("deflate failed: {}", e)))?;
        match status {
            Status::StreamEnd => Ok(stream.total_out() as usize),
            Status::Ok | Status::BufError => Err(StageError::DoesNotFit(output.len())),
        }
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CodecResult<()> {
        let mut stream = Decompress::new(false);
        let status = stream
            .decompress(input, output, FlushDecompress::Finish)
            .map_err(|e| CodecError::bad_frame(format!("corrupt deflate plane: {}", e)))?;
        let produced = stream.total_out() as usize;
        match status {
            Status::StreamEnd if produced == output.len() => Ok(()),
            Status::StreamEnd => Err(CodecError::bad_frame(format!(
                "deflate plane inflated to {} bytes, expected {}",
                produced,
                output.len()
            ))),
            Status::Ok | Status::BufError => Err(CodecError::bad_frame(format!(
                "deflate plane is truncated or longer than {} bytes",
                output.len()
            ))),
        }
    }
}

/// Stage instance for `kind`; `level` only matters for deflate.
pub fn stage_for(kind: StageKind, level: u32) -> Box<dyn SecondStage> {
    match kind {
        StageKind::Stored => Box::new(Stored),
        StageKind::Deflate => Box::new(Deflate::new(level)),
    }
}
