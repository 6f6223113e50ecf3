//! Encoder and decoder sessions.
//!
//! A session owns everything a stream needs: strategies chosen once at
//! setup, buffer pools sized for the stream's dimensions, the task group and
//! the sequencer. Nothing is process-global; two sessions never share state.
//!
//! # Encoding
//!
//! ```text
//! submit(frame) ─► check sequence ─► acquire buffers ─► TaskGroup::submit
//!                                                             │
//!          ┌──────────────── worker ◄────────────────────────┘
//!          ▼
//!   convert + slice + DXT strategy per plane ─► second stage ─► header
//!          │
//!          ▼
//!   FrameSequencer ─► FrameSink::frame_encoded / frame_dropped (in order)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use texblock::color::PixelFormat;
//! use texblock::session::{CodecKind, CollectingSink, DecoderConfig, DecoderSession};
//! use texblock::session::{EncoderConfig, EncoderSession, SinkEvent, SourceFrame};
//!
//! let config = EncoderConfig::new(CodecKind::YCoCg, 16, 16);
//! let sink = Arc::new(CollectingSink::new());
//! let encoder = EncoderSession::create(config.clone(), sink.clone()).unwrap();
//! encoder
//!     .submit(SourceFrame::packed(vec![128u8; 16 * 16 * 4], 16, 16, PixelFormat::Rgba8, 1))
//!     .unwrap();
//! encoder.close().unwrap();
//!
//! let events = sink.take();
//! let SinkEvent::Encoded { data, .. } = &events[0] else { panic!("frame dropped") };
//! let decoder = DecoderSession::create(DecoderConfig::from(&config)).unwrap();
//! let pixels = decoder.decode_to_vec(data).unwrap();
//! assert_eq!(pixels.len(), 16 * 16 * 4);
//! ```

mod config;
mod decoder;
mod encoder;
mod sink;
mod task;

pub use config::{
    default_worker_threads, CodecKind, DecoderConfig, EncoderConfig, DEFAULT_FIRST_SEQUENCE,
    DEFAULT_MAX_CONCURRENT,
};
pub use decoder::DecoderSession;
pub use encoder::EncoderSession;
pub use sink::{CollectingSink, FrameSink, SinkEvent};
pub use task::SourceFrame;

use std::sync::Arc;

use tracing::warn;

use crate::block::Accel;
use crate::error::{CodecError, CodecResult};
use crate::strategy::{DxtStrategy, GpuStrategy, StrategyKind, VqStrategy, YCoCgStrategy};
use crate::texture::TextureFormat;

/// A plane of every frame and the strategy that produces it.
#[derive(Clone)]
pub(crate) struct PlaneCodec {
    pub format: TextureFormat,
    pub strategy: Arc<dyn DxtStrategy>,
    /// Offset of this plane's raw blocks in the task's block buffer.
    pub offset: usize,
    pub size: usize,
}

impl std::fmt::Debug for PlaneCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaneCodec")
            .field("format", &self.format)
            .field("strategy", &self.strategy.name())
            .field("size", &self.size)
            .finish()
    }
}

pub(crate) fn check_dimensions(width: u32, height: u32) -> CodecResult<()> {
    if width == 0 || height == 0 {
        return Err(CodecError::internal(format!(
            "session dimensions must be non-zero, got {}×{}",
            width, height
        )));
    }
    Ok(())
}

fn open_gpu(fallback: bool) -> CodecResult<Option<Arc<dyn DxtStrategy>>> {
    match GpuStrategy::hardware() {
        Ok(gpu) => Ok(Some(Arc::new(gpu))),
        Err(e) if fallback => {
            warn!(error = %e, "GPU compression unavailable, using software");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Picks a strategy for every plane of an encoder session.
pub(crate) fn encoder_planes(config: &EncoderConfig) -> CodecResult<Vec<PlaneCodec>> {
    check_dimensions(config.width, config.height)?;

    let accel = Accel::detect().or_scalar(config.simd);
    let gpu = match config.strategy {
        StrategyKind::Gpu => open_gpu(config.gpu_fallback)?,
        StrategyKind::YCoCg if config.codec == CodecKind::Dxt => {
            return Err(CodecError::unsupported(
                "the ycocg strategy only produces YCoCg_DXT5 planes",
            ));
        }
        _ => None,
    };
    let software: Arc<dyn DxtStrategy> = Arc::new(VqStrategy::new(config.quality).with_accel(accel));

    let mut offset = 0;
    let mut planes = Vec::new();
    for format in config.planes() {
        let strategy: Arc<dyn DxtStrategy> = match format {
            TextureFormat::YCoCgDxt5 => Arc::new(YCoCgStrategy::new().with_accel(accel)),
            _ => gpu.clone().unwrap_or_else(|| Arc::clone(&software)),
        };
        if !strategy.supports(format) {
            return Err(CodecError::unsupported(format!(
                "{} strategy cannot produce {}",
                strategy.name(),
                format
            )));
        }
        let size = format.encoded_size(config.width, config.height);
        planes.push(PlaneCodec {
            format,
            strategy,
            offset,
            size,
        });
        offset += size;
    }
    Ok(planes)
}
