//! texblock - concurrent texture-block compression for video frames
//!
//! Frames are compressed into DXT1, DXT5, YCoCg-DXT5 or RGTC1 block planes,
//! followed by an optional lossless deflate stage, and handed back to the
//! host strictly in submission order.
//!
//! # Architecture
//!
//! ```text
//! session ─► executor (TaskGroup + FrameSequencer)
//!    │
//!    ├─► slicer ─► strategy (gpu | vq | ycocg) ─► block + color
//!    ├─► frame (header + second stage)
//!    └─► pool, telemetry
//! ```
//!
//! Hosts usually only touch [`session`]: build an [`EncoderConfig`], create
//! an [`EncoderSession`] with a [`FrameSink`], and `submit` frames.

pub mod block;
pub mod color;
pub mod config;
pub mod error;
pub mod executor;
pub mod frame;
pub mod logging;
pub mod pool;
pub mod session;
pub mod slicer;
pub mod strategy;
pub mod surface;
pub mod telemetry;
pub mod texture;

pub use error::{CodecError, CodecResult};
pub use session::{
    CodecKind, DecoderConfig, DecoderSession, EncoderConfig, EncoderSession, FrameSink,
    SourceFrame,
};
pub use texture::TextureFormat;
