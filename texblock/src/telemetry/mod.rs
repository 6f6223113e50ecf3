//! Codec telemetry.
//!
//! Sessions record events into lock-free atomic counters; hosts read a
//! point-in-time copy.
//!
//! # Architecture
//!
//! ```text
//! Encoder / Decoder ─────► CodecMetrics ─────► MetricsSnapshot ─────► Views
//!   sessions              (atomic counters)   (point-in-time copy)   (CLI, logs)
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use texblock::telemetry::CodecMetrics;
//!
//! let metrics = CodecMetrics::new();
//! metrics.frame_submitted(4096);
//! metrics.frame_encoded(1024, Duration::from_millis(3));
//! metrics.frame_emitted();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.frames_encoded, 1);
//! assert_eq!(snapshot.compression_ratio(), 4.0);
//! ```

mod metrics;
mod snapshot;

pub use metrics::CodecMetrics;
pub use snapshot::MetricsSnapshot;
