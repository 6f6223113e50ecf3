//! Error types for compression and decompression operations.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors produced by the texture-block compression engine.
///
/// Errors are `Clone` because a failed frame's error is recorded on its task
/// and reported to the host only when the task is emitted in sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A buffer allocation failed.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Pixel or texture format negotiation mismatch.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No compression-capable graphics context is available.
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// Compressed input is corrupt or undersized.
    #[error("Bad frame: {0}")]
    BadFrame(String),

    /// An internal invariant was violated (for example a dimension mismatch
    /// between session setup and per-frame data).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CodecError {
    /// Shorthand for a [`CodecError::BadFrame`] with a formatted message.
    pub fn bad_frame(msg: impl Into<String>) -> Self {
        Self::BadFrame(msg.into())
    }

    /// Shorthand for a [`CodecError::Internal`] with a formatted message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Shorthand for a [`CodecError::UnsupportedFormat`] with a formatted message.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }
}

impl From<TryReserveError> for CodecError {
    fn from(err: TryReserveError) -> Self {
        CodecError::OutOfMemory(err.to_string())
    }
}

/// Convenience alias used across the crate.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display() {
        assert_eq!(
            CodecError::BadFrame("truncated header".to_string()).to_string(),
            "Bad frame: truncated header"
        );
        assert_eq!(
            CodecError::HardwareUnavailable("no adapter".to_string()).to_string(),
            "Hardware unavailable: no adapter"
        );
        assert_eq!(
            CodecError::internal("width mismatch").to_string(),
            "Internal error: width mismatch"
        );
    }

    #[test]
    fn test_try_reserve_maps_to_out_of_memory() {
        let mut v: Vec<u8> = Vec::new();
        let err = v.try_reserve_exact(usize::MAX).unwrap_err();
        let codec_err: CodecError = err.into();
        assert!(matches!(codec_err, CodecError::OutOfMemory(_)));
    }

    #[test]
    fn test_codec_error_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone + 'static>() {}
        assert_traits::<CodecError>();
    }
}
