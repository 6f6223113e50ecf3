use std::fmt;
use std::time::Duration;

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub frames_submitted: u64,
    pub frames_encoded: u64,
    pub frames_dropped: u64,
    pub frames_skipped: u64,
    pub frames_emitted: u64,
    pub frames_decoded: u64,
    /// Raw pixel bytes submitted (encoder) or frame bytes read (decoder).
    pub bytes_in: u64,
    /// Encoded frame bytes produced.
    pub bytes_out: u64,
    pub encode_time: Duration,
    pub decode_time: Duration,
    pub buffers_allocated: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Raw bytes per encoded byte; 0 before the first frame.
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_out == 0 {
            return 0.0;
        }
        self.bytes_in as f64 / self.bytes_out as f64
    }

    pub fn average_encode_time(&self) -> Duration {
        if self.frames_encoded == 0 {
            return Duration::ZERO;
        }
        self.encode_time / self.frames_encoded as u32
    }

    pub fn average_decode_time(&self) -> Duration {
        if self.frames_decoded == 0 {
            return Duration::ZERO;
        }
        self.decode_time / self.frames_decoded as u32
    }

    /// Encoded frames per second of wall time.
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.frames_encoded.max(self.frames_decoded) as f64 / secs
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} encoded, {} emitted, {} dropped, {} decoded, ratio {:.2}:1, avg encode {:.2} ms",
            self.frames_encoded,
            self.frames_emitted,
            self.frames_dropped,
            self.frames_decoded,
            self.compression_ratio(),
            self.average_encode_time().as_secs_f64() * 1000.0
        )
    }
}
