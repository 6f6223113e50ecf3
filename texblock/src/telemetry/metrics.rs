use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::MetricsSnapshot;

/// Counters shared by a session and its workers.
#[derive(Debug)]
pub struct CodecMetrics {
    frames_submitted: AtomicU64,
    frames_encoded: AtomicU64,
    frames_dropped: AtomicU64,
    frames_skipped: AtomicU64,
    frames_emitted: AtomicU64,
    frames_decoded: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    encode_nanos: AtomicU64,
    decode_nanos: AtomicU64,
    /// Gauge: live pooled buffers across all of a session's pools.
    buffers_allocated: AtomicU64,
    started: Instant,
}

impl CodecMetrics {
    pub fn new() -> Self {
        Self {
            frames_submitted: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            frames_emitted: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            encode_nanos: AtomicU64::new(0),
            decode_nanos: AtomicU64::new(0),
            buffers_allocated: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// A frame of `raw_bytes` pixel bytes was admitted.
    pub fn frame_submitted(&self, raw_bytes: usize) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(raw_bytes as u64, Ordering::Relaxed);
    }

    pub fn frame_encoded(&self, encoded_bytes: usize, elapsed: Duration) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(encoded_bytes as u64, Ordering::Relaxed);
        self.encode_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A submission was rejected after its sequence number was taken.
    pub fn frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_emitted(&self) {
        self.frames_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_decoded(&self, frame_bytes: usize, elapsed: Duration) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(frame_bytes as u64, Ordering::Relaxed);
        self.decode_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn set_buffers_allocated(&self, count: usize) {
        self.buffers_allocated.store(count as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            encode_time: Duration::from_nanos(self.encode_nanos.load(Ordering::Relaxed)),
            decode_time: Duration::from_nanos(self.decode_nanos.load(Ordering::Relaxed)),
            buffers_allocated: self.buffers_allocated.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
        }
    }
}

impl Default for CodecMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_accumulate() {
        let metrics = CodecMetrics::new();
        metrics.frame_submitted(100);
        metrics.frame_submitted(100);
        metrics.frame_encoded(40, Duration::from_millis(2));
        metrics.frame_dropped();
        metrics.frame_skipped();
        metrics.frame_emitted();
        metrics.set_buffers_allocated(6);

        let s = metrics.snapshot();
        assert_eq!(s.frames_submitted, 2);
        assert_eq!(s.frames_encoded, 1);
        assert_eq!(s.frames_dropped, 1);
        assert_eq!(s.frames_skipped, 1);
        assert_eq!(s.frames_emitted, 1);
        assert_eq!(s.bytes_in, 200);
        assert_eq!(s.bytes_out, 40);
        assert_eq!(s.encode_time, Duration::from_millis(2));
        assert_eq!(s.buffers_allocated, 6);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(CodecMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.frame_emitted();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().frames_emitted, 8000);
    }
}
