//! Encoder session.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use super::task::{CompressTask, SourceFrame, TaskStatus};
use super::{encoder_planes, EncoderConfig, FrameSink, PlaneCodec};
use crate::error::{CodecError, CodecResult};
use crate::executor::{FrameSequencer, TaskGroup};
use crate::frame::{self, stage_for, RawPlane, SecondStage};
use crate::pool::BufferPool;
use crate::slicer;
use crate::telemetry::{CodecMetrics, MetricsSnapshot};
use crate::texture::TextureFormat;

/// State the worker threads share with the session.
struct EncoderShared {
    planes: Vec<PlaneCodec>,
    slicing: bool,
    stage: Box<dyn SecondStage>,
    sequencer: FrameSequencer<CompressTask>,
    sink: Arc<dyn FrameSink>,
    metrics: Arc<CodecMetrics>,
}

impl EncoderShared {
    /// Work function: encode, park, emit whatever is next in order.
    ///
    /// Every task reaches the sequencer, even one whose strategy panicked,
    /// so its sequence number never leaves a gap.
    fn run(&self, mut task: CompressTask) {
        let started = Instant::now();
        let sequence = task.sequence;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.encode(&mut task)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                error!(sequence, reason = %reason, "Encoder panicked");
                Err(CodecError::internal(format!("encoder panicked: {}", reason)))
            });
        match result {
            Ok(len) => {
                task.encoded_len = len;
                task.status = TaskStatus::Encoded;
                self.metrics.frame_encoded(len, started.elapsed());
                debug!(sequence, bytes = len, elapsed_us = started.elapsed().as_micros() as u64, "Frame encoded");
            }
            Err(e) => {
                warn!(sequence, error = %e, "Frame failed to encode");
                task.status = TaskStatus::Failed(e);
            }
        }

        // Only the output survives until emission.
        task.source = None;
        task.blocks = None;
        task.convert = None;

        self.sequencer.enqueue_finished(task);
        self.drain();
    }

    fn encode(&self, task: &mut CompressTask) -> CodecResult<usize> {
        let CompressTask {
            source,
            output,
            blocks,
            convert,
            ..
        } = task;
        let source = source
            .as_ref()
            .ok_or_else(|| CodecError::internal("task has no source frame"))?;
        let surface = source.surface()?;
        let blocks = blocks
            .as_deref_mut()
            .ok_or_else(|| CodecError::internal("task has no block buffer"))?;
        let output = output
            .as_deref_mut()
            .ok_or_else(|| CodecError::internal("task has no output buffer"))?;
        let mut no_scratch: [u8; 0] = [];
        let scratch: &mut [u8] = match convert.as_deref_mut() {
            Some(buf) => buf,
            None => &mut no_scratch,
        };

        for plane in &self.planes {
            let dst = &mut blocks[plane.offset..plane.offset + plane.size];
            slicer::encode_frame(
                plane.strategy.as_ref(),
                plane.format,
                &surface,
                scratch,
                dst,
                self.slicing,
            )?;
        }

        let raw: Vec<RawPlane<'_>> = self
            .planes
            .iter()
            .map(|p| RawPlane {
                format: p.format,
                blocks: &blocks[p.offset..p.offset + p.size],
            })
            .collect();
        frame::assemble(&raw, self.stage.as_ref(), output)
    }

    fn drain(&self) -> usize {
        self.sequencer.drain(|task| self.emit(task))
    }

    /// Hands one task to the sink; its buffers return to their pools when
    /// it drops at the end of this call.
    fn emit(&self, task: CompressTask) {
        if let Some(payload) = task.payload() {
            self.sink.frame_encoded(task.sequence, payload);
            self.metrics.frame_emitted();
            return;
        }
        match &task.status {
            TaskStatus::Failed(e) => {
                self.sink.frame_dropped(task.sequence, e);
                self.metrics.frame_dropped();
            }
            TaskStatus::Skipped => {
                trace!(sequence = task.sequence, "Skipped frame passed");
            }
            TaskStatus::Pending | TaskStatus::Encoded => {
                let e = CodecError::internal("frame reached emission without output");
                self.sink.frame_dropped(task.sequence, &e);
                self.metrics.frame_dropped();
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A stream of frames being compressed.
///
/// Frames must be submitted with consecutive sequence numbers starting at
/// [`EncoderConfig::first_sequence`]. Output reaches the [`FrameSink`] in
/// that order no matter which worker finishes first.
pub struct EncoderSession {
    config: EncoderConfig,
    shared: Arc<EncoderShared>,
    group: TaskGroup<CompressTask>,
    output_pool: BufferPool,
    block_pool: BufferPool,
    convert_pool: BufferPool,
    next_sequence: AtomicU64,
    max_frame_len: usize,
    closed: bool,
}

impl EncoderSession {
    /// Picks strategies, sizes the pools and starts the worker pool.
    pub fn create(config: EncoderConfig, sink: Arc<dyn FrameSink>) -> CodecResult<Self> {
        let planes = encoder_planes(&config)?;
        let sizes: Vec<usize> = planes.iter().map(|p| p.size).collect();
        let max_frame_len = frame::max_frame_len(&sizes);
        let raw_len: usize = sizes.iter().sum();
        let pixels = config.width as usize * config.height as usize * 4;

        let metrics = Arc::new(CodecMetrics::new());
        let shared = Arc::new(EncoderShared {
            planes,
            slicing: config.slicing,
            stage: stage_for(config.second_stage, config.deflate_level),
            sequencer: FrameSequencer::new(config.first_sequence),
            sink,
            metrics,
        });

        let worker = Arc::clone(&shared);
        let group = TaskGroup::new(
            format!("texblock-{}", config.codec),
            move |task: CompressTask| worker.run(task),
            config.max_concurrent,
            config.worker_threads,
        )?;

        info!(
            codec = %config.codec,
            width = config.width,
            height = config.height,
            planes = ?shared.planes,
            second_stage = %config.second_stage,
            max_concurrent = config.max_concurrent,
            "Encoder session created"
        );

        Ok(Self {
            output_pool: BufferPool::new("frame", max_frame_len),
            block_pool: BufferPool::new("blocks", raw_len),
            convert_pool: BufferPool::new("convert", pixels),
            next_sequence: AtomicU64::new(config.first_sequence),
            max_frame_len,
            config,
            shared,
            group,
            closed: false,
        })
    }

    /// Queues `frame` for compression.
    ///
    /// Blocks while `max_concurrent` frames are in flight. A frame whose
    /// sequence number is not the next one is rejected outright; any other
    /// failure here still consumes the sequence number, so later frames are
    /// not held back.
    pub fn submit(&self, frame: SourceFrame) -> CodecResult<()> {
        let sequence = frame.sequence;
        let expected = self.next_sequence.load(Ordering::Acquire);
        if sequence != expected
            || self
                .next_sequence
                .compare_exchange(expected, expected.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(CodecError::internal(format!(
                "expected frame {}, got {}",
                expected, sequence
            )));
        }

        let raw_bytes = frame.data.len();
        let task = match self.prepare(frame) {
            Ok(task) => task,
            Err(e) => {
                self.skip(sequence, &e);
                return Err(e);
            }
        };

        self.shared.metrics.frame_submitted(raw_bytes);
        trace!(sequence, in_flight = self.group.in_flight(), "Submitting frame");
        if let Err(e) = self.group.submit(task) {
            self.skip(sequence, &e);
            return Err(e);
        }
        Ok(())
    }

    fn prepare(&self, frame: SourceFrame) -> CodecResult<CompressTask> {
        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(CodecError::internal(format!(
                "frame {} is {}×{}, session is {}×{}",
                frame.sequence, frame.width, frame.height, self.config.width, self.config.height
            )));
        }
        frame.surface()?;

        let needs_conversion = self
            .shared
            .planes
            .iter()
            .any(|p| !p.strategy.accepts(p.format, frame.format));

        let output = self.output_pool.acquire()?;
        let blocks = self.block_pool.acquire()?;
        let convert = if needs_conversion {
            Some(self.convert_pool.acquire()?)
        } else {
            None
        };
        Ok(CompressTask::new(frame, output, blocks, convert))
    }

    fn skip(&self, sequence: u64, error: &CodecError) {
        warn!(sequence, error = %error, "Frame rejected at submission");
        self.shared.metrics.frame_skipped();
        self.shared.sequencer.enqueue_finished(CompressTask::skipped(sequence));
        self.shared.drain();
    }

    /// Waits for every submitted frame and emits all of them.
    pub fn flush(&self) -> CodecResult<()> {
        self.group.wait_for_completion()?;
        let emitted = self.shared.drain();
        self.update_buffer_gauge();
        debug!(emitted, pending = self.shared.sequencer.pending(), "Encoder flushed");
        Ok(())
    }

    /// Flushes and releases the session's memory.
    pub fn close(mut self) -> CodecResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> CodecResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.flush();
        self.output_pool.destroy();
        self.block_pool.destroy();
        self.convert_pool.destroy();
        info!(codec = %self.config.codec, metrics = %self.shared.metrics.snapshot(), "Encoder session closed");
        result
    }

    /// Drops idle pooled buffers; call after [`flush`](Self::flush).
    pub fn trim(&self) -> usize {
        let freed = self.output_pool.trim() + self.block_pool.trim() + self.convert_pool.trim();
        self.update_buffer_gauge();
        freed
    }

    fn update_buffer_gauge(&self) {
        self.shared.metrics.set_buffers_allocated(
            self.output_pool.allocated_count()
                + self.block_pool.allocated_count()
                + self.convert_pool.allocated_count(),
        );
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.update_buffer_gauge();
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Plane formats of every frame, in frame order.
    pub fn plane_formats(&self) -> Vec<TextureFormat> {
        self.shared.planes.iter().map(|p| p.format).collect()
    }

    /// Strategy name per plane.
    pub fn strategy_names(&self) -> Vec<String> {
        self.shared
            .planes
            .iter()
            .map(|p| p.strategy.name().to_string())
            .collect()
    }

    /// Largest frame this session can emit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Sequence number the next submission must carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> usize {
        self.group.in_flight()
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Encoder session shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PixelFormat;
    use crate::frame::{FrameHeader, StageKind};
    use crate::session::{CodecKind, CollectingSink, SinkEvent};
    use crate::strategy::{DxtStrategy, StrategyKind};
    use crate::surface::{Surface, SurfaceMut};

    fn frame(width: u32, height: u32, sequence: u64) -> SourceFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 9) as u8, (y * 9) as u8, sequence as u8, 255]);
            }
        }
        SourceFrame::packed(data, width, height, PixelFormat::Rgba8, sequence)
    }

    fn session(config: EncoderConfig) -> (EncoderSession, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let session = EncoderSession::create(config, sink.clone()).unwrap();
        (session, sink)
    }

    #[test]
    fn test_frames_emitted_in_order() {
        let (encoder, sink) = session(EncoderConfig::new(CodecKind::YCoCg, 20, 12).with_max_concurrent(3));
        for seq in 1..=10 {
            encoder.submit(frame(20, 12, seq)).unwrap();
        }
        encoder.flush().unwrap();

        let events = sink.take();
        let order: Vec<u64> = events.iter().map(|e| e.sequence()).collect();
        assert_eq!(order, (1..=10).collect::<Vec<_>>());
        assert!(events.iter().all(|e| matches!(e, SinkEvent::Encoded { .. })));

        let m = encoder.metrics();
        assert_eq!(m.frames_submitted, 10);
        assert_eq!(m.frames_encoded, 10);
        assert_eq!(m.frames_emitted, 10);
    }

    #[test]
    fn test_out_of_order_sequence_not_admitted() {
        let (encoder, sink) = session(EncoderConfig::new(CodecKind::Dxt, 8, 8));
        let err = encoder.submit(frame(8, 8, 2));
        assert!(matches!(err, Err(CodecError::Internal(_))));
        assert_eq!(encoder.next_sequence(), 1);

        encoder.submit(frame(8, 8, 1)).unwrap();
        encoder.flush().unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_dimension_mismatch_is_skipped_silently() {
        let (encoder, sink) = session(EncoderConfig::new(CodecKind::Dxt, 8, 8));
        encoder.submit(frame(8, 8, 1)).unwrap();
        let err = encoder.submit(frame(4, 4, 2));
        assert!(matches!(err, Err(CodecError::Internal(_))));
        encoder.submit(frame(8, 8, 3)).unwrap();
        encoder.flush().unwrap();

        let order: Vec<u64> = sink.take().iter().map(|e| e.sequence()).collect();
        assert_eq!(order, vec![1, 3]);
        assert_eq!(encoder.metrics().frames_skipped, 1);
    }

    #[test]
    fn test_frame_header_matches_session() {
        let config = EncoderConfig::new(CodecKind::YCoCg, 18, 18)
            .with_alpha(true)
            .with_second_stage(StageKind::Stored, 0);
        let (encoder, sink) = session(config);
        encoder.submit(frame(18, 18, 1)).unwrap();
        encoder.flush().unwrap();

        let events = sink.take();
        let SinkEvent::Encoded { data, .. } = &events[0] else {
            panic!("frame was dropped");
        };
        let header = FrameHeader::parse(data).unwrap();
        let formats: Vec<TextureFormat> = header.planes().iter().map(|p| p.format).collect();
        assert_eq!(formats, encoder.plane_formats());
        assert_eq!(header.planes()[0].length as usize, 5 * 5 * 16);
        assert_eq!(header.planes()[1].length as usize, 5 * 5 * 8);
        assert_eq!(data.len(), encoder.max_frame_len());
    }

    #[test]
    fn test_buffers_are_reused() {
        let (encoder, _sink) = session(
            EncoderConfig::new(CodecKind::Dxt, 16, 16)
                .with_max_concurrent(1)
                .with_worker_threads(1),
        );
        for seq in 1..=5 {
            encoder.submit(frame(16, 16, seq)).unwrap();
            encoder.flush().unwrap();
        }
        // Each frame finds the previous frame's output and block buffers idle.
        assert_eq!(encoder.metrics().buffers_allocated, 2);
        assert_eq!(encoder.trim(), 2);
        assert_eq!(encoder.metrics().buffers_allocated, 0);

        encoder.submit(frame(16, 16, 6)).unwrap();
        encoder.flush().unwrap();
        assert_eq!(encoder.metrics().buffers_allocated, 2);
    }

    #[test]
    fn test_bgra_source_allocates_conversion_buffer() {
        let (encoder, sink) = session(EncoderConfig::new(CodecKind::Dxt, 8, 8).with_strategy(StrategyKind::VectorQuantization));
        let mut f = frame(8, 8, 1);
        f.format = PixelFormat::Bgra8;
        encoder.submit(f).unwrap();
        encoder.flush().unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(encoder.metrics().buffers_allocated, 3);
    }

    #[test]
    fn test_close_flushes() {
        let (encoder, sink) = session(EncoderConfig::new(CodecKind::YCoCg, 32, 32));
        for seq in 1..=4 {
            encoder.submit(frame(32, 32, seq)).unwrap();
        }
        encoder.close().unwrap();
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn test_sequence_wraps_past_u64_max() {
        let config = EncoderConfig::new(CodecKind::Dxt, 8, 8)
            .with_max_concurrent(2)
            .with_first_sequence(u64::MAX - 1);
        let (encoder, sink) = session(config);
        for seq in [u64::MAX - 1, u64::MAX, 0, 1] {
            encoder.submit(frame(8, 8, seq)).unwrap();
        }
        encoder.flush().unwrap();

        let order: Vec<u64> = sink.take().iter().map(|e| e.sequence()).collect();
        assert_eq!(order, vec![u64::MAX - 1, u64::MAX, 0, 1]);
        assert_eq!(encoder.next_sequence(), 2);
    }

    #[test]
    fn test_first_sequence_at_u64_max() {
        let config = EncoderConfig::new(CodecKind::YCoCg, 8, 8).with_first_sequence(u64::MAX);
        let (encoder, sink) = session(config);
        encoder.submit(frame(8, 8, u64::MAX)).unwrap();
        encoder.flush().unwrap();
        assert_eq!(encoder.next_sequence(), 0);
        assert_eq!(sink.len(), 1);
    }

    /// Strategy whose encoder always panics.
    struct PanickingStrategy;

    impl DxtStrategy for PanickingStrategy {
        fn name(&self) -> &str {
            "panicking"
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::VectorQuantization
        }

        fn supports(&self, target: TextureFormat) -> bool {
            target == TextureFormat::RgbDxt1
        }

        fn input_format(&self, _target: TextureFormat) -> PixelFormat {
            PixelFormat::Rgba8
        }

        fn is_sliceable(&self) -> bool {
            false
        }

        fn encode(&self, _source: &Surface<'_>, _target: TextureFormat, _out: &mut [u8]) -> CodecResult<()> {
            panic!("block fit diverged");
        }

        fn decode(&self, _blocks: &[u8], _target: TextureFormat, _dest: &mut SurfaceMut<'_>) -> CodecResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_panicking_strategy_does_not_stall_stream() {
        let size = TextureFormat::RgbDxt1.encoded_size(8, 8);
        let sink = Arc::new(CollectingSink::new());
        let shared = EncoderShared {
            planes: vec![PlaneCodec {
                format: TextureFormat::RgbDxt1,
                strategy: Arc::new(PanickingStrategy),
                offset: 0,
                size,
            }],
            slicing: false,
            stage: stage_for(StageKind::Stored, 0),
            sequencer: FrameSequencer::new(1),
            sink: sink.clone(),
            metrics: Arc::new(CodecMetrics::new()),
        };
        let output_pool = BufferPool::new("frame", frame::max_frame_len(&[size]));
        let block_pool = BufferPool::new("blocks", size);

        // Finish out of order so frame 1 has to unblock frame 2.
        for seq in [2, 1] {
            let task = CompressTask::new(
                frame(8, 8, seq),
                output_pool.acquire().unwrap(),
                block_pool.acquire().unwrap(),
                None,
            );
            shared.run(task);
        }

        let events = sink.take();
        let order: Vec<u64> = events.iter().map(|e| e.sequence()).collect();
        assert_eq!(order, vec![1, 2]);
        assert!(events.iter().all(|e| matches!(
            e,
            SinkEvent::Dropped { error: CodecError::Internal(msg), .. } if msg.contains("block fit diverged")
        )));
        assert_eq!(shared.sequencer.pending(), 0);
        assert_eq!(shared.metrics.snapshot().frames_dropped, 2);
        assert_eq!(output_pool.idle_count(), 2);
    }
}
