//! Decoder session.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace};

use super::{check_dimensions, DecoderConfig};
use crate::block::Accel;
use crate::error::{CodecError, CodecResult};
use crate::frame::{self, Deflate, FrameHeader};
use crate::pool::BufferPool;
use crate::slicer;
use crate::strategy::{DxtStrategy, Quality, VqStrategy, YCoCgStrategy};
use crate::surface::SurfaceMut;
use crate::telemetry::{CodecMetrics, MetricsSnapshot};
use crate::texture::TextureFormat;

/// Turns frames back into pixels.
///
/// Decoding is synchronous: every call fills the destination before it
/// returns, using the session's own worker pool for slices.
pub struct DecoderSession {
    config: DecoderConfig,
    ycocg: YCoCgStrategy,
    software: VqStrategy,
    blocks: BufferPool,
    deflate: Deflate,
    pool: rayon::ThreadPool,
    metrics: Arc<CodecMetrics>,
}

impl DecoderSession {
    pub fn create(config: DecoderConfig) -> CodecResult<Self> {
        check_dimensions(config.width, config.height)?;
        if config.worker_threads == 0 {
            return Err(CodecError::internal("decoder needs at least one worker thread"));
        }

        let (width, height) = (config.width, config.height);
        let largest = [false, true]
            .into_iter()
            .flat_map(|alpha| config.codec.planes(alpha))
            .map(|format| format.encoded_size(width, height))
            .max()
            .unwrap_or(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("texblock-decode-{}", i))
            .build()
            .map_err(|e| CodecError::internal(format!("failed to start decode workers: {}", e)))?;

        let accel = Accel::detect().or_scalar(config.simd);
        info!(
            codec = %config.codec,
            width,
            height,
            output = ?config.output_format,
            accel = accel.name(),
            "Decoder session created"
        );

        Ok(Self {
            ycocg: YCoCgStrategy::new().with_accel(accel),
            software: VqStrategy::new(Quality::Fast).with_accel(accel),
            blocks: BufferPool::new("decode-blocks", largest),
            deflate: Deflate::default(),
            pool,
            metrics: Arc::new(CodecMetrics::new()),
            config,
        })
    }

    fn strategy_for(&self, format: TextureFormat) -> &dyn DxtStrategy {
        match format {
            TextureFormat::YCoCgDxt5 => &self.ycocg,
            _ => &self.software,
        }
    }

    /// Checks that the frame's planes are ones this session's codec emits.
    fn validate(&self, header: &FrameHeader) -> CodecResult<()> {
        let formats: Vec<TextureFormat> = header.planes().iter().map(|p| p.format).collect();
        let codec = self.config.codec;
        if formats != codec.planes(false) && formats != codec.planes(true) {
            return Err(CodecError::bad_frame(format!(
                "planes {:?} do not belong to a {} stream",
                formats, codec
            )));
        }
        Ok(())
    }

    /// Decodes `frame` into `dest`, which must match the session's
    /// dimensions. Its pixel format decides the output layout.
    pub fn decode(&self, frame: &[u8], dest: &mut SurfaceMut<'_>) -> CodecResult<()> {
        let started = Instant::now();
        if dest.width() != self.config.width || dest.height() != self.config.height {
            return Err(CodecError::internal(format!(
                "destination is {}×{}, session is {}×{}",
                dest.width(),
                dest.height(),
                self.config.width,
                self.config.height
            )));
        }

        let header = FrameHeader::parse(frame)?;
        self.validate(&header)?;

        let mut scratch = self.blocks.acquire()?;
        for (index, entry) in header.planes().iter().enumerate() {
            let size = entry.format.encoded_size(self.config.width, self.config.height);
            let raw = &mut scratch[..size];
            frame::unpack_plane(&header, frame, index, &self.deflate, raw)?;

            let strategy = self.strategy_for(entry.format);
            let target = dest.reborrow();
            self.pool
                .install(|| slicer::decode_frame(strategy, entry.format, raw, target, self.config.slicing))?;
            trace!(plane = index, format = %entry.format, stage = %entry.stage, "Plane decoded");
        }

        self.metrics.frame_decoded(frame.len(), started.elapsed());
        Ok(())
    }

    /// Decodes into a new packed buffer in the configured output format.
    pub fn decode_to_vec(&self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        let (width, height) = (self.config.width, self.config.height);
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(width as usize * height as usize * 4)?;
        pixels.resize(width as usize * height as usize * 4, 0);
        {
            let mut dest = SurfaceMut::packed(&mut pixels, width, height, self.config.output_format)?;
            self.decode(frame, &mut dest)?;
        }
        Ok(pixels)
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
            .set_buffers_allocated(self.blocks.allocated_count());
        self.metrics.snapshot()
    }

    /// Releases the session's buffers.
    pub fn close(self) {
        self.blocks.destroy();
        debug!(metrics = %self.metrics.snapshot(), "Decoder session closed");
    }
}
