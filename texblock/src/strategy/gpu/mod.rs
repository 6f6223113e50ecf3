//! Hardware texture-unit strategy.
//!
//! The hardware is reached through a [`TextureUnit`], which compresses one
//! tile no larger than its maximum texture dimension. Frames bigger than
//! that are cut into a grid of tiles, each padded to a multiple of 4 by
//! replicating the frame's edge texels, and the compressed tiles are
//! stitched back into one block stream.
//!
//! # Serialization
//!
//! A texture unit is not safe to drive from several threads at once. Each
//! [`GpuStrategy`] owns a dedicated worker thread that owns the unit and
//! takes jobs from a single-slot queue:
//!
//! ```text
//! encode() ──► bounded(1) job queue ──► "texblock-gpu" thread ──► TextureUnit
//!    ▲                                          │
//!    └────────────── per-job reply ◄────────────┘
//! ```
//!
//! Callers from any number of threads are therefore serialized, and the
//! strategy reports itself as not sliceable.

#[cfg(feature = "gpu-encode")]
mod wgpu_unit;

#[cfg(feature = "gpu-encode")]
pub use wgpu_unit::WgpuUnit;

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, trace, warn};

use super::{decode_blocks, ensure_encode_args, ensure_supported};
use super::{DxtStrategy, StrategyKind};
use crate::block::Accel;
use crate::color::PixelFormat;
use crate::error::{CodecError, CodecResult};
use crate::surface::{Surface, SurfaceMut};
use crate::texture::TextureFormat;

/// A block-compression device.
///
/// `compress` receives a packed `Rgba8` tile whose width and height are
/// multiples of 4 and at most [`max_dimension`](Self::max_dimension), and
/// writes `format.encoded_size(width, height)` bytes. Single-channel
/// formats read the red channel.
pub trait TextureUnit: Send {
    fn name(&self) -> &str;

    /// Largest texture edge the unit accepts.
    fn max_dimension(&self) -> u32;

    fn supports(&self, format: TextureFormat) -> bool;

    fn compress(&mut self, tile: &Surface<'_>, format: TextureFormat, out: &mut [u8]) -> CodecResult<()>;
}

/// One tile handed to the worker thread.
struct GpuJob {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: TextureFormat,
    reply: Sender<CodecResult<Vec<u8>>>,
}

fn run_job(unit: &mut dyn TextureUnit, job: &GpuJob) -> CodecResult<Vec<u8>> {
    let tile = Surface::packed(&job.pixels, job.width, job.height, PixelFormat::Rgba8)?;
    let mut out = Vec::new();
    let size = job.format.encoded_size(job.width, job.height);
    out.try_reserve_exact(size)?;
    out.resize(size, 0);
    unit.compress(&tile, job.format, &mut out)?;
    Ok(out)
}

fn worker_loop(mut unit: Box<dyn TextureUnit>, jobs: Receiver<GpuJob>) {
    for job in jobs.iter() {
        let result = run_job(unit.as_mut(), &job);
        // The caller may have gone away; nothing to report to.
        let _ = job.reply.send(result);
    }
    debug!(unit = unit.name(), "GPU worker stopped");
}

/// Compressor backed by a hardware texture unit.
pub struct GpuStrategy {
    unit_name: String,
    tile_size: u32,
    formats: Vec<TextureFormat>,
    accel: Accel,
    jobs: Option<Sender<GpuJob>>,
    worker: Option<JoinHandle<()>>,
}

impl GpuStrategy {
    /// Starts a worker thread that owns `unit`.
    pub fn with_unit(unit: Box<dyn TextureUnit>) -> CodecResult<Self> {
        let max_dimension = unit.max_dimension();
        if max_dimension < 4 {
            return Err(CodecError::HardwareUnavailable(format!(
                "{} reports a maximum texture size of {}",
                unit.name(),
                max_dimension
            )));
        }

        let unit_name = unit.name().to_string();
        let tile_size = max_dimension - max_dimension % 4;
        let formats: Vec<TextureFormat> = TextureFormat::ALL
            .iter()
            .copied()
            .filter(|f| *f != TextureFormat::YCoCgDxt5 && unit.supports(*f))
            .collect();

        let (tx, rx) = channel::bounded::<GpuJob>(1);
        let worker = thread::Builder::new()
            .name("texblock-gpu".to_string())
            .spawn(move || worker_loop(unit, rx))
            .map_err(|e| CodecError::internal(format!("failed to spawn GPU worker: {}", e)))?;

        info!(
            unit = %unit_name,
            tile_size,
            formats = formats.len(),
            "GPU strategy ready"
        );

        Ok(Self {
            unit_name,
            tile_size,
            formats,
            accel: Accel::detect(),
            jobs: Some(tx),
            worker: Some(worker),
        })
    }

    /// Opens the default graphics adapter.
    #[cfg(feature = "gpu-encode")]
    pub fn hardware() -> CodecResult<Self> {
        let unit = WgpuUnit::new()?;
        Self::with_unit(Box::new(unit))
    }

    /// Always fails: the crate was built without `gpu-encode`.
    #[cfg(not(feature = "gpu-encode"))]
    pub fn hardware() -> CodecResult<Self> {
        Err(CodecError::HardwareUnavailable(
            "built without the gpu-encode feature".to_string(),
        ))
    }

    /// Edge of the square tiles frames are cut into.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    fn submit(&self, pixels: Vec<u8>, width: u32, height: u32, format: TextureFormat) -> CodecResult<Vec<u8>> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| CodecError::HardwareUnavailable("GPU worker shut down".to_string()))?;

        let (reply, result) = channel::bounded(1);
        jobs.send(GpuJob {
            pixels,
            width,
            height,
            format,
            reply,
        })
        .map_err(|_| CodecError::HardwareUnavailable("GPU worker is gone".to_string()))?;

        result
            .recv()
            .map_err(|_| CodecError::HardwareUnavailable("GPU worker dropped a job".to_string()))?
    }
}

/// Copies a tile out of `source`, padded to whole blocks by clamping to the
/// frame edges. Single-channel targets get the alpha value in every channel.
fn padded_tile(source: &Surface<'_>, x0: u32, y0: u32, width: u32, height: u32, single: bool) -> CodecResult<Vec<u8>> {
    let padded_w = width.div_ceil(4) * 4;
    let padded_h = height.div_ceil(4) * 4;
    let max_x = source.width() - 1;
    let max_y = source.height() - 1;
    let alpha = source.format().alpha_index();

    let mut pixels = Vec::new();
    pixels.try_reserve_exact(padded_w as usize * padded_h as usize * 4)?;
    for y in 0..padded_h {
        let sy = (y0 + y).min(max_y);
        for x in 0..padded_w {
            let px = source.pixel((x0 + x).min(max_x), sy);
            if single {
                pixels.extend_from_slice(&[px[alpha]; 4]);
            } else {
                pixels.extend_from_slice(&px);
            }
        }
    }
    Ok(pixels)
}

impl DxtStrategy for GpuStrategy {
    fn name(&self) -> &str {
        "gpu"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Gpu
    }

    fn supports(&self, target: TextureFormat) -> bool {
        self.formats.contains(&target)
    }

    fn input_format(&self, _target: TextureFormat) -> PixelFormat {
        PixelFormat::Rgba8
    }

    fn accepts(&self, target: TextureFormat, format: PixelFormat) -> bool {
        target.is_single_channel() || format == PixelFormat::Rgba8
    }

    fn is_sliceable(&self) -> bool {
        false
    }

    fn encode(&self, source: &Surface<'_>, target: TextureFormat, out: &mut [u8]) -> CodecResult<()> {
        ensure_encode_args(self, source, target, out)?;

        let bpb = target.bytes_per_block();
        let blocks_wide = source.blocks_wide() as usize;
        let single = target.is_single_channel();
        let tile = self.tile_size;

        let mut tiles = 0usize;
        for ty in (0..source.height()).step_by(tile as usize) {
            for tx in (0..source.width()).step_by(tile as usize) {
                let tw = tile.min(source.width() - tx);
                let th = tile.min(source.height() - ty);
                let pixels = padded_tile(source, tx, ty, tw, th, single)?;
                let (pw, ph) = (tw.div_ceil(4) * 4, th.div_ceil(4) * 4);

                trace!(x = tx, y = ty, width = pw, height = ph, "GPU tile");
                let encoded = self.submit(pixels, pw, ph, target)?;

                let row_bytes = (pw / 4) as usize * bpb;
                if encoded.len() < row_bytes * (ph / 4) as usize {
                    return Err(CodecError::internal(format!(
                        "{} returned {} bytes for a {}×{} tile",
                        self.unit_name,
                        encoded.len(),
                        pw,
                        ph
                    )));
                }
                for (r, src) in encoded.chunks_exact(row_bytes).take((ph / 4) as usize).enumerate() {
                    let block_row = (ty / 4) as usize + r;
                    let start = (block_row * blocks_wide + (tx / 4) as usize) * bpb;
                    out[start..start + row_bytes].copy_from_slice(src);
                }
                tiles += 1;
            }
        }

        debug!(
            width = source.width(),
            height = source.height(),
            format = %target,
            tiles,
            "GPU encode"
        );
        Ok(())
    }

    fn decode(&self, blocks: &[u8], target: TextureFormat, dest: &mut SurfaceMut<'_>) -> CodecResult<()> {
        ensure_supported(self, target)?;
        decode_blocks(blocks, target, dest, self.accel)
    }
}

impl Drop for GpuStrategy {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(unit = %self.unit_name, "GPU worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for GpuStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuStrategy")
            .field("unit", &self.unit_name)
            .field("tile_size", &self.tile_size)
            .field("formats", &self.formats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Quality, VqStrategy};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread::ThreadId;
    use std::time::Duration;

    /// Texture unit that runs the software fitter on the calling thread.
    struct SoftwareUnit {
        max_dimension: u32,
        inner: VqStrategy,
        threads: Arc<Mutex<HashSet<ThreadId>>>,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SoftwareUnit {
        fn new(max_dimension: u32) -> Self {
            Self {
                max_dimension,
                inner: VqStrategy::new(Quality::Fast),
                threads: Arc::new(Mutex::new(HashSet::new())),
                active: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl TextureUnit for SoftwareUnit {
        fn name(&self) -> &str {
            "software-test-unit"
        }

        fn max_dimension(&self) -> u32 {
            self.max_dimension
        }

        fn supports(&self, format: TextureFormat) -> bool {
            self.inner.supports(format)
        }

        fn compress(&mut self, tile: &Surface<'_>, format: TextureFormat, out: &mut [u8]) -> CodecResult<()> {
            assert_eq!(tile.width() % 4, 0);
            assert_eq!(tile.height() % 4, 0);
            assert!(tile.width() <= self.max_dimension && tile.height() <= self.max_dimension);

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.threads.lock().insert(thread::current().id());
            thread::sleep(Duration::from_millis(1));
            let result = self.inner.encode(tile, format, out);
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn image(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 23) as u8, (y * 17) as u8, (x * y) as u8, (x * 9 + y) as u8]);
            }
        }
        data
    }

    fn direct(width: u32, height: u32, format: TextureFormat) -> Vec<u8> {
        let data = image(width, height);
        let surface = Surface::packed(&data, width, height, PixelFormat::Rgba8).unwrap();
        let mut out = vec![0u8; format.encoded_size(width, height)];
        VqStrategy::new(Quality::Fast).encode(&surface, format, &mut out).unwrap();
        out
    }

    fn tiled(strategy: &GpuStrategy, width: u32, height: u32, format: TextureFormat) -> Vec<u8> {
        let data = image(width, height);
        let surface = Surface::packed(&data, width, height, PixelFormat::Rgba8).unwrap();
        let mut out = vec![0u8; format.encoded_size(width, height)];
        strategy.encode(&surface, format, &mut out).unwrap();
        out
    }

    #[test]
    fn test_tiles_stitch_to_single_unit_stream() {
        let strategy = GpuStrategy::with_unit(Box::new(SoftwareUnit::new(4))).unwrap();
        for format in [TextureFormat::RgbDxt1, TextureFormat::RgbaDxt5] {
            assert_eq!(tiled(&strategy, 10, 10, format), direct(10, 10, format), "{format}");
        }
    }

    #[test]
    fn test_alpha_plane_matches_software() {
        let strategy = GpuStrategy::with_unit(Box::new(SoftwareUnit::new(8))).unwrap();
        assert_eq!(
            tiled(&strategy, 13, 6, TextureFormat::AlphaRgtc1),
            direct(13, 6, TextureFormat::AlphaRgtc1)
        );
    }

    #[test]
    fn test_tile_size_rounds_down_to_block_multiple() {
        let strategy = GpuStrategy::with_unit(Box::new(SoftwareUnit::new(6))).unwrap();
        assert_eq!(strategy.tile_size(), 4);
        assert_eq!(tiled(&strategy, 9, 7, TextureFormat::RgbDxt1), direct(9, 7, TextureFormat::RgbDxt1));
    }

    #[test]
    fn test_rejects_tiny_texture_unit() {
        let err = GpuStrategy::with_unit(Box::new(SoftwareUnit::new(2)));
        assert!(matches!(err, Err(CodecError::HardwareUnavailable(_))));
    }

    #[test]
    fn test_rejects_ycocg_target() {
        let strategy = GpuStrategy::with_unit(Box::new(SoftwareUnit::new(16))).unwrap();
        assert!(!strategy.supports(TextureFormat::YCoCgDxt5));
        assert!(!strategy.is_sliceable());

        let data = vec![0u8; 4 * 4 * 4];
        let surface = Surface::packed(&data, 4, 4, PixelFormat::Rgba8).unwrap();
        let mut out = [0u8; 16];
        let err = strategy.encode(&surface, TextureFormat::YCoCgDxt5, &mut out);
        assert!(matches!(err, Err(CodecError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_concurrent_callers_are_serialized() {
        let unit = SoftwareUnit::new(8);
        let threads = Arc::clone(&unit.threads);
        let peak = Arc::clone(&unit.peak);
        let strategy = GpuStrategy::with_unit(Box::new(unit)).unwrap();
        let expected = direct(20, 12, TextureFormat::RgbDxt1);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    assert_eq!(tiled(&strategy, 20, 12, TextureFormat::RgbDxt1), expected);
                });
            }
        });

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(threads.lock().len(), 1);
    }

    #[test]
    fn test_decode_uses_software_decoder() {
        let strategy = GpuStrategy::with_unit(Box::new(SoftwareUnit::new(8))).unwrap();
        let (w, h) = (6, 5);
        let blocks = tiled(&strategy, w, h, TextureFormat::RgbDxt1);
        let mut out = vec![0u8; (w * h * 4) as usize];
        let mut dest = SurfaceMut::packed(&mut out, w, h, PixelFormat::Rgba8).unwrap();
        strategy.decode(&blocks, TextureFormat::RgbDxt1, &mut dest).unwrap();
        assert!(out.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[cfg(not(feature = "gpu-encode"))]
    #[test]
    fn test_hardware_unavailable_without_feature() {
        assert!(matches!(
            GpuStrategy::hardware(),
            Err(CodecError::HardwareUnavailable(_))
        ));
    }
}
