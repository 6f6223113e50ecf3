//! `wgpu` texture unit using the `block_compression` compute shaders.

use block_compression::{CompressionVariant, GpuBlockCompressor};
use tracing::{debug, info};

use super::TextureUnit;
use crate::error::{CodecError, CodecResult};
use crate::surface::Surface;
use crate::texture::TextureFormat;

fn unavailable(context: &str, err: impl std::fmt::Display) -> CodecError {
    CodecError::HardwareUnavailable(format!("{}: {}", context, err))
}

/// The default adapter's device and queue plus a block compressor bound to
/// them.
pub struct WgpuUnit {
    device: wgpu::Device,
    queue: wgpu::Queue,
    compressor: GpuBlockCompressor,
    adapter_name: String,
    max_dimension: u32,
}

impl WgpuUnit {
    /// Opens the highest-performance adapter available.
    pub fn new() -> CodecResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            ..Default::default()
        }))
        .map_err(|e| unavailable("no graphics adapter", e))?;

        let adapter_name = adapter.get_info().name;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("texblock"),
            ..Default::default()
        }))
        .map_err(|e| unavailable("device request failed", e))?;

        let max_dimension = device.limits().max_texture_dimension_2d;
        let compressor = GpuBlockCompressor::new(device.clone(), queue.clone());

        info!(adapter = %adapter_name, max_dimension, "Opened GPU texture unit");

        Ok(Self {
            device,
            queue,
            compressor,
            adapter_name,
            max_dimension,
        })
    }

    fn variant(format: TextureFormat) -> Option<CompressionVariant> {
        match format {
            TextureFormat::RgbDxt1 => Some(CompressionVariant::BC1),
            TextureFormat::RgbaDxt5 => Some(CompressionVariant::BC3),
            TextureFormat::AlphaRgtc1 => Some(CompressionVariant::BC4),
            TextureFormat::YCoCgDxt5 => None,
        }
    }
}

impl TextureUnit for WgpuUnit {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn supports(&self, format: TextureFormat) -> bool {
        Self::variant(format).is_some()
    }

    fn compress(&mut self, tile: &Surface<'_>, format: TextureFormat, out: &mut [u8]) -> CodecResult<()> {
        let variant = Self::variant(format)
            .ok_or_else(|| CodecError::unsupported(format!("{} has no hardware path", format)))?;
        let (width, height) = (tile.width(), tile.height());
        let size = format.encoded_size(width, height);

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texblock tile"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(width as usize * height as usize * 4)?;
        for y in 0..height {
            pixels.extend_from_slice(tile.row(y));
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent,
        );

        let blocks = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texblock blocks"),
            size: size as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texblock readback"),
            size: size as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.compressor
            .add_compression_task(variant, &view, width, height, &blocks, None, None);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("texblock compress"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("texblock block compression"),
                timestamp_writes: None,
            });
            self.compressor.compress(&mut pass);
        }
        encoder.copy_buffer_to_buffer(&blocks, 0, &readback, 0, size as u64);
        self.queue.submit([encoder.finish()]);

        let slice = readback.slice(..);
        let (tx, rx) = crossbeam::channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| unavailable("device poll failed", e))?;
        rx.recv()
            .map_err(|e| unavailable("readback callback dropped", e))?
            .map_err(|e| unavailable("readback map failed", e))?;

        {
            let mapped = slice.get_mapped_range();
            out[..size].copy_from_slice(&mapped[..size]);
        }
        readback.unmap();

        debug!(width, height, format = %format, "GPU tile compressed");
        Ok(())
    }
}
