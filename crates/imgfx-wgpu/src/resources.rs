//! Per-run device resource ownership
//!
//! The [`ResourceManager`] owns everything allocated for one run: the
//! uploaded source texture, the two ping-pong render targets, the output
//! surface, and any transient buffers. `end_run` releases all of it
//! unconditionally, on the success and failure paths alike; the
//! [`AllocationLedger`] makes that observable. Device memory is explicitly
//! managed here, so this is the one invariant that must never be violated.

use crate::error::EngineError;
use crate::program_cache::TARGET_FORMAT;

/// Decoded RGBA8 pixel data, rows top-to-bottom
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl SourceImage {
    /// Wraps decoded RGBA8 pixels.
    ///
    /// Fails with [`EngineError::ImageDecode`] when the buffer does not hold
    /// exactly `width * height * 4` bytes, before any device work happens.
    pub fn from_rgba8(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 {
            return Err(EngineError::ImageDecode(format!(
                "image dimensions must be positive, got {width}x{height}"
            )));
        }
        if pixels.len() != expected {
            return Err(EngineError::ImageDecode(format!(
                "expected {expected} bytes for {width}x{height} RGBA, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Counts device allocations and releases across runs; balanced when every
/// allocation has been released
#[derive(Debug, Default, Clone)]
pub struct AllocationLedger {
    allocated: usize,
    released: usize,
}

impl AllocationLedger {
    fn record_alloc(&mut self) {
        self.allocated += 1;
    }

    fn record_release(&mut self) {
        self.released += 1;
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn released(&self) -> usize {
        self.released
    }

    pub fn outstanding(&self) -> usize {
        self.allocated - self.released
    }

    pub fn is_balanced(&self) -> bool {
        self.allocated == self.released
    }
}

/// An off-screen destination surface: a texture usable as a color attachment
/// plus its sampled view
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Everything allocated for a single run
pub struct RunResources {
    /// Uploaded source pixels
    pub input: wgpu::Texture,
    pub input_view: wgpu::TextureView,
    /// The ping-pong pair; exactly two regardless of pipeline length
    pub targets: [RenderTarget; 2],
    /// Final output surface; the last pass always renders here
    pub surface: RenderTarget,
    buffers: Vec<wgpu::Buffer>,
}

/// Owns run-scoped allocations and the ledger shared across runs
#[derive(Default)]
pub struct ResourceManager {
    ledger: AllocationLedger,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads the source image and allocates the ping-pong pair and output
    /// surface, each sized to the run's output resolution.
    ///
    /// Every render-target allocation is validated immediately; an incomplete
    /// target is fatal. On a partial failure everything already allocated for
    /// this run is released before returning.
    pub fn begin_run(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &SourceImage,
        width: u32,
        height: u32,
    ) -> Result<RunResources, EngineError> {
        tracing::debug!(
            source_width = source.width(),
            source_height = source.height(),
            width,
            height,
            "uploading source image"
        );
        let (input, input_view) = self.upload_source(device, queue, source);

        let target_a = match self.create_target(device, width, height, "ping target", false) {
            Ok(target) => target,
            Err(err) => {
                self.destroy_texture(&input);
                return Err(err);
            }
        };
        let target_b = match self.create_target(device, width, height, "pong target", false) {
            Ok(target) => target,
            Err(err) => {
                self.destroy_texture(&input);
                self.destroy_texture(&target_a.texture);
                return Err(err);
            }
        };
        let surface = match self.create_target(device, width, height, "output surface", true) {
            Ok(target) => target,
            Err(err) => {
                self.destroy_texture(&input);
                self.destroy_texture(&target_a.texture);
                self.destroy_texture(&target_b.texture);
                return Err(err);
            }
        };

        Ok(RunResources {
            input,
            input_view,
            targets: [target_a, target_b],
            surface,
            buffers: Vec::new(),
        })
    }

    /// Creates a run-scoped buffer that `end_run` will release.
    pub fn create_buffer(
        &mut self,
        device: &wgpu::Device,
        run: &mut RunResources,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.ledger.record_alloc();
        run.buffers.push(buffer.clone());
        buffer
    }

    /// Releases every allocation made during the run. Runs on every exit
    /// path, success or failure.
    pub fn end_run(&mut self, run: RunResources) {
        self.destroy_texture(&run.input);
        for target in &run.targets {
            self.destroy_texture(&target.texture);
        }
        self.destroy_texture(&run.surface.texture);
        for buffer in &run.buffers {
            buffer.destroy();
            self.ledger.record_release();
        }
        tracing::debug!(
            allocated = self.ledger.allocated(),
            released = self.ledger.released(),
            "run resources released"
        );
    }

    /// The allocation ledger, observable for balance checks
    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    fn upload_source(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &SourceImage,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let size = wgpu::Extent3d {
            width: source.width(),
            height: source.height(),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("source image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            source.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(source.width() * 4),
                rows_per_image: Some(source.height()),
            },
            size,
        );

        self.ledger.record_alloc();
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Allocates one render target and validates it immediately; a failed
    /// construction maps to [`EngineError::FramebufferIncomplete`].
    fn create_target(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: &str,
        readback: bool,
    ) -> Result<RenderTarget, EngineError> {
        let usage = if readback {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            texture.destroy();
            return Err(EngineError::FramebufferIncomplete {
                diagnostic: error.to_string(),
            });
        }

        self.ledger.record_alloc();
        Ok(RenderTarget { texture, view })
    }

    fn destroy_texture(&mut self, texture: &wgpu::Texture) {
        texture.destroy();
        self.ledger.record_release();
    }
}
