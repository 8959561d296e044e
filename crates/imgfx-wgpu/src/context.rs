//! Device context acquisition
//!
//! One [`GpuContext`] owns the wgpu device and queue for the lifetime of the
//! engine. Acquisition failure is fatal at construction and reported once as
//! [`EngineError::ContextUnavailable`]; a non-accelerated fallback renderer
//! is out of scope.

use crate::error::EngineError;

/// A wgpu device, its queue, and capability flags relevant to the engine
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    timestamps_supported: bool,
}

impl GpuContext {
    /// Acquires a high-performance adapter and device.
    ///
    /// Opts into `TIMESTAMP_QUERY` when the adapter offers it so per-pass
    /// device timing can use elapsed-time queries instead of host wall-clock.
    pub fn new() -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| EngineError::ContextUnavailable {
            reason: err.to_string(),
        })?;

        let timestamps_supported = adapter
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY);
        let required_features = if timestamps_supported {
            wgpu::Features::TIMESTAMP_QUERY
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: Default::default(),
        }))
        .map_err(|err| EngineError::ContextUnavailable {
            reason: err.to_string(),
        })?;

        tracing::info!(
            adapter = %adapter.get_info().name,
            timestamps_supported,
            "acquired device context"
        );

        Ok(Self {
            device,
            queue,
            timestamps_supported,
        })
    }

    /// Whether the device supports elapsed-time queries
    pub fn timestamps_supported(&self) -> bool {
        self.timestamps_supported
    }

    /// Nanoseconds per timestamp tick. Only meaningful when
    /// [`timestamps_supported`](Self::timestamps_supported) is true.
    pub fn timestamp_period_ns(&self) -> f32 {
        self.queue.get_timestamp_period()
    }
}
