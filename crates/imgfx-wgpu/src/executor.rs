//! Multi-pass pipeline execution
//!
//! The executor renders the enabled filters in sequence over the ping-pong
//! target pair: pass `i + 1` always consumes pass `i`'s output, because
//! filters are not generally commutative (blur then sharpen differs from
//! sharpen then blur), and the final pass always renders to the output
//! surface. A run moves through upload, rendering, and flush phases and
//! terminates as encoded or failed; a failed run never yields a partial
//! image.
//!
//! Runs are serialized by `&mut self`: a run cannot begin until the previous
//! run has released its resources, since all runs share the program cache
//! and the two-render-target budget.

use std::collections::BTreeMap;
use std::time::Instant;

use bytes::Bytes;

use crate::context::GpuContext;
use crate::encode;
use crate::error::EngineError;
use crate::filter::{FilterKind, FilterSpec, PipelineDescriptor};
use crate::program_cache::ProgramCache;
use crate::registry::{self, ShaderEntry};
use crate::resources::{AllocationLedger, ResourceManager, RunResources, SourceImage};
use crate::telemetry::{ProcessingResult, estimated_memory_mib};

/// One pass with its program and uniform data resolved, ready to record
struct PreparedPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
}

/// The multi-pass filter engine: one device context, a program cache shared
/// across runs, and per-run resources
pub struct FilterEngine {
    context: GpuContext,
    programs: ProgramCache,
    resources: ResourceManager,
    sampler: wgpu::Sampler,
}

impl FilterEngine {
    /// Acquires a device context and builds the engine.
    pub fn new() -> Result<Self, EngineError> {
        Self::with_context(GpuContext::new()?)
    }

    /// Builds the engine on an existing context.
    pub fn with_context(context: GpuContext) -> Result<Self, EngineError> {
        let programs = ProgramCache::new(&context.device)?;
        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filter sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            context,
            programs,
            resources: ResourceManager::new(),
            sampler,
        })
    }

    /// Runs the enabled filters of `pipeline` over `source`, producing a
    /// PNG-encoded frame at `width` x `height` plus telemetry.
    ///
    /// The output resolution is taken as given; the engine never resizes
    /// beyond it. An empty enabled set reproduces the source through the
    /// identity program. All resources allocated for the run are released on
    /// every exit path.
    pub fn process(
        &mut self,
        source: &SourceImage,
        pipeline: &PipelineDescriptor,
        width: u32,
        height: u32,
    ) -> ProcessingResult {
        let run_start = Instant::now();
        let enabled = pipeline.enabled_filters();
        let estimate = estimated_memory_mib(width, height, enabled.len());

        tracing::debug!(phase = "uploading", width, height, "beginning run");
        let mut run = match self.resources.begin_run(
            &self.context.device,
            &self.context.queue,
            source,
            width,
            height,
        ) {
            Ok(run) => run,
            Err(err) => {
                tracing::warn!(error = %err, "run failed before rendering");
                return ProcessingResult::failed(&err, elapsed_ms(run_start), estimate);
            }
        };

        let outcome = self.execute(&mut run, &enabled, width, height);
        // Release runs on every exit path; device memory is explicitly managed.
        self.resources.end_run(run);

        match outcome {
            Ok((encoded_image, device_time_ms)) => {
                let total_time_ms = elapsed_ms(run_start);
                tracing::info!(
                    passes = enabled.len(),
                    device_time_ms,
                    total_time_ms,
                    "run complete"
                );
                ProcessingResult::completed(encoded_image, device_time_ms, total_time_ms, estimate)
            }
            Err(err) => {
                tracing::warn!(error = %err, "run failed");
                ProcessingResult::failed(&err, elapsed_ms(run_start), estimate)
            }
        }
    }

    /// The shared device context
    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Allocation ledger across all runs of this engine
    pub fn allocation_ledger(&self) -> &AllocationLedger {
        self.resources.ledger()
    }

    /// Number of compiled programs currently cached
    pub fn cached_programs(&self) -> usize {
        self.programs.len()
    }

    fn execute(
        &mut self,
        run: &mut RunResources,
        enabled: &[&FilterSpec],
        width: u32,
        height: u32,
    ) -> Result<(Bytes, f64), EngineError> {
        // Resolve programs and pack uniforms up front; compile failures abort
        // before any draw is issued.
        let no_params = BTreeMap::new();
        let pass_specs: Vec<(&'static ShaderEntry, &BTreeMap<String, f32>)> = if enabled.is_empty()
        {
            vec![(registry::entry(FilterKind::Identity), &no_params)]
        } else {
            enabled
                .iter()
                .map(|spec| (registry::resolve(&spec.kind), &spec.parameters))
                .collect()
        };

        let mut prepared = Vec::with_capacity(pass_specs.len());
        for &(entry, params) in &pass_specs {
            let pipeline = self
                .programs
                .get(&self.context.device, entry.fragment_source)?
                .clone();
            let data = registry::pack_uniforms(entry, width, height, params);
            let uniforms = self.resources.create_buffer(
                &self.context.device,
                run,
                "pass uniforms",
                data.len() as u64,
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            );
            self.context.queue.write_buffer(&uniforms, 0, &data);
            prepared.push(PreparedPass {
                label: entry.kind.name(),
                pipeline,
                uniforms,
            });
        }

        let pass_count = prepared.len() as u32;

        // Per-pass elapsed-time queries when the device offers them; the
        // wall-clock fallback is measured around the flush below.
        let timing = if self.context.timestamps_supported() {
            let query_set = self.context.device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("pass timing"),
                ty: wgpu::QueryType::Timestamp,
                count: pass_count * 2,
            });
            let size = u64::from(pass_count) * 2 * size_of::<u64>() as u64;
            let resolve = self.resources.create_buffer(
                &self.context.device,
                run,
                "timing resolve",
                size,
                wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            );
            let readback = self.resources.create_buffer(
                &self.context.device,
                run,
                "timing readback",
                size,
                wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            );
            Some((query_set, resolve, readback))
        } else {
            None
        };

        let padded_bpr = encode::align_bytes_per_row(width * 4);
        let staging = self.resources.create_buffer(
            &self.context.device,
            run,
            "frame staging",
            u64::from(padded_bpr) * u64::from(height),
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        );

        tracing::debug!(phase = "rendering", passes = prepared.len(), "recording passes");
        let device = &self.context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("filter pipeline"),
        });

        let mut current_view = &run.input_view;
        let mut cur = 0usize;
        let last_index = prepared.len() - 1;

        for (i, pass) in prepared.iter().enumerate() {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(pass.label),
                layout: self.programs.bind_group_layout(),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(current_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: pass.uniforms.as_entire_binding(),
                    },
                ],
            });

            let is_last = i == last_index;
            // Only the final pass renders to the output surface.
            let target_view = if is_last {
                &run.surface.view
            } else {
                &run.targets[cur].view
            };

            let timestamp_writes =
                timing
                    .as_ref()
                    .map(|(query_set, _, _)| wgpu::RenderPassTimestampWrites {
                        query_set,
                        beginning_of_pass_write_index: Some(i as u32 * 2),
                        end_of_pass_write_index: Some(i as u32 * 2 + 1),
                    });

            {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(pass.label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes,
                    occlusion_query_set: None,
                });
                rpass.set_pipeline(&pass.pipeline);
                rpass.set_bind_group(0, &bind_group, &[]);
                rpass.draw(0..6, 0..1);
            }

            // Pass i+1 consumes pass i's output; toggle the ping-pong index.
            if !is_last {
                current_view = &run.targets[cur].view;
                cur ^= 1;
            }
        }

        if let Some((query_set, resolve, readback)) = &timing {
            encoder.resolve_query_set(query_set, 0..pass_count * 2, resolve, 0);
            encoder.copy_buffer_to_buffer(
                resolve,
                0,
                readback,
                0,
                u64::from(pass_count) * 2 * size_of::<u64>() as u64,
            );
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &run.surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        // Full device flush before read-back; reading earlier could observe a
        // partially rendered frame.
        tracing::debug!(phase = "flushing", "submitting and awaiting device");
        let flush_start = Instant::now();
        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| EngineError::Readback(err.to_string()))?;
        let flush_ms = elapsed_ms(flush_start);

        let device_time_ms = match &timing {
            Some((_, _, readback)) => {
                let ticks = encode::read_timestamps(&self.context.device, readback)?;
                let period_ns = f64::from(self.context.timestamp_period_ns());
                let total_ns: f64 = ticks
                    .chunks_exact(2)
                    .map(|pair| pair[1].saturating_sub(pair[0]) as f64 * period_ns)
                    .sum();
                let ms = total_ns / 1_000_000.0;
                // Some tick sources are too coarse to see short passes.
                if ms > 0.0 { ms } else { flush_ms }
            }
            None => flush_ms,
        };

        let pixels = encode::read_pixels_tight(&self.context.device, &staging, width, height)?;
        let encoded = encode::encode_png(pixels, width, height)?;

        Ok((encoded, device_time_ms))
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
