//! Compiled program cache keyed by fragment source text
//!
//! The vertex stage (full-screen quad) and the bind group layout are fixed
//! and shared by every filter program. The first request for a fragment
//! source compiles and links it inside wgpu validation error scopes; later
//! requests return the cached pipeline. Compile or link failure is fatal for
//! that request, carries the device diagnostic text, and retains nothing in
//! the cache. Cache lifetime equals the device context lifetime; it is never
//! shared across independent contexts.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::registry::FULLSCREEN_VERTEX;

/// Color format used for every render target and the output surface
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct ProgramCache {
    vertex_module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    programs: HashMap<String, wgpu::RenderPipeline>,
}

impl ProgramCache {
    /// Compiles the shared vertex stage and builds the common layouts.
    pub fn new(device: &wgpu::Device) -> Result<Self, EngineError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fullscreen quad vertex"),
            source: wgpu::ShaderSource::Wgsl(FULLSCREEN_VERTEX.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::ShaderCompile {
                diagnostic: error.to_string(),
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter pass layout"),
            entries: &[
                // u_image
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // u_sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // u_resolution and filter parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter pass pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Ok(Self {
            vertex_module,
            bind_group_layout,
            pipeline_layout,
            programs: HashMap::new(),
        })
    }

    /// Returns the compiled program for a fragment source, compiling and
    /// linking it on first use.
    pub fn get(
        &mut self,
        device: &wgpu::Device,
        fragment_source: &str,
    ) -> Result<&wgpu::RenderPipeline, EngineError> {
        if !self.programs.contains_key(fragment_source) {
            let pipeline = self.compile(device, fragment_source)?;
            tracing::debug!(cached = self.programs.len() + 1, "compiled filter program");
            self.programs.insert(fragment_source.to_owned(), pipeline);
        }
        Ok(&self.programs[fragment_source])
    }

    /// Number of programs currently cached
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    fn compile(
        &self,
        device: &wgpu::Device,
        fragment_source: &str,
    ) -> Result<wgpu::RenderPipeline, EngineError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("filter fragment"),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::ShaderCompile {
                diagnostic: error.to_string(),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("filter pass"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex_module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::ProgramLink {
                diagnostic: error.to_string(),
            });
        }

        Ok(pipeline)
    }

    /// The bind group layout shared by all filter programs
    pub(crate) fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }
}
