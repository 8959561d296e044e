//! GPU multi-pass image filter engine built on wgpu
//!
//! This crate renders an ordered list of image filters over a source image
//! using a fixed pair of reusable off-screen render targets (ping-pong
//! buffering), then reads back and encodes the final frame together with
//! timing and memory telemetry.
//!
//! The engine receives already-decoded RGBA pixel data and already-validated
//! numeric parameters; image loading, UI, and batch orchestration live with
//! the caller.

mod context;
mod encode;
mod error;
mod executor;
mod filter;
mod program_cache;
mod resources;
mod telemetry;

pub mod registry;

pub use context::GpuContext;
pub use error::EngineError;
pub use executor::FilterEngine;
pub use filter::{FilterKind, FilterSpec, PipelineDescriptor};
pub use program_cache::ProgramCache;
pub use resources::{AllocationLedger, RenderTarget, ResourceManager, RunResources, SourceImage};
pub use telemetry::{ProcessingResult, estimated_memory_mib};
