//! Lux GPU - wgpu side of the ray tracer.
//!
//! Implements the scene synchronizer's [`lux_core::BufferBackend`] on wgpu
//! and runs the per-frame pipeline: trace into the write target, blend into
//! the accumulation target, present, draw the overlay.

mod accumulate;
mod backend;
mod context;
mod overlay;
mod pipeline;
mod renderer;
mod targets;
mod uniforms;

pub use accumulate::Accumulator;
pub use backend::WgpuBackend;
pub use context::GpuContext;
pub use overlay::{FpsCounter, Overlay, OverlayStats};
pub use pipeline::{tile_groups, TracePipeline, WORKGROUP_SIZE};
pub use renderer::Renderer;
pub use targets::{RenderTargets, Target, TARGET_FORMAT};
pub use uniforms::{FrameUniforms, FRAME_UNIFORMS_SIZE};
