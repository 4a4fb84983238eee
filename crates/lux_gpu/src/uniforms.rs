//! Per-frame uniform block shared with the ray-tracing kernel.

use bytemuck::{Pod, Zeroable};
use lux_math::{Camera, Vec3};

/// Uniform block at binding 0. Field order matches `FrameUniforms` in `raytrace.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Camera → world
    pub camera_to_world: [[f32; 4]; 4],
    /// Clip → camera
    pub inverse_projection: [[f32; 4]; 4],
    /// Light travel direction (xyz) and intensity (w)
    pub light: [f32; 4],
    /// Sub-pixel sample position in [0, 1)
    pub pixel_offset: [f32; 2],
    /// Random seed for this frame, in [0, 1)
    pub seed: f32,
    pub sphere_count: u32,
    pub mesh_count: u32,
    pub max_bounces: u32,
    pub _padding: [u32; 2],
}

pub const FRAME_UNIFORMS_SIZE: usize = 176;

const _: () = assert!(std::mem::size_of::<FrameUniforms>() == FRAME_UNIFORMS_SIZE);

impl FrameUniforms {
    /// Everything except the sampling parameters, taken from the camera and light.
    pub fn new(camera: &Camera, light_direction: Vec3, light_intensity: f32) -> Self {
        Self {
            camera_to_world: camera.camera_to_world().to_cols_array_2d(),
            inverse_projection: camera.inverse_projection().to_cols_array_2d(),
            light: light_direction.normalize_or_zero().extend(light_intensity).to_array(),
            pixel_offset: [0.5, 0.5],
            seed: 0.0,
            sphere_count: 0,
            mesh_count: 0,
            max_bounces: 1,
            _padding: [0; 2],
        }
    }

    pub fn with_sampling(mut self, pixel_offset: [f32; 2], seed: f32) -> Self {
        self.pixel_offset = pixel_offset;
        self.seed = seed;
        self
    }

    pub fn with_counts(mut self, sphere_count: usize, mesh_count: usize) -> Self {
        self.sphere_count = sphere_count as u32;
        self.mesh_count = mesh_count as u32;
        self
    }

    pub fn with_max_bounces(mut self, max_bounces: u32) -> Self {
        self.max_bounces = max_bounces.max(1);
        self
    }
}
