//! Fixed-stride records shared with the ray-tracing kernel.
//!
//! Every struct here is `#[repr(C)]` + `Pod` and mirrors a WGSL struct in
//! `lux_gpu/src/shaders/raytrace.wgsl`. Vectors are stored as `[f32; 3]` so
//! the WGSL side can use `array<f32, 3>` and keep a tight 4-byte alignment.

use bytemuck::{Pod, Zeroable};
use lux_math::{Mat4, Vec3};

/// One point primitive (sphere). 40 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub position: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
}

/// One mesh primitive: transform, index range and material. 96 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuMeshObject {
    pub local_to_world: [[f32; 4]; 4],
    pub indices_offset: u32,
    pub indices_count: u32,
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
}

/// One vertex position. 12 bytes.
pub type GpuVertex = [f32; 3];

/// One triangle index. 4 bytes.
pub type GpuIndex = u32;

pub const SPHERE_STRIDE: usize = 40;
pub const MESH_OBJECT_STRIDE: usize = 96;
pub const VERTEX_STRIDE: usize = 12;
pub const INDEX_STRIDE: usize = 4;

const _: () = assert!(std::mem::size_of::<GpuSphere>() == SPHERE_STRIDE);
const _: () = assert!(std::mem::size_of::<GpuMeshObject>() == MESH_OBJECT_STRIDE);
const _: () = assert!(std::mem::size_of::<GpuVertex>() == VERTEX_STRIDE);
const _: () = assert!(std::mem::size_of::<GpuIndex>() == INDEX_STRIDE);

impl GpuMeshObject {
    pub fn new(
        local_to_world: Mat4,
        indices_offset: u32,
        indices_count: u32,
        albedo: Vec3,
        specular: Vec3,
    ) -> Self {
        Self {
            local_to_world: local_to_world.to_cols_array_2d(),
            indices_offset,
            indices_count,
            albedo: albedo.to_array(),
            specular: specular.to_array(),
        }
    }

    /// Index range `offset..offset + count` into the shared index array.
    pub fn index_range(&self) -> std::ops::Range<usize> {
        let start = self.indices_offset as usize;
        start..start + self.indices_count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_object_bytes() {
        let record = GpuMeshObject::new(Mat4::IDENTITY, 6, 36, Vec3::ONE, Vec3::ZERO);
        let bytes = bytemuck::bytes_of(&record);

        assert_eq!(bytes.len(), MESH_OBJECT_STRIDE);
        // indices_offset sits right after the 4x4 matrix
        assert_eq!(u32::from_ne_bytes(bytes[64..68].try_into().unwrap()), 6);
        assert_eq!(u32::from_ne_bytes(bytes[68..72].try_into().unwrap()), 36);
        assert_eq!(record.index_range(), 6..42);
    }

    #[test]
    fn test_sphere_field_offsets() {
        let sphere = GpuSphere {
            position: [1.0, 2.0, 3.0],
            radius: 4.0,
            albedo: [0.5; 3],
            specular: [0.25; 3],
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&sphere));

        assert_eq!(floats.len(), SPHERE_STRIDE / 4);
        assert_eq!(floats[3], 4.0);
        assert_eq!(floats[4], 0.5);
        assert_eq!(floats[7], 0.25);
    }
}
