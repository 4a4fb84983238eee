//! Renderable scene objects.
//!
//! A scene object is either a point primitive (a sphere described entirely
//! by its fields) or a mesh primitive (shared geometry plus a transform).

use std::sync::Arc;

use lux_math::{Mat4, Quat, Vec3};

use crate::layout::GpuSphere;
use crate::mesh::Mesh;

/// Surface response consumed by the kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Diffuse reflectance (RGB, 0-1)
    pub albedo: Vec3,

    /// Specular reflectance (RGB, 0-1)
    pub specular: Vec3,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            specular: Vec3::splat(0.04),
        }
    }
}

impl Material {
    /// Create a material, clamping both colors to [0, 1].
    pub fn new(albedo: Vec3, specular: Vec3) -> Self {
        Self {
            albedo: albedo.clamp(Vec3::ZERO, Vec3::ONE),
            specular: specular.clamp(Vec3::ZERO, Vec3::ONE),
        }
    }

    /// Dielectric: colored albedo, uniform low specular.
    pub fn diffuse(color: Vec3, specular: f32) -> Self {
        Self::new(color, Vec3::splat(specular))
    }

    /// Metal: no diffuse term, the color tints the reflection.
    pub fn metal(color: Vec3) -> Self {
        Self::new(Vec3::ZERO, color)
    }

    /// Copy with both colors clamped to [0, 1]. Fields are public, so
    /// flattening goes through this.
    pub fn clamped(&self) -> Self {
        Self::new(self.albedo, self.specular)
    }
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation
    pub translation: Vec3,

    /// Rotation (as quaternion)
    pub rotation: Quat,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A sphere fully described by its own fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointPrimitive {
    pub position: Vec3,
    pub radius: f32,
    pub material: Material,
}

impl PointPrimitive {
    pub fn new(position: Vec3, radius: f32, material: Material) -> Self {
        Self {
            position,
            radius: radius.max(0.0),
            material,
        }
    }

    /// Flatten into the kernel's sphere record.
    pub fn to_gpu(&self) -> GpuSphere {
        let material = self.material.clamped();
        GpuSphere {
            position: self.position.to_array(),
            radius: self.radius.max(0.0),
            albedo: material.albedo.to_array(),
            specular: material.specular.to_array(),
        }
    }
}

/// Externally built geometry placed in the world by a transform.
///
/// The geometry is fixed once the primitive exists; only the transform
/// (and material) may change. Material edits are picked up on the next
/// full rebuild, transform edits every frame.
#[derive(Clone, Debug)]
pub struct MeshPrimitive {
    mesh: Arc<Mesh>,
    pub transform: Transform,
    pub material: Material,
}

impl MeshPrimitive {
    pub fn new(mesh: Arc<Mesh>, transform: Transform, material: Material) -> Self {
        Self {
            mesh,
            transform,
            material,
        }
    }

    /// Shared geometry.
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Current local → world matrix.
    pub fn local_to_world(&self) -> Mat4 {
        self.transform.to_matrix()
    }
}

/// Which collection an object lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Point,
    Mesh,
}

/// A renderable object handed to the registry.
#[derive(Clone, Debug)]
pub enum SceneObject {
    Point(PointPrimitive),
    Mesh(MeshPrimitive),
}

impl SceneObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            SceneObject::Point(_) => ObjectKind::Point,
            SceneObject::Mesh(_) => ObjectKind::Mesh,
        }
    }

    pub fn material(&self) -> &Material {
        match self {
            SceneObject::Point(point) => &point.material,
            SceneObject::Mesh(mesh) => &mesh.material,
        }
    }
}

impl From<PointPrimitive> for SceneObject {
    fn from(point: PointPrimitive) -> Self {
        SceneObject::Point(point)
    }
}

impl From<MeshPrimitive> for SceneObject {
    fn from(mesh: MeshPrimitive) -> Self {
        SceneObject::Mesh(mesh)
    }
}
