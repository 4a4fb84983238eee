//! Mesh geometry shared by mesh primitives.
//!
//! A `Mesh` is plain CPU data: vertex positions plus a triangle index list.
//! Mesh primitives hold it behind an `Arc` and never mutate it, so the
//! synchronizer only has to re-read geometry when mesh membership changes.

use std::path::Path;

use lux_math::Vec3;
use thiserror::Error;

/// Errors that can occur while building mesh geometry.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("OBJ load error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("No models found in OBJ file {0}")]
    NoModels(String),
}

/// A triangle mesh: vertex positions and indices (every 3 indices form a triangle).
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Triangle indices into `positions`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// Unit cube centred on the origin (edge length 1).
    pub fn cube() -> Self {
        let positions = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];

        #[rustfmt::skip]
        let indices = vec![
            // -Z
            0, 2, 1, 0, 3, 2,
            // +Z
            4, 5, 6, 4, 6, 7,
            // -X
            0, 4, 7, 0, 7, 3,
            // +X
            1, 2, 6, 1, 6, 5,
            // -Y
            0, 1, 5, 0, 5, 4,
            // +Y
            3, 7, 6, 3, 6, 2,
        ];

        Self::new(positions, indices)
    }

    /// Load an OBJ file, merging all of its models into one mesh.
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )?;

        if models.is_empty() {
            return Err(MeshError::NoModels(path.display().to_string()));
        }

        let mut positions = Vec::new();
        let mut indices = Vec::new();

        for model in &models {
            let first_vertex = positions.len() as u32;
            positions.extend(
                model
                    .mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2])),
            );
            indices.extend(model.mesh.indices.iter().map(|&i| i + first_vertex));
        }

        log::info!(
            "Loaded {}: {} models, {} vertices, {} triangles",
            path.display(),
            models.len(),
            positions.len(),
            indices.len() / 3
        );

        Ok(Self::new(positions, indices))
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}
