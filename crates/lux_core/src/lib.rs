//! Lux Core - scene bookkeeping for the GPU ray tracer.
//!
//! This crate provides:
//!
//! - **Object registry**: point and mesh primitives behind generational handles
//! - **Sphere placement**: seeded, non-overlapping sphere layouts
//! - **Buffer synchronization**: flat sphere/mesh/vertex/index buffers kept in
//!   step with the registry, uploaded through a [`BufferBackend`]
//! - **Scene config**: JSON scene files, meshes and skyboxes
//!
//! # Example
//!
//! ```ignore
//! use lux_core::{place_spheres, ObjectRegistry, PlacementConfig, SceneBuffers};
//!
//! let mut registry = ObjectRegistry::new();
//! let placement = place_spheres(&PlacementConfig::default())?;
//! placement.register_all(&mut registry);
//!
//! // Once per frame, after lifecycle events
//! let report = buffers.sync(&mut registry, &backend)?;
//! println!("{} spheres, {} mesh objects", report.spheres, report.mesh_objects);
//! ```

pub mod buffer;
pub mod config;
pub mod layout;
pub mod mesh;
pub mod object;
pub mod placement;
pub mod registry;
pub mod skybox;
pub mod sync;

// Re-export commonly used types
pub use buffer::{BufferBackend, BufferName, ComputeBuffer, UploadOutcome};
pub use config::{AccumulationMode, ConfigError, MeshSource, MeshSpec, SceneConfig};
pub use layout::{GpuMeshObject, GpuSphere, GpuVertex};
pub use mesh::{Mesh, MeshError};
pub use object::{Material, MeshPrimitive, ObjectKind, PointPrimitive, SceneObject, Transform};
pub use placement::{place_spheres, Placement, PlacementConfig, PlacementError};
pub use registry::{ObjectHandle, ObjectRegistry, RegistryError, SceneObjectRef};
pub use skybox::{Skybox, SkyboxError};
pub use sync::{FlatScene, SceneBuffers, SyncError, SyncReport};
