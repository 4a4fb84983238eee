//! Buffer synchronization: keeps the flat scene buffers in step with the registry.
//!
//! Two paths run every frame, in order:
//!
//! - **Full rebuild** (only when the registry is dirty): mesh geometry is
//!   concatenated into one vertex and one index array, indices rebased by
//!   the vertex count at the time of the append, and one record per mesh is
//!   written with its index range. All three arrays come from the same pass.
//! - **Per-frame update**: only the transform of each mesh record is
//!   rewritten; every sphere record is re-flattened from its object.
//!
//! ```text
//! registry ──rebuild_meshes (dirty)──▶ mesh_objects / vertices / indices
//!          ──refresh (every frame)───▶ mesh_objects[..].local_to_world, spheres
//!                                        │
//!                                        ▼
//!                         ComputeBuffer::upload (reuse / realloc / release)
//! ```

use thiserror::Error;

use crate::buffer::{BufferBackend, BufferName, ComputeBuffer, UploadOutcome};
use crate::layout::{GpuMeshObject, GpuSphere, GpuVertex};
use crate::registry::{Entry, MeshRecord, ObjectHandle, ObjectRegistry};

/// Internal-consistency violations between the registry and the flat buffers.
///
/// None of these can happen when rebuilds run to completion; seeing one
/// means a frame would render stale geometry, so callers treat it as fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("registry lists {0} but holds no matching object")]
    UnknownObject(ObjectHandle),

    #[error("mesh object {0} has no record from the current rebuild")]
    MissingMeshRecord(ObjectHandle),

    #[error("mesh object {handle} record is from rebuild {record}, not {current}")]
    StaleMeshRecord {
        handle: ObjectHandle,
        record: u64,
        current: u64,
    },

    #[error("per-frame update requested while a mesh rebuild is pending")]
    PendingRebuild,

    #[error("mesh object {handle} references vertex {index} but has {vertex_count} vertices")]
    MeshIndexOutOfRange {
        handle: ObjectHandle,
        index: u32,
        vertex_count: usize,
    },

    #[error("mesh record {record} index range {start}..{end} exceeds {len} indices")]
    IndexRangeOutOfBounds {
        record: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("index {value} at position {position} exceeds vertex count {vertex_count}")]
    IndexOutOfRange {
        position: usize,
        value: u32,
        vertex_count: usize,
    },
}

/// CPU copies of the four flat buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatScene {
    pub spheres: Vec<GpuSphere>,
    pub mesh_objects: Vec<GpuMeshObject>,
    pub vertices: Vec<GpuVertex>,
    pub indices: Vec<u32>,
    rebuild: u64,
}

impl FlatScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of full rebuilds so far. Mesh records carry the value they were built with.
    pub fn rebuild_generation(&self) -> u64 {
        self.rebuild
    }

    /// Rebuild mesh records, vertices and indices if the registry is dirty.
    ///
    /// Returns `true` if a rebuild happened. Clears the dirty flag on success.
    pub fn rebuild_meshes(&mut self, registry: &mut ObjectRegistry) -> Result<bool, SyncError> {
        if !registry.is_dirty() {
            return Ok(false);
        }

        self.mesh_objects.clear();
        self.vertices.clear();
        self.indices.clear();
        self.rebuild += 1;
        let rebuild = self.rebuild;

        let handles = registry.meshes().to_vec();
        for handle in handles {
            let Some(Entry::Mesh { object, record }) = registry.entry_mut(handle) else {
                return Err(SyncError::UnknownObject(handle));
            };
            let mesh = object.mesh();

            if let Some(&index) = mesh
                .indices
                .iter()
                .find(|&&i| i as usize >= mesh.vertex_count())
            {
                return Err(SyncError::MeshIndexOutOfRange {
                    handle,
                    index,
                    vertex_count: mesh.vertex_count(),
                });
            }

            // Indices are rebased by the vertex count before this mesh is appended
            let first_vertex = self.vertices.len() as u32;
            let first_index = self.indices.len() as u32;
            self.vertices.extend(mesh.positions.iter().map(|p| p.to_array()));
            self.indices.extend(mesh.indices.iter().map(|&i| i + first_vertex));

            let material = object.material.clamped();
            let gpu = GpuMeshObject::new(
                object.local_to_world(),
                first_index,
                mesh.indices.len() as u32,
                material.albedo,
                material.specular,
            );
            *record = Some(MeshRecord { gpu, rebuild });
            self.mesh_objects.push(gpu);
        }

        self.validate()?;
        registry.clear_dirty();

        log::debug!(
            "Rebuilt mesh buffers #{}: {} objects, {} vertices, {} indices",
            rebuild,
            self.mesh_objects.len(),
            self.vertices.len(),
            self.indices.len()
        );
        Ok(true)
    }

    /// Per-frame update: mesh transforms and all sphere records.
    ///
    /// Returns `true` if any record differs from the previous frame.
    pub fn refresh(&mut self, registry: &mut ObjectRegistry) -> Result<bool, SyncError> {
        if registry.is_dirty() {
            return Err(SyncError::PendingRebuild);
        }

        let mut changed = false;
        let current = self.rebuild;

        for slot in 0..registry.mesh_count() {
            let handle = registry.meshes()[slot];
            let record = match registry.entry_mut(handle) {
                Some(Entry::Mesh {
                    object,
                    record: Some(record),
                }) => {
                    if record.rebuild != current {
                        return Err(SyncError::StaleMeshRecord {
                            handle,
                            record: record.rebuild,
                            current,
                        });
                    }
                    let local_to_world = object.local_to_world().to_cols_array_2d();
                    if record.gpu.local_to_world != local_to_world {
                        record.gpu.local_to_world = local_to_world;
                        changed = true;
                    }
                    record.gpu
                }
                Some(Entry::Mesh { record: None, .. }) => {
                    return Err(SyncError::MissingMeshRecord(handle))
                }
                _ => return Err(SyncError::UnknownObject(handle)),
            };

            let flat = self
                .mesh_objects
                .get_mut(slot)
                .ok_or(SyncError::MissingMeshRecord(handle))?;
            *flat = record;
        }

        if self.spheres.len() != registry.point_count() {
            self.spheres.resize(registry.point_count(), GpuSphere::default());
            changed = true;
        }

        for slot in 0..registry.point_count() {
            let handle = registry.points()[slot];
            let Some(Entry::Point { object, record }) = registry.entry_mut(handle) else {
                return Err(SyncError::UnknownObject(handle));
            };
            *record = object.to_gpu();

            if self.spheres[slot] != *record {
                self.spheres[slot] = *record;
                changed = true;
            }
        }

        Ok(changed)
    }

    /// Check that every mesh record and index stays inside the current arrays.
    pub fn validate(&self) -> Result<(), SyncError> {
        for (i, object) in self.mesh_objects.iter().enumerate() {
            let range = object.index_range();
            if range.end > self.indices.len() {
                return Err(SyncError::IndexRangeOutOfBounds {
                    record: i,
                    start: range.start,
                    end: range.end,
                    len: self.indices.len(),
                });
            }
        }

        if let Some((position, &value)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, &value)| value as usize >= self.vertices.len())
        {
            return Err(SyncError::IndexOutOfRange {
                position,
                value,
                vertex_count: self.vertices.len(),
            });
        }

        Ok(())
    }
}

/// Summary of one synchronization step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// A full mesh rebuild ran this frame
    pub rebuilt: bool,
    /// Some record differs from the previous frame
    pub changed: bool,
    pub spheres: usize,
    pub mesh_objects: usize,
    pub vertices: usize,
    pub indices: usize,
}

/// The flat scene plus the GPU buffers it is uploaded to.
///
/// Owns the buffers exclusively; the render pipeline only borrows them
/// through [`SceneBuffers::bindings`] for the duration of a dispatch.
#[derive(Debug)]
pub struct SceneBuffers<Buf> {
    flat: FlatScene,
    spheres: ComputeBuffer<Buf>,
    mesh_objects: ComputeBuffer<Buf>,
    vertices: ComputeBuffer<Buf>,
    indices: ComputeBuffer<Buf>,
}

impl<Buf> Default for SceneBuffers<Buf> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Buf> SceneBuffers<Buf> {
    pub fn new() -> Self {
        Self {
            flat: FlatScene::new(),
            spheres: ComputeBuffer::new(BufferName::Spheres),
            mesh_objects: ComputeBuffer::new(BufferName::MeshObjects),
            vertices: ComputeBuffer::new(BufferName::Vertices),
            indices: ComputeBuffer::new(BufferName::Indices),
        }
    }

    /// Bring the buffers in line with `registry`: rebuild if dirty, then the per-frame update.
    pub fn sync<B>(
        &mut self,
        registry: &mut ObjectRegistry,
        backend: &B,
    ) -> Result<SyncReport, SyncError>
    where
        B: BufferBackend<Buffer = Buf>,
    {
        let rebuilt = self.flat.rebuild_meshes(registry)?;
        if rebuilt {
            self.vertices.upload(backend, &self.flat.vertices);
            self.indices.upload(backend, &self.flat.indices);
        }

        let changed = self.flat.refresh(registry)? || rebuilt;
        if changed {
            let meshes = self.mesh_objects.upload(backend, &self.flat.mesh_objects);
            let spheres = self.spheres.upload(backend, &self.flat.spheres);
            if meshes == UploadOutcome::Created || spheres == UploadOutcome::Created {
                log::trace!(
                    "Scene buffers resized: {} spheres, {} mesh objects",
                    self.flat.spheres.len(),
                    self.flat.mesh_objects.len()
                );
            }
        }

        Ok(SyncReport {
            rebuilt,
            changed,
            spheres: self.flat.spheres.len(),
            mesh_objects: self.flat.mesh_objects.len(),
            vertices: self.flat.vertices.len(),
            indices: self.flat.indices.len(),
        })
    }

    /// CPU copy of the last synchronized data.
    pub fn flat(&self) -> &FlatScene {
        &self.flat
    }

    pub fn compute_buffer(&self, name: BufferName) -> &ComputeBuffer<Buf> {
        match name {
            BufferName::Spheres => &self.spheres,
            BufferName::MeshObjects => &self.mesh_objects,
            BufferName::Vertices => &self.vertices,
            BufferName::Indices => &self.indices,
        }
    }

    /// The live buffer for `name`, or `None` if there is no data of that kind.
    pub fn buffer(&self, name: BufferName) -> Option<&Buf> {
        self.compute_buffer(name).buffer()
    }

    /// Present buffers only; absent ones are simply not bound.
    pub fn bindings(&self) -> impl Iterator<Item = (BufferName, &Buf)> + '_ {
        BufferName::ALL
            .into_iter()
            .filter_map(move |name| self.buffer(name).map(|buffer| (name, buffer)))
    }

    /// Free every GPU buffer. The CPU copy is kept.
    pub fn release<B: BufferBackend<Buffer = Buf>>(&mut self, backend: &B) {
        self.spheres.release(backend);
        self.mesh_objects.release(backend);
        self.vertices.release(backend);
        self.indices.release(backend);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lux_math::{Quat, Vec3};

    use super::*;
    use crate::buffer::testing::RecordingBackend;
    use crate::mesh::Mesh;
    use crate::object::{Material, MeshPrimitive, PointPrimitive, Transform};

    fn sphere(x: f32, z: f32) -> PointPrimitive {
        PointPrimitive::new(Vec3::new(x, 1.0, z), 1.0, Material::default())
    }

    fn triangle() -> Arc<Mesh> {
        Arc::new(Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2]))
    }

    fn mesh_object(mesh: Arc<Mesh>, x: f32) -> MeshPrimitive {
        MeshPrimitive::new(
            mesh,
            Transform::from_translation(Vec3::new(x, 0.0, 0.0)),
            Material::default(),
        )
    }

    #[test]
    fn test_three_spheres_no_meshes() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        let a = registry.register(sphere(0.0, 0.0));
        let b = registry.register(sphere(5.0, 0.0));
        let c = registry.register(sphere(0.0, 5.0));

        let report = buffers.sync(&mut registry, &backend).unwrap();
        assert_eq!(report.spheres, 3);
        assert_eq!(buffers.compute_buffer(BufferName::Spheres).count(), 3);
        assert!(buffers.buffer(BufferName::MeshObjects).is_none());
        assert!(buffers.buffer(BufferName::Vertices).is_none());
        assert!(buffers.buffer(BufferName::Indices).is_none());
        assert_eq!(buffers.bindings().count(), 1);

        let before_a = *registry.point_record(a).unwrap();
        let before_c = *registry.point_record(c).unwrap();

        registry.unregister(b).unwrap();
        buffers.sync(&mut registry, &backend).unwrap();

        assert_eq!(buffers.compute_buffer(BufferName::Spheres).count(), 2);
        assert_eq!(buffers.flat().spheres, vec![before_a, before_c]);
        assert_eq!(before_a.position, [0.0, 1.0, 0.0]);
        assert_eq!(before_c.position, [0.0, 1.0, 5.0]);
    }

    #[test]
    fn test_index_rebasing() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        let cube = Arc::new(Mesh::cube());
        let first = registry.register(mesh_object(triangle(), 0.0));
        let second = registry.register(mesh_object(cube.clone(), 2.0));

        let report = buffers.sync(&mut registry, &backend).unwrap();
        assert!(report.rebuilt);
        assert!(!registry.is_dirty());

        let flat = buffers.flat();
        assert_eq!(flat.vertices.len(), 3 + 8);
        assert_eq!(flat.indices.len(), 3 + 36);
        assert!(flat.indices.iter().all(|&i| (i as usize) < flat.vertices.len()));

        let r0 = registry.mesh_record(first).unwrap();
        let r1 = registry.mesh_record(second).unwrap();
        assert_eq!((r0.indices_offset, r0.indices_count), (0, 3));
        assert_eq!((r1.indices_offset, r1.indices_count), (3, 36));

        // Each slice maps back to its own mesh once the base vertex is removed
        assert_eq!(&flat.indices[r0.index_range()], &[0, 1, 2]);
        let rebased: Vec<u32> = flat.indices[r1.index_range()].iter().map(|i| i - 3).collect();
        assert_eq!(rebased, cube.indices);
    }

    #[test]
    fn test_transform_update_keeps_topology() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        let handle = registry.register(mesh_object(Arc::new(Mesh::cube()), 0.0));
        buffers.sync(&mut registry, &backend).unwrap();
        let vertices = buffers.flat().vertices.clone();
        let indices = buffers.flat().indices.clone();
        let writes = backend.writes.borrow().len();
        let generation = buffers.flat().rebuild_generation();
        assert_eq!(generation, 1);

        let mesh = registry.mesh_mut(handle).unwrap();
        mesh.transform.translation = Vec3::new(1.0, 2.0, 3.0);
        mesh.transform.rotation = Quat::from_rotation_y(0.5);

        let report = buffers.sync(&mut registry, &backend).unwrap();
        assert!(!report.rebuilt);
        assert!(report.changed);
        assert!(!registry.is_dirty());
        assert_eq!(buffers.flat().vertices, vertices);
        assert_eq!(buffers.flat().indices, indices);
        assert_eq!(buffers.flat().rebuild_generation(), generation);

        // Only the mesh object buffer was written this time
        let new_writes: Vec<usize> = backend.writes.borrow()[writes..]
            .iter()
            .map(|(id, _)| *id)
            .collect();
        let mesh_id = backend
            .created
            .borrow()
            .iter()
            .find(|b| b.label == "mesh_objects")
            .unwrap()
            .id;
        assert_eq!(new_writes, vec![mesh_id]);

        let expected = registry.mesh_mut(handle).unwrap().local_to_world();
        let record = *registry.mesh_record(handle).unwrap();
        assert_eq!(record.local_to_world, expected.to_cols_array_2d());
        assert_eq!(buffers.flat().mesh_objects[0], *registry.mesh_record(handle).unwrap());
    }

    #[test]
    fn test_unchanged_frame_uploads_nothing() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        registry.register(sphere(0.0, 0.0));
        registry.register(mesh_object(triangle(), 0.0));
        buffers.sync(&mut registry, &backend).unwrap();
        let writes = backend.writes.borrow().len();

        let report = buffers.sync(&mut registry, &backend).unwrap();
        assert!(!report.rebuilt);
        assert!(!report.changed);
        assert_eq!(backend.writes.borrow().len(), writes);
    }

    #[test]
    fn test_point_edits_reflattened() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        let handle = registry.register(sphere(0.0, 0.0));
        buffers.sync(&mut registry, &backend).unwrap();

        let point = registry.point_mut(handle).unwrap();
        point.position = Vec3::new(3.0, 2.0, 1.0);
        point.radius = 2.0;
        point.material.albedo = Vec3::new(1.5, 0.5, -0.5);

        let report = buffers.sync(&mut registry, &backend).unwrap();
        assert!(report.changed);
        assert!(!registry.is_dirty(), "point edits never trigger a rebuild");
        assert_eq!(buffers.flat().spheres[0].position, [3.0, 2.0, 1.0]);
        assert_eq!(buffers.flat().spheres[0].radius, 2.0);
        // Out of range colors never reach the sphere record
        assert_eq!(buffers.flat().spheres[0].albedo, [1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_register_unregister_symmetry() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        registry.register(sphere(0.0, 0.0));
        registry.register(mesh_object(triangle(), 0.0));
        buffers.sync(&mut registry, &backend).unwrap();
        let before = buffers.flat().clone();

        let point = registry.register(sphere(9.0, 9.0));
        let mesh = registry.register(mesh_object(Arc::new(Mesh::cube()), 4.0));
        buffers.sync(&mut registry, &backend).unwrap();
        registry.unregister(point).unwrap();
        registry.unregister(mesh).unwrap();
        buffers.sync(&mut registry, &backend).unwrap();

        let after = buffers.flat();
        assert_eq!(after.spheres, before.spheres);
        assert_eq!(after.mesh_objects, before.mesh_objects);
        assert_eq!(after.vertices, before.vertices);
        assert_eq!(after.indices, before.indices);
        for name in BufferName::ALL {
            let expected = match name {
                BufferName::Spheres => before.spheres.len(),
                BufferName::MeshObjects => before.mesh_objects.len(),
                BufferName::Vertices => before.vertices.len(),
                BufferName::Indices => before.indices.len(),
            };
            assert_eq!(buffers.compute_buffer(name).count(), expected, "{name}");
        }
    }

    #[test]
    fn test_removal_rebases_remaining_meshes() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        let first = registry.register(mesh_object(triangle(), 0.0));
        let second = registry.register(mesh_object(Arc::new(Mesh::cube()), 2.0));
        buffers.sync(&mut registry, &backend).unwrap();

        registry.unregister(first).unwrap();
        let report = buffers.sync(&mut registry, &backend).unwrap();

        assert!(report.rebuilt);
        let record = registry.mesh_record(second).unwrap();
        assert_eq!(record.indices_offset, 0);
        assert_eq!(buffers.flat().vertices.len(), 8);
        assert_eq!(buffers.flat().indices.iter().max(), Some(&7));
    }

    #[test]
    fn test_last_mesh_removed_releases_buffers() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        let handle = registry.register(mesh_object(triangle(), 0.0));
        buffers.sync(&mut registry, &backend).unwrap();
        assert_eq!(buffers.bindings().count(), 3);

        registry.unregister(handle).unwrap();
        buffers.sync(&mut registry, &backend).unwrap();

        assert_eq!(buffers.bindings().count(), 0);
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn test_refresh_before_rebuild_is_error() {
        let mut registry = ObjectRegistry::new();
        registry.register(mesh_object(triangle(), 0.0));

        let mut flat = FlatScene::new();
        assert_eq!(flat.refresh(&mut registry), Err(SyncError::PendingRebuild));
    }

    #[test]
    fn test_stale_record_detected() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.register(mesh_object(triangle(), 0.0));

        let mut built = FlatScene::new();
        built.rebuild_meshes(&mut registry).unwrap();

        // Records now point into `built`; a scene from another rebuild must refuse them
        let mut other = FlatScene::new();
        assert_eq!(
            other.refresh(&mut registry),
            Err(SyncError::StaleMeshRecord {
                handle,
                record: 1,
                current: 0
            })
        );
    }

    #[test]
    fn test_bad_mesh_indices_rejected() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.register(mesh_object(
            Arc::new(Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 3])),
            0.0,
        ));

        let mut flat = FlatScene::new();
        assert_eq!(
            flat.rebuild_meshes(&mut registry),
            Err(SyncError::MeshIndexOutOfRange {
                handle,
                index: 3,
                vertex_count: 3
            })
        );
        assert!(registry.is_dirty(), "failed rebuild leaves the flag set");
    }

    #[test]
    fn test_validate_catches_bad_range() {
        let mut flat = FlatScene::new();
        flat.vertices = vec![[0.0; 3]; 3];
        flat.indices = vec![0, 1, 2];
        flat.mesh_objects = vec![GpuMeshObject::new(
            lux_math::Mat4::IDENTITY,
            1,
            3,
            Vec3::ONE,
            Vec3::ZERO,
        )];

        assert!(matches!(
            flat.validate(),
            Err(SyncError::IndexRangeOutOfBounds { end: 4, len: 3, .. })
        ));
    }

    #[test]
    fn test_release_frees_everything() {
        let backend = RecordingBackend::default();
        let mut registry = ObjectRegistry::new();
        let mut buffers = SceneBuffers::new();

        registry.register(sphere(0.0, 0.0));
        registry.register(mesh_object(triangle(), 0.0));
        buffers.sync(&mut registry, &backend).unwrap();
        assert_eq!(backend.live(), 4);

        buffers.release(&backend);
        assert_eq!(backend.live(), 0);
        assert_eq!(buffers.bindings().count(), 0);
    }
}
