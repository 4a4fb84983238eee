//! Object registry: the set of currently registered scene objects.
//!
//! Objects live in an arena addressed by generational [`ObjectHandle`]s.
//! Two ordered handle lists (points, meshes) keep registration order, which
//! is the order records appear in the flat GPU buffers. A single dirty flag
//! tracks mesh membership changes; only the synchronizer clears it.

use thiserror::Error;

use crate::layout::{GpuMeshObject, GpuSphere};
use crate::object::{MeshPrimitive, ObjectKind, PointPrimitive, SceneObject};

/// Errors raised by registry operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown or stale object handle {0}")]
    UnknownHandle(ObjectHandle),
}

/// Stable small-integer handle issued at registration.
///
/// The generation changes every time a slot is reused, so a handle kept
/// after `unregister` never aliases a newer object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    /// Arena slot of this handle.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Mesh record as written by a full rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MeshRecord {
    pub gpu: GpuMeshObject,
    /// Rebuild generation whose vertex/index arrays `gpu` indexes into.
    pub rebuild: u64,
}

#[derive(Clone, Debug)]
pub(crate) enum Entry {
    Point {
        object: PointPrimitive,
        record: GpuSphere,
    },
    Mesh {
        object: MeshPrimitive,
        record: Option<MeshRecord>,
    },
}

impl Entry {
    fn kind(&self) -> ObjectKind {
        match self {
            Entry::Point { .. } => ObjectKind::Point,
            Entry::Mesh { .. } => ObjectKind::Mesh,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Registered scene objects, partitioned by kind.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    points: Vec<ObjectHandle>,
    meshes: Vec<ObjectHandle>,
    meshes_dirty: bool,
}

impl ObjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object and return its handle.
    ///
    /// Mesh primitives mark the registry dirty. Point primitives get their
    /// flat record immediately.
    pub fn register(&mut self, object: impl Into<SceneObject>) -> ObjectHandle {
        let entry = match object.into() {
            SceneObject::Point(point) => Entry::Point {
                record: point.to_gpu(),
                object: point,
            },
            SceneObject::Mesh(mesh) => Entry::Mesh {
                object: mesh,
                record: None,
            },
        };
        let kind = entry.kind();

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ObjectHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ObjectHandle {
                    index,
                    generation: 0,
                }
            }
        };

        match kind {
            ObjectKind::Point => self.points.push(handle),
            ObjectKind::Mesh => {
                self.meshes.push(handle);
                self.meshes_dirty = true;
            }
        }

        log::trace!("Registered {:?} object {}", kind, handle);
        handle
    }

    /// Remove an object, returning it. Mesh primitives mark the registry dirty.
    pub fn unregister(&mut self, handle: ObjectHandle) -> Result<SceneObject, RegistryError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.entry.is_some())
            .ok_or(RegistryError::UnknownHandle(handle))?;

        let entry = slot.entry.take().ok_or(RegistryError::UnknownHandle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);

        let object = match entry {
            Entry::Point { object, .. } => {
                self.points.retain(|h| *h != handle);
                SceneObject::Point(object)
            }
            Entry::Mesh { object, .. } => {
                self.meshes.retain(|h| *h != handle);
                self.meshes_dirty = true;
                SceneObject::Mesh(object)
            }
        };

        log::trace!("Unregistered {:?} object {}", object.kind(), handle);
        Ok(object)
    }

    /// True if mesh membership changed since the last rebuild.
    pub fn is_dirty(&self) -> bool {
        self.meshes_dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.meshes_dirty = false;
    }

    /// Drop every object. Marks dirty if any mesh was registered.
    pub fn clear(&mut self) {
        if !self.meshes.is_empty() {
            self.meshes_dirty = true;
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.points.clear();
        self.meshes.clear();
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<SceneObjectRef<'_>> {
        self.entry(handle).map(|entry| match entry {
            Entry::Point { object, .. } => SceneObjectRef::Point(object),
            Entry::Mesh { object, .. } => SceneObjectRef::Mesh(object),
        })
    }

    /// Mutable access to a point primitive. `None` for meshes or stale handles.
    pub fn point_mut(&mut self, handle: ObjectHandle) -> Option<&mut PointPrimitive> {
        match self.entry_mut(handle)? {
            Entry::Point { object, .. } => Some(object),
            Entry::Mesh { .. } => None,
        }
    }

    /// Mutable access to a mesh primitive. `None` for points or stale handles.
    pub fn mesh_mut(&mut self, handle: ObjectHandle) -> Option<&mut MeshPrimitive> {
        match self.entry_mut(handle)? {
            Entry::Mesh { object, .. } => Some(object),
            Entry::Point { .. } => None,
        }
    }

    /// Point primitive handles in registration order.
    pub fn points(&self) -> &[ObjectHandle] {
        &self.points
    }

    /// Mesh primitive handles in registration order.
    pub fn meshes(&self) -> &[ObjectHandle] {
        &self.meshes
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn len(&self) -> usize {
        self.points.len() + self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current flat record of a point primitive.
    pub fn point_record(&self, handle: ObjectHandle) -> Option<&GpuSphere> {
        match self.entry(handle)? {
            Entry::Point { record, .. } => Some(record),
            Entry::Mesh { .. } => None,
        }
    }

    /// Most recently computed flat record of a mesh primitive.
    pub fn mesh_record(&self, handle: ObjectHandle) -> Option<&GpuMeshObject> {
        match self.entry(handle)? {
            Entry::Mesh { record, .. } => record.as_ref().map(|r| &r.gpu),
            Entry::Point { .. } => None,
        }
    }

    pub(crate) fn entry(&self, handle: ObjectHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn entry_mut(&mut self, handle: ObjectHandle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }
}

/// Borrowed view of a registered object.
#[derive(Clone, Copy, Debug)]
pub enum SceneObjectRef<'a> {
    Point(&'a PointPrimitive),
    Mesh(&'a MeshPrimitive),
}

impl SceneObjectRef<'_> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            SceneObjectRef::Point(_) => ObjectKind::Point,
            SceneObjectRef::Mesh(_) => ObjectKind::Mesh,
        }
    }
}
