//! Fixed-stride GPU buffers and their reuse policy.
//!
//! [`BufferBackend`] is the seam between the synchronizer and the graphics
//! API: `lux_gpu` implements it on top of wgpu, tests use a recording mock.
//! A [`ComputeBuffer`] keeps its allocation as long as element count and
//! stride stay the same, and releases it when the data set becomes empty.

use bytemuck::Pod;

/// Graphics API operations needed to keep storage buffers up to date.
pub trait BufferBackend {
    type Buffer;

    /// Allocate a buffer of `count` elements of `stride` bytes.
    fn create_buffer(&self, label: &str, count: usize, stride: usize) -> Self::Buffer;

    /// Overwrite the buffer contents starting at offset 0.
    fn write_buffer(&self, buffer: &Self::Buffer, bytes: &[u8]);

    /// Free a buffer. The default just drops it.
    fn release_buffer(&self, buffer: Self::Buffer) {
        drop(buffer);
    }
}

/// Kernel-facing name of each scene buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferName {
    Spheres,
    MeshObjects,
    Vertices,
    Indices,
}

impl BufferName {
    pub const ALL: [BufferName; 4] = [
        BufferName::Spheres,
        BufferName::MeshObjects,
        BufferName::Vertices,
        BufferName::Indices,
    ];

    /// Name of the binding in the kernel source.
    pub fn binding_name(&self) -> &'static str {
        match self {
            BufferName::Spheres => "spheres",
            BufferName::MeshObjects => "mesh_objects",
            BufferName::Vertices => "vertices",
            BufferName::Indices => "indices",
        }
    }

    /// Binding slot in the kernel's bind group.
    pub fn binding_index(&self) -> u32 {
        match self {
            BufferName::Spheres => 1,
            BufferName::MeshObjects => 2,
            BufferName::Vertices => 3,
            BufferName::Indices => 4,
        }
    }
}

impl std::fmt::Display for BufferName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binding_name())
    }
}

/// What an upload did to the underlying allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new allocation was made (first upload or size/stride change).
    Created,
    /// The existing allocation was overwritten in place.
    Reused,
    /// The data set was empty and the old allocation was freed.
    Released,
    /// The data set was empty and there was nothing to free.
    Empty,
}

#[derive(Debug)]
struct Allocation<Buf> {
    buffer: Buf,
    count: usize,
    stride: usize,
}

/// A named storage buffer that is null while there is no data.
#[derive(Debug)]
pub struct ComputeBuffer<Buf> {
    name: BufferName,
    allocation: Option<Allocation<Buf>>,
}

impl<Buf> ComputeBuffer<Buf> {
    pub fn new(name: BufferName) -> Self {
        Self {
            name,
            allocation: None,
        }
    }

    pub fn name(&self) -> BufferName {
        self.name
    }

    /// The live buffer, if any data has been uploaded.
    pub fn buffer(&self) -> Option<&Buf> {
        self.allocation.as_ref().map(|a| &a.buffer)
    }

    /// Element count of the live allocation (0 when null).
    pub fn count(&self) -> usize {
        self.allocation.as_ref().map_or(0, |a| a.count)
    }

    /// Element stride of the live allocation (0 when null).
    pub fn stride(&self) -> usize {
        self.allocation.as_ref().map_or(0, |a| a.stride)
    }

    pub fn is_null(&self) -> bool {
        self.allocation.is_none()
    }

    /// Upload `data`, reusing the allocation when count and stride match.
    pub fn upload<T, B>(&mut self, backend: &B, data: &[T]) -> UploadOutcome
    where
        T: Pod,
        B: BufferBackend<Buffer = Buf>,
    {
        let stride = std::mem::size_of::<T>();
        let mut released = false;

        if let Some(existing) = self.allocation.take() {
            if data.is_empty() || existing.count != data.len() || existing.stride != stride {
                log::debug!(
                    "Releasing {} buffer ({} x {} B)",
                    self.name,
                    existing.count,
                    existing.stride
                );
                backend.release_buffer(existing.buffer);
                released = true;
            } else {
                self.allocation = Some(existing);
            }
        }

        if data.is_empty() {
            return if released {
                UploadOutcome::Released
            } else {
                UploadOutcome::Empty
            };
        }

        let outcome = match &self.allocation {
            Some(_) => UploadOutcome::Reused,
            None => {
                log::debug!(
                    "Allocating {} buffer ({} x {} B)",
                    self.name,
                    data.len(),
                    stride
                );
                self.allocation = Some(Allocation {
                    buffer: backend.create_buffer(self.name.binding_name(), data.len(), stride),
                    count: data.len(),
                    stride,
                });
                UploadOutcome::Created
            }
        };

        if let Some(allocation) = &self.allocation {
            backend.write_buffer(&allocation.buffer, bytemuck::cast_slice(data));
        }

        outcome
    }

    /// Free the allocation, leaving the buffer null.
    pub fn release<B: BufferBackend<Buffer = Buf>>(&mut self, backend: &B) {
        if let Some(allocation) = self.allocation.take() {
            backend.release_buffer(allocation.buffer);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::BufferBackend;

    /// Mock buffer: an id plus the bytes last written to it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct MockBuffer {
        pub id: usize,
        pub label: String,
        pub size: usize,
    }

    /// Backend that records every call instead of touching a GPU.
    #[derive(Debug, Default)]
    pub struct RecordingBackend {
        pub created: RefCell<Vec<MockBuffer>>,
        pub released: RefCell<Vec<usize>>,
        pub writes: RefCell<Vec<(usize, Vec<u8>)>>,
    }

    impl RecordingBackend {
        pub fn live(&self) -> usize {
            self.created.borrow().len() - self.released.borrow().len()
        }

        pub fn last_write(&self, id: usize) -> Option<Vec<u8>> {
            self.writes
                .borrow()
                .iter()
                .rev()
                .find(|(w, _)| *w == id)
                .map(|(_, bytes)| bytes.clone())
        }
    }

    impl BufferBackend for RecordingBackend {
        type Buffer = MockBuffer;

        fn create_buffer(&self, label: &str, count: usize, stride: usize) -> MockBuffer {
            let buffer = MockBuffer {
                id: self.created.borrow().len(),
                label: label.to_string(),
                size: count * stride,
            };
            self.created.borrow_mut().push(buffer.clone());
            buffer
        }

        fn write_buffer(&self, buffer: &MockBuffer, bytes: &[u8]) {
            assert_eq!(bytes.len(), buffer.size, "write must fill the allocation");
            self.writes.borrow_mut().push((buffer.id, bytes.to_vec()));
        }

        fn release_buffer(&self, buffer: MockBuffer) {
            self.released.borrow_mut().push(buffer.id);
        }
    }
}
