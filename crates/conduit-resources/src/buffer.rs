//! Owning handle for resource-issued memory
//!
//! [`ManagedBuffer`] wraps the raw allocate/free primitives of a [`Resource`]
//! with scoped release: the memory is freed when the buffer is dropped, after
//! the owning resource's stream has drained. Raw pointers remain available for
//! interop through [`ManagedBuffer::as_ptr`] and [`ManagedBuffer::as_mut_ptr`].

use crate::backend::Resource;
use crate::error::{ResourceError, Result};
use bytemuck::Pod;
use std::mem;
use std::slice;

/// Typed allocation owned by one resource
pub struct ManagedBuffer<T: Pod> {
    resource: Resource,
    ptr: *mut T,
    len: usize,
}

// SAFETY: the allocation is uniquely owned and all access goes through the
// owning resource's stream or `&mut self`
unsafe impl<T: Pod + Send> Send for ManagedBuffer<T> {}

impl<T: Pod> ManagedBuffer<T> {
    /// Allocate `len` elements through `resource` and enqueue a zero fill.
    ///
    /// Every later operation on the buffer is ordered after the fill, so the
    /// contents are never observed uninitialised.
    pub fn new(resource: impl Into<Resource>, len: usize) -> Result<Self> {
        let resource = resource.into();
        let ptr = resource.allocate::<T>(len)?;
        let mut buffer = Self { resource, ptr, len };
        buffer.fill_bytes(0)?;
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.len * mem::size_of::<T>()
    }

    /// Resource whose stream orders operations on this buffer
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    /// Enqueue a fill of every byte with `value`
    pub fn fill_bytes(&mut self, value: u8) -> Result<()> {
        // SAFETY: the range is owned by this buffer, which outlives the fill
        // because drop waits on the stream
        unsafe { self.resource.memset(self.ptr.cast(), value, self.size_bytes()) }
    }

    /// Copy `data` into the front of the buffer.
    ///
    /// Blocks until the copy has completed so `data` is not borrowed past the
    /// call.
    pub fn copy_from_slice(&mut self, data: &[T]) -> Result<()> {
        if data.len() > self.len {
            return Err(ResourceError::SizeMismatch {
                capacity: self.len,
                actual: data.len(),
            });
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        // SAFETY: destination holds at least `bytes.len()` bytes; the wait
        // below keeps `data` alive for the duration of the copy
        unsafe { self.resource.memcpy(self.ptr.cast(), bytes.as_ptr(), bytes.len())? };
        self.drain()
    }

    /// Wait for queued work on the owning stream; synchronous resources have
    /// none
    fn drain(&self) -> Result<()> {
        if self.resource.get_platform().is_async() {
            self.resource.wait()?;
        }
        Ok(())
    }

    /// Copy into the front of another buffer.
    ///
    /// The copy runs on this buffer's stream after all work already enqueued
    /// on `dst`'s stream. Everything enqueued on `dst`'s stream afterwards,
    /// including [`ManagedBuffer::to_vec`] and the release on drop, runs after
    /// the copy.
    pub fn copy_to(&self, dst: &mut ManagedBuffer<T>) -> Result<()> {
        if self.len > dst.len {
            return Err(ResourceError::SizeMismatch {
                capacity: dst.len,
                actual: self.len,
            });
        }
        self.resource.wait_on(&dst.resource.get_event()?)?;
        // SAFETY: src is released only after its own stream drains, and dst's
        // stream is made to wait for the copy below
        unsafe { self.resource.memcpy(dst.ptr.cast(), self.ptr.cast(), self.size_bytes())? };
        let copied = self.resource.get_event()?;
        dst.resource.wait_on(&copied)
    }

    /// Wait for the stream, then read the contents back
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.drain()?;
        // SAFETY: the stream has drained, the memory is host-visible and
        // aligned for T
        let contents = unsafe { slice::from_raw_parts(self.ptr, self.len) };
        Ok(contents.to_vec())
    }
}

impl<T: Pod> Drop for ManagedBuffer<T> {
    fn drop(&mut self) {
        if let Err(err) = self.drain() {
            tracing::warn!(platform = %self.resource.get_platform(), error = %err, "stream failed before buffer release");
        }
        // SAFETY: pointer came from this resource's allocator and no work on
        // the stream references it any more
        if let Err(err) = unsafe { self.resource.free(self.ptr.cast()) } {
            tracing::warn!(platform = %self.resource.get_platform(), error = %err, "failed to free managed buffer");
        }
    }
}
