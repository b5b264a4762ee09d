//! Traits implemented by every concrete backend
//!
//! A backend contributes two types: a resource wrapping one pooled stream
//! ([`Backend`]) and an event marking a point in that stream's order
//! ([`BackendEvent`]). Both are closed over the set of compiled-in backends;
//! the sealed supertraits let the erased [`Event`] and [`Resource`] enums query
//! for a concrete payload without any dynamic casting.
//!
//! # Cross-backend waits
//!
//! ```text
//! resource.wait_on(event)
//!     │
//!     ├── event holds Self::Event ──► enqueue_wait()   (stream dependency, returns immediately)
//!     │
//!     └── anything else ───────────► event.wait()     (calling thread blocks)
//! ```

use super::{Event, Resource};
use crate::error::{ResourceError, Result};
use crate::platform::Platform;
use conduit_tracing::perf_span;
use std::fmt;
use std::mem;

pub(crate) mod sealed {
    use crate::backend::{Event, Resource};

    /// Concrete event types that can live inside [`Event`]
    pub trait EventPayload: Sized {
        fn from_event(event: &Event) -> Option<&Self>;
    }

    /// Concrete resource types that can live inside [`Resource`]
    pub trait ResourcePayload: Sized {
        fn from_resource(resource: &Resource) -> Option<&Self>;
    }
}

/// A recorded point in one backend's execution order
///
/// The point is fixed when the event is created; there is no way to re-record
/// or cancel it.
pub trait BackendEvent: Clone + Send + Sync + fmt::Debug + Into<Event> + sealed::EventPayload {
    /// Backend that produced this event
    fn platform(&self) -> Platform;

    /// Whether all captured work has completed. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the captured work failed.
    fn check(&self) -> Result<bool>;

    /// Block the calling thread until all captured work has completed.
    fn wait(&self) -> Result<()>;
}

/// One backend execution stream plus its memory primitives
///
/// Memory operations are enqueued on the resource's stream and return
/// immediately. They are ordered only relative to other work on the same
/// stream, or through an explicit event dependency.
pub trait Backend: Clone + Send + Sync + fmt::Debug + Into<Resource> + sealed::ResourcePayload {
    /// Event type recorded on this backend's streams
    type Event: BackendEvent;

    /// This backend's platform tag
    fn get_platform(&self) -> Platform;

    /// Process-wide default instance, created on first use and never dropped
    fn get_default() -> Result<&'static Self>
    where
        Self: Sized;

    /// Record an event capturing all work enqueued on this stream so far
    fn get_event(&self) -> Result<Self::Event>;

    /// Like [`Backend::get_event`], already wrapped in an [`Event`]
    fn get_event_erased(&self) -> Result<Event> {
        self.get_event().map(Into::into)
    }

    /// Block until all work enqueued on this stream has completed
    fn wait(&self) -> Result<()>;

    /// Make this stream wait for `event`.
    ///
    /// Events from this backend become a stream dependency and the call
    /// returns without blocking. Events from any other backend cannot be
    /// expressed as a dependency, so the calling thread blocks on them before
    /// returning.
    fn wait_on(&self, event: &Event) -> Result<()> {
        match event.try_get::<Self::Event>() {
            Some(native) => self.enqueue_wait(native),
            None => {
                let _span = perf_span!(
                    "foreign_wait",
                    resource = self.get_platform().as_str(),
                    event = event.get_platform().as_str(),
                );
                event.wait()
            }
        }
    }

    /// Insert a stream-level dependency on a same-backend event
    fn enqueue_wait(&self, event: &Self::Event) -> Result<()>;

    /// Allocate `size` bytes of memory addressable from host and backend
    fn allocate_bytes(&self, size: usize) -> Result<*mut u8>;

    /// Allocate memory for `count` values of `T`
    ///
    /// # Errors
    ///
    /// [`ResourceError::AllocationOverflow`] if the byte size overflows.
    fn allocate<T>(&self, count: usize) -> Result<*mut T> {
        let elem_size = mem::size_of::<T>();
        let size = count
            .checked_mul(elem_size)
            .ok_or(ResourceError::AllocationOverflow { count, elem_size })?;
        Ok(self.allocate_bytes(size)?.cast())
    }

    /// Allocate `size` bytes and enqueue a zero fill on this stream
    fn calloc(&self, size: usize) -> Result<*mut u8> {
        let ptr = self.allocate_bytes(size)?;
        // SAFETY: ptr was just allocated with `size` bytes; a refused fill
        // leaves nothing enqueued that references it
        unsafe {
            if let Err(err) = self.memset(ptr, 0, size) {
                if let Err(free_err) = self.free(ptr) {
                    tracing::warn!(error = %free_err, "failed to release calloc after refused fill");
                }
                return Err(err);
            }
        }
        Ok(ptr)
    }

    /// Release memory from [`Backend::allocate`] or [`Backend::calloc`]
    ///
    /// # Safety
    ///
    /// `ptr` must come from a compatible backend's allocator, no enqueued work
    /// may still reference it, and it must not be used afterwards.
    unsafe fn free(&self, ptr: *mut u8) -> Result<()>;

    /// Enqueue a copy of `size` bytes from `src` to `dst`
    ///
    /// # Safety
    ///
    /// Both ranges must stay valid until the copy completes and must not
    /// overlap.
    unsafe fn memcpy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<()>;

    /// Enqueue a fill of `size` bytes at `ptr` with `value`
    ///
    /// # Safety
    ///
    /// The range must stay valid until the fill completes.
    unsafe fn memset(&self, ptr: *mut u8, value: u8, size: usize) -> Result<()>;
}
