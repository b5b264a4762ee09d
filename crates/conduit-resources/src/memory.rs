//! Host-addressable managed memory shared by the host-side backends
//!
//! [`Host`](crate::Host) and [`Threads`](crate::Threads) both hand out memory
//! from this heap, so a pointer from either may be freed through the other.
//! Allocations are tracked by address so `free` can recover the layout and
//! reject pointers it never issued.

use crate::error::{ResourceError, Result};
use conduit_tracing::performance::record_allocation;
use conduit_tracing::timed_block;
use parking_lot::Mutex;
use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Alignment of every allocation (one cache line)
pub const HOST_ALIGNMENT: usize = 64;

/// Registry of live host allocations
pub struct HostHeap {
    /// Address -> layout used to allocate it
    live: Mutex<HashMap<usize, Layout>>,
}

impl HostHeap {
    pub(crate) fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide heap
    pub fn global() -> &'static HostHeap {
        static HEAP: OnceLock<HostHeap> = OnceLock::new();
        HEAP.get_or_init(HostHeap::new)
    }

    /// Allocate `size` bytes aligned to [`HOST_ALIGNMENT`].
    ///
    /// Zero-byte requests return a unique one-byte allocation so the pointer is
    /// always valid to free.
    pub fn allocate(&self, size: usize) -> Result<*mut u8> {
        let layout = Layout::from_size_align(size.max(1), HOST_ALIGNMENT)
            .map_err(|_| ResourceError::AllocationFailed { size })?;

        // SAFETY: layout has non-zero size
        let (ptr, duration_us) = timed_block!("host_alloc", { unsafe { alloc::alloc(layout) } });
        if ptr.is_null() {
            return Err(ResourceError::AllocationFailed { size });
        }

        self.live.lock().insert(ptr as usize, layout);
        record_allocation(size, "host", HOST_ALIGNMENT, duration_us);
        Ok(ptr)
    }

    /// Release memory obtained from [`HostHeap::allocate`].
    ///
    /// # Safety
    ///
    /// No pending asynchronous operation may still reference `ptr`, and the
    /// caller must not use it afterwards.
    pub unsafe fn free(&self, ptr: *mut u8) -> Result<()> {
        let layout = self
            .live
            .lock()
            .remove(&(ptr as usize))
            .ok_or(ResourceError::InvalidPointer(ptr as usize))?;
        alloc::dealloc(ptr, layout);
        Ok(())
    }

    /// Size in bytes of a live allocation
    pub fn size_of(&self, ptr: *const u8) -> Option<usize> {
        self.live.lock().get(&(ptr as usize)).map(|layout| layout.size())
    }

    /// Number of live allocations
    pub fn live_allocations(&self) -> usize {
        self.live.lock().len()
    }
}
