//! CUDA backend for NVIDIA GPUs
//!
//! Thin layer over the CUDA driver API through `cudarc`. Resources bind to
//! one of 16 pooled non-blocking streams on the configured device; events are
//! native `CUevent`s recorded at construction; memory is managed (unified)
//! so pointers are valid on host and device.
//!
//! # Usage
//!
//! ```rust,ignore
//! use conduit_resources::{Backend, Cuda};
//!
//! let cuda = Cuda::new(-1)?;
//! let ptr = cuda.allocate::<f32>(1024)?;
//! unsafe { cuda.memset(ptr.cast(), 0, 4096)? };
//! cuda.wait()?;
//! unsafe { cuda.free(ptr.cast())? };
//! ```

use crate::backend::{Backend, BackendEvent};
use crate::config::PoolConfig;
use crate::error::{ResourceError, Result};
use crate::platform::Platform;
use crate::pool::{Selector, StreamPool};
use conduit_tracing::performance::record_allocation;
use conduit_tracing::timed_block;
use cudarc::driver::{result, sys, CudaDevice, DriverError};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Alignment guaranteed by the driver for managed allocations
const MANAGED_ALIGNMENT: usize = 256;

static DEVICE: OnceLock<std::result::Result<Arc<CudaDevice>, ResourceError>> = OnceLock::new();
static POOL: StreamPool<NativeStream> = StreamPool::new(Platform::Cuda);

fn driver_error(err: DriverError) -> ResourceError {
    ResourceError::backend(Platform::Cuda, err)
}

/// Device used by the pool; its primary context is made current before every
/// driver call
fn device() -> Result<&'static Arc<CudaDevice>> {
    DEVICE
        .get_or_init(|| {
            let ordinal = PoolConfig::global().cuda_device;
            CudaDevice::new(ordinal).map_err(|err| {
                ResourceError::pool_init(Platform::Cuda, format!("device {} unavailable: {}", ordinal, err))
            })
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn bind() -> Result<()> {
    device()?.bind_to_thread().map_err(driver_error)
}

/// Pooled `CUstream`; owned by the pool and never destroyed
struct NativeStream(sys::CUstream);

// SAFETY: CUDA streams may be used from any thread once the context is current
unsafe impl Send for NativeStream {}
unsafe impl Sync for NativeStream {}

fn create_stream(index: usize) -> Result<NativeStream> {
    bind()?;
    let stream = result::stream::create(result::stream::StreamKind::NonBlocking).map_err(|err| {
        ResourceError::pool_init(Platform::Cuda, format!("stream {} creation failed: {}", index, err))
    })?;
    Ok(NativeStream(stream))
}

/// Owned `CUevent`, destroyed with the last [`CudaEvent`] clone
struct NativeEvent(sys::CUevent);

// SAFETY: events are thread-safe driver objects
unsafe impl Send for NativeEvent {}
unsafe impl Sync for NativeEvent {}

impl Drop for NativeEvent {
    fn drop(&mut self) {
        // SAFETY: the event is not referenced by any other handle
        if let Err(err) = unsafe { result::event::destroy(self.0) } {
            tracing::warn!(error = %err, "failed to destroy CUDA event");
        }
    }
}

/// Point in a CUDA stream's order
#[derive(Clone)]
pub struct CudaEvent {
    event: Arc<NativeEvent>,
}

impl CudaEvent {
    fn record(stream: sys::CUstream) -> Result<Self> {
        bind()?;
        let event = result::event::create(sys::CUevent_flags::CU_EVENT_DISABLE_TIMING).map_err(driver_error)?;
        let event = NativeEvent(event);
        // SAFETY: both handles are live
        unsafe { result::event::record(event.0, stream) }.map_err(driver_error)?;
        Ok(Self { event: Arc::new(event) })
    }

    /// Native event handle
    pub fn get_cuda_event(&self) -> sys::CUevent {
        self.event.0
    }
}

impl fmt::Debug for CudaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaEvent").field("event", &self.event.0).finish()
    }
}

impl BackendEvent for CudaEvent {
    fn platform(&self) -> Platform {
        Platform::Cuda
    }

    fn check(&self) -> Result<bool> {
        bind()?;
        // SAFETY: the event is live for as long as self
        match unsafe { sys::lib().cuEventQuery(self.event.0) } {
            sys::CUresult::CUDA_SUCCESS => Ok(true),
            sys::CUresult::CUDA_ERROR_NOT_READY => Ok(false),
            code => Err(driver_error(DriverError(code))),
        }
    }

    fn wait(&self) -> Result<()> {
        bind()?;
        // SAFETY: the event is live for as long as self
        unsafe { sys::lib().cuEventSynchronize(self.event.0) }
            .result()
            .map_err(driver_error)
    }
}

/// Resource bound to one pooled CUDA stream
#[derive(Clone, Copy)]
pub struct Cuda {
    stream: &'static NativeStream,
}

impl Cuda {
    /// Bind to a pooled stream chosen by `selector`
    ///
    /// # Errors
    ///
    /// [`ResourceError::PoolInit`] if the device or its streams could not be
    /// created. The failure is permanent for the process.
    pub fn new(selector: impl Into<Selector>) -> Result<Self> {
        let stream = POOL.get_stream(selector.into(), create_stream)?;
        Ok(Self { stream })
    }

    /// Whether a CUDA device can be opened
    pub fn is_available() -> bool {
        device().is_ok()
    }

    /// Native stream handle
    pub fn get_stream(&self) -> sys::CUstream {
        self.stream.0
    }
}

impl fmt::Debug for Cuda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cuda").field("stream", &self.stream.0).finish()
    }
}

impl Backend for Cuda {
    type Event = CudaEvent;

    fn get_platform(&self) -> Platform {
        Platform::Cuda
    }

    fn get_default() -> Result<&'static Self> {
        static DEFAULT: OnceLock<std::result::Result<Cuda, ResourceError>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| {
                let resource = Cuda::new(Selector::Next);
                tracing::debug!(ok = resource.is_ok(), "created default CUDA resource");
                resource
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    fn get_event(&self) -> Result<CudaEvent> {
        CudaEvent::record(self.stream.0)
    }

    fn wait(&self) -> Result<()> {
        bind()?;
        // SAFETY: pooled streams are never destroyed
        unsafe { result::stream::synchronize(self.stream.0) }.map_err(driver_error)
    }

    fn enqueue_wait(&self, event: &CudaEvent) -> Result<()> {
        bind()?;
        // SAFETY: stream is pooled, event is kept alive by the caller's handle
        // until the driver has taken its own reference
        unsafe {
            result::stream::wait_event(
                self.stream.0,
                event.get_cuda_event(),
                sys::CUevent_wait_flags::CU_EVENT_WAIT_DEFAULT,
            )
        }
        .map_err(driver_error)
    }

    fn allocate_bytes(&self, size: usize) -> Result<*mut u8> {
        bind()?;
        // SAFETY: plain managed allocation
        let (dptr, duration_us) = timed_block!("cuda_alloc", {
            unsafe { result::malloc_managed(size.max(1), sys::CUmemAttach_flags::CU_MEM_ATTACH_GLOBAL) }
        });
        let dptr = dptr.map_err(|err| {
            tracing::debug!(size, error = %err, "managed allocation failed");
            ResourceError::AllocationFailed { size }
        })?;
        record_allocation(size, "cuda", MANAGED_ALIGNMENT, duration_us);
        Ok(dptr as *mut u8)
    }

    unsafe fn free(&self, ptr: *mut u8) -> Result<()> {
        bind()?;
        result::free_sync(ptr as sys::CUdeviceptr).map_err(driver_error)
    }

    unsafe fn memcpy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        bind()?;
        sys::lib()
            .cuMemcpyAsync(dst as sys::CUdeviceptr, src as sys::CUdeviceptr, size, self.stream.0)
            .result()
            .map_err(driver_error)
    }

    unsafe fn memset(&self, ptr: *mut u8, value: u8, size: usize) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        bind()?;
        result::memset_d8_async(ptr as sys::CUdeviceptr, value, size, self.stream.0).map_err(driver_error)
    }
}
