//! Type-erased resource

use super::sealed::ResourcePayload;
use super::{Backend, Event};
use crate::backends::{Host, Threads};
use crate::error::{ResourceError, Result};
use crate::platform::Platform;
use conduit_tracing::performance::record_wait;
use conduit_tracing::timed_block;

#[cfg(feature = "cuda")]
use crate::backends::Cuda;

/// Exactly one concrete backend resource
///
/// Offers the same operations as the concrete types, dispatched by match.
#[derive(Debug, Clone)]
pub enum Resource {
    Host(Host),
    Threads(Threads),
    #[cfg(feature = "cuda")]
    Cuda(Cuda),
}

macro_rules! dispatch {
    ($self:expr, $resource:ident => $body:expr) => {
        match $self {
            Resource::Host($resource) => $body,
            Resource::Threads($resource) => $body,
            #[cfg(feature = "cuda")]
            Resource::Cuda($resource) => $body,
        }
    };
}

impl Resource {
    /// Default resource of `platform`, wrapped
    ///
    /// # Errors
    ///
    /// [`ResourceError::Unsupported`] for platforms not compiled into this
    /// build, or the pool initialisation error of the backend.
    pub fn get_default(platform: Platform) -> Result<Resource> {
        match platform {
            Platform::Host => Ok(Host::get_default()?.clone().into()),
            Platform::Threads => Ok(Threads::get_default()?.clone().into()),
            #[cfg(feature = "cuda")]
            Platform::Cuda => Ok(Cuda::get_default()?.clone().into()),
            other => Err(ResourceError::unsupported(format!("no {} backend in this build", other))),
        }
    }

    pub fn get_platform(&self) -> Platform {
        dispatch!(self, resource => resource.get_platform())
    }

    /// Record an event on the held resource's stream
    pub fn get_event(&self) -> Result<Event> {
        dispatch!(self, resource => resource.get_event_erased())
    }

    /// Block until all work enqueued on the held resource has completed
    pub fn wait(&self) -> Result<()> {
        let (waited, duration_us) = timed_block!("resource_wait", { dispatch!(self, resource => resource.wait()) });
        record_wait(self.get_platform().as_str(), "resource", duration_us);
        waited
    }

    /// See [`Backend::wait_on`]
    pub fn wait_on(&self, event: &Event) -> Result<()> {
        dispatch!(self, resource => resource.wait_on(event))
    }

    pub fn allocate<T>(&self, count: usize) -> Result<*mut T> {
        dispatch!(self, resource => resource.allocate::<T>(count))
    }

    pub fn calloc(&self, size: usize) -> Result<*mut u8> {
        dispatch!(self, resource => resource.calloc(size))
    }

    /// # Safety
    ///
    /// See [`Backend::free`].
    pub unsafe fn free(&self, ptr: *mut u8) -> Result<()> {
        dispatch!(self, resource => resource.free(ptr))
    }

    /// # Safety
    ///
    /// See [`Backend::memcpy`].
    pub unsafe fn memcpy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<()> {
        dispatch!(self, resource => resource.memcpy(dst, src, size))
    }

    /// # Safety
    ///
    /// See [`Backend::memset`].
    pub unsafe fn memset(&self, ptr: *mut u8, value: u8, size: usize) -> Result<()> {
        dispatch!(self, resource => resource.memset(ptr, value, size))
    }

    /// Whether the held resource is a `T`. Never fails.
    pub fn test_get<T: Backend>(&self) -> bool {
        T::from_resource(self).is_some()
    }

    /// The held resource as a `T`, if it is one
    pub fn try_get<T: Backend>(&self) -> Option<&T> {
        T::from_resource(self)
    }

    /// The held resource as a `T`
    ///
    /// # Panics
    ///
    /// Panics if the held resource is not a `T`.
    pub fn get<T: Backend>(&self) -> &T {
        match T::from_resource(self) {
            Some(resource) => resource,
            None => panic!(
                "Resource holds a {} resource, not {}",
                self.get_platform(),
                std::any::type_name::<T>()
            ),
        }
    }
}

macro_rules! resource_payload {
    ($variant:ident, $ty:ty) => {
        impl ResourcePayload for $ty {
            fn from_resource(resource: &Resource) -> Option<&Self> {
                #[allow(unreachable_patterns)]
                match resource {
                    Resource::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Resource {
            fn from(resource: $ty) -> Self {
                Resource::$variant(resource)
            }
        }
    };
}

resource_payload!(Host, Host);
resource_payload!(Threads, Threads);
#[cfg(feature = "cuda")]
resource_payload!(Cuda, Cuda);
