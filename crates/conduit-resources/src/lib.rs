//! Backend-agnostic execution resources and events
//!
//! This crate provides:
//! - **Platform tag**: identifies which backend a value belongs to
//! - **Backend traits**: [`Backend`] (resource) and [`BackendEvent`] (event)
//! - **Type erasure**: [`Resource`] and [`Event`] hold exactly one concrete
//!   backend value and dispatch to it
//! - **Stream pools**: 16 lazily created streams per backend, handed out
//!   round-robin or by group
//! - **Backends**: [`Host`] (synchronous), [`Threads`] (worker-thread
//!   streams) and, with the `cuda` feature, `Cuda`
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────────────────────────────────────┐
//!            │      Resource / Event  (erased enums)      │
//!            └──────────────────────┬─────────────────────┘
//!                                   │ match
//!            ┌──────────────────────┼─────────────────────┐
//!            ▼                      ▼                     ▼
//!       ┌─────────┐           ┌──────────┐          ┌──────────┐
//!       │  Host   │           │ Threads  │          │   Cuda   │
//!       └─────────┘           └────┬─────┘          └────┬─────┘
//!                                  ▼                     ▼
//!                           StreamPool (16)       StreamPool (16)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use conduit_resources::{Backend, Event, Host, Resource, Threads};
//!
//! # fn main() -> conduit_resources::Result<()> {
//! let producer = Threads::new(0)?;
//! let consumer: Resource = Threads::new(1)?.into();
//!
//! let data = producer.allocate::<u8>(4096)?;
//! unsafe { producer.memset(data, 0xab, 4096)? };
//!
//! // Same backend: the consumer's stream waits, this thread does not
//! let ready: Event = producer.get_event()?.into();
//! consumer.wait_on(&ready)?;
//!
//! // Host cannot enqueue a dependency, so this blocks until the fill is done
//! Host::new().wait_on(&ready)?;
//! assert_eq!(unsafe { *data.add(4095) }, 0xab);
//!
//! consumer.wait()?;
//! unsafe { producer.free(data)? };
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod buffer;
pub mod config;
pub mod error;
pub mod memory;
pub mod platform;
pub mod pool;

#[cfg(test)]
mod testing;

pub use backend::{Backend, BackendEvent, Event, Resource};
pub use backends::{Host, HostEvent, Threads, ThreadsEvent, WorkerStream};
pub use buffer::ManagedBuffer;
pub use config::PoolConfig;
pub use error::{ResourceError, Result};
pub use memory::HostHeap;
pub use platform::Platform;
pub use pool::{Selector, StreamPool, POOL_SIZE};

#[cfg(feature = "cuda")]
pub use backends::{Cuda, CudaEvent};
