//! Concrete backend implementations
//!
//! - `host` - Synchronous execution on the calling thread
//! - `threads` - Pooled software streams backed by worker threads
//! - `cuda` - CUDA streams (requires the `cuda` feature)

pub mod host;
pub mod threads;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use host::{Host, HostEvent};
pub use threads::{Threads, ThreadsEvent, WorkerStream};

#[cfg(feature = "cuda")]
pub use cuda::{Cuda, CudaEvent};
