//! Platform tag identifying which backend a resource or event belongs to

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend identity
///
/// Used purely for dispatch and identification. Every platform is listed here
/// regardless of which backends are compiled in; only enabled ones have
/// concrete resource and event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Not bound to any backend
    Undefined,
    /// Synchronous host execution on the calling thread
    Host,
    /// Pooled software streams, one worker thread per stream
    Threads,
    /// NVIDIA CUDA streams
    Cuda,
}

impl Platform {
    /// Whether work submitted to this platform completes asynchronously
    pub fn is_async(self) -> bool {
        matches!(self, Self::Threads | Self::Cuda)
    }

    /// Whether a concrete backend for this platform is compiled in
    pub fn is_enabled(self) -> bool {
        match self {
            Self::Host | Self::Threads => true,
            Self::Cuda => cfg!(feature = "cuda"),
            Self::Undefined => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Host => "host",
            Self::Threads => "threads",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
