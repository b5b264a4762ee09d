//! Error types for resource operations

use crate::platform::Platform;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors that can occur while creating or driving resources
///
/// Errors are cloneable so that a failed one-time stream pool initialisation
/// can be handed to every later caller without re-running creation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// Creating the native streams of a pool failed
    #[error("{platform} stream pool initialization failed: {reason}")]
    PoolInit { platform: Platform, reason: String },

    /// A stream executed a failing operation; the stream stays faulted
    #[error("stream {stream} faulted: {message}")]
    StreamFault { stream: usize, message: String },

    /// Native runtime error code, passed through unchanged
    #[error("{platform} runtime error: {code}")]
    Backend { platform: Platform, code: String },

    /// Allocator refused the request
    #[error("allocation of {size} bytes failed")]
    AllocationFailed { size: usize },

    /// `count * size_of::<T>()` does not fit in `usize`
    #[error("allocation size overflow: {count} elements of {elem_size} bytes")]
    AllocationOverflow { count: usize, elem_size: usize },

    /// Pointer was not issued by a compatible allocator (or was already freed)
    #[error("pointer {0:#x} was not allocated by this backend")]
    InvalidPointer(usize),

    /// Host data does not fit the destination buffer
    #[error("size mismatch: buffer holds {capacity} elements, got {actual}")]
    SizeMismatch { capacity: usize, actual: usize },

    /// Backend not compiled into this build
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid or late configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ResourceError {
    /// Create a pool initialisation error
    pub fn pool_init(platform: Platform, reason: impl Into<String>) -> Self {
        Self::PoolInit {
            platform,
            reason: reason.into(),
        }
    }

    /// Wrap a native runtime error code
    pub fn backend(platform: Platform, code: impl std::fmt::Display) -> Self {
        Self::Backend {
            platform,
            code: code.to_string(),
        }
    }

    /// Create an unsupported backend error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
