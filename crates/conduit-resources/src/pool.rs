//! Fixed-size pools of native streams
//!
//! Each backend keeps one [`StreamPool`] in a `static`. The first lookup
//! creates all [`POOL_SIZE`] streams exactly once; later lookups are plain
//! indexing. Streams are handed out either by explicit group (stable
//! affinity) or round-robin through a shared cursor.
//!
//! ```text
//! Selector::Group(n) ──► slot n % 16
//! Selector::Next     ──► lock { cursor = (cursor + 1) % 16 } ──► slot cursor
//! ```
//!
//! Pools are never torn down; their streams live until process exit.

use crate::error::{ResourceError, Result};
use crate::platform::Platform;
use parking_lot::Mutex;
use std::sync::OnceLock;

/// Number of native streams per backend pool
pub const POOL_SIZE: usize = 16;

/// Which pooled stream a resource should bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Selector {
    /// Next stream in round-robin order
    #[default]
    Next,
    /// Stream `n % POOL_SIZE`; the same group always maps to the same stream
    Group(usize),
}

impl From<i64> for Selector {
    fn from(value: i64) -> Self {
        if value < 0 {
            Self::Next
        } else {
            Self::Group(value as usize)
        }
    }
}

impl From<i32> for Selector {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<usize> for Selector {
    fn from(value: usize) -> Self {
        Self::Group(value)
    }
}

/// Lazily created, fixed set of [`POOL_SIZE`] streams
pub struct StreamPool<S> {
    platform: Platform,
    streams: OnceLock<std::result::Result<Box<[S]>, ResourceError>>,
    cursor: Mutex<usize>,
}

impl<S> StreamPool<S> {
    /// Create an empty pool; no streams exist until the first lookup
    pub const fn new(platform: Platform) -> Self {
        Self {
            platform,
            streams: OnceLock::new(),
            cursor: Mutex::new(0),
        }
    }

    /// Whether the one-time creation pass has run (successfully or not)
    pub fn is_initialized(&self) -> bool {
        self.streams.get().is_some()
    }

    /// Return the stream chosen by `selector`, creating the pool on first use.
    ///
    /// `create` is called once per slot, in slot order, by exactly one thread.
    /// Other threads arriving during creation block until it finishes. If any
    /// slot fails, the whole pool is marked failed and every call (current and
    /// future) returns the same [`ResourceError::PoolInit`].
    pub fn get_stream<F>(&self, selector: Selector, create: F) -> Result<&S>
    where
        F: FnMut(usize) -> Result<S>,
    {
        let streams = self.streams_or_init(create)?;

        let index = match selector {
            Selector::Group(group) => group % POOL_SIZE,
            Selector::Next => {
                let mut cursor = self.cursor.lock();
                *cursor = (*cursor + 1) % POOL_SIZE;
                *cursor
            }
        };

        Ok(&streams[index])
    }

    /// All pooled streams, creating them on first use
    pub fn streams<F>(&self, create: F) -> Result<&[S]>
    where
        F: FnMut(usize) -> Result<S>,
    {
        self.streams_or_init(create)
    }

    fn streams_or_init<F>(&self, create: F) -> Result<&[S]>
    where
        F: FnMut(usize) -> Result<S>,
    {
        match self.streams.get_or_init(|| self.create_all(create)) {
            Ok(streams) => Ok(streams),
            Err(err) => Err(err.clone()),
        }
    }

    fn create_all<F>(&self, mut create: F) -> std::result::Result<Box<[S]>, ResourceError>
    where
        F: FnMut(usize) -> Result<S>,
    {
        let mut streams = Vec::with_capacity(POOL_SIZE);
        for index in 0..POOL_SIZE {
            match create(index) {
                Ok(stream) => streams.push(stream),
                Err(err) => {
                    tracing::error!(platform = %self.platform, slot = index, error = %err, "stream pool creation failed");
                    return Err(match err {
                        ResourceError::PoolInit { .. } => err,
                        other => ResourceError::pool_init(self.platform, other.to_string()),
                    });
                }
            }
        }

        tracing::info!(platform = %self.platform, streams = POOL_SIZE, "stream pool initialized");
        Ok(streams.into_boxed_slice())
    }
}
