//! Process-wide configuration for stream pools
//!
//! The configuration is read once, the first time any pool is created. It can
//! be installed explicitly beforehand with [`PoolConfig::install`]; otherwise
//! it is built from the environment.
//!
//! # Environment Variables
//!
//! - `CONDUIT_THREAD_PREFIX` - Name prefix for worker stream threads
//! - `CONDUIT_WORKER_STACK_KB` - Worker thread stack size in KiB
//! - `CONDUIT_CUDA_DEVICE` - CUDA device ordinal used by the CUDA pool

use crate::error::{ResourceError, Result};
use std::env;
use std::sync::OnceLock;

static GLOBAL: OnceLock<PoolConfig> = OnceLock::new();

/// Settings consumed when stream pools are created
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker threads are named `{prefix}-{index}`
    pub thread_name_prefix: String,
    /// Stack size for worker threads; `None` keeps the platform default
    pub worker_stack_size: Option<usize>,
    /// Device ordinal for the CUDA stream pool
    pub cuda_device: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "conduit-stream".to_string(),
            worker_stack_size: None,
            cuda_device: 0,
        }
    }
}

impl PoolConfig {
    /// Build a configuration from `CONDUIT_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(prefix) = env::var("CONDUIT_THREAD_PREFIX") {
            if !prefix.trim().is_empty() {
                config.thread_name_prefix = prefix.trim().to_string();
            }
        }

        if let Ok(stack) = env::var("CONDUIT_WORKER_STACK_KB") {
            if let Ok(kib) = stack.trim().parse::<usize>() {
                config.worker_stack_size = Some(kib * 1024);
            }
        }

        if let Ok(device) = env::var("CONDUIT_CUDA_DEVICE") {
            if let Ok(ordinal) = device.trim().parse::<usize>() {
                config.cuda_device = ordinal;
            }
        }

        config
    }

    /// Install `config` as the process-wide configuration.
    ///
    /// # Errors
    ///
    /// Fails once the global configuration has been read or installed, since
    /// pools created earlier would not observe the change.
    pub fn install(config: PoolConfig) -> Result<()> {
        GLOBAL
            .set(config)
            .map_err(|_| ResourceError::Config("pool configuration already in use".to_string()))
    }

    /// The process-wide configuration, read from the environment on first use.
    pub fn global() -> &'static PoolConfig {
        GLOBAL.get_or_init(Self::from_env)
    }

    pub(crate) fn thread_name(&self, index: usize) -> String {
        format!("{}-{}", self.thread_name_prefix, index)
    }
}
