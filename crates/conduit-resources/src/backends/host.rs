//! Host backend
//!
//! Runs every operation synchronously on the calling thread. Events are
//! complete as soon as they exist, `wait` returns immediately, and memory
//! comes from the shared [`HostHeap`].

use crate::backend::{Backend, BackendEvent};
use crate::error::Result;
use crate::memory::HostHeap;
use crate::platform::Platform;
use std::ptr;

/// Event on the host timeline; always complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostEvent;

impl HostEvent {
    pub fn new() -> Self {
        Self
    }
}

impl BackendEvent for HostEvent {
    fn platform(&self) -> Platform {
        Platform::Host
    }

    fn check(&self) -> Result<bool> {
        Ok(true)
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }
}

/// Synchronous host resource
#[derive(Debug, Clone, Copy, Default)]
pub struct Host;

impl Host {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for Host {
    type Event = HostEvent;

    fn get_platform(&self) -> Platform {
        Platform::Host
    }

    fn get_default() -> Result<&'static Self> {
        static DEFAULT: Host = Host;
        Ok(&DEFAULT)
    }

    fn get_event(&self) -> Result<HostEvent> {
        Ok(HostEvent)
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }

    fn enqueue_wait(&self, _event: &HostEvent) -> Result<()> {
        // Host work is complete by the time the event exists
        Ok(())
    }

    fn allocate_bytes(&self, size: usize) -> Result<*mut u8> {
        HostHeap::global().allocate(size)
    }

    unsafe fn free(&self, ptr: *mut u8) -> Result<()> {
        HostHeap::global().free(ptr)
    }

    unsafe fn memcpy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<()> {
        if size > 0 {
            ptr::copy_nonoverlapping(src, dst, size);
        }
        Ok(())
    }

    unsafe fn memset(&self, dst: *mut u8, value: u8, size: usize) -> Result<()> {
        if size > 0 {
            ptr::write_bytes(dst, value, size);
        }
        Ok(())
    }
}
