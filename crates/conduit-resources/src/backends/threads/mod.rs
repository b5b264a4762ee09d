//! Threads backend
//!
//! Software accelerator backend: each of the 16 pooled streams is a
//! [`WorkerStream`] with its own OS thread. Copies and fills are enqueued on
//! the stream and run asynchronously; events are stream tickets. Memory comes
//! from the shared [`HostHeap`], so it is directly host-visible.
//!
//! # Architecture
//!
//! ```text
//! Threads ──► Arc<WorkerStream> ◄── StreamPool (static, 16 slots)
//!    │              │
//!    │              └── worker thread: jobs in enqueue order
//!    └── ThreadsEvent { stream, ticket }
//! ```

mod stream;

pub use stream::WorkerStream;

use crate::backend::{Backend, BackendEvent};
use crate::config::PoolConfig;
use crate::error::{ResourceError, Result};
use crate::memory::HostHeap;
use crate::platform::Platform;
use crate::pool::{Selector, StreamPool};
use std::fmt;
use std::ptr;
use std::sync::{Arc, OnceLock};

static POOL: StreamPool<Arc<WorkerStream>> = StreamPool::new(Platform::Threads);

/// Raw pointer moved into a job
#[derive(Clone, Copy)]
struct SendPtr(*mut u8);

// SAFETY: callers of the enqueuing operations guarantee the memory outlives
// the job, and the job is the only user while it runs
unsafe impl Send for SendPtr {}

impl SendPtr {
    fn get(self) -> *mut u8 {
        self.0
    }
}

/// Point in a worker stream's order
#[derive(Clone)]
pub struct ThreadsEvent {
    stream: Arc<WorkerStream>,
    ticket: u64,
}

impl ThreadsEvent {
    fn record(stream: &Arc<WorkerStream>) -> Self {
        Self {
            stream: Arc::clone(stream),
            ticket: stream.record(),
        }
    }

    /// Stream this event was recorded on
    pub fn stream(&self) -> &Arc<WorkerStream> {
        &self.stream
    }

    /// Number of jobs the event waits for
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl fmt::Debug for ThreadsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadsEvent")
            .field("stream", &self.stream.index())
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl BackendEvent for ThreadsEvent {
    fn platform(&self) -> Platform {
        Platform::Threads
    }

    fn check(&self) -> Result<bool> {
        self.stream.is_complete(self.ticket)
    }

    fn wait(&self) -> Result<()> {
        self.stream.wait_for(self.ticket)
    }
}

/// Resource bound to one pooled worker stream
///
/// Cloning is cheap; clones share the stream. The pool, not the resource,
/// owns the stream.
#[derive(Clone)]
pub struct Threads {
    stream: Arc<WorkerStream>,
}

impl Threads {
    /// Bind to a pooled stream chosen by `selector`.
    ///
    /// Negative integers select round-robin; non-negative ones pick the
    /// stream `n % 16`.
    ///
    /// ```rust
    /// use conduit_resources::Threads;
    ///
    /// let a = Threads::new(3)?;
    /// let b = Threads::new(19)?;
    /// assert_eq!(a.get_stream().index(), b.get_stream().index());
    /// # Ok::<(), conduit_resources::ResourceError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// [`ResourceError::PoolInit`] if the worker threads could not be
    /// started. The failure is permanent for the process.
    pub fn new(selector: impl Into<Selector>) -> Result<Self> {
        let stream = POOL.get_stream(selector.into(), |index| WorkerStream::spawn(index, PoolConfig::global()))?;
        Ok(Self {
            stream: Arc::clone(stream),
        })
    }

    /// Bind to the next stream in round-robin order
    pub fn round_robin() -> Result<Self> {
        Self::new(Selector::Next)
    }

    /// The pooled stream this resource enqueues on
    pub fn get_stream(&self) -> &Arc<WorkerStream> {
        &self.stream
    }

    /// Enqueue a host closure on this resource's stream
    #[cfg(test)]
    pub(crate) fn launch_host_fn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.stream
            .enqueue(Box::new(move || {
                f();
                Ok(())
            }))
            .map(|_| ())
    }
}

impl fmt::Debug for Threads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Threads").field("stream", &self.stream.index()).finish()
    }
}

impl Backend for Threads {
    type Event = ThreadsEvent;

    fn get_platform(&self) -> Platform {
        Platform::Threads
    }

    fn get_default() -> Result<&'static Self> {
        static DEFAULT: OnceLock<std::result::Result<Threads, ResourceError>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| {
                let resource = Threads::round_robin();
                tracing::debug!(ok = resource.is_ok(), "created default threads resource");
                resource
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    fn get_event(&self) -> Result<ThreadsEvent> {
        Ok(ThreadsEvent::record(&self.stream))
    }

    fn wait(&self) -> Result<()> {
        self.stream.synchronize()
    }

    fn enqueue_wait(&self, event: &ThreadsEvent) -> Result<()> {
        // Same stream: enqueue order already provides the dependency
        if Arc::ptr_eq(&self.stream, &event.stream) {
            return Ok(());
        }

        tracing::trace!(
            stream = self.stream.index(),
            on_stream = event.stream.index(),
            ticket = event.ticket,
            "stream wait on event"
        );
        let event = event.clone();
        self.stream
            .enqueue(Box::new(move || event.wait().map_err(|err| err.to_string())))
            .map(|_| ())
    }

    fn allocate_bytes(&self, size: usize) -> Result<*mut u8> {
        HostHeap::global().allocate(size)
    }

    unsafe fn free(&self, ptr: *mut u8) -> Result<()> {
        HostHeap::global().free(ptr)
    }

    unsafe fn memcpy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let dst = SendPtr(dst);
        let src = SendPtr(src as *mut u8);
        self.stream
            .enqueue(Box::new(move || {
                // SAFETY: the caller keeps both ranges alive until the copy completes
                unsafe { ptr::copy_nonoverlapping(src.get() as *const u8, dst.get(), size) };
                Ok(())
            }))
            .map(|_| ())
    }

    unsafe fn memset(&self, dst: *mut u8, value: u8, size: usize) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let dst = SendPtr(dst);
        self.stream
            .enqueue(Box::new(move || {
                // SAFETY: the caller keeps the range alive until the fill completes
                unsafe { ptr::write_bytes(dst.get(), value, size) };
                Ok(())
            }))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Host, HostEvent};
    use crate::pool::POOL_SIZE;
    use crate::Event;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_group_affinity() {
        for group in 0..POOL_SIZE {
            let a = Threads::new(group as i64).unwrap();
            let b = Threads::new((group + POOL_SIZE) as i64).unwrap();
            assert!(Arc::ptr_eq(a.get_stream(), b.get_stream()));
            assert_eq!(a.get_stream().index(), group);
        }
    }

    #[test]
    fn test_round_robin_covers_pool() {
        // Other tests may advance the cursor concurrently, so only check that
        // every handed-out stream is a pool member
        let indices: HashSet<usize> = (0..POOL_SIZE)
            .map(|_| Threads::round_robin().unwrap().get_stream().index())
            .collect();
        assert!(indices.iter().all(|&i| i < POOL_SIZE));
    }

    #[test]
    fn test_default_is_singleton() {
        let a = Threads::get_default().unwrap();
        let b = Threads::get_default().unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.get_platform(), Platform::Threads);
    }

    #[test]
    fn test_check_after_wait() {
        let threads = Threads::new(5).unwrap();
        let buffer = threads.allocate::<u8>(1024).unwrap();
        unsafe { threads.memset(buffer, 7, 1024).unwrap() };
        let event = threads.get_event().unwrap();
        event.wait().unwrap();
        assert!(event.check().unwrap());
        assert!(event.check().unwrap());
        unsafe { threads.free(buffer).unwrap() };
    }

    #[test]
    fn test_same_backend_wait_on_does_not_block() {
        let producer = Threads::new(12).unwrap();
        let consumer = Threads::new(13).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (release, gate) = mpsc::channel::<()>();

        let log = Arc::clone(&order);
        producer
            .launch_host_fn(move || {
                gate.recv().ok();
                log.lock().push("producer");
            })
            .unwrap();
        let event: Event = producer.get_event().unwrap().into();

        // Returns while the producer is still held at the gate
        consumer.wait_on(&event).unwrap();
        assert!(!event.check().unwrap());

        let log = Arc::clone(&order);
        consumer.launch_host_fn(move || log.lock().push("consumer")).unwrap();

        release.send(()).unwrap();
        consumer.wait().unwrap();
        assert_eq!(*order.lock(), vec!["producer", "consumer"]);
    }

    #[test]
    fn test_same_stream_wait_on_is_noop() {
        let threads = Threads::new(14).unwrap();
        let before = threads.get_stream().record();
        let event = threads.get_event_erased().unwrap();
        threads.wait_on(&event).unwrap();
        assert_eq!(threads.get_stream().record(), before);
    }

    #[test]
    fn test_foreign_wait_on_blocks_until_complete() {
        let threads = Threads::new(15).unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let (release, gate) = mpsc::channel::<()>();

        let flag = Arc::clone(&done);
        threads
            .launch_host_fn(move || {
                gate.recv().ok();
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        let event = threads.get_event_erased().unwrap();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();
        });

        // Host cannot express a stream dependency, so it blocks
        Host::new().wait_on(&event).unwrap();
        assert!(done.load(Ordering::SeqCst));
        releaser.join().unwrap();
    }

    #[test]
    fn test_host_event_is_foreign_but_complete() {
        let threads = Threads::new(6).unwrap();
        let event: Event = HostEvent::new().into();
        let before = threads.get_stream().record();
        threads.wait_on(&event).unwrap();
        assert_eq!(threads.get_stream().record(), before);
    }

    #[test]
    fn test_async_memcpy() {
        let threads = Threads::new(8).unwrap();
        let src = threads.allocate::<u32>(256).unwrap();
        let dst = threads.calloc(256 * 4).unwrap();
        unsafe {
            for i in 0..256 {
                src.add(i).write(i as u32);
            }
            threads.memcpy(dst, src.cast(), 256 * 4).unwrap();
            threads.wait().unwrap();
            let copied = std::slice::from_raw_parts(dst.cast::<u32>(), 256);
            assert!(copied.iter().enumerate().all(|(i, &v)| v == i as u32));
            threads.free(src.cast()).unwrap();
            threads.free(dst).unwrap();
        }
    }
}
