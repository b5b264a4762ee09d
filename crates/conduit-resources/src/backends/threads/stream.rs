//! Worker-thread stream
//!
//! A [`WorkerStream`] is an ordered queue of host jobs drained by one
//! dedicated OS thread. Every enqueue returns a ticket; the stream has
//! finished a ticket once `completed >= ticket`. Events are just tickets.
//!
//! ```text
//!   enqueue ──► [ job 4 | job 3 | job 2 ] ──► worker thread ──► completed = 1
//!              enqueued = 4
//! ```
//!
//! A job that fails or panics faults the stream. The fault is sticky: queued
//! jobs are skipped, new enqueues are refused, and every later query or wait
//! reports [`ResourceError::StreamFault`].

use crate::config::PoolConfig;
use crate::error::{ResourceError, Result};
use crate::platform::Platform;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Unit of work run on a worker thread
pub(crate) type Job = Box<dyn FnOnce() -> std::result::Result<(), String> + Send + 'static>;

struct StreamState {
    queue: VecDeque<Job>,
    /// Jobs ever enqueued
    enqueued: u64,
    /// Jobs finished (run or skipped)
    completed: u64,
    fault: Option<String>,
}

/// Ordered asynchronous job queue backed by a worker thread
pub struct WorkerStream {
    index: usize,
    state: Mutex<StreamState>,
    work_ready: Condvar,
    progress: Condvar,
}

impl WorkerStream {
    /// Create the stream for pool slot `index` and start its worker thread.
    ///
    /// The worker runs until process exit.
    pub fn spawn(index: usize, config: &PoolConfig) -> Result<Arc<Self>> {
        let stream = Arc::new(Self {
            index,
            state: Mutex::new(StreamState {
                queue: VecDeque::new(),
                enqueued: 0,
                completed: 0,
                fault: None,
            }),
            work_ready: Condvar::new(),
            progress: Condvar::new(),
        });

        let mut builder = thread::Builder::new().name(config.thread_name(index));
        if let Some(stack_size) = config.worker_stack_size {
            builder = builder.stack_size(stack_size);
        }

        let worker = Arc::clone(&stream);
        builder.spawn(move || worker.run()).map_err(|err| {
            ResourceError::pool_init(Platform::Threads, format!("failed to spawn worker {}: {}", index, err))
        })?;

        Ok(stream)
    }

    /// Pool slot of this stream
    pub fn index(&self) -> usize {
        self.index
    }

    /// Append `job`; returns the ticket that completes when it has run
    pub(crate) fn enqueue(&self, job: Job) -> Result<u64> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fault {
            return Err(self.fault_error(message));
        }

        state.queue.push_back(job);
        state.enqueued += 1;
        let ticket = state.enqueued;
        drop(state);

        self.work_ready.notify_one();
        tracing::trace!(stream = self.index, ticket, "job enqueued");
        Ok(ticket)
    }

    /// Ticket covering all work enqueued so far
    pub fn record(&self) -> u64 {
        self.state.lock().enqueued
    }

    /// Number of jobs finished so far
    pub fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    /// Jobs enqueued but not yet finished
    pub fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.enqueued - state.completed
    }

    /// Non-blocking: whether `ticket` has been reached
    pub fn is_complete(&self, ticket: u64) -> Result<bool> {
        let state = self.state.lock();
        if let Some(message) = &state.fault {
            return Err(self.fault_error(message));
        }
        Ok(state.completed >= ticket)
    }

    /// Block the calling thread until `ticket` has been reached
    pub fn wait_for(&self, ticket: u64) -> Result<()> {
        let mut state = self.state.lock();
        while state.completed < ticket && state.fault.is_none() {
            self.progress.wait(&mut state);
        }
        match &state.fault {
            Some(message) => Err(self.fault_error(message)),
            None => Ok(()),
        }
    }

    /// Block until everything enqueued before this call has finished
    pub fn synchronize(&self) -> Result<()> {
        let ticket = self.record();
        self.wait_for(ticket)
    }

    /// Whether a job has failed on this stream
    pub fn is_faulted(&self) -> bool {
        self.state.lock().fault.is_some()
    }

    fn fault_error(&self, message: &str) -> ResourceError {
        ResourceError::StreamFault {
            stream: self.index,
            message: message.to_string(),
        }
    }

    fn run(&self) {
        loop {
            let (job, skip) = {
                let mut state = self.state.lock();
                while state.queue.is_empty() {
                    self.work_ready.wait(&mut state);
                }
                (state.queue.pop_front(), state.fault.is_some())
            };
            let Some(job) = job else { continue };

            let outcome = if skip {
                Ok(())
            } else {
                match panic::catch_unwind(AssertUnwindSafe(job)) {
                    Ok(result) => result,
                    Err(payload) => Err(panic_message(payload)),
                }
            };

            let mut state = self.state.lock();
            if let Err(message) = outcome {
                tracing::error!(stream = self.index, error = %message, "stream faulted");
                state.fault.get_or_insert(message);
            }
            state.completed += 1;
            drop(state);
            self.progress.notify_all();
        }
    }
}

impl fmt::Debug for WorkerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerStream")
            .field("index", &self.index)
            .field("pending", &self.pending())
            .field("faulted", &self.is_faulted())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn stream() -> Arc<WorkerStream> {
        WorkerStream::spawn(99, &PoolConfig::default()).unwrap()
    }

    #[test]
    fn test_jobs_run_in_order() {
        let stream = stream();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..32 {
            let log = Arc::clone(&log);
            stream
                .enqueue(Box::new(move || {
                    log.lock().push(i);
                    Ok(())
                }))
                .unwrap();
        }
        stream.synchronize().unwrap();
        assert_eq!(*log.lock(), (0..32).collect::<Vec<_>>());
        assert_eq!(stream.pending(), 0);
    }

    #[test]
    fn test_tickets_track_completion() {
        let stream = stream();
        let (release, gate) = mpsc::channel::<()>();

        let ticket = stream
            .enqueue(Box::new(move || {
                gate.recv().map_err(|e| e.to_string())
            }))
            .unwrap();
        assert_eq!(ticket, 1);
        assert_eq!(stream.record(), 1);
        assert!(!stream.is_complete(ticket).unwrap());

        release.send(()).unwrap();
        stream.wait_for(ticket).unwrap();
        assert!(stream.is_complete(ticket).unwrap());
        assert_eq!(stream.completed(), 1);
    }

    #[test]
    fn test_zero_ticket_is_complete() {
        let stream = stream();
        assert!(stream.is_complete(0).unwrap());
        stream.synchronize().unwrap();
    }

    #[test]
    fn test_worker_thread_is_named() {
        let config = PoolConfig {
            thread_name_prefix: "named-q".to_string(),
            ..PoolConfig::default()
        };
        let stream = WorkerStream::spawn(7, &config).unwrap();
        let (tx, rx) = mpsc::channel();
        stream
            .enqueue(Box::new(move || {
                tx.send(thread::current().name().map(str::to_string))
                    .map_err(|e| e.to_string())
            }))
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("named-q-7"));
    }

    #[test]
    fn test_panic_faults_stream() {
        let stream = stream();
        let ran = Arc::new(AtomicUsize::new(0));

        stream.enqueue(Box::new(|| panic!("bad copy"))).unwrap();
        let counter = Arc::clone(&ran);
        let _ = stream.enqueue(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let err = stream.synchronize().unwrap_err();
        assert_eq!(
            err,
            ResourceError::StreamFault {
                stream: 99,
                message: "bad copy".to_string()
            }
        );
        assert!(stream.is_faulted());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fault_is_sticky() {
        let stream = stream();
        stream.enqueue(Box::new(|| Err("device lost".to_string()))).unwrap();
        assert!(stream.synchronize().is_err());

        assert!(stream.is_complete(0).is_err());
        let refused = stream.enqueue(Box::new(|| Ok(())));
        assert!(matches!(refused, Err(ResourceError::StreamFault { .. })));
    }

    #[test]
    fn test_debug_reports_queue_state() {
        let stream = stream();
        stream.synchronize().unwrap();
        let idle = format!("{:?}", stream);
        assert!(idle.contains("pending: 0"), "{}", idle);
        assert!(idle.contains("faulted: false"), "{}", idle);

        stream.enqueue(Box::new(|| Err("lost".to_string()))).unwrap();
        assert!(stream.synchronize().is_err());
        assert!(format!("{:?}", stream).contains("faulted: true"));
    }
}
