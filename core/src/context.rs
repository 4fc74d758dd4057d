//! The caller's main execution context.
//!
//! # Design
//! Completion callbacks must run on the thread that owns the requests, no
//! matter which worker finished the transport call. Workers post boxed jobs
//! through a cloneable `ContextHandle`; the owning thread drains them with
//! `MainContext::run_pending` or `MainContext::run_next` from its event loop.
//! Jobs run in the order they were posted.
//!
//! If the `MainContext` has been dropped, posted jobs are discarded and the
//! drop is logged.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::warn;

/// A unit of work queued for the main context.
pub type Job = Box<dyn FnOnce() + Send>;

/// Queue of jobs executed on the thread that drains it.
pub struct MainContext {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MainContext {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Handle used to post jobs from any thread.
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            sender: self.sender.clone(),
        }
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run every job queued right now on the calling thread. Jobs posted
    /// while draining wait for the next call.
    pub fn run_pending(&self) -> usize {
        let queued = self.receiver.len();
        let mut ran = 0;
        while ran < queued {
            match self.receiver.try_recv() {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Wait up to `timeout` for one job and run it. Returns whether a job
    /// ran.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Cloneable, `Send` handle for posting jobs to a `MainContext`.
#[derive(Clone)]
pub struct ContextHandle {
    sender: Sender<Job>,
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl ContextHandle {
    /// Queue `job` for the main context.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(job)).is_err() {
            warn!("main context dropped; discarding job");
        }
    }
}
