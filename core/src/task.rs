//! Handle for a request's in-flight transport work.
//!
//! Each started request runs its transport call on a dedicated worker
//! thread. The handle only carries an id and a shared state cell; cancelling
//! flips the state and the worker reports `RequestError::Cancelled` when the
//! transport returns. The transport call itself is not interrupted.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::debug;
use uuid::Uuid;

use crate::error::RequestError;

/// Lifecycle state of a `RequestTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Cancelled,
    Completed,
}

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const COMPLETED: u8 = 2;

/// Shared handle to one transport task.
#[derive(Debug, Clone)]
pub struct RequestTask {
    id: Uuid,
    state: Arc<AtomicU8>,
}

impl RequestTask {
    /// Run `work` on a new worker thread. `work` receives a handle to the
    /// task so it can observe cancellation.
    pub(crate) fn spawn<F>(work: F) -> Result<Self, RequestError>
    where
        F: FnOnce(RequestTask) + Send + 'static,
    {
        let task = RequestTask {
            id: Uuid::new_v4(),
            state: Arc::new(AtomicU8::new(RUNNING)),
        };
        let worker = task.clone();
        thread::Builder::new()
            .name(format!("reqkit-task-{}", task.id.simple()))
            .spawn(move || work(worker))
            .map_err(|e| RequestError::TaskSpawn(e.to_string()))?;
        debug!(task_id = %task.id, "spawned request task");
        Ok(task)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => TaskState::Running,
            CANCELLED => TaskState::Cancelled,
            _ => TaskState::Completed,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Mark the task cancelled. Has no effect once it completed.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            debug!(task_id = %self.id, "cancelled request task");
        }
        cancelled
    }

    /// Mark the task completed unless it was cancelled first. Returns
    /// whether the task was still running.
    pub(crate) fn complete(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
