//! The request object and its lifecycle.
//!
//! # Design
//! `Request<C>` pairs a `RequestConfig` with a `Session`. `start()` builds
//! the `HttpRequest`, runs the transport on a `RequestTask` worker, and posts
//! the resulting `Outcome` to the session's main context. There the outcome
//! is recorded, the delegate is notified and the completion block fires.
//! This happens exactly once per `start()`, success or failure, and always
//! on the thread draining the `MainContext`.
//!
//! Every `start()` gets a generation number and claims the current
//! completion block, so an outcome only ever reaches the block of the start
//! that produced it. Only one start may be active; `start()` while one is
//! active is ignored. `stop()` releases the active start right away and a
//! new `start()` may follow immediately. The stopped start's completion
//! fires with `RequestError::Cancelled` unless it already failed with an
//! error that `RequestError::is_transport` rejects.
//!
//! The completion block is claimed by the next `start()`, so it must be set
//! again before every start. The delegate is held weakly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use crate::client;
use crate::config::RequestConfig;
use crate::encoding::{string_encoding, TextEncoding};
use crate::error::RequestError;
use crate::http::ResponseHead;
use crate::outcome::{Outcome, ResponseObject};
use crate::session::Session;
use crate::task::RequestTask;

/// One-shot callback invoked with the finished request.
pub type CompletionBlock<C> = Box<dyn FnOnce(&Request<C>) + Send>;

/// Receives finish notifications on the main context.
pub trait RequestDelegate<C: RequestConfig>: Send + Sync {
    /// Called once per `start()`, before the completion block.
    fn request_finished(&self, _request: &Request<C>) {}
}

/// A configured request bound to a session.
pub struct Request<C: RequestConfig> {
    inner: Arc<Inner<C>>,
}

struct Inner<C: RequestConfig> {
    config: C,
    session: Session,
    state: Mutex<State<C>>,
}

struct State<C: RequestConfig> {
    next_generation: u64,
    /// Generation of the start that may still be stopped.
    active: Option<u64>,
    /// Starts whose completion has not been delivered yet.
    starts: Vec<Start<C>>,
    task: Option<RequestTask>,
    outcome: Option<Arc<Outcome>>,
    completion: Option<CompletionBlock<C>>,
    delegate: Option<Weak<dyn RequestDelegate<C>>>,
}

struct Start<C: RequestConfig> {
    generation: u64,
    task: Option<RequestTask>,
    completion: Option<CompletionBlock<C>>,
    stop_requested: bool,
}

impl<C: RequestConfig> State<C> {
    fn start_mut(&mut self, generation: u64) -> Option<&mut Start<C>> {
        self.starts.iter_mut().find(|s| s.generation == generation)
    }
}

impl<C: RequestConfig> Clone for Request<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RequestConfig> Request<C> {
    pub fn new(config: C, session: &Session) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                session: session.clone(),
                state: Mutex::new(State {
                    next_generation: 0,
                    active: None,
                    starts: Vec::new(),
                    task: None,
                    outcome: None,
                    completion: None,
                    delegate: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &C {
        &self.inner.config
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    fn state(&self) -> MutexGuard<'_, State<C>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Set the block the next `start()` reports to.
    pub fn set_completion_block<F>(&self, block: F)
    where
        F: FnOnce(&Request<C>) + Send + 'static,
    {
        self.state().completion = Some(Box::new(block));
    }

    /// Drop the unclaimed block and the blocks of every undelivered start.
    pub fn clear_completion_block(&self) {
        let mut state = self.state();
        state.completion = None;
        for start in &mut state.starts {
            start.completion = None;
        }
    }

    pub fn set_delegate<D>(&self, delegate: &Arc<D>)
    where
        D: RequestDelegate<C> + 'static,
    {
        let delegate = Arc::downgrade(delegate) as Weak<dyn RequestDelegate<C>>;
        self.state().delegate = Some(delegate);
    }

    pub fn clear_delegate(&self) {
        self.state().delegate = None;
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the request. Errors are delivered through the outcome.
    pub fn start(&self) {
        let generation = {
            let mut state = self.state();
            if state.active.is_some() {
                warn!("request already in flight; ignoring start");
                return;
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.active = Some(generation);
            state.outcome = None;
            state.task = None;
            let completion = state.completion.take();
            state.starts.push(Start {
                generation,
                task: None,
                completion,
                stop_requested: false,
            });
            generation
        };

        let built = client::build_request(&self.inner.config);

        let mut state = self.state();
        if state.start_mut(generation).is_none_or(|s| s.stop_requested) {
            debug!(generation, "request stopped before it was sent");
            return;
        }
        let http_request = match built {
            Ok(http_request) => http_request,
            Err(e) => {
                drop(state);
                warn!(error = %e, "failed to build request");
                self.deliver(generation, client::failed(&self.inner.config, e));
                return;
            }
        };

        let request = self.clone();
        let spawned = RequestTask::spawn(move |task| {
            let config = &request.inner.config;
            let result = request.inner.session.transport().execute(&http_request);
            if !task.complete() {
                debug!(task_id = %task.id(), "dropping result of cancelled task");
                return;
            }
            let outcome = match result {
                Ok(response) => client::parse_response(config, response),
                Err(e) => client::failed(config, e),
            };
            request.deliver(generation, outcome);
        });

        match spawned {
            Ok(task) => {
                debug!(task_id = %task.id(), generation, "request started");
                state.task = Some(task.clone());
                if let Some(start) = state.start_mut(generation) {
                    start.task = Some(task);
                }
            }
            Err(e) => {
                drop(state);
                warn!(error = %e, "failed to start request task");
                self.deliver(generation, client::failed(&self.inner.config, e));
            }
        }
    }

    /// Set `block` as the completion block and start.
    pub fn start_with_completion<F>(&self, block: F)
    where
        F: FnOnce(&Request<C>) + Send + 'static,
    {
        self.set_completion_block(block);
        self.start();
    }

    /// Cancel the active start, if any. Its completion still fires, with
    /// `RequestError::Cancelled`, and the request can be started again at
    /// once.
    pub fn stop(&self) {
        let (generation, task) = {
            let mut state = self.state();
            let Some(generation) = state.active.take() else {
                return;
            };
            match state.start_mut(generation) {
                Some(start) => {
                    start.stop_requested = true;
                    (generation, start.task.clone())
                }
                None => return,
            }
        };

        // A task that already completed has posted its outcome; `finish`
        // turns it into a cancellation.
        let post_cancel = task.as_ref().is_none_or(RequestTask::cancel);
        if post_cancel {
            self.deliver(
                generation,
                client::failed(&self.inner.config, RequestError::Cancelled),
            );
        }
        debug!(generation, "request stop requested");
    }

    /// True from `start()` until the completion has been delivered or
    /// `stop()` released the start.
    pub fn is_executing(&self) -> bool {
        self.state().active.is_some()
    }

    fn deliver(&self, generation: u64, outcome: Outcome) {
        let request = self.clone();
        self.inner
            .session
            .context()
            .post(move || request.finish(generation, outcome));
    }

    fn finish(&self, generation: u64, outcome: Outcome) {
        let (completion, delegate, outcome) = {
            let mut state = self.state();
            let Some(index) = state.starts.iter().position(|s| s.generation == generation) else {
                debug!(generation, "start already delivered");
                return;
            };
            let start = state.starts.remove(index);
            if state.active == Some(generation) {
                state.active = None;
            }
            let outcome = if start.stop_requested
                && outcome.error.as_ref().is_none_or(RequestError::is_transport)
            {
                client::failed(&self.inner.config, RequestError::Cancelled)
            } else {
                outcome
            };
            let outcome = Arc::new(outcome);
            state.outcome = Some(Arc::clone(&outcome));
            (
                start.completion,
                state.delegate.as_ref().and_then(Weak::upgrade),
                outcome,
            )
        };

        match &outcome.error {
            None => debug!(generation, status = outcome.status_code(), "request finished"),
            Some(e) => debug!(
                generation,
                status = outcome.status_code(),
                error = %e,
                network_bad = outcome.network_bad,
                "request failed"
            ),
        }

        if let Some(delegate) = delegate {
            delegate.request_finished(self);
        }
        if let Some(completion) = completion {
            completion(self);
        }
    }

    // -----------------------------------------------------------------------
    // Outcome accessors
    // -----------------------------------------------------------------------

    /// Handle of the most recently started task.
    pub fn task(&self) -> Option<RequestTask> {
        self.state().task.clone()
    }

    /// Everything recorded by the last completion.
    pub fn outcome(&self) -> Option<Arc<Outcome>> {
        self.state().outcome.clone()
    }

    pub fn error(&self) -> Option<RequestError> {
        self.outcome().and_then(|o| o.error.clone())
    }

    pub fn response(&self) -> Option<ResponseHead> {
        self.outcome().and_then(|o| o.response.clone())
    }

    pub fn response_status_code(&self) -> Option<u16> {
        self.outcome().and_then(|o| o.status_code())
    }

    pub fn response_data(&self) -> Option<Vec<u8>> {
        self.outcome().and_then(|o| o.response_data.clone())
    }

    pub fn response_object(&self) -> Option<ResponseObject> {
        self.outcome().and_then(|o| o.response_object.clone())
    }

    pub fn response_string(&self) -> Option<String> {
        self.outcome().and_then(|o| o.response_string.clone())
    }

    /// `status_code_validator` applied to the recorded status. False when
    /// no response was received.
    pub fn is_status_code_valid(&self) -> bool {
        self.response_status_code()
            .is_some_and(|status| self.inner.config.status_code_validator(status))
    }

    /// Verdict of `network_bad_validator` for the last failure.
    pub fn is_network_bad(&self) -> bool {
        self.outcome().is_some_and(|o| o.network_bad)
    }

    /// Encoding declared for decoding the response body.
    pub fn string_encoding(&self) -> TextEncoding {
        string_encoding(&self.inner.config)
    }
}

impl<C: RequestConfig> std::fmt::Debug for Request<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Request")
            .field("task", &state.task)
            .field("active", &state.active)
            .field("undelivered", &state.starts.len())
            .field("outcome", &state.outcome)
            .finish_non_exhaustive()
    }
}
