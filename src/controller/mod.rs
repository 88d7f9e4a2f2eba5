//! The admission controller.

use std::sync::{
    atomic::{self, AtomicUsize},
    Arc,
};

use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::{
    executor::Executor,
    limits::{LatencyBand, LimitAlgorithm},
    options::{ConfigError, Options},
};
use admission::Admission;

mod admission;
mod item;
mod queue;
mod slot;

/// Admits enqueued payloads to an [Executor] in FIFO order, never running more at once than the
/// current concurrency limit.
///
/// The limit is adjusted after every completed execution using a [LatencyBand]: fast executions
/// raise it, slow or failed ones lower it.
///
/// Cheaply cloneable. All clones feed the same queue.
#[derive(Debug)]
pub struct Controller<P> {
    requests: mpsc::UnboundedSender<Vec<P>>,
    state: watch::Receiver<ControllerState>,
    /// Payloads handed to the admission loop so far, across all clones.
    submitted: Arc<AtomicUsize>,
    options: Options,
}

/// A snapshot of the state of a [Controller].
///
/// Taken after the last event the controller processed, so it may lag behind recent
/// [Controller::enqueue] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    limit: usize,
    in_flight: usize,
    executing: usize,
    queued: usize,
    running: bool,
    received: usize,
}

impl<P> Controller<P>
where
    P: Send + 'static,
{
    /// Create a controller and start its admission loop.
    ///
    /// # Panics
    ///
    /// When called outside of a tokio runtime.
    pub fn new<E>(executor: E, options: Options) -> Result<Self, ConfigError>
    where
        E: Executor<P>,
    {
        options.validate()?;

        Ok(Self::with_algorithm(
            executor,
            options,
            LatencyBand::from(&options),
        ))
    }

    pub(crate) fn with_algorithm<E, L>(executor: E, options: Options, limit_algo: L) -> Self
    where
        E: Executor<P>,
        L: LimitAlgorithm,
    {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (completions, completions_rx) = mpsc::unbounded_channel();

        let admission = Admission::new(
            executor,
            limit_algo,
            options.starting_in_flight(),
            completions,
        );
        let state = admission.subscribe();

        tokio::spawn(admission.run(requests_rx, completions_rx));

        Self {
            requests,
            state,
            submitted: Arc::new(AtomicUsize::new(0)),
            options,
        }
    }

    /// Add a payload to the back of the queue.
    ///
    /// Returns immediately. The queue is unbounded.
    pub fn enqueue(&self, payload: P) {
        self.enqueue_all([payload]);
    }

    /// Add payloads to the back of the queue, in iteration order.
    ///
    /// Returns immediately. The queue is unbounded.
    pub fn enqueue_all<I>(&self, payloads: I)
    where
        I: IntoIterator<Item = P>,
    {
        let payloads: Vec<P> = payloads.into_iter().collect();
        if payloads.is_empty() {
            return;
        }

        let count = payloads.len();
        self.submitted.fetch_add(count, atomic::Ordering::SeqCst);

        if self.requests.send(payloads).is_err() {
            // Only possible while the runtime is shutting down.
            warn!(count, "Admission loop has stopped, payloads were not enqueued.");
        }
    }
}

impl<P> Controller<P> {
    /// The current state of the controller.
    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// The options this controller was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Wait until everything enqueued so far has been executed.
    ///
    /// Payloads enqueued by other clones while waiting may extend the wait.
    pub async fn idle(&self) {
        let submitted = self.submitted.load(atomic::Ordering::SeqCst);
        let mut state = self.state.clone();

        // Fails only once the admission loop has stopped, by which point nothing is left to run.
        let _ = state
            .wait_for(|state| state.received >= submitted && state.is_idle())
            .await;
    }
}

impl<P> Clone for Controller<P> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            state: self.state.clone(),
            submitted: Arc::clone(&self.submitted),
            options: self.options,
        }
    }
}

impl ControllerState {
    /// The current concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
    /// The number of occupied slots, including the starting baseline.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
    /// The number of free slots.
    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.in_flight)
    }
    /// The number of payloads waiting to be admitted.
    pub fn queued(&self) -> usize {
        self.queued
    }
    /// Whether an admission sweep is active.
    pub fn is_running(&self) -> bool {
        self.running
    }
    /// Whether nothing is queued or executing.
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.executing == 0
    }
}
