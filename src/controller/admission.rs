use std::panic::{self, AssertUnwindSafe};

use tokio::sync::{
    mpsc::{UnboundedReceiver, UnboundedSender},
    watch,
};
use tracing::{debug, trace, warn};

use crate::{
    executor::Executor,
    limits::{LimitAlgorithm, Outcome, Sample},
};

use super::{
    item::WorkItem,
    queue::PendingQueue,
    slot::{Completion, Slot},
    ControllerState,
};

/// Owns every piece of mutable controller state, and reacts to two kinds of event: payloads being
/// enqueued, and executions completing.
///
/// Only one task ever touches this, so no locking is needed. Executions run on their own tasks.
#[derive(Debug)]
pub(crate) struct Admission<P, E, L> {
    executor: E,
    limit_algo: L,
    queue: PendingQueue<P>,

    /// Includes the starting baseline.
    in_flight: usize,
    /// Executions actually running.
    executing: usize,
    /// Whether a sweep has dispatched and has not yet found the queue empty.
    running: bool,
    received: usize,

    completions: UnboundedSender<Completion>,
    state: watch::Sender<ControllerState>,
}

impl<P, E, L> Admission<P, E, L>
where
    P: Send + 'static,
    E: Executor<P>,
    L: LimitAlgorithm,
{
    pub(crate) fn new(
        executor: E,
        limit_algo: L,
        starting_in_flight: usize,
        completions: UnboundedSender<Completion>,
    ) -> Self {
        let (state, _) = watch::channel(ControllerState {
            limit: limit_algo.limit(),
            in_flight: starting_in_flight,
            executing: 0,
            queued: 0,
            running: false,
            received: 0,
        });

        Self {
            executor,
            limit_algo,
            queue: PendingQueue::new(),
            in_flight: starting_in_flight,
            executing: 0,
            running: false,
            received: 0,
            completions,
            state,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Process events until every [Controller](super::Controller) handle has gone, and everything
    /// enqueued has been executed.
    pub(crate) async fn run(
        mut self,
        mut requests: UnboundedReceiver<Vec<P>>,
        mut completions: UnboundedReceiver<Completion>,
    ) {
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;

                Some(completion) = completions.recv() => self.on_completion(completion),

                request = requests.recv(), if accepting => match request {
                    Some(payloads) => self.on_enqueue(payloads),
                    None => accepting = false,
                },

                else => break,
            }

            if !accepting && self.executing == 0 && self.queue.is_empty() {
                break;
            }
        }

        debug!(limit = self.limit_algo.limit(), "Admission loop stopped.");
    }

    pub(crate) fn on_enqueue(&mut self, payloads: Vec<P>) {
        let count = payloads.len();
        self.received += count;
        self.queue.enqueue(payloads);

        trace!(count, queued = self.queue.len(), running = self.running, "Enqueued.");

        // A running sweep will be picked up again by the next completion.
        if !self.running {
            self.fill();
        }

        self.publish();
    }

    pub(crate) fn on_completion(&mut self, completion: Completion) {
        let sample = Sample {
            latency: completion.stamps.latency(),
            in_flight: self.executing,
            outcome: completion.outcome,
        };

        debug_assert!(self.executing > 0, "completion without an execution");
        self.in_flight = self.in_flight.saturating_sub(1);
        self.executing = self.executing.saturating_sub(1);

        let old_limit = self.limit_algo.limit();
        let new_limit = self.limit_algo.update(sample);
        if new_limit != old_limit {
            debug!(
                old_limit,
                new_limit,
                latency = ?completion.stamps.latency(),
                outcome = ?completion.outcome,
                "Concurrency limit changed."
            );
        }

        self.fill();
        self.publish();
    }

    /// Dispatch one queued item per available slot.
    fn fill(&mut self) {
        let available = self.limit_algo.limit().saturating_sub(self.in_flight);
        if available == 0 {
            trace!(in_flight = self.in_flight, "Saturated.");
            return;
        }

        for _ in 0..available {
            match self.queue.dequeue_front() {
                Some(item) => {
                    self.running = true;
                    self.dispatch(item);
                }
                None => {
                    self.running = false;
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, item: WorkItem<P>) {
        debug_assert!(self.in_flight < self.limit_algo.limit());

        let (payload, stamps) = item.admit();
        self.in_flight += 1;
        self.executing += 1;

        let slot = Slot::new(stamps, self.completions.clone());

        // Called here rather than on the spawned task, so payloads reach the executor in order.
        let execution =
            match panic::catch_unwind(AssertUnwindSafe(|| self.executor.execute(payload))) {
                Ok(execution) => execution,
                Err(_) => {
                    warn!("Executor panicked while starting an execution.");
                    // Dropping the slot reports the failure.
                    return;
                }
            };

        tokio::spawn(async move {
            match execution.await {
                Ok(()) => slot.complete(Outcome::Success),
                Err(error) => {
                    warn!(%error, "Execution failed.");
                    slot.complete(Outcome::Failure);
                }
            }
        });
    }

    fn publish(&self) {
        self.state.send_replace(ControllerState {
            limit: self.limit_algo.limit(),
            in_flight: self.in_flight,
            executing: self.executing,
            queued: self.queue.len(),
            running: self.running,
            received: self.received,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use tokio::{sync::mpsc, time::Instant};

    use crate::{
        controller::{item::Stamps, slot::Completion},
        limits::{mock::MockLimitAlgorithm, LatencyBand, Outcome, Sample},
    };

    use super::Admission;

    type Started = Arc<Mutex<Vec<char>>>;

    /// Records what it was given, then never finishes. Completions are fed in by hand.
    fn stalled() -> (
        impl Fn(char) -> future::Pending<Result<(), String>> + Send + Sync + 'static,
        Started,
    ) {
        let started = Started::default();
        let executor = {
            let started = Arc::clone(&started);
            move |c: char| {
                started.lock().unwrap().push(c);
                future::pending()
            }
        };
        (executor, started)
    }

    fn completion(latency_ms: u64, outcome: Outcome) -> Completion {
        Completion {
            stamps: Stamps::spanning(Instant::now(), Duration::from_millis(latency_ms)),
            outcome,
        }
    }

    #[tokio::test]
    async fn worked_example() {
        let (executor, started) = stalled();
        let (tx, _rx) = mpsc::unbounded_channel();
        let band = LatencyBand::new(
            2,
            1,
            Duration::from_millis(100),
            Duration::from_millis(50),
        );
        let mut admission = Admission::new(executor, band, 0, tx);
        let state = admission.subscribe();

        admission.on_enqueue(vec!['A', 'B', 'C']);

        assert_eq!(state.borrow().in_flight(), 2);
        assert_eq!(state.borrow().queued(), 1);
        assert!(state.borrow().is_running());

        // A: fast
        admission.on_completion(completion(50, Outcome::Success));
        assert_eq!(state.borrow().limit(), 3);
        assert_eq!(state.borrow().in_flight(), 2, "C admitted into the freed slot");
        assert_eq!(state.borrow().queued(), 0);

        // B: slow
        admission.on_completion(completion(200, Outcome::Success));
        assert_eq!(state.borrow().limit(), 2);

        // C: dead zone
        admission.on_completion(completion(120, Outcome::Success));
        assert_eq!(state.borrow().limit(), 2);
        assert_eq!(state.borrow().in_flight(), 0);
        assert!(!state.borrow().is_running());

        tokio::task::yield_now().await;
        assert_eq!(*started.lock().unwrap(), vec!['A', 'B', 'C']);
    }

    #[tokio::test]
    async fn never_dispatches_beyond_the_limit() {
        let (executor, _started) = stalled();
        let (tx, _rx) = mpsc::unbounded_channel();
        let algo = MockLimitAlgorithm::new(3);
        let mut admission = Admission::new(executor, algo.clone(), 0, tx);
        let state = admission.subscribe();

        admission.on_enqueue((0..10).map(|_| 'x').collect());
        assert_eq!(state.borrow().in_flight(), 3);
        assert_eq!(state.borrow().queued(), 7);

        // Limit drops below what is in flight: nothing new goes out.
        algo.set_limit(1);
        admission.on_completion(completion(10, Outcome::Success));
        assert_eq!(state.borrow().in_flight(), 2);
        assert_eq!(state.borrow().queued(), 7);

        admission.on_completion(completion(10, Outcome::Success));
        assert_eq!(state.borrow().in_flight(), 1);
        assert_eq!(state.borrow().queued(), 7);

        // Back to one free slot at a time.
        admission.on_completion(completion(10, Outcome::Success));
        assert_eq!(state.borrow().in_flight(), 1);
        assert_eq!(state.borrow().queued(), 6);
    }

    #[tokio::test]
    async fn starting_in_flight_occupies_slots() {
        let (executor, _started) = stalled();
        let (tx, _rx) = mpsc::unbounded_channel();
        let algo = MockLimitAlgorithm::new(4);
        let mut admission = Admission::new(executor, algo.clone(), 1, tx);
        let state = admission.subscribe();

        admission.on_enqueue(vec!['a'; 5]);

        assert_eq!(state.borrow().in_flight(), 4);
        assert_eq!(state.borrow().executing, 3);
        assert_eq!(state.borrow().available(), 0);

        // Samples count executions only, not the baseline.
        admission.on_completion(completion(10, Outcome::Success));
        assert_eq!(algo.samples()[0].in_flight(), 3);
    }

    #[tokio::test]
    async fn enqueue_while_running_waits_for_a_completion() {
        let (executor, _started) = stalled();
        let (tx, _rx) = mpsc::unbounded_channel();
        let algo = MockLimitAlgorithm::new(2);
        let mut admission = Admission::new(executor, algo.clone(), 0, tx);
        let state = admission.subscribe();

        // Fills both slots without ever seeing the queue empty.
        admission.on_enqueue(vec!['a', 'b']);
        assert!(state.borrow().is_running());

        algo.set_limit(5);
        admission.on_enqueue(vec!['c']);
        assert_eq!(state.borrow().in_flight(), 2);
        assert_eq!(state.borrow().queued(), 1);

        admission.on_completion(completion(10, Outcome::Success));
        assert_eq!(state.borrow().in_flight(), 2);
        assert_eq!(state.borrow().queued(), 0);
        assert!(!state.borrow().is_running());

        // Idle again, so the next enqueue sweeps straight away.
        admission.on_enqueue(vec!['d']);
        assert_eq!(state.borrow().in_flight(), 3);
    }

    #[tokio::test]
    async fn samples_include_the_completed_execution() {
        let (executor, _started) = stalled();
        let (tx, _rx) = mpsc::unbounded_channel();
        let algo = MockLimitAlgorithm::new(2);
        let mut admission = Admission::new(executor, algo.clone(), 0, tx);

        admission.on_enqueue(vec!['a', 'b']);
        admission.on_completion(completion(30, Outcome::Failure));

        assert_eq!(
            algo.samples(),
            vec![Sample {
                latency: Duration::from_millis(30),
                in_flight: 2,
                outcome: Outcome::Failure,
            }]
        );
    }
}
