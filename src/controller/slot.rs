use tokio::sync::mpsc::UnboundedSender;

use crate::limits::Outcome;

use super::item::Stamps;

/// A finished execution, reported back to the admission loop.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) stamps: Stamps,
    pub(crate) outcome: Outcome,
}

/// One occupied unit of concurrency, held by a running execution.
///
/// Frees itself when dropped. If the execution never reported an outcome (it panicked or its task
/// was cancelled) the slot is freed as a [Outcome::Failure].
#[derive(Debug)]
pub(crate) struct Slot {
    stamps: Stamps,
    outcome: Option<Outcome>,
    completions: UnboundedSender<Completion>,
}

impl Slot {
    pub(crate) fn new(stamps: Stamps, completions: UnboundedSender<Completion>) -> Self {
        Self {
            stamps,
            outcome: None,
            completions,
        }
    }

    pub(crate) fn complete(mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.stamps.finish();

        let outcome = self.outcome.take().unwrap_or_else(|| {
            tracing::warn!("Execution ended without completing.");
            Outcome::Failure
        });

        // The admission loop outlives every slot, unless the runtime is shutting down.
        let _ = self.completions.send(Completion {
            stamps: self.stamps,
            outcome,
        });
    }
}
