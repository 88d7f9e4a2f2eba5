use std::time::Duration;

use tokio::time::Instant;

/// A caller's payload, waiting in the pending queue.
#[derive(Debug)]
pub(crate) struct WorkItem<P> {
    payload: P,
    stamps: Stamps,
}

/// When an item was admitted and when its execution finished.
///
/// Both are unset until assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Stamps {
    start: Option<Instant>,
    end: Option<Instant>,
}

impl<P> WorkItem<P> {
    pub(crate) fn new(payload: P) -> Self {
        Self {
            payload,
            stamps: Stamps::default(),
        }
    }

    /// Record the admission time and hand over the payload for execution.
    pub(crate) fn admit(self) -> (P, Stamps) {
        let mut stamps = self.stamps;
        stamps.start = Some(Instant::now());
        (self.payload, stamps)
    }

    #[cfg(test)]
    pub(crate) fn payload(&self) -> &P {
        &self.payload
    }
}

impl Stamps {
    pub(crate) fn finish(&mut self) {
        self.end = Some(Instant::now());
    }

    /// Time from admission to completion.
    ///
    /// Zero unless both ends were recorded.
    pub(crate) fn latency(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub(crate) fn spanning(start: Instant, latency: Duration) -> Self {
        Self {
            start: Some(start),
            end: Some(start + latency),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{self, Instant};

    use super::{Stamps, WorkItem};

    #[tokio::test(start_paused = true)]
    async fn latency_runs_from_admission_to_finish() {
        let item = WorkItem::new("a");

        time::advance(Duration::from_millis(30)).await;
        let (payload, mut stamps) = item.admit();
        assert_eq!(payload, "a");

        time::advance(Duration::from_millis(70)).await;
        stamps.finish();

        assert_eq!(stamps.latency(), Duration::from_millis(70));
    }

    #[test]
    fn unset_stamps_have_no_latency() {
        assert_eq!(Stamps::default().latency(), Duration::ZERO);
    }

    #[test]
    fn spanning() {
        let stamps = Stamps::spanning(Instant::now(), Duration::from_secs(2));
        assert_eq!(stamps.latency(), Duration::from_secs(2));
    }
}
