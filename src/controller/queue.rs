use std::collections::VecDeque;

use super::item::WorkItem;

/// Items not yet admitted, oldest first.
///
/// Unbounded. Nothing is ever dropped, deduplicated or reordered.
#[derive(Debug)]
pub(crate) struct PendingQueue<P> {
    items: VecDeque<WorkItem<P>>,
}

impl<P> PendingQueue<P> {
    pub(crate) fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue<I>(&mut self, payloads: I)
    where
        I: IntoIterator<Item = P>,
    {
        self.items.extend(payloads.into_iter().map(WorkItem::new));
    }

    /// The oldest item, or `None` if the queue is empty.
    pub(crate) fn dequeue_front(&mut self) -> Option<WorkItem<P>> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
