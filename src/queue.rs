use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded, unbounded};
use std::time::Duration;

use crate::manager::StopFlag;

/// Capacity of the data-carrying queues. Generous so that a briefly slow
/// consumer never stalls the stage above it during normal flow.
pub const QUEUE_CAPACITY: usize = 1000;

/// How long a blocked `get`/`put` waits before re-checking the stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A queue item: either real work or the end-of-stream marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Item(T),
    Sentinel,
}

/**
A multi-producer/multi-consumer FIFO connecting two pipeline stages.

Both ends are cloneable; consumers pop with a timeout so they stay
responsive to cancellation, and producers push with the same timeout so a
full queue can never wedge a worker that has already been asked to stop.
*/
#[derive(Debug)]
pub struct WorkQueue<T> {
    tx: Sender<Envelope<T>>,
    rx: Receiver<Envelope<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::bounded()
    }
}

impl<T> WorkQueue<T> {
    /// A queue with the standard pipeline capacity.
    #[must_use]
    pub fn bounded() -> Self {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        Self { tx, rx }
    }

    /// An unbounded queue. Used for the log queue only, so that a slow
    /// collector can never block a worker mid-log-statement.
    #[must_use]
    pub fn unbounded() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Push one item, waiting for space. Returns `false` if the stop flag
    /// was raised while waiting (the item is dropped).
    pub fn put(&self, item: T, stop: &StopFlag) -> bool {
        self.push(Envelope::Item(item), stop)
    }

    /// Push the end-of-stream marker, subject to the same cancellation rule.
    pub fn put_sentinel(&self, stop: &StopFlag) -> bool {
        self.push(Envelope::Sentinel, stop)
    }

    fn push(&self, envelope: Envelope<T>, stop: &StopFlag) -> bool {
        let mut pending = envelope;
        loop {
            match self.tx.send_timeout(pending, POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if stop.is_set() {
                        return false;
                    }
                    pending = returned;
                }
                // Both ends live in this struct, so disconnection only
                // happens during teardown.
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Pop the next envelope, or `None` after the poll interval elapses.
    #[must_use]
    pub fn get(&self) -> Option<Envelope<T>> {
        match self.rx.recv_timeout(POLL_INTERVAL) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Push without waiting; fails only when a bounded queue is full.
    pub fn put_nowait(&self, item: T) -> bool {
        self.tx.try_send(Envelope::Item(item)).is_ok()
    }

    /// Pop without waiting.
    #[must_use]
    pub fn try_get(&self) -> Option<Envelope<T>> {
        self.rx.try_recv().ok()
    }

    /// Discard everything currently queued. Unblocks any producer stuck on
    /// a full queue during shutdown.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_then_sentinel_in_order() {
        let q: WorkQueue<u32> = WorkQueue::bounded();
        let stop = StopFlag::new();
        assert!(q.put(1, &stop));
        assert!(q.put(2, &stop));
        assert!(q.put_sentinel(&stop));

        assert_eq!(q.get(), Some(Envelope::Item(1)));
        assert_eq!(q.get(), Some(Envelope::Item(2)));
        assert_eq!(q.get(), Some(Envelope::Sentinel));
    }

    #[test]
    fn timed_get_returns_none_on_empty() {
        let q: WorkQueue<u32> = WorkQueue::bounded();
        assert_eq!(q.get(), None);
    }

    #[test]
    fn clear_empties_the_queue() {
        let q: WorkQueue<u32> = WorkQueue::bounded();
        let stop = StopFlag::new();
        for i in 0..10 {
            q.put(i, &stop);
        }
        assert_eq!(q.len(), 10);
        q.clear();
        assert!(q.is_empty());
    }

    #[test]
    fn put_gives_up_when_stopped() {
        let q: WorkQueue<u32> = WorkQueue::bounded();
        let stop = StopFlag::new();
        for i in 0..QUEUE_CAPACITY as u32 {
            q.put(i, &stop);
        }
        stop.set();
        assert!(!q.put(99, &stop));
    }
}
