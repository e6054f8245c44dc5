use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::Bytes;

/// One unit of outbound work. Immutable once enqueued; consumed exactly
/// once by the sender loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operation {
    SendImages {
        names: Vec<String>,
        blobs: Vec<Bytes>,
    },
    RequestNames {
        names: Vec<String>,
    },
    QueuePrompt,
}

/// Ordered, thread-safe queue of pending operations, drained strictly FIFO.
///
/// An operation stays accounted for from `push` until the sender finishes
/// writing it: `begin` marks the popped entry in flight, `complete` clears
/// the mark, and `is_idle` observes both under the queue lock. Callers
/// waiting for a drain can therefore trust `is_idle` without guessing how
/// long the final write takes.
pub(crate) struct OperationQueue {
    inner: Mutex<VecDeque<Operation>>,
    in_flight: AtomicBool,
}

impl OperationQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Append an operation. Non-blocking, callable from any thread.
    pub(crate) fn push(&self, op: Operation) {
        self.inner.lock().expect("operation queue poisoned").push_back(op);
    }

    /// Pop the head entry and mark it in flight until [`complete`].
    ///
    /// The mark is set while still holding the queue lock, so `is_idle`
    /// never sees the gap between the pop and the write starting.
    ///
    /// [`complete`]: OperationQueue::complete
    pub(crate) fn begin(&self) -> Option<Operation> {
        let mut inner = self.inner.lock().expect("operation queue poisoned");
        let op = inner.pop_front();
        if op.is_some() {
            self.in_flight.store(true, Ordering::SeqCst);
        }
        op
    }

    /// Clear the in-flight mark once the operation is fully written.
    pub(crate) fn complete(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// Whether nothing is queued and nothing is mid-write.
    pub(crate) fn is_idle(&self) -> bool {
        let inner = self.inner.lock().expect("operation queue poisoned");
        inner.is_empty() && !self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().expect("operation queue poisoned").len()
    }
}
