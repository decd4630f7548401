//! The operation queue.
//!
//! Unbounded, thread-safe FIFO feeding the single processor thread. FIFO
//! order is the engine's only consistency mechanism: a query enqueued after
//! a mutation observes that mutation, one enqueued before it does not.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::operation::Operation;

/// Why a dequeue returned without an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueError {
    /// Nothing arrived within the timeout. The processor just loops.
    TimedOut,
    /// Every producer handle is gone. The processor treats this as a
    /// request to stop waiting, never as a data fault.
    Disconnected,
}

/// Unbounded FIFO of pending operations.
///
/// Cloning yields another handle onto the same queue; producers enqueue
/// from any thread while the processor dequeues from its own.
#[derive(Debug, Clone)]
pub struct OperationQueue {
    tx: Sender<Operation>,
    rx: Receiver<Operation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Append an operation to the tail. Never blocks, never rejects.
    pub fn enqueue(&self, operation: Operation) {
        // Send only fails when every receiver is gone, i.e. the whole
        // engine is being torn down; dropping the operation is fine then.
        let _ = self.tx.send(operation);
    }

    /// Block up to `timeout` waiting for the next operation.
    pub fn dequeue(&self, timeout: Duration) -> Result<Operation, DequeueError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => DequeueError::TimedOut,
            RecvTimeoutError::Disconnected => DequeueError::Disconnected,
        })
    }

    /// Zero-timeout dequeue, used to drain the queue.
    pub fn try_dequeue(&self) -> Option<Operation> {
        self.rx.try_recv().ok()
    }

    /// Whether the queue currently holds no operations.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Number of operations currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContextId;
    use std::thread;

    fn remove_context_op(name: &str) -> Operation {
        Operation::RemoveContext {
            context: ContextId::new(name),
        }
    }

    fn op_context_name(op: &Operation) -> String {
        match op {
            Operation::RemoveContext { context } => context.to_string(),
            other => panic!("expected RemoveContext, got {other:?}"),
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = OperationQueue::new();
        for name in ["a", "b", "c"] {
            queue.enqueue(remove_context_op(name));
        }

        let timeout = Duration::from_millis(10);
        assert_eq!(op_context_name(&queue.dequeue(timeout).unwrap()), "a");
        assert_eq!(op_context_name(&queue.dequeue(timeout).unwrap()), "b");
        assert_eq!(op_context_name(&queue.dequeue(timeout).unwrap()), "c");
    }

    #[test]
    fn test_dequeue_times_out_when_empty() {
        let queue = OperationQueue::new();
        let result = queue.dequeue(Duration::from_millis(5));
        assert_eq!(result.unwrap_err(), DequeueError::TimedOut);
    }

    #[test]
    fn test_try_dequeue_drains() {
        let queue = OperationQueue::new();
        queue.enqueue(remove_context_op("a"));
        queue.enqueue(remove_context_op("b"));

        let mut drained = 0;
        while queue.try_dequeue().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 2);
        assert!(queue.is_empty());
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_enqueue_from_other_thread() {
        let queue = OperationQueue::new();
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            producer.enqueue(remove_context_op("cross-thread"));
        });
        handle.join().expect("producer thread");

        let op = queue.dequeue(Duration::from_millis(100)).unwrap();
        assert_eq!(op_context_name(&op), "cross-thread");
    }

    #[test]
    fn test_len_tracks_pending() {
        let queue = OperationQueue::new();
        assert_eq!(queue.len(), 0);
        queue.enqueue(remove_context_op("a"));
        assert_eq!(queue.len(), 1);
        queue.try_dequeue();
        assert_eq!(queue.len(), 0);
    }
}
