//! The operation processor.
//!
//! A single dedicated worker that dequeues and executes operations against
//! the store, strictly in FIFO order, until told to stop. All store access
//! funnels through here, which is what makes the store's single-writer
//! discipline hold.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::{debug, error, info};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::operation::Operation;
use crate::queue::{DequeueError, OperationQueue};
use crate::store::{lock_store, SharedStore};

/// Lifecycle state of the processor. Transitions only move forward:
/// `Idle → Running → Stopping → Stopped` (or `Idle → Stopped` if stopped
/// before ever starting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Idle,
            1 => ProcessorState::Running,
            2 => ProcessorState::Stopping,
            _ => ProcessorState::Stopped,
        }
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorState::Idle => write!(f, "idle"),
            ProcessorState::Running => write!(f, "running"),
            ProcessorState::Stopping => write!(f, "stopping"),
            ProcessorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Executes queued operations one at a time on whichever thread calls
/// `run`. Callers dedicate a thread to it for the processor's lifetime.
#[derive(Debug)]
pub struct OperationProcessor {
    queue: OperationQueue,
    state: AtomicU8,
    /// Set by a forced stop: exit without draining the queue.
    discard_queue: AtomicBool,
    config: IndexConfig,
}

impl OperationProcessor {
    pub(crate) fn new(queue: OperationQueue, config: IndexConfig) -> Self {
        Self {
            queue,
            state: AtomicU8::new(ProcessorState::Idle as u8),
            discard_queue: AtomicBool::new(false),
            config,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The processor's event loop. Blocks the calling thread until the
    /// processor is stopped; a single faulty operation never terminates it.
    pub(crate) fn run(&self, store: &SharedStore) -> Result<()> {
        self.state
            .compare_exchange(
                ProcessorState::Idle as u8,
                ProcessorState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| match ProcessorState::from_u8(current) {
                ProcessorState::Stopped => IndexError::Stopped,
                state => IndexError::AlreadyStarted(state),
            })?;
        info!("operation processor started");

        loop {
            if self.state() == ProcessorState::Stopping {
                self.finish_stopping(store);
                break;
            }
            match self.queue.dequeue(self.config.dequeue_timeout()) {
                Ok(operation) => {
                    // A forced stop discards operations already dequeued
                    // but not yet started.
                    if self.state() == ProcessorState::Stopping
                        && self.discard_queue.load(Ordering::Acquire)
                    {
                        debug!(operation = ?operation, "discarding operation on forced stop");
                        break;
                    }
                    self.execute_one(operation, store);
                }
                Err(DequeueError::TimedOut) => continue,
                // Every producer handle is gone: a stop request, not a fault.
                Err(DequeueError::Disconnected) => {
                    debug!("operation queue disconnected; stopping");
                    break;
                }
            }
        }

        self.state
            .store(ProcessorState::Stopped as u8, Ordering::Release);
        info!("operation processor stopped");
        Ok(())
    }

    /// Ask the loop to exit. `force` discards queued operations instead of
    /// draining them; neither form rolls back work already executed.
    pub fn stop(&self, force: bool) {
        if force {
            self.discard_queue.store(true, Ordering::Release);
        }
        // Never started: go straight to Stopped so run() cannot start later.
        if self
            .state
            .compare_exchange(
                ProcessorState::Idle as u8,
                ProcessorState::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            return;
        }
        let _ = self.state.compare_exchange(
            ProcessorState::Running as u8,
            ProcessorState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Cooperative stop: drain what is still queued (unless configured
    /// otherwise or the stop was forced), then let the loop exit.
    fn finish_stopping(&self, store: &SharedStore) {
        if self.discard_queue.load(Ordering::Acquire) || !self.config.drain_on_stop {
            let discarded = self.queue.len();
            if discarded > 0 {
                debug!(discarded, "stopping without draining the queue");
            }
            return;
        }
        let mut drained = 0usize;
        while let Some(operation) = self.queue.try_dequeue() {
            self.execute_one(operation, store);
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "drained queue before stopping");
        }
    }

    fn execute_one(&self, operation: Operation, store: &SharedStore) {
        let described = format!("{operation:?}");
        debug!(operation = %described, "executing operation");
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut store = lock_store(store);
            operation.execute(&mut store);
        }));
        if outcome.is_err() {
            error!(operation = %described, "operation panicked; continuing with the next one");
        }
    }
}
