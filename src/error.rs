//! Error types for the index engine.

use thiserror::Error;

use crate::processor::ProcessorState;

/// Errors surfaced by the index engine.
///
/// The fallible surface is deliberately small: malformed units are treated
/// as no-ops, per-operation faults are caught and logged by the processor,
/// and enqueueing never fails. What remains is lifecycle misuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// `run()` was called while the processor was already running or
    /// in the middle of stopping.
    #[error("operation processor already started (state: {0})")]
    AlreadyStarted(ProcessorState),

    /// `run()` was called after the processor stopped; processors are
    /// not restartable.
    #[error("operation processor has stopped and cannot be restarted")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, IndexError>;
