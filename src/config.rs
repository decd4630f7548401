//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for the index engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// How long one dequeue attempt blocks the processor thread before it
    /// re-checks its stop flag, in milliseconds.
    pub dequeue_timeout_ms: u64,

    /// Whether a cooperative `stop()` drains the remaining queue before
    /// halting. When false, queued operations are left behind (and
    /// discarded) just like a forced stop.
    pub drain_on_stop: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout_ms: 100,
            drain_on_stop: true,
        }
    }
}

impl IndexConfig {
    pub(crate) fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}
