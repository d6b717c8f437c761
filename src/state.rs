//! Cooperative cancellation shared by the coordinator and its readers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared running flag for cooperative cancellation.
///
/// Clones share the same flag. Readers poll [`StreamState::is_running`]
/// after each unit of work; anyone holding a clone may call
/// [`StreamState::stop`]. Stopping does not interrupt blocking reads or
/// poll sleeps; it is observed at the next check.
#[derive(Debug, Clone)]
pub struct StreamState {
    running: Arc<AtomicBool>,
}

impl StreamState {
    /// Creates a flag in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the stream is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag. Returns true if this call performed the flip.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}
