//! Cooperative cancellation signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A monotone cancellation flag shared between the caller and a sync run.
///
/// Cloning yields another handle to the same flag. Once set, the flag is
/// never cleared; a new run needs a new signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    /// Creates an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Takes effect at the run's next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
