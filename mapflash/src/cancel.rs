//! Cooperative cancellation for long-running memory operations.
//!
//! A [`CancelToken`] is a shared flag the embedding application sets (for
//! example from a Ctrl-C handler) and the transfer engine polls between
//! chunks. Cancellation is cooperative: a chunk that is already in flight
//! completes before the operation stops, so the device is always left at a
//! chunk boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag, polled once per chunk boundary.
///
/// Cloning is cheap and all clones observe the same flag. The token is scoped
/// to the operations it is passed into; once an operation observes the flag it
/// consumes it, so a single request never cancels more than one operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the operation holding this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Consume a pending cancellation request, returning whether one was set.
    ///
    /// The engine calls this at chunk boundaries; observing the request resets
    /// the flag so the token can be reused for the next operation.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }
}
