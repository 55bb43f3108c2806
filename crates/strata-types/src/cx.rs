//! Per-statement operation context (`Cx`).
//!
//! Every adapter operation that can loop or touch a collaborator takes
//! `&Cx`. It carries the host's cancellation signal so that long scans and
//! rewrites observe statement abort at row granularity: the caller's unwind
//! then reaches the teardown hook with sessions still in a closable state.
//!
//! The context is scoped to one statement; the host creates a fresh one per
//! statement and drops it at teardown, which bounds any scratch state to the
//! same window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strata_error::{Result, StrataError};

/// Shared cancellation flag, clonable into the host's abort path.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent; the flag never resets within a
    /// statement.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Statement-scoped operation context.
#[derive(Debug, Clone, Default)]
pub struct Cx {
    cancel: CancelHandle,
}

impl Cx {
    /// Create a fresh context for one statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for unit tests; never cancelled unless the test asks.
    pub fn for_testing() -> Self {
        Self::new()
    }

    /// A handle the host abort path can use to cancel this statement.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether the host has requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cooperative cancellation point.
    ///
    /// Returns [`StrataError::Cancelled`] once the host has aborted the
    /// statement. Called at row granularity in scan, batch-insert, and
    /// rewrite loops.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(StrataError::Cancelled)
        } else {
            Ok(())
        }
    }
}
