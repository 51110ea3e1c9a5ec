//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Phase, RunError};

/// Cancellation token shared between a sorter and its controller.
/// Sorting checks the token between record reads and aborts with [`RunError::Cancelled`] once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Requests cancellation of every sort sharing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self, phase: Phase) -> Result<(), RunError> {
        if self.is_cancelled() {
            log::debug!("cancellation observed during {}", phase);
            Err(RunError::Cancelled(phase))
        } else {
            Ok(())
        }
    }
}
