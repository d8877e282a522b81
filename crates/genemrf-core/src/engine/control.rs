//! Cooperative cancellation for long propagation runs and mu searches.
//!
//! Checked between sweeps and between mu candidates, never inside a sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::engine::errors::GeneMrfError;

/// External stop signal: a shared cancellation flag and/or a deadline.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl RunControl {
    /// A control that never stops a run.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns an error if the flag is set or the deadline has passed.
    pub fn check(&self, context: &str) -> Result<(), GeneMrfError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(GeneMrfError::Cancelled(format!(
                    "{}: cancellation requested",
                    context
                )));
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(GeneMrfError::Cancelled(format!(
                    "{}: deadline exceeded",
                    context
                )));
            }
        }
        Ok(())
    }
}
