//! Cooperative run control: cancellation and deadlines.
//!
//! Long-running computations (the Monte Carlo simulator) check a
//! [`RunControl`] at batch boundaries. Cancellation is cooperative, never
//! pre-emptive; a cancelled or timed-out run fails with the matching
//! [`RiskError`] rather than returning a silently truncated result.

use crate::error::{Result, RiskError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag plus an optional wall-clock deadline.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    started: Option<Instant>,
}

impl RunControl {
    /// A control that never cancels and never times out.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A control with a wall-clock budget measured from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(now + timeout),
            started: Some(now),
        }
    }

    /// Handle for requesting cancellation from another thread.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        Canceller {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// True once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// True once the deadline (if any) has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Check cancellation, then the deadline.
    ///
    /// Called between batches, not inside them.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RiskError::Cancelled);
        }
        if self.is_expired() {
            let elapsed = self
                .started
                .map_or_else(|| Duration::from_secs(0), |s| s.elapsed());
            return Err(RiskError::Timeout { elapsed });
        }
        Ok(())
    }
}

/// Cloneable handle that flips a [`RunControl`] to cancelled.
#[derive(Debug, Clone)]
pub struct Canceller {
    cancelled: Arc<AtomicBool>,
}

impl Canceller {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}
