//! Error tolerance window.
//!
//! Transient failures are retried for as long as the unbroken run of
//! failures stays inside the tolerance. The window opens at the first
//! failure after a success and closes on the next success.

use crate::config::BackoffConfig;
use std::time::Duration;
use tokio::time::Instant;

/// What to do after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then retry the same cursor.
    Retry {
        /// Backoff delay.
        delay: Duration,
    },
    /// The tolerance is exhausted.
    GiveUp {
        /// Time since the window opened.
        elapsed: Duration,
        /// Consecutive failures in the window.
        attempts: u32,
    },
}

/// Tracks an unbroken run of transient failures.
#[derive(Debug, Clone)]
pub struct ToleranceWindow {
    tolerance: Duration,
    backoff: BackoffConfig,
    window_start: Option<Instant>,
    consecutive_errors: u32,
}

impl ToleranceWindow {
    /// Creates a closed window.
    pub fn new(tolerance: Duration, backoff: BackoffConfig) -> Self {
        Self {
            tolerance,
            backoff,
            window_start: None,
            consecutive_errors: 0,
        }
    }

    /// Records a transient failure observed at `now`.
    ///
    /// The returned delay never extends past the end of the window, so the
    /// retry that follows is the last one when the budget runs out.
    pub fn record_failure(&mut self, now: Instant) -> RetryDecision {
        let start = *self.window_start.get_or_insert(now);
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= self.tolerance {
            return RetryDecision::GiveUp {
                elapsed,
                attempts: self.consecutive_errors,
            };
        }

        let remaining = self.tolerance - elapsed;
        let delay = self
            .backoff
            .delay_for_failure(self.consecutive_errors)
            .min(remaining);
        RetryDecision::Retry { delay }
    }

    /// Records a successful fetch, closing the window.
    pub fn record_success(&mut self) {
        self.window_start = None;
        self.consecutive_errors = 0;
    }

    /// Returns true while failures are being tolerated.
    pub fn is_open(&self) -> bool {
        self.window_start.is_some()
    }

    /// Consecutive failures in the current window.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}
