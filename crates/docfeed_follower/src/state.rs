//! Follower lifecycle and loop state.

use crate::config::FollowerConfig;
use crate::tolerance::ToleranceWindow;
use docfeed_protocol::Seq;
use std::fmt;

/// Lifecycle state of a follower.
///
/// ```text
/// Idle -> Running -> Stopping -> Stopped
///            |  \------------------^
///            \-> Failed
/// ```
///
/// `Stopped` and `Failed` are terminal. A failure that arrives after a stop
/// request ends as `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerStatus {
    /// Constructed, not yet started.
    Idle,
    /// The background loop is fetching and emitting changes.
    Running,
    /// A stop was requested; the loop ends at its next safe point.
    Stopping,
    /// Ended normally: stopped, caught up, or limit reached.
    Stopped,
    /// Ended with an error.
    Failed,
}

impl FollowerStatus {
    /// Returns true if the follower can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FollowerStatus::Stopped | FollowerStatus::Failed)
    }

    /// Returns true if a background loop is active.
    pub fn is_active(&self) -> bool {
        matches!(self, FollowerStatus::Running | FollowerStatus::Stopping)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: FollowerStatus) -> bool {
        use FollowerStatus::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Running, Failed)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for FollowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FollowerStatus::Idle => "idle",
            FollowerStatus::Running => "running",
            FollowerStatus::Stopping => "stopping",
            FollowerStatus::Stopped => "stopped",
            FollowerStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Statistics about a follower run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowerStats {
    /// Requests issued.
    pub fetches: u64,
    /// Pages fully delivered.
    pub pages: u64,
    /// Items handed to the consumer.
    pub items_emitted: u64,
    /// Retries after transient failures.
    pub retries: u64,
    /// Cursor after the last fully delivered page.
    pub last_seq: Option<Seq>,
    /// Last failure message.
    pub last_error: Option<String>,
}

/// State owned exclusively by the background loop.
#[derive(Debug)]
pub(crate) struct FollowerState {
    /// Cursor for the next request.
    pub since: Seq,
    /// Items delivered so far, for the total limit.
    pub delivered: u64,
    /// Transient failure tracking.
    pub tolerance: ToleranceWindow,
}

impl FollowerState {
    pub(crate) fn new(config: &FollowerConfig) -> Self {
        Self {
            since: config.since.clone(),
            delivered: 0,
            tolerance: ToleranceWindow::new(config.error_tolerance, config.backoff.clone()),
        }
    }

    /// Items still allowed under `limit`, or `None` if unlimited.
    pub(crate) fn remaining(&self, limit: Option<u64>) -> Option<u64> {
        limit.map(|limit| limit.saturating_sub(self.delivered))
    }
}
