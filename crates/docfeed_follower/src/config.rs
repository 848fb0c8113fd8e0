//! Configuration for the follower.

use docfeed_protocol::Seq;
use std::time::Duration;

/// Default error tolerance: how long an unbroken run of transient failures
/// is retried before the follower gives up.
pub const DEFAULT_ERROR_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Default server-side long-poll timeout.
pub const DEFAULT_LONGPOLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-page limit.
pub const DEFAULT_BATCH_SIZE: u64 = 1000;

/// Default per-page limit when document bodies are included.
pub const DEFAULT_BATCH_SIZE_WITH_DOCS: u64 = 100;

/// Configuration for a follower.
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// Cursor to start following from.
    pub since: Seq,
    /// Maximum wall-clock time spent in consecutive transient failures.
    pub error_tolerance: Duration,
    /// How long the server may hold a request with no changes.
    pub longpoll_timeout: Duration,
    /// Optional server keep-alive interval.
    pub heartbeat: Option<Duration>,
    /// Grace period added to `longpoll_timeout` for the client-side deadline.
    pub request_timeout_margin: Duration,
    /// Per-page limit. `None` picks a default based on `include_docs`.
    pub batch_size: Option<u64>,
    /// Capacity of the output channel.
    pub buffer_size: usize,
    /// Backoff between retries.
    pub backoff: BackoffConfig,
}

impl FollowerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            since: Seq::zero(),
            error_tolerance: DEFAULT_ERROR_TOLERANCE,
            longpoll_timeout: DEFAULT_LONGPOLL_TIMEOUT,
            heartbeat: None,
            request_timeout_margin: Duration::from_secs(10),
            batch_size: None,
            buffer_size: 256,
            backoff: BackoffConfig::default(),
        }
    }

    /// Sets the starting cursor.
    pub fn with_since(mut self, since: impl Into<Seq>) -> Self {
        self.since = since.into();
        self
    }

    /// Sets the error tolerance. `Duration::ZERO` fails on the first
    /// transient error.
    pub fn with_error_tolerance(mut self, tolerance: Duration) -> Self {
        self.error_tolerance = tolerance;
        self
    }

    /// Sets the server-side long-poll timeout.
    pub fn with_longpoll_timeout(mut self, timeout: Duration) -> Self {
        self.longpoll_timeout = timeout;
        self
    }

    /// Sets the server keep-alive interval.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Sets the client-side grace period.
    pub fn with_request_timeout_margin(mut self, margin: Duration) -> Self {
        self.request_timeout_margin = margin;
        self
    }

    /// Sets the per-page limit.
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the output channel capacity.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the backoff configuration.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Client-side deadline for a single request.
    ///
    /// Saturates at `Duration::MAX`.
    pub fn request_timeout(&self) -> Duration {
        self.longpoll_timeout.saturating_add(self.request_timeout_margin)
    }

    /// Effective per-page limit.
    pub fn page_size(&self, include_docs: bool) -> u64 {
        match self.batch_size {
            Some(size) => size,
            None if include_docs => DEFAULT_BATCH_SIZE_WITH_DOCS,
            None => DEFAULT_BATCH_SIZE,
        }
    }
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry backoff.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay, before jitter.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure.
    pub multiplier: f64,
    /// Maximum additive jitter as a fraction of the delay.
    pub jitter: f64,
}

impl BackoffConfig {
    /// Creates a configuration with the given bounds.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter: 0.25,
        }
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction. `0.0` disables jitter.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the delay after the given number of consecutive failures
    /// (1-indexed). Zero failures means no delay.
    pub fn delay_for_failure(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let delay = base.min(self.max_delay.as_secs_f64());

        let jitter = if self.jitter > 0.0 {
            delay * self.jitter * rand::random::<f64>()
        } else {
            0.0
        };
        // Near `Duration::MAX` the jittered value no longer fits.
        Duration::try_from_secs_f64(delay + jitter).unwrap_or(self.max_delay)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
    }
}
