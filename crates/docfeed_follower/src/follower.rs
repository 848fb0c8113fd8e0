//! The changes follower.

use crate::classify::FeedFailure;
use crate::client::ChangesClient;
use crate::config::FollowerConfig;
use crate::error::{FollowerError, FollowerResult};
use crate::fetcher::FeedFetcher;
use crate::state::{FollowerState, FollowerStats, FollowerStatus};
use crate::stream::ChangesStream;
use crate::tolerance::RetryDecision;
use crate::validate::ValidatedOptions;
use docfeed_protocol::{ChangesPage, ChangesResultItem, FeedOptions};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// How long a follower listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// Follow indefinitely, until stopped or failed.
    Listen,
    /// Follow until the feed reports no pending changes.
    OneOff,
}

/// Why a loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    Stopped,
    ConsumerGone,
    CaughtUp,
    LimitReached,
}

/// Follows a database changes feed, surviving transient failures.
///
/// The follower validates its options at construction, then runs one
/// background task per [`start`](Self::start) or
/// [`start_one_off`](Self::start_one_off) that repeatedly long-polls the
/// feed and hands every change, in order, to a [`ChangesStream`].
///
/// # Delivery
///
/// Delivery is at-least-once. The cursor only advances after every item of
/// a page has been handed to the consumer, so a follower restarted from the
/// `seq` of the last item it delivered never sees earlier changes again, but
/// may see changes at or after that point a second time.
///
/// # Example
///
/// ```rust,ignore
/// use docfeed_follower::{ChangesFollower, FollowerConfig};
/// use docfeed_protocol::FeedOptions;
/// use futures::StreamExt;
///
/// let follower = ChangesFollower::with_config(
///     client,
///     FeedOptions::new().with_include_docs(true),
///     FollowerConfig::new().with_since(last_seq),
/// )?;
///
/// let mut changes = follower.start()?;
/// while let Some(change) = changes.next().await {
///     let change = change?;
///     println!("{} -> {}", change.id, change.seq);
/// }
/// ```
pub struct ChangesFollower<C: ChangesClient> {
    client: Arc<C>,
    options: ValidatedOptions,
    config: FollowerConfig,
    status: Arc<Mutex<FollowerStatus>>,
    stats: Arc<RwLock<FollowerStats>>,
    stop: CancellationToken,
}

impl<C: ChangesClient> ChangesFollower<C> {
    /// Creates a follower with the default configuration.
    ///
    /// Fails with [`FollowerError::Configuration`] if `options` set a
    /// parameter the follower manages or combine filters incorrectly. No
    /// request is made.
    pub fn new(client: C, options: FeedOptions) -> FollowerResult<Self> {
        Self::with_config(client, options, FollowerConfig::default())
    }

    /// Creates a follower with a custom error tolerance.
    pub fn with_error_tolerance(
        client: C,
        options: FeedOptions,
        error_tolerance: Duration,
    ) -> FollowerResult<Self> {
        Self::with_config(
            client,
            options,
            FollowerConfig::default().with_error_tolerance(error_tolerance),
        )
    }

    /// Creates a follower with a full configuration.
    pub fn with_config(
        client: C,
        options: FeedOptions,
        config: FollowerConfig,
    ) -> FollowerResult<Self> {
        let options = ValidatedOptions::new(options)?;

        if config.buffer_size == 0 {
            return Err(FollowerError::configuration(
                "buffer_size must be greater than 0",
            ));
        }
        if config.batch_size == Some(0) {
            return Err(FollowerError::configuration(
                "batch_size must be greater than 0",
            ));
        }

        Ok(Self {
            client: Arc::new(client),
            options,
            config,
            status: Arc::new(Mutex::new(FollowerStatus::Idle)),
            stats: Arc::new(RwLock::new(FollowerStats::default())),
            stop: CancellationToken::new(),
        })
    }

    /// Gets the current lifecycle state.
    pub fn status(&self) -> FollowerStatus {
        *self.status.lock()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> FollowerStats {
        self.stats.read().clone()
    }

    /// Gets the validated feed options.
    pub fn options(&self) -> &FeedOptions {
        &self.options
    }

    /// Gets the configuration.
    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    /// Starts following indefinitely.
    ///
    /// Must be called from within a Tokio runtime. A follower runs at most
    /// once: calling this on a running or finished follower fails with
    /// [`FollowerError::InvalidStateTransition`].
    pub fn start(&self) -> FollowerResult<ChangesStream> {
        self.spawn(FollowMode::Listen)
    }

    /// Starts following until the feed has caught up.
    ///
    /// The stream ends cleanly after the first page that reports no pending
    /// changes.
    pub fn start_one_off(&self) -> FollowerResult<ChangesStream> {
        self.spawn(FollowMode::OneOff)
    }

    /// Requests the follower to stop.
    ///
    /// Safe to call from any thread, any number of times. An in-flight
    /// request is abandoned and its page discarded; no request is issued
    /// afterwards. Calling `stop` before `start` does nothing.
    pub fn stop(&self) {
        let mut status = self.status.lock();
        match *status {
            FollowerStatus::Running => {
                *status = FollowerStatus::Stopping;
                self.stop.cancel();
                info!("changes follower stop requested");
            }
            FollowerStatus::Idle => {
                debug!("stop requested before start; ignoring");
            }
            FollowerStatus::Stopping | FollowerStatus::Stopped | FollowerStatus::Failed => {}
        }
    }

    fn spawn(&self, mode: FollowMode) -> FollowerResult<ChangesStream> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| FollowerError::NoRuntime)?;

        let fetcher = FeedFetcher::new(Arc::clone(&self.client), self.options.clone(), &self.config);

        {
            let mut status = self.status.lock();
            if !status.can_transition_to(FollowerStatus::Running) {
                return Err(FollowerError::InvalidStateTransition {
                    from: status.to_string(),
                    to: FollowerStatus::Running.to_string(),
                });
            }
            *status = FollowerStatus::Running;
        }

        let (tx, rx) = mpsc::channel(self.config.buffer_size);
        let follow_loop = FollowLoop {
            fetcher,
            mode,
            limit: self.options.limit,
            state: FollowerState::new(&self.config),
            tx,
            stop: self.stop.clone(),
            status: Arc::clone(&self.status),
            stats: Arc::clone(&self.stats),
        };

        let span = tracing::info_span!("changes_follower", ?mode);
        info!(?mode, since = %self.config.since, "changes follower started");
        runtime.spawn(follow_loop.run().instrument(span));

        Ok(ChangesStream::new(rx))
    }
}

/// The background loop. Owns the cursor and the error window; shares only
/// the stop token, the status and the stats.
struct FollowLoop<C> {
    fetcher: FeedFetcher<C>,
    mode: FollowMode,
    limit: Option<u64>,
    state: FollowerState,
    tx: mpsc::Sender<FollowerResult<ChangesResultItem>>,
    stop: CancellationToken,
    status: Arc<Mutex<FollowerStatus>>,
    stats: Arc<RwLock<FollowerStats>>,
}

impl<C: ChangesClient> FollowLoop<C> {
    async fn run(mut self) {
        let outcome = self.drive().await;
        let outcome = self.finish(outcome);

        match &outcome {
            Ok(end) => info!(?end, since = %self.state.since, "changes follower finished"),
            Err(err) => error!(error = %err, since = %self.state.since, "changes follower failed"),
        }

        if let Err(err) = outcome {
            // The consumer may already be gone; nothing left to tell it then.
            let _ = self.tx.send(Err(err)).await;
        }
    }

    async fn drive(&mut self) -> FollowerResult<LoopEnd> {
        loop {
            if let Some(end) = self.interruption() {
                return Ok(end);
            }
            let remaining = self.state.remaining(self.limit);
            if remaining == Some(0) {
                return Ok(LoopEnd::LimitReached);
            }

            self.stats.write().fetches += 1;
            let result = tokio::select! {
                biased;
                _ = interrupted(&self.stop, &self.tx) => None,
                result = self.fetcher.fetch(&self.state.since, remaining) => Some(result),
            };
            let Some(result) = result else {
                return Ok(self.interruption().unwrap_or(LoopEnd::Stopped));
            };

            match result {
                Ok(page) => {
                    self.state.tolerance.record_success();
                    if let Some(end) = self.deliver(page).await {
                        return Ok(end);
                    }
                }
                Err(FeedFailure::Terminal(err)) => {
                    self.stats.write().last_error = Some(err.to_string());
                    return Err(FollowerError::Terminal(err));
                }
                Err(FeedFailure::Transient(err)) => {
                    self.stats.write().last_error = Some(err.to_string());

                    match self.state.tolerance.record_failure(Instant::now()) {
                        RetryDecision::GiveUp { elapsed, attempts } => {
                            return Err(FollowerError::ToleranceExhausted {
                                elapsed,
                                attempts,
                                last: err,
                            });
                        }
                        RetryDecision::Retry { delay } => {
                            warn!(
                                error = %err,
                                attempt = self.state.tolerance.consecutive_errors(),
                                ?delay,
                                "transient changes feed error; retrying"
                            );
                            self.stats.write().retries += 1;

                            let slept = tokio::select! {
                                biased;
                                _ = interrupted(&self.stop, &self.tx) => false,
                                _ = tokio::time::sleep(delay) => true,
                            };
                            if !slept {
                                return Ok(self.interruption().unwrap_or(LoopEnd::Stopped));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Hands a page to the consumer, then advances the cursor.
    ///
    /// Returns `Some` if the loop should end.
    async fn deliver(&mut self, page: ChangesPage) -> Option<LoopEnd> {
        debug!(
            items = page.results.len(),
            last_seq = %page.last_seq,
            pending = page.pending,
            "received changes page"
        );

        let caught_up = page.is_caught_up();
        let ChangesPage {
            results, last_seq, ..
        } = page;

        let mut next_since = last_seq;
        let mut last_delivered = None;
        for item in results {
            if self.state.remaining(self.limit) == Some(0) {
                // The server sent more than asked for; resume after the last
                // item actually delivered.
                if let Some(seq) = last_delivered.take() {
                    next_since = seq;
                }
                break;
            }

            let seq = item.seq.clone();
            let sent = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Some(LoopEnd::Stopped),
                sent = self.tx.send(Ok(item)) => sent,
            };
            if sent.is_err() {
                return Some(LoopEnd::ConsumerGone);
            }

            self.state.delivered += 1;
            self.stats.write().items_emitted += 1;
            last_delivered = Some(seq);
        }

        self.state.since = next_since;
        {
            let mut stats = self.stats.write();
            stats.pages += 1;
            stats.last_seq = Some(self.state.since.clone());
        }

        if self.mode == FollowMode::OneOff && caught_up {
            return Some(LoopEnd::CaughtUp);
        }
        None
    }

    fn interruption(&self) -> Option<LoopEnd> {
        if self.stop.is_cancelled() {
            Some(LoopEnd::Stopped)
        } else if self.tx.is_closed() {
            Some(LoopEnd::ConsumerGone)
        } else {
            None
        }
    }

    /// Moves to the terminal status for `outcome`.
    ///
    /// Decided under the status lock, so a failure that races `stop()` ends
    /// as `Stopped` with a clean outcome.
    fn finish(&self, outcome: FollowerResult<LoopEnd>) -> FollowerResult<LoopEnd> {
        let mut status = self.status.lock();
        let outcome = match outcome {
            Err(err) if *status == FollowerStatus::Stopping => {
                warn!(error = %err, "changes feed failed while stopping");
                Ok(LoopEnd::Stopped)
            }
            outcome => outcome,
        };

        let terminal = if outcome.is_ok() {
            FollowerStatus::Stopped
        } else {
            FollowerStatus::Failed
        };
        if status.can_transition_to(terminal) {
            *status = terminal;
        }
        outcome
    }
}

/// Resolves when a stop was requested or the consumer went away.
async fn interrupted<T>(stop: &CancellationToken, tx: &mpsc::Sender<T>) {
    tokio::select! {
        _ = stop.cancelled() => {}
        _ = tx.closed() => {}
    }
}
