//! Consumer side of a follower.

use crate::error::{FollowerError, FollowerResult};
use docfeed_protocol::ChangesResultItem;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The ordered sequence of changes produced by a running follower.
///
/// Yields `Ok` items in feed order. If the follower fails, exactly one
/// `Err` is yielded last. The stream then ends with `None`; a stream that
/// ends without an `Err` was stopped cleanly (via `stop()`, catch-up in
/// one-off mode, or the total limit).
///
/// The follower never runs more than the channel capacity ahead of the
/// consumer. Dropping the stream stops the follower.
#[derive(Debug)]
pub struct ChangesStream {
    receiver: mpsc::Receiver<FollowerResult<ChangesResultItem>>,
    outcome: Option<Result<(), FollowerError>>,
}

impl ChangesStream {
    pub(crate) fn new(receiver: mpsc::Receiver<FollowerResult<ChangesResultItem>>) -> Self {
        Self {
            receiver,
            outcome: None,
        }
    }

    /// Receives the next change, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<FollowerResult<ChangesResultItem>> {
        let next = self.receiver.recv().await;
        self.observe(&next);
        next
    }

    /// How the stream ended: `Ok(())` for a clean stop, or the error that
    /// ended it. `None` while the stream is still open.
    pub fn outcome(&self) -> Option<&Result<(), FollowerError>> {
        self.outcome.as_ref()
    }

    /// Returns true once the stream has ended.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    fn observe(&mut self, next: &Option<FollowerResult<ChangesResultItem>>) {
        match next {
            Some(Err(err)) => self.outcome = Some(Err(err.clone())),
            None if self.outcome.is_none() => self.outcome = Some(Ok(())),
            _ => {}
        }
    }
}

impl Stream for ChangesStream {
    type Item = FollowerResult<ChangesResultItem>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = match self.receiver.poll_recv(cx) {
            Poll::Ready(next) => next,
            Poll::Pending => return Poll::Pending,
        };
        self.observe(&next);
        Poll::Ready(next)
    }
}
