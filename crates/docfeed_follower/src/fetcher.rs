//! Single-request feed fetching.

use crate::classify::FeedFailure;
use crate::client::ChangesClient;
use crate::config::FollowerConfig;
use crate::error::ClientError;
use crate::validate::ValidatedOptions;
use docfeed_protocol::{ChangesPage, ChangesRequest, FeedControl, Seq};
use std::sync::Arc;
use std::time::Duration;

/// Issues exactly one long-poll request per call and classifies failures.
///
/// No retries happen here.
pub(crate) struct FeedFetcher<C> {
    client: Arc<C>,
    options: ValidatedOptions,
    longpoll_timeout: Duration,
    heartbeat: Option<Duration>,
    request_timeout: Duration,
    page_size: u64,
}

impl<C: ChangesClient> FeedFetcher<C> {
    pub(crate) fn new(client: Arc<C>, options: ValidatedOptions, config: &FollowerConfig) -> Self {
        let page_size = config.page_size(options.include_docs).max(1);
        Self {
            client,
            options,
            longpoll_timeout: config.longpoll_timeout,
            heartbeat: config.heartbeat,
            request_timeout: config.request_timeout(),
            page_size,
        }
    }

    /// Builds the request for `since`, limiting the page to `remaining`
    /// items when a total limit is in force.
    pub(crate) fn request(&self, since: &Seq, remaining: Option<u64>) -> ChangesRequest {
        let limit = remaining.map_or(self.page_size, |r| r.min(self.page_size));
        let mut control = FeedControl::new(since.clone(), self.longpoll_timeout).with_limit(limit);
        if let Some(heartbeat) = self.heartbeat {
            control = control.with_heartbeat(heartbeat);
        }
        ChangesRequest::new(self.options.shared(), control)
    }

    /// Fetches one page. A request that outlives the client-side deadline
    /// is reported as a transient timeout.
    pub(crate) async fn fetch(
        &self,
        since: &Seq,
        remaining: Option<u64>,
    ) -> Result<ChangesPage, FeedFailure> {
        let request = self.request(since, remaining);
        match tokio::time::timeout(self.request_timeout, self.client.fetch_changes(&request)).await
        {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(err)) => Err(FeedFailure::classify(err)),
            Err(_) => Err(FeedFailure::classify(ClientError::Timeout)),
        }
    }
}
