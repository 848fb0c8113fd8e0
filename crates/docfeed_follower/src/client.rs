//! Database client abstraction.

use crate::error::ClientError;
use async_trait::async_trait;
use docfeed_protocol::{ChangesPage, ChangesRequest};
use std::sync::Arc;

/// A database client that can fetch one page of the changes feed.
///
/// This trait abstracts the transport, allowing HTTP clients, in-memory
/// databases and test fakes to back a follower. Implementations perform a
/// single request per call and never retry; failures are reported as
/// [`ClientError`] and classified by the follower.
#[async_trait]
pub trait ChangesClient: Send + Sync + 'static {
    /// Performs one long-poll request.
    async fn fetch_changes(&self, request: &ChangesRequest) -> Result<ChangesPage, ClientError>;
}

#[async_trait]
impl<T: ChangesClient + ?Sized> ChangesClient for Arc<T> {
    async fn fetch_changes(&self, request: &ChangesRequest) -> Result<ChangesPage, ClientError> {
        (**self).fetch_changes(request).await
    }
}

#[async_trait]
impl<T: ChangesClient + ?Sized> ChangesClient for Box<T> {
    async fn fetch_changes(&self, request: &ChangesRequest) -> Result<ChangesPage, ClientError> {
        (**self).fetch_changes(request).await
    }
}
