//! HTTP-backed changes client.
//!
//! The actual HTTP client is abstracted via a trait so any library
//! (reqwest, hyper, ureq behind `spawn_blocking`, ...) can be plugged in.
//! This module only builds the `_changes` URL and body and interprets the
//! response.

use crate::client::ChangesClient;
use crate::error::ClientError;
use async_trait::async_trait;
use docfeed_protocol::{ChangesPage, ChangesRequest, ErrorBody};

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP client abstraction.
///
/// Implementations report connection problems as [`ClientError::Connection`]
/// and elapsed deadlines as [`ClientError::Timeout`]. Any response that was
/// received, whatever its status, is returned as `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Sends a POST request with a JSON body and returns the response.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, ClientError>;
}

/// Changes client that talks to a database over HTTP.
pub struct HttpChangesClient<H: HttpClient> {
    /// Server URL (e.g., "https://db.example.com").
    base_url: String,
    /// Database name.
    database: String,
    /// HTTP client implementation.
    http: H,
}

impl<H: HttpClient> HttpChangesClient<H> {
    /// Creates a client for `database` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>, http: H) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            database: database.into(),
            http,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Builds the full URL for a request.
    pub fn changes_url(&self, request: &ChangesRequest) -> String {
        format!(
            "{}/{}/_changes?{}",
            self.base_url,
            urlencoding::encode(&self.database),
            request.query_string()
        )
    }
}

#[async_trait]
impl<H: HttpClient> ChangesClient for HttpChangesClient<H> {
    async fn fetch_changes(&self, request: &ChangesRequest) -> Result<ChangesPage, ClientError> {
        let url = self.changes_url(request);
        tracing::trace!(%url, "requesting changes");

        let response = self.http.post(&url, request.body_bytes()).await?;

        if response.status >= 400 {
            let message = ErrorBody::from_json(&response.body)
                .map(|body| body.message())
                .unwrap_or_else(|| String::from_utf8_lossy(&response.body).trim().to_string());
            return Err(ClientError::status(response.status, message));
        }

        Ok(ChangesPage::from_json(&response.body)?)
    }
}
