//! Wire requests for the changes endpoint.
//!
//! A request is the merge of two disjoint halves: the caller's validated
//! [`FeedOptions`] and the follower-owned [`FeedControl`]. They are only
//! combined here, when the query string and body are produced.

use crate::options::FeedOptions;
use crate::seq::Seq;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Query parameters owned by the follower. Callers may not set them.
///
/// `last-event-id` is the header-style alias of `since` and is reserved
/// for the same reason.
pub const RESERVED_PARAMS: [&str; 5] = ["feed", "since", "heartbeat", "timeout", "last-event-id"];

/// Feed mode used for every request.
pub const FEED_LONGPOLL: &str = "longpoll";

/// Follower-owned request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedControl {
    /// Position to read from.
    pub since: Seq,
    /// Maximum changes in this page.
    pub limit: Option<u64>,
    /// How long the server may hold the request open with no changes.
    pub timeout: Duration,
    /// Optional keep-alive interval while the request is held open.
    pub heartbeat: Option<Duration>,
}

impl FeedControl {
    /// Creates control parameters for a long-poll from `since`.
    pub fn new(since: Seq, timeout: Duration) -> Self {
        Self {
            since,
            limit: None,
            timeout,
            heartbeat: None,
        }
    }

    /// Sets the page limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the heartbeat interval.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }
}

/// A single long-poll request against the changes endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesRequest {
    /// Caller options, shared across all requests of a follower.
    pub options: Arc<FeedOptions>,
    /// Follower-owned parameters for this request.
    pub control: FeedControl,
}

impl ChangesRequest {
    /// Creates a request.
    pub fn new(options: Arc<FeedOptions>, control: FeedControl) -> Self {
        Self { options, control }
    }

    /// Query parameters in a stable order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let control = &self.control;
        let options = &self.options;

        let mut pairs = vec![
            ("feed".to_string(), FEED_LONGPOLL.to_string()),
            ("since".to_string(), control.since.to_string()),
            ("timeout".to_string(), control.timeout.as_millis().to_string()),
        ];
        if let Some(heartbeat) = control.heartbeat {
            pairs.push(("heartbeat".into(), heartbeat.as_millis().to_string()));
        }
        if let Some(limit) = control.limit {
            pairs.push(("limit".into(), limit.to_string()));
        }
        if let Some(filter) = options.effective_filter() {
            pairs.push(("filter".into(), filter.to_string()));
        }
        if let Some(view) = &options.view {
            pairs.push(("view".into(), view.clone()));
        }
        if let Some(style) = options.style {
            pairs.push(("style".into(), style.as_str().to_string()));
        }
        for (key, flag) in [
            ("include_docs", options.include_docs),
            ("conflicts", options.conflicts),
            ("attachments", options.attachments),
            ("att_encoding_info", options.att_encoding_info),
        ] {
            if flag {
                pairs.push((key.into(), "true".into()));
            }
        }
        for (key, value) in &options.params {
            pairs.push((key.clone(), value.clone()));
        }
        pairs
    }

    /// Percent-encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// JSON request body carrying the selector, document IDs and fields.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        if let Some(selector) = &self.options.selector {
            body.insert("selector".into(), selector.clone());
        }
        if !self.options.doc_ids.is_empty() {
            body.insert("doc_ids".into(), Value::from(self.options.doc_ids.clone()));
        }
        if !self.options.fields.is_empty() {
            body.insert("fields".into(), Value::from(self.options.fields.clone()));
        }
        Value::Object(body)
    }

    /// The request body serialized as JSON bytes.
    pub fn body_bytes(&self) -> Vec<u8> {
        // Serializing a `Value` cannot fail.
        serde_json::to_vec(&self.body()).unwrap_or_else(|_| b"{}".to_vec())
    }
}
