//! # docfeed Follower
//!
//! Resilient follower for document database changes feeds.
//!
//! This crate provides:
//! - Validation of caller-supplied feed options
//! - A `ChangesClient` abstraction over the database, with an HTTP adapter
//! - Classification of feed failures into transient and terminal
//! - An error tolerance window with exponential backoff
//! - The `ChangesFollower` state machine (idle → running → stopping →
//!   stopped/failed) and its backpressured `ChangesStream`
//!
//! ## Architecture
//!
//! A follower owns one background Tokio task that long-polls the feed:
//! 1. Fetch one page from the current cursor
//! 2. Hand every item to the consumer, in order
//! 3. Advance the cursor to the page's `last_seq`
//!
//! Transient failures (network, timeouts, 429, 5xx) are retried with backoff
//! until they have persisted for longer than the error tolerance. Anything
//! else ends the stream with an error.
//!
//! ## Key Invariants
//!
//! - Pages are processed strictly sequentially
//! - The cursor advances only after a page is fully delivered
//! - Delivery is at-least-once across restarts
//! - The follower performs no I/O of its own; the client does

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classify;
mod client;
mod config;
mod error;
mod fetcher;
mod follower;
mod http;
mod state;
mod stream;
mod tolerance;
mod validate;

pub use classify::FeedFailure;
pub use client::ChangesClient;
pub use config::{
    BackoffConfig, FollowerConfig, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_SIZE_WITH_DOCS,
    DEFAULT_ERROR_TOLERANCE, DEFAULT_LONGPOLL_TIMEOUT,
};
pub use error::{ClientError, FollowerError, FollowerResult};
pub use follower::{ChangesFollower, FollowMode};
pub use http::{HttpChangesClient, HttpClient, HttpResponse};
pub use state::{FollowerStats, FollowerStatus};
pub use stream::ChangesStream;
pub use tolerance::{RetryDecision, ToleranceWindow};
pub use validate::ValidatedOptions;
