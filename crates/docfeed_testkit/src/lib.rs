//! # docfeed Testkit
//!
//! Test utilities for docfeed.
//!
//! This crate provides:
//! - Item and page fixtures with predictable sequence tokens
//! - `ScriptedClient`, a changes client that replays a fixed script
//! - `MemoryFeed`, an in-memory database with a long-polling changes feed
//! - Property-based test generators using proptest
//! - Test log output via `tracing-subscriber`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docfeed_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn follows_a_feed() {
//!     let feed = Arc::new(MemoryFeed::new());
//!     feed.put("a", json!({ "type": "user" }));
//!
//!     let follower = ChangesFollower::new(Arc::clone(&feed), FeedOptions::new()).unwrap();
//!     let mut changes = follower.start_one_off().unwrap();
//!     // ... consume changes
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod memory;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::memory::*;
    pub use crate::scripted::*;
}

pub use generators::PropTestConfig;
pub use logging::init_tracing;
pub use memory::MemoryFeed;
pub use scripted::{ScriptedClient, Step};
