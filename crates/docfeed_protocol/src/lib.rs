//! # docfeed Protocol
//!
//! Changes feed wire types and JSON codecs.
//!
//! This crate provides:
//! - `Seq`, the opaque feed cursor
//! - `ChangesResultItem` and `ChangesPage` for feed results
//! - `FeedOptions` for caller-supplied query options
//! - `ChangesRequest`, which merges options with follower-owned
//!   parameters into a query string and JSON body
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod options;
mod page;
mod request;
mod seq;

pub use error::{ProtocolError, ProtocolResult};
pub use options::{
    ChangesStyle, FeedOptions, FILTER_DOC_IDS, FILTER_SELECTOR, FILTER_VIEW, TYPED_PARAMS,
};
pub use page::{ChangeRev, ChangesPage, ChangesResultItem, ErrorBody};
pub use request::{ChangesRequest, FeedControl, FEED_LONGPOLL, RESERVED_PARAMS};
pub use seq::Seq;
