//! Property-based test generators using proptest.
//!
//! Feeds generated here keep the shape a real server produces: positions
//! increase across pages, empty pages repeat the previous cursor, and
//! `pending` counts down to zero on the last page.

use crate::fixtures;
use crate::scripted::Step;
use docfeed_follower::ClientError;
use docfeed_protocol::{ChangesPage, Seq};
use proptest::prelude::*;

/// Strategy for opaque sequence tokens in the shapes servers emit.
pub fn seq_token_strategy() -> impl Strategy<Value = Seq> {
    prop_oneof![
        any::<u32>().prop_map(|n| Seq::new(n.to_string())),
        (1u32..1_000_000, "[a-zA-Z0-9_]{8,40}")
            .prop_map(|(n, suffix)| Seq::new(format!("{n}-{suffix}"))),
    ]
}

/// Strategy for the number of items on each page. Zero means an empty
/// long-poll response.
pub fn page_sizes_strategy(max_pages: usize, max_items: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=max_items, 1..=max_pages)
}

/// Builds consecutive pages with the given sizes.
pub fn feed_from_sizes(sizes: &[usize]) -> Vec<ChangesPage> {
    let total: u64 = sizes.iter().map(|&size| size as u64).sum();
    let mut next = 1;
    sizes
        .iter()
        .map(|&size| {
            let end = next + size as u64;
            let page = fixtures::page(next..end, total + 1 - end);
            next = end;
            page
        })
        .collect()
}

/// Strategy for a paged feed of consecutive items.
pub fn paged_feed_strategy(max_pages: usize, max_items: usize) -> impl Strategy<Value = Vec<ChangesPage>> {
    page_sizes_strategy(max_pages, max_items).prop_map(|sizes| feed_from_sizes(&sizes))
}

/// Strategy for a failure that the follower should retry.
pub fn transient_failure_strategy() -> impl Strategy<Value = ClientError> {
    prop_oneof![
        Just(ClientError::Timeout),
        Just(ClientError::Connection("connection reset".to_string())),
        prop_oneof![Just(408u16), Just(429), Just(500), Just(502), Just(503), Just(504)]
            .prop_map(|status| ClientError::status(status, "transient")),
    ]
}

/// Strategy for a failure that the follower must not retry.
pub fn terminal_failure_strategy() -> impl Strategy<Value = ClientError> {
    prop_oneof![
        prop_oneof![Just(400u16), Just(401), Just(403), Just(404), Just(410)]
            .prop_map(|status| ClientError::status(status, "terminal")),
        Just(ClientError::MalformedResponse("missing field `results`".to_string())),
    ]
}

/// Strategy for a script of consecutive pages with up to `max_failures`
/// transient failures before each page.
pub fn flaky_script_strategy(
    max_pages: usize,
    max_items: usize,
    max_failures: usize,
) -> impl Strategy<Value = (Vec<ChangesPage>, Vec<Step>)> {
    paged_feed_strategy(max_pages, max_items).prop_flat_map(move |pages| {
        let failures = prop::collection::vec(
            prop::collection::vec(transient_failure_strategy(), 0..=max_failures),
            pages.len(),
        );
        (Just(pages), failures).prop_map(|(pages, failures)| {
            let script = pages
                .iter()
                .zip(failures)
                .flat_map(|(page, failures)| {
                    failures
                        .into_iter()
                        .map(Step::Fail)
                        .chain(std::iter::once(Step::Page(page.clone())))
                })
                .collect();
            (pages, script)
        })
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 5000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
