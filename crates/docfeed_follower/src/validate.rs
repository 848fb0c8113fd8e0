//! Validation of caller-supplied feed options.

use crate::error::{FollowerError, FollowerResult};
use docfeed_protocol::{
    FeedOptions, FILTER_DOC_IDS, FILTER_SELECTOR, FILTER_VIEW, RESERVED_PARAMS, TYPED_PARAMS,
};
use std::ops::Deref;
use std::sync::Arc;

/// Feed options that passed validation.
///
/// Immutable once built; cloning shares the same options.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions(Arc<FeedOptions>);

impl ValidatedOptions {
    /// Validates `options`, rejecting anything the follower manages itself
    /// and filter combinations the server would refuse.
    pub fn new(options: FeedOptions) -> FollowerResult<Self> {
        validate(&options)?;
        Ok(Self(Arc::new(options)))
    }

    /// Returns the shared options.
    pub fn shared(&self) -> Arc<FeedOptions> {
        Arc::clone(&self.0)
    }
}

impl Deref for ValidatedOptions {
    type Target = FeedOptions;

    fn deref(&self) -> &FeedOptions {
        &self.0
    }
}

fn validate(options: &FeedOptions) -> FollowerResult<()> {
    if let Some(key) = options
        .params
        .keys()
        .find(|key| RESERVED_PARAMS.contains(&key.as_str()))
    {
        return Err(FollowerError::configuration(format!(
            "option `{key}` is managed by the follower and cannot be set"
        )));
    }

    // Untyped copies would skip the checks below and reach the query twice.
    if let Some(key) = options
        .params
        .keys()
        .find(|key| TYPED_PARAMS.contains(&key.as_str()))
    {
        return Err(FollowerError::configuration(format!(
            "option `{key}` has a typed field and cannot be set as a parameter"
        )));
    }

    if options.limit == Some(0) {
        return Err(FollowerError::configuration("limit must be greater than 0"));
    }

    if options.selector.is_some() && !options.doc_ids.is_empty() {
        return Err(FollowerError::configuration(
            "selector and doc_ids cannot be combined",
        ));
    }

    match options.filter.as_deref() {
        Some(FILTER_SELECTOR) if options.selector.is_none() => {
            return Err(FollowerError::configuration(
                "the _selector filter requires a selector",
            ));
        }
        Some(FILTER_DOC_IDS) if options.doc_ids.is_empty() => {
            return Err(FollowerError::configuration(
                "the _doc_ids filter requires doc_ids",
            ));
        }
        Some(FILTER_VIEW) if options.view.is_none() => {
            return Err(FollowerError::configuration(
                "the _view filter requires a view",
            ));
        }
        Some(filter) if filter != FILTER_SELECTOR && options.selector.is_some() => {
            return Err(FollowerError::configuration(format!(
                "a selector cannot be used with filter `{filter}`"
            )));
        }
        Some(filter) if filter != FILTER_DOC_IDS && !options.doc_ids.is_empty() => {
            return Err(FollowerError::configuration(format!(
                "doc_ids cannot be used with filter `{filter}`"
            )));
        }
        _ => {}
    }

    if options.view.is_some() && options.filter.as_deref() != Some(FILTER_VIEW) {
        return Err(FollowerError::configuration(
            "view requires filter=_view",
        ));
    }

    Ok(())
}
