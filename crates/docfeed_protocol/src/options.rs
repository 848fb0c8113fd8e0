//! Caller-supplied changes feed options.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// Built-in filter that matches documents against a Mango selector.
pub const FILTER_SELECTOR: &str = "_selector";
/// Built-in filter that restricts the feed to a set of document IDs.
pub const FILTER_DOC_IDS: &str = "_doc_ids";
/// Built-in filter that uses a view's map function.
pub const FILTER_VIEW: &str = "_view";

/// Option keys that have a typed field on [`FeedOptions`].
///
/// [`FeedOptions::from_params`] parses these into their fields; they are not
/// valid in [`FeedOptions::params`].
pub const TYPED_PARAMS: &[&str] = &[
    "selector",
    "doc_ids",
    "fields",
    "include_docs",
    "conflicts",
    "attachments",
    "att_encoding_info",
    "filter",
    "view",
    "limit",
    "style",
];

/// Which revisions are reported per change row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesStyle {
    /// Only the winning revision.
    MainOnly,
    /// All leaf revisions, including conflicts.
    AllDocs,
}

impl ChangesStyle {
    /// Wire value of the style.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangesStyle::MainOnly => "main_only",
            ChangesStyle::AllDocs => "all_docs",
        }
    }

    /// Parses a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "main_only" => Some(ChangesStyle::MainOnly),
            "all_docs" => Some(ChangesStyle::AllDocs),
            _ => None,
        }
    }
}

/// Query options for a changes feed, as supplied by the caller.
///
/// This is the same shape as a one-shot changes query. Parameters that the
/// follower manages itself (`feed`, `since`, `heartbeat`, `timeout`) have no
/// typed field; if they arrive through [`FeedOptions::from_params`] or
/// [`FeedOptions::with_param`] they are kept in `params` so that validation
/// can reject them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedOptions {
    /// Mango selector for the `_selector` filter.
    pub selector: Option<Value>,
    /// Document IDs for the `_doc_ids` filter.
    pub doc_ids: Vec<String>,
    /// Fields to project from included documents.
    pub fields: Vec<String>,
    /// Whether to include document bodies.
    pub include_docs: bool,
    /// Filter function name (`ddoc/filter`) or a built-in filter.
    pub filter: Option<String>,
    /// View name for the `_view` filter.
    pub view: Option<String>,
    /// Total number of changes to deliver before ending.
    pub limit: Option<u64>,
    /// Revision reporting style.
    pub style: Option<ChangesStyle>,
    /// Whether to include conflict information in included documents.
    pub conflicts: bool,
    /// Whether to include attachment bodies in included documents.
    pub attachments: bool,
    /// Whether to include attachment encoding information.
    pub att_encoding_info: bool,
    /// Additional query parameters, e.g. arguments for a custom filter.
    pub params: BTreeMap<String, String>,
}

impl FeedOptions {
    /// Creates empty options that follow every change in the database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from untyped key/value pairs.
    ///
    /// Recognised keys are parsed into their typed fields. Everything else,
    /// including parameters the follower reserves for itself, is carried in
    /// `params`.
    pub fn from_params<I, K, V>(params: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut options = Self::new();
        for (key, value) in params {
            let key = key.into();
            let value = value.into();
            match key.as_str() {
                "selector" => {
                    options.selector = Some(parse_json(&key, &value)?);
                }
                "doc_ids" => {
                    options.doc_ids = parse_string_list(&key, &value)?;
                }
                "fields" => {
                    options.fields = parse_string_list(&key, &value)?;
                }
                "include_docs" => options.include_docs = parse_bool(&key, &value)?,
                "conflicts" => options.conflicts = parse_bool(&key, &value)?,
                "attachments" => options.attachments = parse_bool(&key, &value)?,
                "att_encoding_info" => options.att_encoding_info = parse_bool(&key, &value)?,
                "filter" => options.filter = Some(value),
                "view" => options.view = Some(value),
                "limit" => {
                    let limit = value
                        .parse::<u64>()
                        .map_err(|_| invalid(&key, &value))?;
                    options.limit = Some(limit);
                }
                "style" => {
                    options.style =
                        Some(ChangesStyle::parse(&value).ok_or_else(|| invalid(&key, &value))?);
                }
                _ => {
                    options.params.insert(key, value);
                }
            }
        }
        Ok(options)
    }

    /// Sets the Mango selector.
    pub fn with_selector(mut self, selector: Value) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Restricts the feed to the given document IDs.
    pub fn with_doc_ids<I, S>(mut self, doc_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc_ids = doc_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Projects included documents to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Includes document bodies.
    pub fn with_include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    /// Sets the filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the view used by the `_view` filter.
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Caps the total number of changes delivered.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the revision reporting style.
    pub fn with_style(mut self, style: ChangesStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Includes conflict information.
    pub fn with_conflicts(mut self, conflicts: bool) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Adds an extra query parameter.
    ///
    /// Keys in [`TYPED_PARAMS`] belong in their typed fields; a follower
    /// rejects them here.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The filter that will be sent, taking implied built-in filters into account.
    pub fn effective_filter(&self) -> Option<&str> {
        if let Some(filter) = self.filter.as_deref() {
            Some(filter)
        } else if self.selector.is_some() {
            Some(FILTER_SELECTOR)
        } else if !self.doc_ids.is_empty() {
            Some(FILTER_DOC_IDS)
        } else {
            None
        }
    }
}

fn invalid(key: &str, value: &str) -> ProtocolError {
    ProtocolError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> ProtocolResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_json(key: &str, value: &str) -> ProtocolResult<Value> {
    serde_json::from_str(value).map_err(|_| invalid(key, value))
}

fn parse_string_list(key: &str, value: &str) -> ProtocolResult<Vec<String>> {
    serde_json::from_str::<Vec<String>>(value).map_err(|_| invalid(key, value))
}
