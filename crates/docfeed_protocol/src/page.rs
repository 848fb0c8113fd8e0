//! Changes feed results.

use crate::error::{ProtocolError, ProtocolResult};
use crate::seq::Seq;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single revision reference inside a change row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRev {
    /// Revision identifier, e.g. `"3-917fa23"`.
    pub rev: String,
}

impl ChangeRev {
    /// Creates a revision reference.
    pub fn new(rev: impl Into<String>) -> Self {
        Self { rev: rev.into() }
    }
}

/// One document mutation reported by the changes feed.
///
/// Items are emitted in feed order. `seq` is the position *after* this
/// change and may be used as a resume cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesResultItem {
    /// Document ID.
    pub id: String,
    /// Feed position of this change.
    pub seq: Seq,
    /// Leaf revisions affected by the change, in server order.
    #[serde(default)]
    pub changes: Vec<ChangeRev>,
    /// Whether the document was deleted.
    #[serde(default)]
    pub deleted: bool,
    /// Document body, present only when `include_docs` was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Map<String, Value>>,
}

impl ChangesResultItem {
    /// Creates an item for a live document revision.
    pub fn new(id: impl Into<String>, seq: impl Into<Seq>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
            changes: vec![ChangeRev::new(rev)],
            deleted: false,
            doc: None,
        }
    }

    /// Marks the item as a deletion.
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Attaches a document body.
    pub fn with_doc(mut self, doc: Map<String, Value>) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Returns the first (winning) revision, if any.
    pub fn rev(&self) -> Option<&str> {
        self.changes.first().map(|c| c.rev.as_str())
    }
}

/// One page of results returned by a single feed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesPage {
    /// Changes in feed order.
    pub results: Vec<ChangesResultItem>,
    /// Cursor to resume from after this page.
    pub last_seq: Seq,
    /// Number of changes remaining after `last_seq`.
    #[serde(default)]
    pub pending: u64,
}

impl ChangesPage {
    /// Creates a page.
    pub fn new(results: Vec<ChangesResultItem>, last_seq: impl Into<Seq>, pending: u64) -> Self {
        Self {
            results,
            last_seq: last_seq.into(),
            pending,
        }
    }

    /// An empty page, as returned when a long-poll times out with no changes.
    pub fn empty(last_seq: impl Into<Seq>) -> Self {
        Self::new(Vec::new(), last_seq, 0)
    }

    /// Returns true if the page carries no changes.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns true if the feed reported no further pending changes.
    pub fn is_caught_up(&self) -> bool {
        self.pending == 0
    }

    /// Decodes a page from a JSON response body.
    ///
    /// A missing `pending` field decodes as 0. Missing `results` or
    /// `last_seq` are protocol violations.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::malformed("expected a JSON object"))?;

        if !object.contains_key("results") {
            return Err(ProtocolError::MissingField { field: "results" });
        }
        if !object.contains_key("last_seq") {
            return Err(ProtocolError::MissingField { field: "last_seq" });
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Encodes the page as a JSON response body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// An error body as returned by the database (`{"error": ..., "reason": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error name, e.g. `not_found`.
    pub error: String,
    /// Human-readable explanation.
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    /// Best-effort decode of an error body. Returns `None` for anything that
    /// does not look like a database error document.
    pub fn from_json(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }

    /// Formats the body as a single-line message.
    pub fn message(&self) -> String {
        if self.reason.is_empty() {
            self.error.clone()
        } else {
            format!("{}: {}", self.error, self.reason)
        }
    }
}
