//! An in-memory database with a long-polling changes feed.

use async_trait::async_trait;
use docfeed_follower::{ChangesClient, ClientError};
use docfeed_protocol::{
    ChangesPage, ChangesRequest, ChangesResultItem, FeedOptions, Seq, FILTER_DOC_IDS,
    FILTER_SELECTOR,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Latest state of one document.
#[derive(Debug, Clone)]
struct DocEntry {
    seq: u64,
    rev: String,
    deleted: bool,
    body: Map<String, Value>,
}

/// Documents plus the changes index.
///
/// Like a real changes feed, each document appears once, at the position of
/// its latest update.
#[derive(Debug, Default)]
struct ChangeLog {
    update_seq: u64,
    docs: HashMap<String, DocEntry>,
    by_seq: BTreeMap<u64, String>,
}

impl ChangeLog {
    fn write(&mut self, id: &str, body: Map<String, Value>, deleted: bool) -> u64 {
        let generation = match self.docs.get(id) {
            Some(entry) => {
                self.by_seq.remove(&entry.seq);
                entry.rev.split('-').next().and_then(|g| g.parse::<u64>().ok()).unwrap_or(0) + 1
            }
            None => 1,
        };

        self.update_seq += 1;
        let seq = self.update_seq;
        self.by_seq.insert(seq, id.to_string());
        self.docs.insert(
            id.to_string(),
            DocEntry {
                seq,
                rev: format!("{generation}-{seq:016x}"),
                deleted,
                body,
            },
        );
        seq
    }
}

/// Which documents a request wants to see.
enum DocFilter {
    All,
    DocIds(HashSet<String>),
    Selector(Map<String, Value>),
}

impl DocFilter {
    fn from_options(options: &FeedOptions) -> Result<Self, ClientError> {
        match options.effective_filter() {
            None => Ok(DocFilter::All),
            Some(FILTER_DOC_IDS) => Ok(DocFilter::DocIds(options.doc_ids.iter().cloned().collect())),
            Some(FILTER_SELECTOR) => match &options.selector {
                Some(Value::Object(selector)) => Ok(DocFilter::Selector(selector.clone())),
                _ => Err(ClientError::status(400, "bad_request: selector must be an object")),
            },
            Some(other) => Err(ClientError::status(
                404,
                format!("not_found: missing filter function {other}"),
            )),
        }
    }

    fn matches(&self, id: &str, entry: &DocEntry) -> bool {
        match self {
            DocFilter::All => true,
            DocFilter::DocIds(ids) => ids.contains(id),
            DocFilter::Selector(selector) => {
                !entry.deleted
                    && selector
                        .iter()
                        .all(|(field, expected)| entry.body.get(field) == Some(expected))
            }
        }
    }
}

/// An in-memory document database that serves a long-polling changes feed.
///
/// Requests with no matching changes after `since` wait until a matching
/// write arrives or the request's long-poll timeout expires, in which case an
/// empty page positioned at the current update sequence is returned.
///
/// Supported options: `doc_ids`, equality-only `selector`, `include_docs`,
/// and the per-request `limit`. Any other named filter is answered with 404.
/// Failures can be injected ahead of normal processing.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    log: RwLock<ChangeLog>,
    changed: Notify,
    failures: Mutex<VecDeque<ClientError>>,
    requests: Mutex<Vec<ChangesRequest>>,
}

impl MemoryFeed {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or updates a document and returns the sequence of the change.
    ///
    /// A body that is not a JSON object is stored under a `value` field.
    pub fn put(&self, id: &str, body: Value) -> Seq {
        let body = match body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.commit(id, body, false)
    }

    /// Deletes a document. Returns `None` if it does not exist.
    pub fn delete(&self, id: &str) -> Option<Seq> {
        let exists = self
            .log
            .read()
            .docs
            .get(id)
            .is_some_and(|entry| !entry.deleted);
        exists.then(|| self.commit(id, Map::new(), true))
    }

    /// The sequence of the latest change.
    pub fn update_seq(&self) -> Seq {
        token(self.log.read().update_seq)
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> usize {
        self.log
            .read()
            .docs
            .values()
            .filter(|entry| !entry.deleted)
            .count()
    }

    /// Makes the next request fail with `err`, before it is processed.
    pub fn fail_next(&self, err: ClientError) {
        self.failures.lock().push_back(err);
    }

    /// Makes the next `times` requests fail with `err`.
    pub fn fail_times(&self, times: usize, err: ClientError) {
        let mut failures = self.failures.lock();
        failures.extend(std::iter::repeat(err).take(times));
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChangesRequest> {
        self.requests.lock().clone()
    }

    fn commit(&self, id: &str, body: Map<String, Value>, deleted: bool) -> Seq {
        let seq = self.log.write().write(id, body, deleted);
        self.changed.notify_waiters();
        token(seq)
    }

    fn resolve_since(&self, since: &Seq) -> Result<u64, ClientError> {
        match since.as_str() {
            Seq::NOW => Ok(self.log.read().update_seq),
            token => parse_token(token).ok_or_else(|| {
                ClientError::status(
                    400,
                    format!("bad_request: malformed sequence supplied in 'since' parameter: {token}"),
                )
            }),
        }
    }

    fn page_after(&self, since: u64, filter: &DocFilter, request: &ChangesRequest) -> Option<ChangesPage> {
        let log = self.log.read();
        let limit = request
            .control
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        let include_docs = request.options.include_docs;

        let mut matching = log
            .by_seq
            .range(since + 1..)
            .filter_map(|(seq, id)| log.docs.get(id).map(|entry| (*seq, id, entry)))
            .filter(|(_, id, entry)| filter.matches(id, entry));

        let rows: Vec<_> = matching.by_ref().take(limit).collect();
        let (last_row_seq, _, _) = *rows.last()?;
        let pending = matching.count() as u64;

        let results = rows
            .into_iter()
            .map(|(seq, id, entry)| render(seq, id, entry, include_docs))
            .collect();
        let last_seq = if pending > 0 { last_row_seq } else { log.update_seq };

        Some(ChangesPage::new(results, token(last_seq), pending))
    }
}

#[async_trait]
impl ChangesClient for MemoryFeed {
    async fn fetch_changes(&self, request: &ChangesRequest) -> Result<ChangesPage, ClientError> {
        self.requests.lock().push(request.clone());
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let filter = DocFilter::from_options(&request.options)?;
        let since = self.resolve_since(&request.control.since)?;
        let deadline = Instant::now() + request.control.timeout;

        loop {
            let changed = self.changed.notified();
            if let Some(page) = self.page_after(since, &filter, request) {
                return Ok(page);
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                let update_seq = self.log.read().update_seq;
                return Ok(ChangesPage::empty(token(update_seq.max(since))));
            }
        }
    }
}

/// Sequence token for position `n`.
fn token(n: u64) -> Seq {
    if n == 0 {
        Seq::zero()
    } else {
        Seq::new(format!("{n}-g1AAAAm{n:x}"))
    }
}

fn parse_token(token: &str) -> Option<u64> {
    let prefix = token.split_once('-').map_or(token, |(prefix, _)| prefix);
    prefix.parse().ok()
}

fn render(seq: u64, id: &str, entry: &DocEntry, include_docs: bool) -> ChangesResultItem {
    let mut item = ChangesResultItem::new(id, token(seq), entry.rev.clone());
    if entry.deleted {
        item = item.deleted();
    }
    if include_docs {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        doc.insert("_rev".to_string(), Value::String(entry.rev.clone()));
        if entry.deleted {
            doc.insert("_deleted".to_string(), Value::Bool(true));
        } else {
            doc.extend(entry.body.clone());
        }
        item = item.with_doc(doc);
    }
    item
}
