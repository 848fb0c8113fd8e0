//! Integration tests for the changes follower.

use async_trait::async_trait;
use docfeed_follower::{
    BackoffConfig, ChangesFollower, ChangesStream, ClientError, FollowerConfig, FollowerError,
    FollowerStatus, HttpChangesClient, HttpClient, HttpResponse,
};
use docfeed_protocol::{ChangesPage, ChangesResultItem, FeedOptions, Seq};
use docfeed_testkit::fixtures::{self, page, pages};
use docfeed_testkit::{MemoryFeed, ScriptedClient, Step};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Drains a stream, returning the items and the error that ended it, if any.
async fn drain(stream: &mut ChangesStream) -> (Vec<ChangesResultItem>, Option<FollowerError>) {
    docfeed_testkit::init_tracing();
    let mut items = Vec::new();
    while let Some(next) = stream.next().await {
        match next {
            Ok(item) => items.push(item),
            Err(err) => {
                assert!(stream.next().await.is_none(), "error must be the last element");
                return (items, Some(err));
            }
        }
    }
    (items, None)
}

fn ids(items: &[ChangesResultItem]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

fn no_jitter() -> BackoffConfig {
    BackoffConfig::new(Duration::from_millis(100), Duration::from_secs(30)).with_jitter(0.0)
}

/// Waits for the background loop to reach a terminal state.
async fn settle<C: docfeed_follower::ChangesClient>(follower: &ChangesFollower<C>) {
    for _ in 0..1000 {
        if follower.status().is_terminal() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("follower did not settle: {}", follower.status());
}

// ============================================================================
// Ordering and cursor
// ============================================================================

#[tokio::test(start_paused = true)]
async fn listen_emits_pages_in_order_and_advances_cursor() {
    let client = Arc::new(ScriptedClient::new(pages(7, 3)));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let mut changes = follower.start().unwrap();
    let mut items = Vec::new();
    for _ in 0..7 {
        items.push(changes.next().await.unwrap().unwrap());
    }

    let expected: Vec<String> = (1..=7).map(|n| format!("doc-{n}")).collect();
    assert_eq!(ids(&items), expected);

    // Listening continues after the caught-up page.
    client.wait_for_calls(4).await;
    assert_eq!(
        client.sinces(),
        vec![
            "0".to_string(),
            fixtures::seq(3).to_string(),
            fixtures::seq(6).to_string(),
            fixtures::seq(7).to_string(),
        ]
    );
    assert_eq!(follower.status(), FollowerStatus::Running);

    follower.stop();
    assert_eq!(drain(&mut changes).await, (Vec::new(), None));
    assert_eq!(follower.status(), FollowerStatus::Stopped);
    assert_eq!(follower.stats().last_seq, Some(fixtures::seq(7)));
}

#[tokio::test(start_paused = true)]
async fn empty_pages_keep_listening() {
    let client = Arc::new(ScriptedClient::new([
        page(1..1, 0),
        page(1..1, 0),
        page(1..3, 0),
    ]));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let mut changes = follower.start().unwrap();
    let first = changes.next().await.unwrap().unwrap();
    assert_eq!(first.id, "doc-1");
    assert!(client.calls() >= 3);

    follower.stop();
    let (rest, err) = drain(&mut changes).await;
    assert!(err.is_none());
    assert!(rest.len() <= 1);
}

#[tokio::test(start_paused = true)]
async fn follows_from_configured_since() {
    let client = Arc::new(ScriptedClient::new([page(5..7, 0)]));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new().with_since(fixtures::seq(4)),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;
    assert!(err.is_none());
    assert_eq!(ids(&items), vec!["doc-5", "doc-6"]);
    assert_eq!(client.sinces(), vec![fixtures::seq(4).to_string()]);
}

#[tokio::test(start_paused = true)]
async fn request_carries_follower_parameters() {
    let client = Arc::new(ScriptedClient::new([page(1..2, 0)]));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new().with_include_docs(true).with_param("type", "user"),
        FollowerConfig::new()
            .with_longpoll_timeout(Duration::from_secs(20))
            .with_heartbeat(Duration::from_secs(5)),
    )
    .unwrap();

    drain(&mut follower.start_one_off().unwrap()).await;

    let request = &client.requests()[0];
    let query = request.query_pairs();
    let get = |key: &str| {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(get("feed").as_deref(), Some("longpoll"));
    assert_eq!(get("since").as_deref(), Some("0"));
    assert_eq!(get("timeout").as_deref(), Some("20000"));
    assert_eq!(get("heartbeat").as_deref(), Some("5000"));
    assert_eq!(get("limit").as_deref(), Some("100"));
    assert_eq!(get("include_docs").as_deref(), Some("true"));
    assert_eq!(get("type").as_deref(), Some("user"));
}

// ============================================================================
// One-off mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn one_off_caught_up_on_first_page() {
    let client = Arc::new(ScriptedClient::new([page(1..4, 0)]));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let mut changes = follower.start_one_off().unwrap();
    let (items, err) = drain(&mut changes).await;

    assert!(err.is_none());
    assert_eq!(items.len(), 3);
    assert_eq!(client.calls(), 1);
    assert_eq!(changes.outcome(), Some(&Ok(())));
    settle(&follower).await;
    assert_eq!(follower.status(), FollowerStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn one_off_pages_until_caught_up() {
    let client = Arc::new(ScriptedClient::new(pages(10, 4)));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;

    assert!(err.is_none());
    assert_eq!(items.len(), 10);
    assert_eq!(client.calls(), 3);

    let stats = follower.stats();
    assert_eq!(stats.fetches, 3);
    assert_eq!(stats.pages, 3);
    assert_eq!(stats.items_emitted, 10);
    assert_eq!(stats.retries, 0);
    assert_eq!(stats.last_seq, Some(fixtures::seq(10)));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn tolerance_exhausted_after_persistent_server_errors() {
    let client = Arc::new(ScriptedClient::new(Vec::<Step>::new()).then_forever(Step::status(500)));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new()
            .with_error_tolerance(Duration::from_millis(200))
            .with_backoff(no_jitter()),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let (items, err) = drain(&mut follower.start().unwrap()).await;

    assert!(items.is_empty());
    match err {
        Some(FollowerError::ToleranceExhausted {
            elapsed,
            attempts,
            last,
        }) => {
            assert!(elapsed >= Duration::from_millis(200));
            assert!(attempts >= 2);
            assert_eq!(last.status_code(), Some(500));
        }
        other => panic!("expected ToleranceExhausted, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    let calls = client.calls();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.calls(), calls, "no request after termination");
    assert_eq!(follower.status(), FollowerStatus::Failed);
    assert_eq!(follower.stats().retries as usize, calls - 1);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_terminal_without_retry() {
    let client = Arc::new(ScriptedClient::new([Step::status(404)]).then_forever(page(1..2, 0)));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let (items, err) = drain(&mut follower.start().unwrap()).await;

    assert!(items.is_empty());
    match err {
        Some(FollowerError::Terminal(err)) => assert_eq!(err.status_code(), Some(404)),
        other => panic!("expected Terminal, got {other:?}"),
    }
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.calls(), 1);
    assert_eq!(follower.status(), FollowerStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn malformed_response_is_terminal() {
    let client = Arc::new(ScriptedClient::new([
        Step::Page(page(1..3, 1)),
        Step::Fail(ClientError::MalformedResponse("missing field `last_seq`".into())),
    ]));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let (items, err) = drain(&mut follower.start().unwrap()).await;

    assert_eq!(items.len(), 2);
    assert!(matches!(err, Some(FollowerError::Terminal(ClientError::MalformedResponse(_)))));
    assert_eq!(client.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_same_cursor_and_reset_window() {
    let client = Arc::new(ScriptedClient::new([
        Step::status(503),
        Step::Fail(ClientError::Timeout),
        Step::Page(page(1..3, 1)),
        Step::status(429),
        Step::Fail(ClientError::Connection("reset".into())),
        Step::Page(page(3..4, 0)),
    ]));
    // Two failures take 100ms + 50ms of a 150ms budget; without a reset
    // after the first page the second run would exhaust it.
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new()
            .with_error_tolerance(Duration::from_millis(150))
            .with_backoff(no_jitter()),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;

    assert!(err.is_none(), "unexpected error: {err:?}");
    assert_eq!(ids(&items), vec!["doc-1", "doc-2", "doc-3"]);
    assert_eq!(
        client.sinces(),
        vec![
            "0".to_string(),
            "0".to_string(),
            "0".to_string(),
            fixtures::seq(2).to_string(),
            fixtures::seq(2).to_string(),
            fixtures::seq(2).to_string(),
        ]
    );
    let stats = follower.stats();
    assert_eq!(stats.retries, 4);
    assert!(stats.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn unresponsive_request_times_out_and_retries() {
    let client = Arc::new(ScriptedClient::new([Step::Hang, Step::Page(page(1..2, 0))]));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new()
            .with_longpoll_timeout(Duration::from_secs(1))
            .with_request_timeout_margin(Duration::from_secs(1))
            .with_backoff(no_jitter()),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;

    assert!(err.is_none());
    assert_eq!(items.len(), 1);
    assert_eq!(client.calls(), 2);
    assert_eq!(follower.stats().retries, 1);
}

#[tokio::test(start_paused = true)]
async fn unbounded_timeouts_and_backoff_still_follow() {
    let client = Arc::new(ScriptedClient::new([
        Step::status(503),
        Step::Page(page(1..3, 0)),
    ]));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new()
            .with_longpoll_timeout(Duration::MAX)
            .with_error_tolerance(Duration::MAX)
            .with_backoff(BackoffConfig::new(Duration::from_secs(1), Duration::MAX)),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;

    assert!(err.is_none(), "unexpected error: {err:?}");
    assert_eq!(ids(&items), vec!["doc-1", "doc-2"]);
    assert_eq!(client.calls(), 2);
    settle(&follower).await;
    assert_eq!(follower.status(), FollowerStatus::Stopped);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn reserved_option_is_rejected_before_any_request() {
    let client = Arc::new(ScriptedClient::new([page(1..2, 0)]));
    let result = ChangesFollower::new(
        Arc::clone(&client),
        FeedOptions::new().with_param("since", "3-abc"),
    );

    assert!(matches!(result, Err(FollowerError::Configuration(_))));
    assert_eq!(client.calls(), 0);
}

#[test]
fn reserved_query_parameters_are_rejected() {
    for key in ["feed", "since", "heartbeat", "timeout", "last-event-id"] {
        let options = FeedOptions::from_params([(key, "1")]).unwrap();
        let result = ChangesFollower::new(ScriptedClient::new(Vec::<Step>::new()), options);
        assert!(
            matches!(result, Err(FollowerError::Configuration(_))),
            "{key} should be rejected"
        );
    }
}

#[test]
fn typed_option_passed_as_parameter_is_rejected_before_any_request() {
    let client = Arc::new(ScriptedClient::new([page(1..2, 0)]));
    let result = ChangesFollower::new(
        Arc::clone(&client),
        FeedOptions::new().with_limit(5).with_param("limit", "2"),
    );

    assert!(matches!(result, Err(FollowerError::Configuration(_))));
    assert_eq!(client.calls(), 0);
}

#[test]
fn invalid_buffer_and_batch_sizes_are_rejected() {
    let zero_buffer = ChangesFollower::with_config(
        ScriptedClient::new(Vec::<Step>::new()),
        FeedOptions::new(),
        FollowerConfig::new().with_buffer_size(0),
    );
    assert!(matches!(zero_buffer, Err(FollowerError::Configuration(_))));

    let zero_batch = ChangesFollower::with_config(
        ScriptedClient::new(Vec::<Step>::new()),
        FeedOptions::new(),
        FollowerConfig::new().with_batch_size(0),
    );
    assert!(matches!(zero_batch, Err(FollowerError::Configuration(_))));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn stop_after_items_ends_without_further_items() {
    let client = Arc::new(ScriptedClient::new([page(1..4, 5)]));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let mut changes = follower.start().unwrap();
    for _ in 0..3 {
        changes.next().await.unwrap().unwrap();
    }
    follower.stop();
    follower.stop();

    let (rest, err) = drain(&mut changes).await;
    assert!(rest.is_empty());
    assert!(err.is_none());
    assert!(client.calls() <= 2);

    settle(&follower).await;
    assert_eq!(follower.status(), FollowerStatus::Stopped);
    let calls = client.calls();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(client.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn stop_aborts_in_flight_request() {
    let client = Arc::new(ScriptedClient::new(Vec::<Step>::new()));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let mut changes = follower.start().unwrap();
    client.wait_for_calls(1).await;
    follower.stop();

    assert_eq!(drain(&mut changes).await, (Vec::new(), None));
    assert_eq!(client.calls(), 1);
    assert_eq!(follower.stats().pages, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_issues_no_further_request() {
    let client = Arc::new(ScriptedClient::new(Vec::<Step>::new()).then_forever(Step::status(503)));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new().with_backoff(BackoffConfig::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
        )),
    )
    .unwrap();

    let mut changes = follower.start().unwrap();
    client.wait_for_calls(1).await;
    follower.stop();

    assert_eq!(drain(&mut changes).await, (Vec::new(), None));
    assert_eq!(client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_before_start_is_a_no_op() {
    let client = Arc::new(ScriptedClient::new([page(1..3, 0)]));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    follower.stop();
    assert_eq!(follower.status(), FollowerStatus::Idle);

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;
    assert!(err.is_none());
    assert_eq!(items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected() {
    let client = Arc::new(ScriptedClient::new(Vec::<Step>::new()));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let mut changes = follower.start().unwrap();
    assert!(matches!(
        follower.start(),
        Err(FollowerError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        follower.start_one_off(),
        Err(FollowerError::InvalidStateTransition { .. })
    ));

    follower.stop();
    drain(&mut changes).await;
    settle(&follower).await;

    assert!(matches!(
        follower.start(),
        Err(FollowerError::InvalidStateTransition { .. })
    ));
}

#[test]
fn start_outside_runtime_fails() {
    let follower =
        ChangesFollower::new(ScriptedClient::new(Vec::<Step>::new()), FeedOptions::new()).unwrap();

    assert!(matches!(follower.start(), Err(FollowerError::NoRuntime)));
    assert_eq!(follower.status(), FollowerStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn dropping_stream_stops_follower() {
    let client = Arc::new(ScriptedClient::new(Vec::<Step>::new()));
    let follower = ChangesFollower::new(Arc::clone(&client), FeedOptions::new()).unwrap();

    let changes = follower.start().unwrap();
    client.wait_for_calls(1).await;
    drop(changes);

    settle(&follower).await;
    assert_eq!(follower.status(), FollowerStatus::Stopped);
    assert_eq!(client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_consumer_applies_backpressure() {
    let client = Arc::new(ScriptedClient::new([page(1..11, 0)]));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new().with_buffer_size(2),
    )
    .unwrap();

    let mut changes = follower.start_one_off().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stats = follower.stats();
    assert_eq!(stats.items_emitted, 2);
    assert_eq!(stats.pages, 0);
    assert_eq!(stats.last_seq, None);

    let (items, err) = drain(&mut changes).await;
    assert!(err.is_none());
    assert_eq!(items.len(), 10);
    assert_eq!(client.calls(), 1);
}

// ============================================================================
// Total limit
// ============================================================================

#[tokio::test(start_paused = true)]
async fn total_limit_ends_stream_cleanly() {
    let client = Arc::new(ScriptedClient::new(pages(10, 3)));
    let follower = ChangesFollower::new(
        Arc::clone(&client),
        FeedOptions::new().with_limit(5),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start().unwrap()).await;

    assert!(err.is_none());
    assert_eq!(ids(&items), vec!["doc-1", "doc-2", "doc-3", "doc-4", "doc-5"]);
    assert_eq!(client.calls(), 2);

    let limits: Vec<_> = client
        .requests()
        .iter()
        .map(|request| request.control.limit)
        .collect();
    assert_eq!(limits, vec![Some(5), Some(2)]);
    assert_eq!(follower.stats().last_seq, Some(fixtures::seq(5)));
}

#[tokio::test(start_paused = true)]
async fn oversized_page_is_truncated_at_limit() {
    let client = Arc::new(ScriptedClient::new([page(1..6, 0)]));
    let follower = ChangesFollower::new(
        Arc::clone(&client),
        FeedOptions::new().with_limit(3),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start().unwrap()).await;

    assert!(err.is_none());
    assert_eq!(items.len(), 3);
    assert_eq!(follower.stats().last_seq, Some(fixtures::seq(3)));
}

// ============================================================================
// In-memory database
// ============================================================================

#[tokio::test(start_paused = true)]
async fn resumes_from_last_delivered_seq() {
    let feed = Arc::new(MemoryFeed::new());
    for i in 0..5 {
        feed.put(&format!("doc{i}"), json!({ "n": i }));
    }

    let first = ChangesFollower::with_config(
        Arc::clone(&feed),
        FeedOptions::new(),
        FollowerConfig::new().with_batch_size(2),
    )
    .unwrap();
    let (items, err) = drain(&mut first.start_one_off().unwrap()).await;
    assert!(err.is_none());
    assert_eq!(items.len(), 5);
    let resume_at = items.last().unwrap().seq.clone();

    feed.put("doc5", json!({ "n": 5 }));
    feed.put("doc0", json!({ "n": 0, "v": 2 }));

    let second = ChangesFollower::with_config(
        Arc::clone(&feed),
        FeedOptions::new(),
        FollowerConfig::new().with_since(resume_at),
    )
    .unwrap();
    let (items, err) = drain(&mut second.start_one_off().unwrap()).await;
    assert!(err.is_none());
    assert_eq!(ids(&items), vec!["doc5", "doc0"]);
}

#[tokio::test(start_paused = true)]
async fn listen_observes_live_writes() {
    let feed = Arc::new(MemoryFeed::new());
    let follower = ChangesFollower::with_config(
        Arc::clone(&feed),
        FeedOptions::new().with_include_docs(true),
        FollowerConfig::new().with_since(Seq::now()),
    )
    .unwrap();

    let mut changes = follower.start().unwrap();

    let writer = Arc::clone(&feed);
    tokio::spawn(async move {
        for i in 0..3 {
            tokio::time::sleep(Duration::from_secs(90)).await;
            writer.put(&format!("live{i}"), json!({ "i": i }));
        }
    });

    let mut seen = Vec::new();
    for _ in 0..3 {
        let item = changes.next().await.unwrap().unwrap();
        assert!(item.doc.is_some());
        seen.push(item.id);
    }
    assert_eq!(seen, vec!["live0", "live1", "live2"]);

    follower.stop();
    assert_eq!(drain(&mut changes).await, (Vec::new(), None));
}

#[tokio::test(start_paused = true)]
async fn doc_ids_filter_and_recovery_from_outage() {
    let feed = Arc::new(MemoryFeed::new());
    feed.put("a", json!({}));
    feed.put("b", json!({}));
    feed.put("c", json!({}));
    feed.fail_times(3, ClientError::status(503, "service unavailable"));

    let follower = ChangesFollower::with_config(
        Arc::clone(&feed),
        FeedOptions::new().with_doc_ids(["a", "c"]),
        FollowerConfig::new().with_backoff(no_jitter()),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;
    assert!(err.is_none());
    assert_eq!(ids(&items), vec!["a", "c"]);
    assert_eq!(feed.calls(), 4);
    assert_eq!(follower.stats().retries, 3);
}

#[tokio::test(start_paused = true)]
async fn unknown_filter_fails_terminally() {
    let feed = Arc::new(MemoryFeed::new());
    let follower = ChangesFollower::new(
        Arc::clone(&feed),
        FeedOptions::new().with_filter("app/important"),
    )
    .unwrap();

    let (_, err) = drain(&mut follower.start().unwrap()).await;
    assert!(matches!(err, Some(FollowerError::Terminal(_))));
    assert_eq!(feed.calls(), 1);
}

// ============================================================================
// HTTP adapter
// ============================================================================

/// Serves canned JSON responses in order, then 500s.
struct CannedHttp {
    responses: parking_lot::Mutex<Vec<HttpResponse>>,
    urls: parking_lot::Mutex<Vec<String>>,
}

#[async_trait]
impl HttpClient for CannedHttp {
    async fn post(&self, url: &str, _body: Vec<u8>) -> Result<HttpResponse, ClientError> {
        self.urls.lock().push(url.to_string());
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            Ok(HttpResponse::new(500, r#"{"error":"internal","reason":"gone"}"#))
        } else {
            Ok(responses.remove(0))
        }
    }
}

#[tokio::test(start_paused = true)]
async fn follows_over_http() {
    let page_one = ChangesPage::new(
        vec![ChangesResultItem::new("a", "1-x", "1-r1")],
        "1-x",
        1,
    );
    let http = CannedHttp {
        responses: parking_lot::Mutex::new(vec![
            HttpResponse::new(200, page_one.to_json().unwrap()),
            HttpResponse::new(503, "upstream unavailable"),
            HttpResponse::new(
                200,
                r#"{"results":[{"id":"b","seq":2,"changes":[{"rev":"1-r2"}],"deleted":true}],"last_seq":2,"pending":0}"#,
            ),
        ]),
        urls: parking_lot::Mutex::new(Vec::new()),
    };
    let client = Arc::new(HttpChangesClient::new("http://db.local/", "my db", http));
    let follower = ChangesFollower::with_config(
        Arc::clone(&client),
        FeedOptions::new(),
        FollowerConfig::new().with_backoff(no_jitter()),
    )
    .unwrap();

    let (items, err) = drain(&mut follower.start_one_off().unwrap()).await;

    assert!(err.is_none(), "unexpected error: {err:?}");
    assert_eq!(ids(&items), vec!["a", "b"]);
    assert!(items[1].deleted);
    assert_eq!(items[1].seq, Seq::new("2"));
    assert_eq!(follower.stats().retries, 1);
}
