//! A changes client that replays a fixed script.

use async_trait::async_trait;
use docfeed_follower::{ChangesClient, ClientError};
use docfeed_protocol::{ChangesPage, ChangesRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return this page.
    Page(ChangesPage),
    /// Fail with this error.
    Fail(ClientError),
    /// Wait, then perform the inner step.
    Delay(Duration, Box<Step>),
    /// Never answer.
    Hang,
}

impl Step {
    /// A step that fails with an HTTP status.
    pub fn status(status: u16) -> Self {
        Step::Fail(ClientError::status(status, format!("scripted {status}")))
    }

    /// A step that waits `delay` before answering with `page`.
    pub fn delayed(delay: Duration, page: ChangesPage) -> Self {
        Step::Delay(delay, Box::new(Step::Page(page)))
    }
}

impl From<ChangesPage> for Step {
    fn from(page: ChangesPage) -> Self {
        Step::Page(page)
    }
}

impl From<ClientError> for Step {
    fn from(err: ClientError) -> Self {
        Step::Fail(err)
    }
}

/// A [`ChangesClient`] that answers requests from a script, in order.
///
/// Once the script runs out, every further request performs the fallback
/// step ([`Step::Hang`] unless set otherwise). Every request is recorded.
#[derive(Debug)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    requests: Mutex<Vec<ChangesRequest>>,
    called: Notify,
}

impl ScriptedClient {
    /// Creates a client that replays `steps`.
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        Self {
            steps: Mutex::new(steps.into_iter().map(Into::into).collect()),
            fallback: Step::Hang,
            requests: Mutex::new(Vec::new()),
            called: Notify::new(),
        }
    }

    /// Sets the step performed once the script is exhausted.
    pub fn then_forever(mut self, step: impl Into<Step>) -> Self {
        self.fallback = step.into();
        self
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChangesRequest> {
        self.requests.lock().clone()
    }

    /// The `since` token of every request, in order.
    pub fn sinces(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|request| request.control.since.to_string())
            .collect()
    }

    /// Waits until at least `count` requests have been received.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let called = self.called.notified();
            if self.calls() >= count {
                return;
            }
            called.await;
        }
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

async fn perform(step: Step) -> Result<ChangesPage, ClientError> {
    let mut step = step;
    loop {
        match step {
            Step::Page(page) => return Ok(page),
            Step::Fail(err) => return Err(err),
            Step::Delay(delay, inner) => {
                tokio::time::sleep(delay).await;
                step = *inner;
            }
            Step::Hang => std::future::pending::<()>().await,
        }
    }
}

#[async_trait]
impl ChangesClient for ScriptedClient {
    async fn fetch_changes(&self, request: &ChangesRequest) -> Result<ChangesPage, ClientError> {
        self.requests.lock().push(request.clone());
        self.called.notify_waiters();
        perform(self.next_step()).await
    }
}
