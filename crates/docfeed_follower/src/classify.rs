//! Classification of feed failures.

use crate::error::ClientError;

/// A feed failure labelled by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFailure {
    /// Connection problems, timeouts, rate limiting and server errors.
    Transient(ClientError),
    /// Client errors and protocol violations.
    Terminal(ClientError),
}

impl FeedFailure {
    /// Classifies a client error.
    ///
    /// | failure | class |
    /// |---|---|
    /// | connection failure, timeout | transient |
    /// | HTTP 408, 429, 5xx | transient |
    /// | other HTTP 4xx | terminal |
    /// | malformed response | terminal |
    ///
    /// HTTP 408 is the server timing out the request, so it is retried like
    /// a client-side timeout.
    pub fn classify(error: ClientError) -> Self {
        if is_transient(&error) {
            FeedFailure::Transient(error)
        } else {
            FeedFailure::Terminal(error)
        }
    }

    /// Returns true if the failure may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedFailure::Transient(_))
    }

    /// Returns the underlying error.
    pub fn error(&self) -> &ClientError {
        match self {
            FeedFailure::Transient(err) | FeedFailure::Terminal(err) => err,
        }
    }

    /// Consumes the failure and returns the underlying error.
    pub fn into_error(self) -> ClientError {
        match self {
            FeedFailure::Transient(err) | FeedFailure::Terminal(err) => err,
        }
    }
}

fn is_transient(error: &ClientError) -> bool {
    match error {
        ClientError::Connection(_) | ClientError::Timeout => true,
        ClientError::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
        ClientError::MalformedResponse(_) => false,
    }
}
