//! Error types for the follower.

use docfeed_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Result type for follower operations.
pub type FollowerResult<T> = Result<T, FollowerError>;

/// A failure reported by the database client for one feed request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The connection could not be established or was lost.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The response could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// Creates a status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Errors surfaced by the follower.
///
/// A feed sequence that ends with one of these errors was *not* stopped
/// cleanly; the last delivered `seq` should be treated with care before it
/// is persisted as a resume point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FollowerError {
    /// The feed options are invalid. Raised before any request is made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The feed failed in a way that retrying cannot fix.
    #[error("terminal feed error: {0}")]
    Terminal(#[source] ClientError),

    /// Transient failures persisted for longer than the error tolerance.
    #[error("error tolerance exhausted after {elapsed:?} ({attempts} consecutive failures): {last}")]
    ToleranceExhausted {
        /// Time since the first failure in the unbroken run.
        elapsed: Duration,
        /// Number of consecutive failures.
        attempts: u32,
        /// The last transient failure.
        #[source]
        last: ClientError,
    },

    /// The follower is not in a state that allows the requested operation.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// `start` was called outside of a Tokio runtime.
    #[error("no Tokio runtime available to run the follower")]
    NoRuntime,
}

impl FollowerError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns the underlying client failure, if any.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            FollowerError::Terminal(err) => Some(err),
            FollowerError::ToleranceExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}
