//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding or building feed messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload is not valid JSON or does not have the expected shape.
    #[error("malformed changes payload: {message}")]
    Malformed {
        /// Description of the decoding error.
        message: String,
    },

    /// A required field is absent from the payload.
    #[error("missing field `{field}` in changes payload")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A parameter value could not be interpreted.
    #[error("invalid value for parameter `{key}`: {value}")]
    InvalidParameter {
        /// Parameter name.
        key: String,
        /// The rejected value.
        value: String,
    },
}

impl ProtocolError {
    /// Creates a malformed-payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
