//! Signature parse errors.

use thiserror::Error;

/// Result type for signature operations.
pub type SignResult<T> = Result<T, SignError>;

/// Malformed signature text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid signature '{text}': {message} at col {column}")]
pub struct SignError {
    /// The text that failed to parse.
    pub text: String,
    /// 0-based character column of the failure.
    pub column: usize,
    pub message: String,
}

impl SignError {
    pub fn new(text: impl Into<String>, column: usize, message: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            column,
            message: message.into(),
        }
    }
}
