//! Transport error taxonomy for the HTTP endpoints.

use thiserror::Error;

/// Failures while talking to the chat or image endpoint.
///
/// Transport errors abort only the current turn: local state (context,
/// counters) is preserved and submission is re-enabled so the user can
/// retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded the fixed timeout and was cancelled.
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent or the connection dropped.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The endpoint answered with a body the engine cannot interpret.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The endpoint reported an error (non-success HTTP status or an
    /// error status in the response envelope).
    #[error("server error: {0}")]
    ServerError(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::NetworkFailure(err.to_string())
        }
    }
}
