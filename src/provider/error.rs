//! Errors raised while talking to the document-analysis provider.
//!
//! [`SubmissionError`] covers the single submit request and is always
//! terminal. [`QueryError`] covers one status query; the poller decides
//! whether it ends the operation (see [`QueryError::is_transient`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),

    #[error("invalid analyzer endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The request never got a response (DNS, TLS, connection, timeout).
    #[error("could not reach the analysis provider: {0}")]
    Transport(#[source] reqwest::Error),

    /// The provider answered with something other than 202 Accepted.
    #[error("analysis provider rejected the document (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// 202 Accepted, but no usable operation reference.
    #[error("malformed submit response: {0}")]
    MalformedResponse(String),
}

impl SubmissionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Rejected { .. } => "rejected",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("status query transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// HTTP 429. `retry_after_secs` comes from the `Retry-After` header.
    #[error("status query throttled")]
    Throttled { retry_after_secs: Option<u64> },

    #[error("status query returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("status query returned an unreadable body: {0}")]
    Malformed(String),
}

impl QueryError {
    /// Transient failures may clear up on the next scheduled attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Throttled { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) => false,
        }
    }
}
