//! Errors from the one-shot report call.
//!
//! The report call is never retried; every variant is surfaced to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429. `retry_after_ms` comes from the `retry-after` header.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success status, with the response body.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The model answered without any text block.
    #[error("model returned no report text")]
    EmptyResponse,
}
