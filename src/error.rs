//! Error types for the feedrelay library.

use std::time::Duration;

use thiserror::Error;

/// The main error type for all feedrelay operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream explicitly throttled the request
    #[error("rate limited by upstream, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait time before retrying, if the upstream provided one
        retry_after: Option<Duration>,
    },

    /// Upstream returned a non-success status
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream {
        /// HTTP status code returned by the upstream
        status: reqwest::StatusCode,
        /// Response body or a short description of the failure
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Missing required credentials
    #[error("missing credentials: a bearer token is required for upstream requests")]
    MissingCredentials,

    /// The request queue's drain task is no longer running
    #[error("request queue is no longer running")]
    QueueClosed,
}

impl FeedError {
    /// Check whether this failure is an upstream throttle signal.
    ///
    /// Only rate-limited failures are eligible for backoff retries; everything
    /// else fails immediately.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FeedError::RateLimited { .. })
    }
}
