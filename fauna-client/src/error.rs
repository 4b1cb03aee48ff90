//! Client error types.
//!
//! The connection core surfaces errors unchanged and never retries; 4xx/5xx
//! responses are not errors and flow through to the caller.

use thiserror::Error;

/// Errors surfaced by the connection core.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("auth token is required")]
    MissingAuthToken,

    #[error("HTTP engine closed")]
    EngineClosed,
}
