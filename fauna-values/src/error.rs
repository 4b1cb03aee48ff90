//! Value decoding errors.

use thiserror::Error;

/// Errors raised while decoding JSON into a [`crate::Value`] tree.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid payload for {tag}: expected {expected}")]
    InvalidTagPayload {
        tag: &'static str,
        expected: &'static str,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(chrono::ParseError),

    #[error("invalid date: {0}")]
    InvalidDate(chrono::ParseError),

    #[error("invalid base64 payload: {0}")]
    InvalidBytes(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
