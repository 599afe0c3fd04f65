//! Adapter error types.

use thiserror::Error;

/// Errors produced while translating exchange wire formats.
///
/// A parse failure on a single frame is logged and discarded by the owning
/// connection; it never terminates the socket.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
