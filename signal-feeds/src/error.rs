//! Error types for feed helpers

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Server answered with a non-success status
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Downloaded data did not have the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Reading or writing the snapshot failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
