//! HTTP error types.

use thiserror::Error;

/// Errors from the HTTP layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpError {
    /// The client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The request failed before a response arrived.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The request timed out.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// Non-success status code.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("failed to read response from {url}: {message}")]
    Body { url: String, message: String },
}
