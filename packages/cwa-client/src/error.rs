//! Error types for the book downloader client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, CwaError>;

/// Book downloader client errors.
#[derive(Debug, Error)]
pub enum CwaError {
    /// Network error (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the service
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
