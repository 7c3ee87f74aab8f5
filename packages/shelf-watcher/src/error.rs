//! Typed errors for the watcher library.
//!
//! Uses `thiserror` for library errors; the binary wraps them with `anyhow`.

use thiserror::Error;

/// Errors that can occur while fetching or parsing the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport failure (connect, timeout, body read)
    #[error("HTTP error fetching feed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed server answered with a non-2xx status
    #[error("feed returned HTTP {0}")]
    Status(u16),

    /// Body could not be read as markup even leniently
    #[error("feed parse error: {0}")]
    Parse(String),
}

/// Errors from the dedup store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("{operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Stored row could not be decoded
    #[error("corrupt record for {identity}: {reason}")]
    Corrupt { identity: String, reason: String },

    /// Filesystem failure preparing the store path
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure injected by a test double
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn db(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
        move |source| StoreError::Database { operation, source }
    }
}

/// Errors from the acquisition service seam.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Book downloader client failure
    #[error(transparent)]
    Client(#[from] cwa_client::CwaError),

    /// Failure injected by a test double
    #[error("acquisition failed: {0}")]
    Rejected(String),
}

/// Umbrella error for watcher operations.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Result type alias for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for acquisition operations.
pub type AcquisitionResult<T> = std::result::Result<T, AcquisitionError>;
