//! Error types for prmirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use prmirror_core::error::StoreError;
use prmirror_core::types::{EventId, PullRequestId};

/// All errors that can arise from a synchronization run.
///
/// Any of these aborts the current transaction; nothing partial is committed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// New data for an existing id disagrees on an immutable field.
    #[error(
        "identity conflict for pull request {id}: {field} is {local:?} locally but {remote:?} remotely"
    )]
    IdentityConflict {
        id: PullRequestId,
        field: &'static str,
        local: String,
        remote: String,
    },

    /// The event log handed back an event at or behind the cursor.
    #[error("event {next} is not after {previous}; event log is out of order")]
    OutOfOrder { previous: EventId, next: EventId },

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("source feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Another update holds the lock on the data directory.
    #[error("another update is already running (lock held on {path})")]
    Locked { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (export).
    #[error("export JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the remote pull request feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport failure or non-success status.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The response body wasn't the JSON we expected.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the webhook event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("failed to open event log at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("event log query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A row holds a value that can't be an id or a number.
    #[error("event {event} has invalid {column}: {value}")]
    InvalidRow {
        event: i64,
        column: &'static str,
        value: i64,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
