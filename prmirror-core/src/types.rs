//! Domain types for the pull request mirror.
//!
//! Timestamps coming from the remote side are kept as the exact strings the
//! remote sent; identity checks compare them byte for byte.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Remote identifier of a pull request. Stable for the record's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PullRequestId(pub u64);

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for PullRequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Position of an event in the event log. Strictly increasing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Tracked records
// ---------------------------------------------------------------------------

/// Locally mirrored copy of one remote pull request.
///
/// `repo_full_name`, `number`, `url` and `created_at` are fixed once the id
/// has been seen; only `title` and `updated_at` may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub id: PullRequestId,
    pub repo_full_name: String,
    pub number: u64,
    pub url: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Logical state carried by a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventState {
    Open,
    Closed,
    /// Anything else the webhook recorded, kept verbatim for reporting.
    Unrecognized(String),
}

impl From<&str> for EventState {
    fn from(s: &str) -> Self {
        match s {
            "open" => EventState::Open,
            "closed" => EventState::Closed,
            other => EventState::Unrecognized(other.to_owned()),
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventState::Open => write!(f, "open"),
            EventState::Closed => write!(f, "closed"),
            EventState::Unrecognized(s) => write!(f, "{s}"),
        }
    }
}

/// One row of the pull request event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub id: EventId,
    pub state: EventState,
    pub pull_request_id: PullRequestId,
    pub repo_full_name: String,
    pub number: u64,
    pub url: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PullRequestEvent {
    /// The record this event describes, as it would be stored.
    pub fn record(&self) -> TrackedRecord {
        TrackedRecord {
            id: self.pull_request_id,
            repo_full_name: self.repo_full_name.clone(),
            number: self.number,
            url: self.url.clone(),
            title: self.title.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

/// Identity of a cursor: `(name, type)`, unique per store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorKey {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl CursorKey {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// The cursor over the pull request webhook log.
    pub fn pull_request_webhook() -> Self {
        Self::new("pull_request", "PullRequestWebhook")
    }
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.kind)
    }
}

/// Consumer progress through one event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub key: CursorKey,
    pub last_processed_id: EventId,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What the queue consumer does with an event whose state it doesn't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatePolicy {
    /// Log the event and move the cursor past it.
    #[default]
    Skip,
    /// Stop the batch before the event so it is seen again next run.
    Halt,
}

impl fmt::Display for UnknownStatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownStatePolicy::Skip => write!(f, "skip"),
            UnknownStatePolicy::Halt => write!(f, "halt"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
