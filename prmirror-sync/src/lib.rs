//! # prmirror-sync
//!
//! Keeps a local mirror of an organization's open pull requests.
//!
//! Two engines write the mirror:
//! - [`FullReconciler`] recomputes it from a complete remote snapshot and
//!   parks the event cursor at the log's high-water mark.
//! - [`QueueConsumer`] replays webhook events after the cursor.
//!
//! [`pipeline::update`] runs one of them under the data directory lock and
//! then hands the result to the [`Exporter`].

pub mod context;
pub mod cursor;
pub mod error;
pub mod event_log;
pub mod export;
pub mod feed;
pub mod github;
pub mod lock;
pub mod merge;
pub mod pipeline;
pub mod queue;
pub mod reconcile;

pub use context::{OutputTarget, SyncContext};
pub use cursor::CursorManager;
pub use error::{EventLogError, FeedError, SyncError};
pub use event_log::{EventLog, MemoryEventLog, SqliteEventLog};
pub use export::{ExportDocument, ExportOutcome, Exporter};
pub use feed::{Repository, SourceFeed, StaticFeed};
pub use github::GitHubFeed;
pub use pipeline::{update, EngineReport, UpdateMode, UpdateReport};
pub use queue::{QueueConsumer, QueueReport};
pub use reconcile::{FullReconciler, ReconcileReport};
