//! prmirror core library — domain types, record store, configuration.
//!
//! - [`types`] — newtypes, tracked records, events, cursors
//! - [`store`] — [`RecordStore`] trait, [`FileStore`], [`MemoryStore`]
//! - [`config`] — layered YAML [`Settings`]
//! - [`error`] — [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::Settings;
pub use error::{ConfigError, StoreError};
pub use store::{FileStore, MemoryStore, RecordStore, Snapshot, Transaction};
pub use types::{
    Cursor, CursorKey, EventId, EventState, PullRequestEvent, PullRequestId, TrackedRecord,
    UnknownStatePolicy,
};
