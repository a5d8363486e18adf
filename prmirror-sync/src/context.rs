//! Explicit run context shared by every engine component.
//!
//! Built once from [`Settings`] and passed by reference; nothing in this
//! crate reads process-wide state.

use std::path::{Path, PathBuf};

use prmirror_core::{CursorKey, Settings, UnknownStatePolicy};

/// File name of the export inside the website data directory.
pub const EXPORT_FILE: &str = "pull-requests.json";

/// Where the exporter sends its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    /// Write `pull-requests.json` into this directory.
    Directory(PathBuf),
}

/// Everything the reconciler, queue consumer and exporter need to know.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub organization: String,
    /// Holds the record store and the update lock.
    pub data_dir: PathBuf,
    pub cursor_key: CursorKey,
    pub unknown_state: UnknownStatePolicy,
    pub output: OutputTarget,
}

impl SyncContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            organization: settings.organization.clone(),
            data_dir: settings.data.clone(),
            cursor_key: CursorKey::pull_request_webhook(),
            unknown_state: settings.unknown_event_state,
            output: match &settings.website_data {
                Some(dir) => OutputTarget::Directory(dir.clone()),
                None => OutputTarget::Stdout,
            },
        }
    }

    /// Context rooted at `data_dir` with default policy, printing to stdout.
    pub fn new(organization: impl Into<String>, data_dir: &Path) -> Self {
        Self {
            organization: organization.into(),
            data_dir: data_dir.to_path_buf(),
            cursor_key: CursorKey::pull_request_webhook(),
            unknown_state: UnknownStatePolicy::default(),
            output: OutputTarget::Stdout,
        }
    }

    pub fn with_unknown_state(mut self, policy: UnknownStatePolicy) -> Self {
        self.unknown_state = policy;
        self
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }
}
