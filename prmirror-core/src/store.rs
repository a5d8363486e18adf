//! Record store: tracked pull requests plus consumer cursors.
//!
//! # Transactions
//!
//! [`RecordStore::begin`] loads a [`Snapshot`] into a [`Transaction`]. All
//! reads and writes inside the transaction hit that working copy; nothing is
//! visible to other readers until [`Transaction::commit`] hands the copy back
//! to [`RecordStore::persist`]. Dropping a transaction without committing
//! discards it.
//!
//! # Storage layout (`FileStore`)
//!
//! ```text
//! <data>/
//!   cache.json        (mode 0600, replaced atomically on commit)
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{store_io, StoreError};
use crate::types::{Cursor, CursorKey, PullRequestId, TrackedRecord};

/// File name of the store document inside the data directory.
pub const STORE_FILE: &str = "cache.json";

// ---------------------------------------------------------------------------
// 1. Snapshot
// ---------------------------------------------------------------------------

/// Complete content of a record store at one point in time.
///
/// Records iterate in ascending id order; that is the store's iteration
/// order everywhere it matters (export grouping, listings).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<PullRequestId, TrackedRecord>,
    cursors: Vec<Cursor>,
}

impl Snapshot {
    pub fn new(records: impl IntoIterator<Item = TrackedRecord>, cursors: Vec<Cursor>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
            cursors,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &TrackedRecord> + '_ {
        self.records.values()
    }

    pub fn record(&self, id: PullRequestId) -> Option<&TrackedRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn cursor(&self, key: &CursorKey) -> Option<&Cursor> {
        self.cursors.iter().find(|c| &c.key == key)
    }
}

/// On-disk shape of a snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    pull_requests: Vec<TrackedRecord>,
    #[serde(default)]
    cursors: Vec<Cursor>,
}

impl From<SnapshotFile> for Snapshot {
    fn from(file: SnapshotFile) -> Self {
        Snapshot::new(file.pull_requests, file.cursors)
    }
}

impl From<&Snapshot> for SnapshotFile {
    fn from(snapshot: &Snapshot) -> Self {
        SnapshotFile {
            pull_requests: snapshot.records().cloned().collect(),
            cursors: snapshot.cursors.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Store trait and transaction
// ---------------------------------------------------------------------------

/// Backing storage for tracked records and cursors.
pub trait RecordStore {
    /// Read the last committed snapshot.
    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replace the committed snapshot wholesale.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Start a transaction over a fresh copy of the committed snapshot.
    fn begin(&self) -> Result<Transaction<'_>, StoreError>
    where
        Self: Sized,
    {
        Ok(Transaction {
            store: self,
            working: self.load()?,
        })
    }
}

/// A unit of work against a [`RecordStore`]. Rolls back on drop.
pub struct Transaction<'s> {
    store: &'s dyn RecordStore,
    working: Snapshot,
}

impl<'s> Transaction<'s> {
    pub fn get(&self, id: PullRequestId) -> Option<&TrackedRecord> {
        self.working.records.get(&id)
    }

    /// Insert the record, or replace the one with the same id.
    pub fn upsert(&mut self, record: TrackedRecord) {
        self.working.records.insert(record.id, record);
    }

    /// Remove the record with this id. Returns it if it was present.
    pub fn delete(&mut self, id: PullRequestId) -> Option<TrackedRecord> {
        self.working.records.remove(&id)
    }

    pub fn list(&self) -> impl Iterator<Item = &TrackedRecord> + '_ {
        self.working.records.values()
    }

    pub fn find_cursor(&self, key: &CursorKey) -> Option<&Cursor> {
        self.working.cursor(key)
    }

    /// Insert the cursor, or overwrite the one with the same key.
    pub fn save_cursor(&mut self, cursor: Cursor) {
        match self.working.cursors.iter_mut().find(|c| c.key == cursor.key) {
            Some(existing) => *existing = cursor,
            None => self.working.cursors.push(cursor),
        }
    }

    /// The working copy as it currently stands.
    pub fn snapshot(&self) -> &Snapshot {
        &self.working
    }

    /// Make every change in this transaction visible.
    pub fn commit(self) -> Result<(), StoreError> {
        self.store.persist(&self.working)
    }
}

// ---------------------------------------------------------------------------
// 3. FileStore
// ---------------------------------------------------------------------------

/// JSON document store with atomic replace-on-commit.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data>/cache.json`
    pub fn in_data_dir(data: &Path) -> Self {
        Self::new(data.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for FileStore {
    /// A missing file is an empty store.
    fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| store_io(&self.path, e))?;
        let file: SnapshotFile = serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(file.into())
    }

    /// Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| store_io(dir, e))?;
            }
        }

        let json = serde_json::to_string_pretty(&SnapshotFile::from(snapshot))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json).map_err(|e| store_io(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(store_io(&self.path, e));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 4. MemoryStore
// ---------------------------------------------------------------------------

/// In-process store; commits replace the held snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            committed: Mutex::new(snapshot),
        }
    }

    /// Copy of the last committed snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.committed.lock().clone()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.snapshot())
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.committed.lock() = snapshot.clone();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| store_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
