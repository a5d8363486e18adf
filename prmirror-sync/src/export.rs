//! Exporter: the store's pull requests as a JSON document.
//!
//! ```text
//! {"last_updated": "<RFC 3339>",
//!  "pull_requests": {"<repo>": [{"id", "html_url", "title", "created_at", "updated_at"}, ...]}}
//! ```
//!
//! Repositories are keyed in ascending order; within a repository records
//! keep store iteration order. Read-only.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use prmirror_core::{RecordStore, Snapshot};

use crate::context::{OutputTarget, SyncContext, EXPORT_FILE};
use crate::error::{io_err, SyncError};

/// One pull request as published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedPullRequest {
    pub id: u64,
    pub html_url: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The published document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub last_updated: String,
    pub pull_requests: BTreeMap<String, Vec<ExportedPullRequest>>,
}

/// Where the document went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { path: PathBuf },
    Stdout,
}

pub struct Exporter<'a> {
    ctx: &'a SyncContext,
}

impl<'a> Exporter<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Group and order `snapshot` for publication, stamped with `now`.
    pub fn document(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> ExportDocument {
        let mut pull_requests: BTreeMap<String, Vec<ExportedPullRequest>> = BTreeMap::new();
        for record in snapshot.records() {
            pull_requests
                .entry(record.repo_full_name.clone())
                .or_default()
                .push(ExportedPullRequest {
                    id: record.id.0,
                    html_url: record.url.clone(),
                    title: record.title.clone(),
                    created_at: record.created_at.clone(),
                    updated_at: record.updated_at.clone(),
                });
        }
        ExportDocument {
            last_updated: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            pull_requests,
        }
    }

    /// Compact JSON for `snapshot`.
    pub fn render(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Result<String, SyncError> {
        Ok(serde_json::to_string(&self.document(snapshot, now))?)
    }

    /// Render the committed store content and send it to the configured output.
    pub fn write<S: RecordStore>(&self, store: &S) -> Result<ExportOutcome, SyncError> {
        let snapshot = store.load()?;
        let json = self.render(&snapshot, Utc::now())?;
        match &self.ctx.output {
            OutputTarget::Directory(dir) => {
                let path = dir.join(EXPORT_FILE);
                write_atomic(&path, json.as_bytes())?;
                tracing::info!("exported {} pull requests to {}", snapshot.len(), path.display());
                Ok(ExportOutcome::Written { path })
            }
            OutputTarget::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(json.as_bytes())
                    .and_then(|_| out.write_all(b"\n"))
                    .and_then(|_| out.flush())
                    .map_err(|e| io_err("<stdout>", e))?;
                Ok(ExportOutcome::Stdout)
            }
        }
    }
}

/// `.tmp` sibling then rename, so readers never see a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prmirror_core::{MemoryStore, PullRequestId, TrackedRecord};
    use tempfile::TempDir;

    fn pr(id: u64, repo: &str) -> TrackedRecord {
        TrackedRecord {
            id: PullRequestId(id),
            repo_full_name: repo.to_string(),
            number: id,
            url: format!("https://github.com/{repo}/pull/{id}"),
            title: format!("PR {id}"),
            created_at: "2014-01-27T05:26:41Z".to_string(),
            updated_at: "2014-01-28T05:26:41Z".to_string(),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 1, 27, 5, 26, 41).unwrap()
    }

    #[test]
    fn groups_sorted_by_repo_and_keeps_store_order() {
        let ctx = SyncContext::new("org", Path::new("/unused"));
        let snapshot = Snapshot::new(vec![pr(5, "org/b"), pr(2, "org/b"), pr(3, "org/a")], vec![]);
        let json = Exporter::new(&ctx).render(&snapshot, fixed_now()).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"last_updated":"2014-01-27T05:26:41+00:00","pull_requests":{"#,
                r#""org/a":[{"id":3,"html_url":"https://github.com/org/a/pull/3","title":"PR 3","created_at":"2014-01-27T05:26:41Z","updated_at":"2014-01-28T05:26:41Z"}],"#,
                r#""org/b":[{"id":2,"html_url":"https://github.com/org/b/pull/2","title":"PR 2","created_at":"2014-01-27T05:26:41Z","updated_at":"2014-01-28T05:26:41Z"},"#,
                r#"{"id":5,"html_url":"https://github.com/org/b/pull/5","title":"PR 5","created_at":"2014-01-27T05:26:41Z","updated_at":"2014-01-28T05:26:41Z"}]}}"#,
            )
        );
    }

    #[test]
    fn empty_store_exports_empty_object() {
        let ctx = SyncContext::new("org", Path::new("/unused"));
        let json = Exporter::new(&ctx)
            .render(&Snapshot::default(), fixed_now())
            .unwrap();
        assert!(json.ends_with(r#""pull_requests":{}}"#), "got: {json}");
    }

    #[test]
    fn render_is_stable_for_unchanged_store() {
        let ctx = SyncContext::new("org", Path::new("/unused"));
        let snapshot = Snapshot::new(vec![pr(1, "org/z"), pr(2, "org/a")], vec![]);
        let exporter = Exporter::new(&ctx);
        assert_eq!(
            exporter.render(&snapshot, fixed_now()).unwrap(),
            exporter.render(&snapshot, fixed_now()).unwrap()
        );
    }

    #[test]
    fn write_to_directory_is_atomic() {
        let out = TempDir::new().unwrap();
        let site = out.path().join("site");
        let ctx = SyncContext::new("org", Path::new("/unused"))
            .with_output(OutputTarget::Directory(site.clone()));
        let store = MemoryStore::with_snapshot(Snapshot::new(vec![pr(1, "org/a")], vec![]));

        let outcome = Exporter::new(&ctx).write(&store).unwrap();
        let path = site.join(EXPORT_FILE);
        assert_eq!(outcome, ExportOutcome::Written { path: path.clone() });
        assert!(!site.join("pull-requests.json.tmp").exists());

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["pull_requests"]["org/a"][0]["id"], 1);
    }
}
