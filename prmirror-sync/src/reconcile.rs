//! Full reconciliation: rebuild the mirror from a complete remote snapshot.
//!
//! ## Protocol
//!
//! 1. Read the event log's high-water mark (before anything is downloaded).
//! 2. Download every open pull request of every repository.
//! 3. Open a transaction and index the stored records by id.
//! 4. Ids on both sides: verify identity, overwrite mutable fields.
//! 5. Remote-only ids: create.
//! 6. Local-only ids: delete.
//! 7. Move the cursor to the mark from step 1.
//! 8. Commit.
//!
//! Events newer than the mark are replayed by the next queue run. Events at
//! or below it are already reflected in the snapshot, or superseded by it.

use std::collections::{BTreeMap, BTreeSet};

use prmirror_core::{EventId, PullRequestId, RecordStore, TrackedRecord};

use crate::context::SyncContext;
use crate::cursor::CursorManager;
use crate::event_log::EventLog;
use crate::feed::SourceFeed;
use crate::merge::{upsert_verified, MergeOutcome};
use crate::SyncError;

/// Counts from one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub repositories: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Cursor position after commit.
    pub cursor: EventId,
}

pub struct FullReconciler<'a, F, L> {
    ctx: &'a SyncContext,
    feed: &'a F,
    log: &'a L,
}

impl<'a, F: SourceFeed, L: EventLog> FullReconciler<'a, F, L> {
    pub fn new(ctx: &'a SyncContext, feed: &'a F, log: &'a L) -> Self {
        Self { ctx, feed, log }
    }

    /// Make `store` equal the remote snapshot, in one transaction.
    pub fn run<S: RecordStore>(&self, store: &S) -> Result<ReconcileReport, SyncError> {
        let high_water_mark = self.log.high_water_mark()?.unwrap_or_default();
        let (repositories, remote) = self.download()?;
        tracing::info!(
            "downloaded {} pull requests from {} repositories (event mark {})",
            remote.len(),
            repositories,
            high_water_mark
        );

        let mut tx = store.begin()?;
        let mut stale: BTreeSet<PullRequestId> = tx.list().map(|r| r.id).collect();
        let mut report = ReconcileReport {
            repositories,
            ..ReconcileReport::default()
        };

        for (id, record) in remote {
            stale.remove(&id);
            match upsert_verified(&mut tx, record)? {
                MergeOutcome::Created => report.created += 1,
                MergeOutcome::Updated => report.updated += 1,
                MergeOutcome::Unchanged => report.unchanged += 1,
            }
        }

        for id in stale {
            tracing::debug!("deleting pull request {id}: no longer open");
            tx.delete(id);
            report.deleted += 1;
        }

        let cursors = CursorManager::new(self.ctx.cursor_key.clone());
        let mut cursor = cursors.load(&tx);
        cursors.advance(&mut tx, &mut cursor, high_water_mark);
        report.cursor = cursor.last_processed_id;

        tx.commit()?;
        tracing::info!(
            "full update: {} created, {} updated, {} unchanged, {} deleted; cursor at {}",
            report.created,
            report.updated,
            report.unchanged,
            report.deleted,
            report.cursor
        );
        Ok(report)
    }

    /// Every open pull request keyed by id. A later sighting of an id wins.
    fn download(&self) -> Result<(usize, BTreeMap<PullRequestId, TrackedRecord>), SyncError> {
        let repositories = self.feed.repositories(&self.ctx.organization)?;
        let mut pull_requests = BTreeMap::new();
        for repository in &repositories {
            for pr in self.feed.pull_requests(repository)? {
                pull_requests.insert(pr.id, pr);
            }
        }
        Ok((repositories.len(), pull_requests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::MemoryEventLog;
    use crate::feed::StaticFeed;
    use prmirror_core::{Cursor, CursorKey, EventState, MemoryStore, PullRequestEvent, Snapshot};
    use std::path::Path;

    fn pr(id: u64, repo: &str, title: &str) -> TrackedRecord {
        TrackedRecord {
            id: PullRequestId(id),
            repo_full_name: repo.to_string(),
            number: id,
            url: format!("http://x/{id}"),
            title: title.to_string(),
            created_at: "2014-01-27T05:26:41Z".to_string(),
            updated_at: "2014-01-27T05:26:41Z".to_string(),
        }
    }

    fn event(id: u64) -> PullRequestEvent {
        PullRequestEvent {
            id: EventId(id),
            state: EventState::Open,
            pull_request_id: PullRequestId(99),
            repo_full_name: "org/z".to_string(),
            number: 99,
            url: "http://x/99".to_string(),
            title: "Z".to_string(),
            created_at: "c".to_string(),
            updated_at: "u".to_string(),
        }
    }

    fn ctx() -> SyncContext {
        SyncContext::new("org", Path::new("/unused"))
    }

    #[test]
    fn converges_from_arbitrary_state() {
        let store = MemoryStore::with_snapshot(Snapshot::new(
            vec![pr(1, "org/a", "stale title"), pr(2, "org/a", "gone")],
            vec![],
        ));
        let feed = StaticFeed::new(vec![pr(1, "org/a", "fresh"), pr(3, "org/b", "new")]);
        let log = MemoryEventLog::new(vec![event(4), event(7)]);

        let report = FullReconciler::new(&ctx(), &feed, &log).run(&store).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.cursor, EventId(7));

        let snapshot = store.snapshot();
        let records: Vec<TrackedRecord> = snapshot.records().cloned().collect();
        assert_eq!(records, vec![pr(1, "org/a", "fresh"), pr(3, "org/b", "new")]);
    }

    #[test]
    fn identity_conflict_rolls_back_everything() {
        let mut moved = pr(1, "org/a", "t");
        moved.url = "http://x/other".to_string();
        let before = Snapshot::new(
            vec![pr(1, "org/a", "t"), pr(2, "org/a", "t")],
            vec![Cursor {
                key: CursorKey::pull_request_webhook(),
                last_processed_id: EventId(1),
            }],
        );
        let store = MemoryStore::with_snapshot(before.clone());
        let feed = StaticFeed::new(vec![moved, pr(5, "org/c", "n")]);
        let log = MemoryEventLog::new(vec![event(9)]);

        let err = FullReconciler::new(&ctx(), &feed, &log).run(&store).unwrap_err();
        assert!(matches!(err, SyncError::IdentityConflict { field: "url", .. }));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn empty_event_log_keeps_cursor_where_it_was() {
        let store = MemoryStore::with_snapshot(Snapshot::new(
            vec![],
            vec![Cursor {
                key: CursorKey::pull_request_webhook(),
                last_processed_id: EventId(12),
            }],
        ));
        let feed = StaticFeed::default();
        let report = FullReconciler::new(&ctx(), &feed, &MemoryEventLog::default())
            .run(&store)
            .unwrap();
        assert_eq!(report.cursor, EventId(12));
    }

    #[test]
    fn repeated_runs_are_idempotent() {
        let store = MemoryStore::new();
        let feed = StaticFeed::new(vec![pr(1, "org/a", "t"), pr(2, "org/b", "u")])
            .with_repository("org/empty");
        let log = MemoryEventLog::new(vec![event(3)]);
        let ctx = ctx();
        let reconciler = FullReconciler::new(&ctx, &feed, &log);

        reconciler.run(&store).unwrap();
        let first = store.snapshot();
        let report = reconciler.run(&store).unwrap();
        assert_eq!(store.snapshot(), first);
        assert_eq!(report.unchanged, 2);
        assert_eq!(report.repositories, 3);
        assert_eq!(report.created + report.updated + report.deleted, 0);
    }
}
