//! Queue consumer: replay webhook events after the stored cursor.
//!
//! The whole batch runs in one transaction, cursor moves included, so an
//! abort anywhere leaves the last committed position untouched. Each event
//! is an idempotent transition, which makes replaying a batch after a crash
//! give the same result as applying it once.
//!
//! | state        | effect                                              |
//! |--------------|-----------------------------------------------------|
//! | `open`       | create, or verify identity and update mutable fields |
//! | `closed`     | delete if present                                   |
//! | anything else| per [`UnknownStatePolicy`]                          |

use prmirror_core::{EventId, EventState, RecordStore, UnknownStatePolicy};

use crate::context::SyncContext;
use crate::cursor::CursorManager;
use crate::event_log::EventLog;
use crate::merge::{upsert_verified, verify_identity, MergeOutcome};
use crate::SyncError;

/// Counts from one queue run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    /// Events the cursor moved past.
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Events with an unrecognized state that were passed over.
    pub skipped: usize,
    /// Event the batch stopped in front of, under [`UnknownStatePolicy::Halt`].
    pub halted_at: Option<EventId>,
    /// Cursor position after commit.
    pub cursor: EventId,
}

pub struct QueueConsumer<'a, L> {
    ctx: &'a SyncContext,
    log: &'a L,
}

impl<'a, L: EventLog> QueueConsumer<'a, L> {
    pub fn new(ctx: &'a SyncContext, log: &'a L) -> Self {
        Self { ctx, log }
    }

    /// Apply every event after the cursor, in ascending id order.
    pub fn run<S: RecordStore>(&self, store: &S) -> Result<QueueReport, SyncError> {
        let mut tx = store.begin()?;
        let cursors = CursorManager::new(self.ctx.cursor_key.clone());
        let mut cursor = cursors.load(&tx);
        let mut report = QueueReport {
            cursor: cursor.last_processed_id,
            ..QueueReport::default()
        };

        let events = self.log.events_after(cursor.last_processed_id)?;
        tracing::info!(
            "{} events after {} in {}",
            events.len(),
            cursor.last_processed_id,
            cursors.key()
        );

        for event in events {
            if event.id <= cursor.last_processed_id {
                return Err(SyncError::OutOfOrder {
                    previous: cursor.last_processed_id,
                    next: event.id,
                });
            }

            let incoming = event.record();
            if let Some(existing) = tx.get(incoming.id) {
                verify_identity(existing, &incoming)?;
            }

            match &event.state {
                EventState::Open => match upsert_verified(&mut tx, incoming)? {
                    MergeOutcome::Created => report.created += 1,
                    MergeOutcome::Updated => report.updated += 1,
                    MergeOutcome::Unchanged => {}
                },
                EventState::Closed => {
                    if tx.delete(incoming.id).is_some() {
                        tracing::debug!("event {}: closed pull request {}", event.id, incoming.id);
                        report.deleted += 1;
                    }
                }
                EventState::Unrecognized(state) => match self.ctx.unknown_state {
                    UnknownStatePolicy::Skip => {
                        tracing::error!(
                            "event {}: unknown pull request state: {state}; skipping",
                            event.id
                        );
                        report.skipped += 1;
                    }
                    UnknownStatePolicy::Halt => {
                        tracing::error!(
                            "event {}: unknown pull request state: {state}; halting before it",
                            event.id
                        );
                        report.halted_at = Some(event.id);
                        break;
                    }
                },
            }

            cursors.advance(&mut tx, &mut cursor, event.id);
            report.processed += 1;
        }

        report.cursor = cursor.last_processed_id;
        tx.commit()?;
        tracing::info!(
            "queue update: {} processed, {} created, {} updated, {} deleted, {} skipped; cursor at {}",
            report.processed,
            report.created,
            report.updated,
            report.deleted,
            report.skipped,
            report.cursor
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::MemoryEventLog;
    use prmirror_core::{
        Cursor, CursorKey, MemoryStore, PullRequestEvent, PullRequestId, Snapshot, TrackedRecord,
    };
    use std::path::Path;

    fn event(id: u64, pr: u64, state: &str, title: &str) -> PullRequestEvent {
        PullRequestEvent {
            id: EventId(id),
            state: EventState::from(state),
            pull_request_id: PullRequestId(pr),
            repo_full_name: "org/a".to_string(),
            number: pr,
            url: format!("http://x/{pr}"),
            title: title.to_string(),
            created_at: "2014-01-27T05:26:41Z".to_string(),
            updated_at: format!("2014-02-{:02}T00:00:00Z", id % 28 + 1),
        }
    }

    fn ctx(policy: UnknownStatePolicy) -> SyncContext {
        SyncContext::new("org", Path::new("/unused")).with_unknown_state(policy)
    }

    fn cursor_at(store: &MemoryStore) -> EventId {
        store
            .snapshot()
            .cursor(&CursorKey::pull_request_webhook())
            .map(|c| c.last_processed_id)
            .unwrap_or_default()
    }

    #[test]
    fn open_then_close_then_reopen_recreates() {
        let store = MemoryStore::new();
        let log = MemoryEventLog::new(vec![
            event(1, 10, "open", "First"),
            event(2, 10, "closed", "First"),
            event(3, 10, "open", "Again"),
        ]);
        let report = QueueConsumer::new(&ctx(UnknownStatePolicy::Skip), &log)
            .run(&store)
            .unwrap();
        assert_eq!((report.created, report.deleted), (2, 1));
        assert_eq!(report.cursor, EventId(3));
        assert_eq!(
            store.snapshot().record(PullRequestId(10)).unwrap().title,
            "Again"
        );
    }

    #[test]
    fn closed_for_missing_record_is_a_noop() {
        let store = MemoryStore::new();
        let log = MemoryEventLog::new(vec![event(5, 10, "closed", "x")]);
        let report = QueueConsumer::new(&ctx(UnknownStatePolicy::Skip), &log)
            .run(&store)
            .unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.processed, 1);
        assert!(store.snapshot().is_empty());
        assert_eq!(cursor_at(&store), EventId(5));
    }

    #[test]
    fn only_events_after_cursor_are_applied() {
        let store = MemoryStore::with_snapshot(Snapshot::new(
            vec![],
            vec![Cursor {
                key: CursorKey::pull_request_webhook(),
                last_processed_id: EventId(2),
            }],
        ));
        let log = MemoryEventLog::new(vec![
            event(1, 10, "open", "old"),
            event(2, 11, "open", "old"),
            event(3, 12, "open", "new"),
        ]);
        let report = QueueConsumer::new(&ctx(UnknownStatePolicy::Skip), &log)
            .run(&store)
            .unwrap();
        assert_eq!(report.processed, 1);
        let ids: Vec<u64> = store.snapshot().records().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![12]);
    }

    #[test]
    fn skip_policy_advances_past_unknown_state() {
        let store = MemoryStore::new();
        let log = MemoryEventLog::new(vec![
            event(1, 10, "open", "a"),
            event(2, 11, "merged", "b"),
            event(3, 12, "open", "c"),
        ]);
        let report = QueueConsumer::new(&ctx(UnknownStatePolicy::Skip), &log)
            .run(&store)
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.halted_at, None);
        assert_eq!(cursor_at(&store), EventId(3));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn halt_policy_commits_up_to_unknown_state() {
        let store = MemoryStore::new();
        let log = MemoryEventLog::new(vec![
            event(1, 10, "open", "a"),
            event(2, 11, "merged", "b"),
            event(3, 12, "open", "c"),
        ]);
        let consumer_ctx = ctx(UnknownStatePolicy::Halt);
        let consumer = QueueConsumer::new(&consumer_ctx, &log);

        let report = consumer.run(&store).unwrap();
        assert_eq!(report.halted_at, Some(EventId(2)));
        assert_eq!(report.processed, 1);
        assert_eq!(cursor_at(&store), EventId(1));
        assert!(store.snapshot().record(PullRequestId(12)).is_none());

        // Stays blocked on the same event.
        let again = consumer.run(&store).unwrap();
        assert_eq!(again.halted_at, Some(EventId(2)));
        assert_eq!(again.processed, 0);
    }

    #[test]
    fn conflicting_closed_event_aborts_batch() {
        let existing = TrackedRecord {
            repo_full_name: "org/other".to_string(),
            ..event(0, 10, "open", "a").record()
        };
        let before = Snapshot::new(vec![existing], vec![]);
        let store = MemoryStore::with_snapshot(before.clone());
        let log = MemoryEventLog::new(vec![event(1, 11, "open", "b"), event(2, 10, "closed", "a")]);

        let err = QueueConsumer::new(&ctx(UnknownStatePolicy::Skip), &log)
            .run(&store)
            .unwrap_err();
        assert!(matches!(err, SyncError::IdentityConflict { field: "repo_full_name", .. }));
        assert_eq!(store.snapshot(), before);
    }

    /// Log whose `events_after` ignores its argument.
    struct ReplayingLog(Vec<PullRequestEvent>);

    impl EventLog for ReplayingLog {
        fn high_water_mark(&self) -> Result<Option<EventId>, crate::EventLogError> {
            Ok(self.0.last().map(|e| e.id))
        }

        fn events_after(&self, _after: EventId) -> Result<Vec<PullRequestEvent>, crate::EventLogError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn out_of_order_log_is_rejected() {
        let store = MemoryStore::new();
        let log = ReplayingLog(vec![event(2, 10, "open", "a"), event(2, 11, "open", "b")]);
        let err = QueueConsumer::new(&ctx(UnknownStatePolicy::Skip), &log)
            .run(&store)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::OutOfOrder { previous: EventId(2), next: EventId(2) }
        ));
        assert!(store.snapshot().is_empty());
    }
}
