//! Record merge shared by the full reconciler and the queue consumer.
//!
//! Incoming data for an id that already exists must agree on every immutable
//! field. A disagreement is returned as [`SyncError::IdentityConflict`] and
//! the caller abandons its transaction.

use prmirror_core::{TrackedRecord, Transaction};

use crate::SyncError;

/// What [`upsert_verified`] did with the incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    /// Mutable fields changed.
    Updated,
    Unchanged,
}

/// Check that `incoming` describes the same pull request as `existing`.
pub fn verify_identity(existing: &TrackedRecord, incoming: &TrackedRecord) -> Result<(), SyncError> {
    let conflict = |field: &'static str, local: String, remote: String| SyncError::IdentityConflict {
        id: existing.id,
        field,
        local,
        remote,
    };

    if existing.repo_full_name != incoming.repo_full_name {
        return Err(conflict(
            "repo_full_name",
            existing.repo_full_name.clone(),
            incoming.repo_full_name.clone(),
        ));
    }
    if existing.number != incoming.number {
        return Err(conflict(
            "number",
            existing.number.to_string(),
            incoming.number.to_string(),
        ));
    }
    if existing.url != incoming.url {
        return Err(conflict("url", existing.url.clone(), incoming.url.clone()));
    }
    if existing.created_at != incoming.created_at {
        return Err(conflict(
            "created_at",
            existing.created_at.clone(),
            incoming.created_at.clone(),
        ));
    }
    Ok(())
}

/// Create `incoming`, or overwrite the mutable fields of the stored record.
pub fn upsert_verified(
    tx: &mut Transaction<'_>,
    incoming: TrackedRecord,
) -> Result<MergeOutcome, SyncError> {
    let outcome = match tx.get(incoming.id) {
        None => MergeOutcome::Created,
        Some(existing) => {
            verify_identity(existing, &incoming)?;
            if existing.title == incoming.title && existing.updated_at == incoming.updated_at {
                MergeOutcome::Unchanged
            } else {
                MergeOutcome::Updated
            }
        }
    };

    if outcome != MergeOutcome::Unchanged {
        tracing::debug!("{:?} pull request {} ({})", outcome, incoming.id, incoming.repo_full_name);
        tx.upsert(incoming);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prmirror_core::{MemoryStore, PullRequestId, RecordStore, Snapshot};
    use rstest::rstest;

    fn record() -> TrackedRecord {
        TrackedRecord {
            id: PullRequestId(1),
            repo_full_name: "org/a".to_string(),
            number: 5,
            url: "http://x/1".to_string(),
            title: "Foo".to_string(),
            created_at: "2014-01-27T05:26:41Z".to_string(),
            updated_at: "2014-01-27T05:26:41Z".to_string(),
        }
    }

    #[rstest]
    #[case::repo("repo_full_name", |r: &mut TrackedRecord| r.repo_full_name = "org/b".into())]
    #[case::number("number", |r: &mut TrackedRecord| r.number = 6)]
    #[case::url("url", |r: &mut TrackedRecord| r.url = "http://x/2".into())]
    #[case::created("created_at", |r: &mut TrackedRecord| r.created_at = "2015-01-01T00:00:00Z".into())]
    fn immutable_field_change_is_a_conflict(
        #[case] expected: &str,
        #[case] mutate: fn(&mut TrackedRecord),
    ) {
        let mut incoming = record();
        mutate(&mut incoming);
        match verify_identity(&record(), &incoming) {
            Err(SyncError::IdentityConflict { field, id, .. }) => {
                assert_eq!(field, expected);
                assert_eq!(id, PullRequestId(1));
            }
            other => panic!("expected identity conflict, got {other:?}"),
        }
    }

    #[test]
    fn mutable_fields_are_not_identity() {
        let mut incoming = record();
        incoming.title = "Bar".to_string();
        incoming.updated_at = "2016-01-01T00:00:00Z".to_string();
        assert!(verify_identity(&record(), &incoming).is_ok());
    }

    #[test]
    fn upsert_reports_created_updated_unchanged() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        assert_eq!(upsert_verified(&mut tx, record()).unwrap(), MergeOutcome::Created);
        assert_eq!(upsert_verified(&mut tx, record()).unwrap(), MergeOutcome::Unchanged);

        let mut renamed = record();
        renamed.title = "Bar".to_string();
        assert_eq!(upsert_verified(&mut tx, renamed).unwrap(), MergeOutcome::Updated);
        assert_eq!(tx.get(PullRequestId(1)).unwrap().title, "Bar");
    }

    #[test]
    fn conflicting_upsert_leaves_record_alone() {
        let store = MemoryStore::with_snapshot(Snapshot::new(vec![record()], vec![]));
        let mut tx = store.begin().unwrap();
        let mut moved = record();
        moved.url = "http://x/2".to_string();
        moved.title = "Bar".to_string();
        assert!(upsert_verified(&mut tx, moved).is_err());
        assert_eq!(tx.get(PullRequestId(1)).unwrap(), &record());
    }
}
