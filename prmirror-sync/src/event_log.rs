//! Event log: the append-only webhook record of pull request changes.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};

use prmirror_core::{EventId, EventState, PullRequestEvent, PullRequestId};

use crate::error::EventLogError;

/// Ordered access to pull request events.
pub trait EventLog {
    /// Id of the newest event, or `None` for an empty log.
    fn high_water_mark(&self) -> Result<Option<EventId>, EventLogError>;

    /// Every event with an id greater than `after`, ascending.
    fn events_after(&self, after: EventId) -> Result<Vec<PullRequestEvent>, EventLogError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const SELECT_AFTER: &str = "SELECT id, pull_request_id, repo_full_name, pull_request_number,
        pull_request_url, pull_request_title, pull_request_created_at,
        pull_request_updated_at, pull_request_state
     FROM pull_request_event WHERE id > ?1 ORDER BY id";

/// Reads the `pull_request_event` table the webhook receiver writes.
pub struct SqliteEventLog {
    conn: Connection,
}

impl SqliteEventLog {
    /// Open the database read-only; the webhook receiver owns writes.
    pub fn open(path: &Path) -> Result<Self, EventLogError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| EventLogError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

/// Raw row before range checks.
struct EventRow {
    id: i64,
    pull_request_id: i64,
    repo_full_name: String,
    number: i64,
    url: String,
    title: String,
    created_at: String,
    updated_at: String,
    state: String,
}

impl TryFrom<EventRow> for PullRequestEvent {
    type Error = EventLogError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event = row.id;
        let unsigned = |column: &'static str, value: i64| {
            u64::try_from(value).map_err(|_| EventLogError::InvalidRow {
                event,
                column,
                value,
            })
        };
        Ok(PullRequestEvent {
            id: EventId(unsigned("id", row.id)?),
            state: EventState::from(row.state.as_str()),
            pull_request_id: PullRequestId(unsigned("pull_request_id", row.pull_request_id)?),
            number: unsigned("pull_request_number", row.number)?,
            repo_full_name: row.repo_full_name,
            url: row.url,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl EventLog for SqliteEventLog {
    fn high_water_mark(&self) -> Result<Option<EventId>, EventLogError> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT max(id) FROM pull_request_event", [], |row| row.get(0))?;
        max.map(|id| {
            u64::try_from(id).map(EventId).map_err(|_| EventLogError::InvalidRow {
                event: id,
                column: "id",
                value: id,
            })
        })
        .transpose()
    }

    fn events_after(&self, after: EventId) -> Result<Vec<PullRequestEvent>, EventLogError> {
        // Ids past i64::MAX can't exist in SQLite; clamp rather than wrap.
        let after = i64::try_from(after.0).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(SELECT_AFTER)?;
        let rows = stmt.query_map(params![after], |row| {
            Ok(EventRow {
                id: row.get(0)?,
                pull_request_id: row.get(1)?,
                repo_full_name: row.get(2)?,
                number: row.get(3)?,
                url: row.get(4)?,
                title: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
                state: row.get(8)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(PullRequestEvent::try_from(row?)?);
        }
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Vector-backed log, kept sorted by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    events: Vec<PullRequestEvent>,
}

impl MemoryEventLog {
    pub fn new(mut events: Vec<PullRequestEvent>) -> Self {
        events.sort_by_key(|e| e.id);
        Self { events }
    }

    pub fn push(&mut self, event: PullRequestEvent) {
        self.events.push(event);
        self.events.sort_by_key(|e| e.id);
    }
}

impl EventLog for MemoryEventLog {
    fn high_water_mark(&self) -> Result<Option<EventId>, EventLogError> {
        Ok(self.events.last().map(|e| e.id))
    }

    fn events_after(&self, after: EventId) -> Result<Vec<PullRequestEvent>, EventLogError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.id > after)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "CREATE TABLE pull_request_event (
        id INTEGER PRIMARY KEY,
        action TEXT,
        repo_full_name TEXT,
        pull_request_id INTEGER,
        pull_request_number INTEGER,
        pull_request_url TEXT,
        pull_request_title TEXT,
        pull_request_created_at TEXT,
        pull_request_updated_at TEXT,
        pull_request_state TEXT
    )";

    fn insert(conn: &Connection, id: i64, pr: i64, state: &str) {
        conn.execute(
            "INSERT INTO pull_request_event (id, repo_full_name, pull_request_id,
                pull_request_number, pull_request_url, pull_request_title,
                pull_request_created_at, pull_request_updated_at, pull_request_state)
             VALUES (?1, 'org/a', ?2, ?2, 'http://x/' || ?2, 'T', 'c', 'u', ?3)",
            params![id, pr, state],
        )
        .unwrap();
    }

    fn log_with(rows: &[(i64, i64, &str)]) -> SqliteEventLog {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(SCHEMA, []).unwrap();
        for (id, pr, state) in rows {
            insert(&conn, *id, *pr, state);
        }
        SqliteEventLog::from_connection(conn)
    }

    #[test]
    fn empty_table_has_no_high_water_mark() {
        let log = log_with(&[]);
        assert_eq!(log.high_water_mark().unwrap(), None);
        assert!(log.events_after(EventId(0)).unwrap().is_empty());
    }

    #[test]
    fn events_after_is_exclusive_and_ascending() {
        let log = log_with(&[(3, 1, "closed"), (1, 1, "open"), (2, 2, "open")]);
        assert_eq!(log.high_water_mark().unwrap(), Some(EventId(3)));

        let events = log.events_after(EventId(1)).unwrap();
        let ids: Vec<u64> = events.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(events[0].url, "http://x/2");
        assert_eq!(events[1].state, EventState::Closed);
    }

    #[test]
    fn negative_number_is_rejected() {
        let log = log_with(&[(1, -4, "open")]);
        let err = log.events_after(EventId(0)).unwrap_err();
        assert!(matches!(err, EventLogError::InvalidRow { event: 1, .. }), "got: {err}");
    }

    #[test]
    fn memory_log_sorts_on_insert() {
        let mut log = MemoryEventLog::default();
        let sqlite = log_with(&[(1, 1, "open"), (2, 1, "closed")]);
        let mut events = sqlite.events_after(EventId(0)).unwrap();
        log.push(events.pop().unwrap());
        log.push(events.pop().unwrap());
        assert_eq!(log.high_water_mark().unwrap(), Some(EventId(2)));
        assert_eq!(log.events_after(EventId(0)).unwrap()[0].id, EventId(1));
    }

    #[test]
    fn open_missing_database_fails_with_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing.db");
        let err = SqliteEventLog::open(&path).err().expect("open should fail");
        assert!(err.to_string().contains("missing.db"));
    }
}
