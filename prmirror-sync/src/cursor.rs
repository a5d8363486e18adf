//! Cursor bookkeeping: where a consumer stands in its event log.

use prmirror_core::{Cursor, CursorKey, EventId, Transaction};

/// Loads and advances one named, typed cursor inside a transaction.
#[derive(Debug, Clone)]
pub struct CursorManager {
    key: CursorKey,
}

impl CursorManager {
    pub fn new(key: CursorKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &CursorKey {
        &self.key
    }

    /// The stored cursor, or a fresh one at position 0.
    ///
    /// A fresh cursor is not written until it is first advanced.
    pub fn load(&self, tx: &Transaction<'_>) -> Cursor {
        tx.find_cursor(&self.key).cloned().unwrap_or_else(|| Cursor {
            key: self.key.clone(),
            last_processed_id: EventId(0),
        })
    }

    /// Move `cursor` to `to` and store it. Never moves backwards.
    ///
    /// Returns `false` when `to` is behind the current position and the
    /// cursor was left where it was.
    pub fn advance(&self, tx: &mut Transaction<'_>, cursor: &mut Cursor, to: EventId) -> bool {
        if to < cursor.last_processed_id {
            tracing::warn!(
                "cursor {} stays at {}; refusing to move back to {}",
                self.key,
                cursor.last_processed_id,
                to
            );
            tx.save_cursor(cursor.clone());
            return false;
        }
        cursor.last_processed_id = to;
        tx.save_cursor(cursor.clone());
        true
    }
}
