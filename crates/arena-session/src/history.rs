//! Append-only move history for one session.
//!
//! Entries are never modified or removed. Indices are assigned on append
//! and are always contiguous from zero, so `len()` equals the number of
//! moves accepted since the session started.

use arena_types::{HistoryEntry, UserId};
use chrono::{DateTime, Utc};

use crate::error::SessionError;

/// The accepted moves of one session, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of recorded moves.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no move has been recorded.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The entry at `index`.
    ///
    /// Takes a signed index so that negative requests from clients are
    /// reported as out of bounds rather than rejected at parse time.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IndexOutOfBounds`] unless `0 <= index < len`.
    pub fn at(&self, index: i64) -> Result<&HistoryEntry, SessionError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or(SessionError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            })
    }

    /// Record an accepted move and return its entry.
    ///
    /// Only the session state machine appends, after the move has been
    /// validated and applied.
    pub(crate) fn append(
        &mut self,
        by: UserId,
        payload: serde_json::Value,
        when: DateTime<Utc>,
    ) -> Result<&HistoryEntry, SessionError> {
        let index = u32::try_from(self.entries.len())
            .map_err(|e| SessionError::Internal(format!("history log is full: {e}")))?;
        self.entries.push(HistoryEntry {
            index,
            by,
            payload,
            when,
        });
        self.entries
            .last()
            .ok_or_else(|| SessionError::Internal(String::from("history append lost entry")))
    }
}
