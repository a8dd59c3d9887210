use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::snapshot::StateSnapshot;

pub const HISTORY_CAPACITY: usize = 20;

const SAVED_AT_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One explicitly saved copy of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub saved_at: String,
    pub state: StateSnapshot,
}

impl HistoryEntry {
    /// Title shown in the history list.
    pub fn title(&self) -> &str {
        self.state.title.as_deref().unwrap_or_default()
    }
}

/// Saved snapshots, newest first, never more than [`HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Keeps the stored order and drops anything past the capacity.
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        if entries.len() > HISTORY_CAPACITY {
            log::warn!(
                "History holds {} entries, keeping the newest {}",
                entries.len(),
                HISTORY_CAPACITY
            );
            entries.truncate(HISTORY_CAPACITY);
        }
        Self { entries }
    }

    /// Saves `state` as the newest entry, evicting the oldest one when full.
    ///
    /// Ids are millisecond timestamps, bumped when needed so they stay
    /// strictly increasing.
    pub fn push(&mut self, state: StateSnapshot, now: DateTime<Local>) -> &HistoryEntry {
        let mut id = now.timestamp_millis();
        if let Some(newest) = self.entries.first() {
            id = id.max(newest.id + 1);
        }

        self.entries.insert(
            0,
            HistoryEntry {
                id,
                saved_at: now.format(SAVED_AT_FORMAT).to_string(),
                state,
            },
        );
        if self.entries.len() > HISTORY_CAPACITY {
            if let Some(evicted) = self.entries.pop() {
                log::debug!("History full, evicted entry {}", evicted.id);
            }
        }
        &self.entries[0]
    }

    pub fn get(&self, id: i64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
