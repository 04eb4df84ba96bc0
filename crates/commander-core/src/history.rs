//! Recent command history
//!
//! The orchestrator records every attempted command here before any strategy
//! runs, so the list reflects attempts rather than results.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of commands kept
pub const HISTORY_CAPACITY: usize = 20;

/// Receives each attempted command text
pub trait HistorySink: Send + Sync {
    fn record(&self, text: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory, most-recent-first, de-duplicated command list
pub struct RecentCommands {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl Default for RecentCommands {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl RecentCommands {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Newest first
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entry at `index`, 0 being the most recent
    pub fn get(&self, index: usize) -> Option<HistoryEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(index).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl HistorySink for RecentCommands {
    fn record(&self, text: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.retain(|e| e.text != text);
        entries.push_front(HistoryEntry {
            text: text.to_string(),
            recorded_at: Utc::now(),
        });
        entries.truncate(self.capacity);
    }
}
