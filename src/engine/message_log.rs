// ── Banter Engine: Message Log ─────────────────────────────────────────────
// Append-only record of everything rendered to the user: chat messages in
// server arrival order, interleaved with system and error lines. The only
// non-append operation is the wholesale replacement a history backfill
// performs on join/rejoin. Replacement, not merge, is what keeps the log
// duplicate-free across reconnects.

use crate::atoms::types::{ChatMessage, LogEntry};

#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole log with a history backfill. Interleaved system and
    /// error lines are discarded along with the old messages.
    pub fn replace_all(&mut self, messages: Vec<ChatMessage>) {
        self.entries = messages.into_iter().map(LogEntry::Message).collect();
    }

    /// Append one entry, preserving arrival order.
    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Lazy, restartable walk over the log, finite at any observation point.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}
