// ── Banter Engine: Presence Tracker ────────────────────────────────────────
// The local view of who is online. The server broadcasts the full roster with
// every join/leave event and the tracker replaces its set wholesale; it never
// patches membership from individual events, so a missed event cannot make the
// view drift.

use crate::atoms::types::PresenceEntry;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    users: BTreeSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic wholesale replace from the latest server snapshot.
    pub fn replace_roster(&mut self, entries: Vec<PresenceEntry>) {
        self.users = entries.into_iter().map(|e| e.username).collect();
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.users.contains(username)
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    /// Sorted snapshot for rendering.
    pub fn users(&self) -> Vec<String> {
        self.users.iter().cloned().collect()
    }
}
