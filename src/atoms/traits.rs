// ── Banter Atoms: Renderer Seam ────────────────────────────────────────────
// The constructor-injected boundary to the presentation layer. The session
// driver calls these after every local-state update; implementations draw
// however they like (terminal, GUI, nothing). Default bodies are no-ops so a
// renderer only implements what it actually draws.

use super::types::LogEntry;

pub trait Renderer: Send {
    /// One new log entry was appended (live message, system or error line).
    fn entry(&mut self, _entry: &LogEntry) {}

    /// The whole log was replaced by a history backfill.
    fn history(&mut self, _entries: &[LogEntry]) {}

    /// The roster was replaced wholesale; `users` is sorted.
    fn roster(&mut self, _users: &[String]) {}
}

/// Renderer that draws nothing. Useful for headless sessions and tests.
pub struct NullRenderer;

impl Renderer for NullRenderer {}
