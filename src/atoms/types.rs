// ── Banter Atoms: Pure Data Types ──────────────────────────────────────────
// All plain struct/enum definitions with no logic.
//
// Wire shapes follow the server's JSON: messages carry `user`/`message`/
// `timestamp`, presence updates carry `user`/`activeUsers`. Timestamps are
// RFC 3339 on the wire and server-assigned; ordering in the message log is
// arrival order, never client clock order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated identity handed over by the login flow. Immutable for
/// the session lifetime; the token (when present) rides the WebSocket
/// handshake and is never validated or refreshed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub session_token: Option<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Identity { username: username.into(), session_token: None }
    }

    pub fn with_token(username: impl Into<String>, token: impl Into<String>) -> Self {
        Identity { username: username.into(), session_token: Some(token.into()) }
    }
}

/// One chat line as the server created it. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One member of the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub username: String,
}

/// Payload of `userJoined` / `userLeft`: who moved, plus the full roster
/// snapshot. The snapshot is the source of truth for membership; the `user`
/// field only feeds the informational log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub user: String,
    #[serde(rename = "activeUsers")]
    pub active_users: Vec<PresenceEntry>,
}

/// Session lifecycle, owned exclusively by the session controller.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Joined,
    Reconnecting,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Joined => "joined",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the rendered log: a chat message, a system notice
/// ("bob joined the chat"), or a non-fatal error report.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Message(ChatMessage),
    System(String),
    Error(String),
}
