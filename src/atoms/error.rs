// ── Banter Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the session core, built with `thiserror`.
//
// Design rules:
//   • Caller-misuse variants (`NotConnected`, `SessionClosed`, `InvalidIdentity`,
//     `AlreadyActive`) are returned synchronously from the offending call and
//     never swallowed.
//   • Transport failures recover locally through the reconnect loop; they only
//     reach callers as `Transport` when the failure is terminal or the caller's
//     own operation failed mid-write.
//   • `Protocol` covers malformed inbound frames, logged into the message log
//     as an error line, never fatal to the session.
//   • No variant carries the session token in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChatError {
    /// A send was attempted while no connection is up (state is not Joined).
    #[error("not connected to the chat server")]
    NotConnected,

    /// Operation attempted after the session was explicitly closed. Terminal.
    #[error("session is closed")]
    SessionClosed,

    /// The identity supplied at start is unusable (empty/blank username).
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// `start` called on a live session with a different identity.
    #[error("session already active as '{0}'")]
    AlreadyActive(String),

    /// Connection-level failure (dial, handshake, mid-write drop).
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed inbound frame or payload of the wrong shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

// ── Wiring: decode failures are protocol errors ────────────────────────────

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Protocol(e.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All session operations return this type.
pub type ChatResult<T> = Result<T, ChatError>;
