// ── Banter ─────────────────────────────────────────────────────────────────
// Real-time chat client core. The library owns the session: connection
// lifecycle, presence reconciliation, and the ordered message log. Auth and
// presentation live outside; they hand the session an identity and an
// endpoint, and receive render callbacks in return.

pub mod atoms;
pub mod engine;

pub use atoms::error::{ChatError, ChatResult};
pub use atoms::traits::{NullRenderer, Renderer};
pub use atoms::types::{
    ChatMessage, Identity, LogEntry, PresenceEntry, PresenceUpdate, SessionState,
};
pub use engine::session::ChatSession;
pub use engine::transport::{Transport, TransportNotice, WsTransport};
pub use engine::wire::{ClientEvent, ServerEvent};
