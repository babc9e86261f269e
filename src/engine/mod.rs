// ── Banter Engine ──────────────────────────────────────────────────────────
// The real-time session logic: wire codec, reconnect backoff, WebSocket
// transport, presence tracker, message log, and the session controller that
// ties them together.

pub mod backoff;
pub mod message_log;
pub mod presence;
pub mod session;
pub mod transport;
pub mod wire;
