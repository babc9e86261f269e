// ── Banter Engine: Wire Codec ──────────────────────────────────────────────
// JSON text frames over one WebSocket, envelope `{"event": ..., "data": ...}`.
//
// Inbound: chatHistory (full backfill array), chatMessage (one message),
// userJoined / userLeft (mover + full roster snapshot), error (string).
// Outbound: userJoin (username string), chatMessage (message string).
//
// A malformed frame or a known event with the wrong payload shape is a
// `Protocol` error; an unknown event name is ignored (the client simply has
// no handler for it).

use crate::atoms::error::{ChatError, ChatResult};
use crate::atoms::types::{ChatMessage, PresenceUpdate};
use log::debug;
use serde_json::json;

// ── Event enums ────────────────────────────────────────────────────────────

/// Server-pushed events, decoded from inbound text frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ChatHistory(Vec<ChatMessage>),
    ChatMessage(ChatMessage),
    UserJoined(PresenceUpdate),
    UserLeft(PresenceUpdate),
    Error(String),
}

/// Client-emitted events, encoded into outbound text frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    UserJoin { username: String },
    ChatMessage { message: String },
}

// ── Encode ─────────────────────────────────────────────────────────────────

pub fn encode_client_event(event: &ClientEvent) -> String {
    match event {
        ClientEvent::UserJoin { username } => {
            json!({ "event": "userJoin", "data": username }).to_string()
        }
        ClientEvent::ChatMessage { message } => {
            json!({ "event": "chatMessage", "data": message }).to_string()
        }
    }
}

// ── Decode ─────────────────────────────────────────────────────────────────

/// Decode one inbound text frame. `Ok(None)` means the event name is unknown
/// and the frame should be dropped silently.
pub fn decode_server_event(raw: &str) -> ChatResult<Option<ServerEvent>> {
    let envelope: serde_json::Value = serde_json::from_str(raw)?;

    let name = envelope["event"]
        .as_str()
        .ok_or_else(|| ChatError::protocol("frame has no event name"))?
        .to_string();
    let data = envelope
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    match name.as_str() {
        "chatHistory" => Ok(Some(ServerEvent::ChatHistory(serde_json::from_value(data)?))),
        "chatMessage" => Ok(Some(ServerEvent::ChatMessage(serde_json::from_value(data)?))),
        "userJoined" => Ok(Some(ServerEvent::UserJoined(serde_json::from_value(data)?))),
        "userLeft" => Ok(Some(ServerEvent::UserLeft(serde_json::from_value(data)?))),
        "error" => {
            let message = data
                .as_str()
                .ok_or_else(|| ChatError::protocol("error payload is not a string"))?
                .to_string();
            Ok(Some(ServerEvent::Error(message)))
        }
        other => {
            debug!("[wire] Ignoring unknown event '{}'", other);
            Ok(None)
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
