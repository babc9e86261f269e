// ── Banter Engine: Session Controller ──────────────────────────────────────
// The state machine tying identity, transport, and the local views together.
//
// One driver task consumes the transport's notice stream; each notice is
// handled to completion (state update + render) before the next is taken, so
// local state never sees interleaved updates. The handle side (`start`,
// `submit_message`, `close`, queries) checks state synchronously and talks to
// the transport directly.
//
// Join announcements are emitted exactly once per transition into `Joined`:
// once when the first connection comes up, and once per successful reconnect.
// The sender's own messages are never appended locally; they enter the log
// only through the server's echo, so every participant renders the identical
// server-ordered log.

use crate::atoms::error::{ChatError, ChatResult};
use crate::atoms::traits::{NullRenderer, Renderer};
use crate::atoms::types::{Identity, LogEntry, PresenceEntry, SessionState};
use crate::engine::message_log::MessageLog;
use crate::engine::presence::PresenceTracker;
use crate::engine::transport::{Transport, TransportNotice};
use crate::engine::wire::{ClientEvent, ServerEvent};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

// ── Shared views ───────────────────────────────────────────────────────────

struct SessionShared {
    /// Session lifecycle. Written only by the handle (`close`) and the driver.
    state: watch::Sender<SessionState>,
    presence: RwLock<PresenceTracker>,
    log: RwLock<MessageLog>,
    identity: RwLock<Option<Identity>>,
}

// ── Public handle ──────────────────────────────────────────────────────────

pub struct ChatSession {
    transport: Arc<dyn Transport>,
    /// Handed to the driver task on `start`.
    renderer: Mutex<Option<Box<dyn Renderer>>>,
    shared: Arc<SessionShared>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn Transport>, renderer: Box<dyn Renderer>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        ChatSession {
            transport,
            renderer: Mutex::new(Some(renderer)),
            shared: Arc::new(SessionShared {
                state: state_tx,
                presence: RwLock::new(PresenceTracker::new()),
                log: RwLock::new(MessageLog::new()),
                identity: RwLock::new(None),
            }),
        }
    }

    /// Open the transport and start the session driver. Idempotent when the
    /// session is already running under the same username; starting over a
    /// live session with a different identity is an error.
    pub async fn start(&self, identity: Identity, endpoint: &str) -> ChatResult<()> {
        if self.state() == SessionState::Closed {
            return Err(ChatError::SessionClosed);
        }
        if identity.username.trim().is_empty() {
            return Err(ChatError::InvalidIdentity("username must not be empty".into()));
        }
        // Check and reserve under one lock, so a second `start` racing past
        // the connect await below sees AlreadyActive rather than a transport
        // error from the double connect.
        {
            let mut current = self.shared.identity.write();
            if let Some(active) = current.as_ref() {
                if active.username == identity.username {
                    return Ok(());
                }
                return Err(ChatError::AlreadyActive(active.username.clone()));
            }
            *current = Some(identity.clone());
        }

        let notices = match self.transport.connect(endpoint).await {
            Ok(notices) => notices,
            Err(e) => {
                *self.shared.identity.write() = None;
                return Err(e);
            }
        };
        self.shared.state.send_replace(SessionState::Connecting);
        info!("[session] Connecting to {} as {}", endpoint, identity.username);

        let renderer = self
            .renderer
            .lock()
            .take()
            .unwrap_or_else(|| Box::new(NullRenderer));
        let shared = self.shared.clone();
        let transport = self.transport.clone();
        tokio::spawn(async move {
            drive(shared, transport, notices, renderer, identity).await;
        });
        Ok(())
    }

    /// Send one chat line. Trims first; an empty line after trimming is a
    /// silent no-op. The message is NOT appended locally; it shows up in the
    /// log via the server echo.
    pub async fn submit_message(&self, text: &str) -> ChatResult<()> {
        if self.state() == SessionState::Closed {
            return Err(ChatError::SessionClosed);
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if self.state() != SessionState::Joined {
            return Err(ChatError::NotConnected);
        }
        self.transport
            .send(ClientEvent::ChatMessage { message: trimmed.to_string() })
            .await
    }

    /// Close the session. Terminal: cancels pending reconnects and makes all
    /// further operations fail with `SessionClosed`.
    pub async fn close(&self) {
        if self.state() == SessionState::Closed {
            return;
        }
        info!("[session] Closing");
        self.shared.state.send_replace(SessionState::Closed);
        self.transport.close().await;
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions as they happen.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.shared.presence.read().is_online(username)
    }

    pub fn online_count(&self) -> usize {
        self.shared.presence.read().online_count()
    }

    pub fn roster(&self) -> Vec<String> {
        self.shared.presence.read().users()
    }

    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.shared.log.read().entries().to_vec()
    }
}

// ── Driver ─────────────────────────────────────────────────────────────────

async fn drive(
    shared: Arc<SessionShared>,
    transport: Arc<dyn Transport>,
    mut notices: UnboundedReceiver<TransportNotice>,
    mut renderer: Box<dyn Renderer>,
    identity: Identity,
) {
    while let Some(notice) = notices.recv().await {
        let state = *shared.state.borrow();
        if state == SessionState::Closed {
            break;
        }

        match notice {
            TransportNotice::Connected => {
                if state == SessionState::Connecting {
                    // Joined is reached once the server acknowledges with the
                    // first chatHistory.
                    announce_join(&transport, &identity).await;
                } else {
                    debug!("[session] Ignoring connected signal in state {state}");
                }
            }
            TransportNotice::Reconnected => {
                if state == SessionState::Reconnecting {
                    announce_join(&transport, &identity).await;
                    shared.state.send_replace(SessionState::Joined);
                    info!("[session] Rejoined as {}", identity.username);
                } else {
                    debug!("[session] Ignoring reconnected signal in state {state}");
                }
            }
            TransportNotice::Disconnected { reason } => {
                if matches!(state, SessionState::Connecting | SessionState::Joined) {
                    warn!("[session] Connection lost: {reason}");
                    shared.state.send_replace(SessionState::Reconnecting);
                    append_line(
                        &shared,
                        renderer.as_mut(),
                        LogEntry::System("Connection lost, reconnecting".into()),
                    );
                }
            }
            TransportNotice::Event(event) => {
                handle_event(&shared, renderer.as_mut(), event);
            }
            TransportNotice::Malformed { detail } => {
                append_line(
                    &shared,
                    renderer.as_mut(),
                    LogEntry::Error(format!("Error: malformed server frame: {detail}")),
                );
            }
            TransportNotice::Lost { reason } => {
                warn!("[session] Transport gave up: {reason}");
                append_line(
                    &shared,
                    renderer.as_mut(),
                    LogEntry::Error(format!("Error: connection lost: {reason}")),
                );
                shared.state.send_replace(SessionState::Closed);
                break;
            }
        }
    }
    debug!("[session] Driver stopped");
}

fn handle_event(shared: &SessionShared, renderer: &mut dyn Renderer, event: ServerEvent) {
    match event {
        ServerEvent::ChatHistory(messages) => {
            debug!("[session] History backfill: {} messages", messages.len());
            shared.log.write().replace_all(messages);
            if *shared.state.borrow() == SessionState::Connecting {
                shared.state.send_replace(SessionState::Joined);
                info!("[session] Joined");
            }
            let snapshot = shared.log.read().entries().to_vec();
            renderer.history(&snapshot);
        }
        ServerEvent::ChatMessage(message) => {
            append_line(shared, renderer, LogEntry::Message(message));
        }
        ServerEvent::UserJoined(update) => {
            append_line(
                shared,
                renderer,
                LogEntry::System(format!("{} joined the chat", update.user)),
            );
            replace_roster(shared, renderer, update.active_users);
        }
        ServerEvent::UserLeft(update) => {
            append_line(
                shared,
                renderer,
                LogEntry::System(format!("{} left the chat", update.user)),
            );
            replace_roster(shared, renderer, update.active_users);
        }
        ServerEvent::Error(message) => {
            append_line(shared, renderer, LogEntry::Error(format!("Error: {message}")));
        }
    }
}

fn append_line(shared: &SessionShared, renderer: &mut dyn Renderer, entry: LogEntry) {
    shared.log.write().append(entry.clone());
    renderer.entry(&entry);
}

fn replace_roster(
    shared: &SessionShared,
    renderer: &mut dyn Renderer,
    entries: Vec<PresenceEntry>,
) {
    let users = {
        let mut presence = shared.presence.write();
        presence.replace_roster(entries);
        presence.users()
    };
    renderer.roster(&users);
}

async fn announce_join(transport: &Arc<dyn Transport>, identity: &Identity) {
    debug!("[session] Announcing join as {}", identity.username);
    if let Err(e) = transport
        .send(ClientEvent::UserJoin { username: identity.username.clone() })
        .await
    {
        warn!("[session] Join announcement failed: {e}");
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
