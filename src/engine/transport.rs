// ── Banter Engine: Transport Session ───────────────────────────────────────
// Owns the one WebSocket to the chat server: dials, redials with backoff,
// pumps inbound frames through the wire codec, and carries outbound sends.
//
// Upper layers never see raw socket errors. The supervisor folds the whole
// connection lifecycle into a single ordered notice stream: `Connected` /
// `Reconnected` / `Disconnected` for lifecycle, `Event` for decoded frames,
// `Malformed` for frames that failed to decode, and a terminal `Lost` once
// the redial budget is exhausted. Notices are delivered to exactly one
// consumer in arrival order; the session driver processes them strictly
// sequentially.
//
// Dial failures and premature connection drops share one redial budget, and
// every redial waits out the backoff first, so a server that accepts the
// handshake and immediately drops cannot drive a connection storm. The
// budget refills only once a connection proves healthy (delivers a frame or
// stays up for a while).

use crate::atoms::error::{ChatError, ChatResult};
use crate::engine::backoff;
use crate::engine::wire::{self, ClientEvent, ServerEvent};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Consecutive unhealthy cycles (failed dials or premature drops) before the
/// transport gives up with `Lost`.
const MAX_RECONNECT_ATTEMPTS: u32 = 8;

/// A connection that stays up this long counts as healthy even if the
/// channel was silent the whole time.
const STABLE_UPTIME: Duration = Duration::from_secs(30);

/// Inbound silence before the client sends a keepalive ping.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// ── Notice stream ──────────────────────────────────────────────────────────

/// Everything the transport reports upward, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportNotice {
    /// First successful connection of this transport.
    Connected,
    /// A later successful connection after a drop.
    Reconnected,
    /// An established connection ended; the supervisor is redialing.
    Disconnected { reason: String },
    /// One decoded server event.
    Event(ServerEvent),
    /// A frame arrived but failed to decode. Non-fatal.
    Malformed { detail: String },
    /// Redial budget exhausted; the transport has stopped. Terminal.
    Lost { reason: String },
}

// ── Transport trait ────────────────────────────────────────────────────────

/// The seam between the session controller and the wire. Tests inject a
/// scripted implementation; production uses [`WsTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the connection supervisor and hand back the notice stream.
    /// May be called once per transport.
    async fn connect(&self, endpoint: &str) -> ChatResult<UnboundedReceiver<TransportNotice>>;

    /// Send one client event. Fails with `NotConnected` when no connection is
    /// up and `SessionClosed` after `close`. Never drops silently.
    async fn send(&self, event: ClientEvent) -> ChatResult<()>;

    /// Stop the supervisor, cancel pending redials, drop the connection.
    async fn close(&self);
}

// ── WebSocket transport ────────────────────────────────────────────────────

struct WsShared {
    /// Bearer token attached to the WebSocket handshake, when the login flow
    /// supplied one.
    token: Option<String>,
    /// Write half of the live connection. `None` whenever no connection is up,
    /// which is where `NotConnected` comes from.
    sink: tokio::sync::Mutex<Option<WsSink>>,
    /// Wakes the supervisor out of a backoff sleep on `close`.
    shutdown: Notify,
    started: AtomicBool,
    closed: AtomicBool,
}

pub struct WsTransport {
    shared: Arc<WsShared>,
}

impl WsTransport {
    pub fn new(session_token: Option<String>) -> Self {
        WsTransport {
            shared: Arc::new(WsShared {
                token: session_token,
                sink: tokio::sync::Mutex::new(None),
                shutdown: Notify::new(),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str) -> ChatResult<UnboundedReceiver<TransportNotice>> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ChatError::SessionClosed);
        }
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(ChatError::transport("transport already connected"));
        }

        let url = normalize_endpoint(endpoint)?;
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            supervise(shared, url, notice_tx).await;
        });
        Ok(notice_rx)
    }

    async fn send(&self, event: ClientEvent) -> ChatResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ChatError::SessionClosed);
        }
        let frame = wire::encode_client_event(&event);
        let mut guard = self.shared.sink.lock().await;
        let sink = guard.as_mut().ok_or(ChatError::NotConnected)?;
        if let Err(e) = sink.send(WsMessage::Text(frame)).await {
            // The pump will notice the drop too; clear the slot so later
            // sends fail fast with NotConnected instead of hitting a dead sink.
            *guard = None;
            return Err(ChatError::transport(format!("send failed: {e}")));
        }
        Ok(())
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.shutdown.notify_one();
        let mut guard = self.shared.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            let _ = sink.send(WsMessage::Close(None)).await;
        }
    }
}

// ── Endpoint normalization ─────────────────────────────────────────────────

/// Normalize a server endpoint for the WebSocket dial:
/// - Strips whitespace and trailing slashes
/// - Coerces `http(s)://` to `ws(s)://`
/// - Adds `wss://` if no scheme is present, with a warning
/// - Rejects non-WebSocket schemes
fn normalize_endpoint(raw: &str) -> ChatResult<String> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(ChatError::transport("server endpoint is required"));
    }

    if url.starts_with("ws://") || url.starts_with("wss://") {
        return Ok(url.to_string());
    }
    if let Some(stripped) = url.strip_prefix("https://") {
        return Ok(format!("wss://{stripped}"));
    }
    if let Some(stripped) = url.strip_prefix("http://") {
        return Ok(format!("ws://{stripped}"));
    }

    if let Some(colon_pos) = url.find("://") {
        let scheme = &url[..colon_pos];
        return Err(ChatError::transport(format!(
            "unsupported URL scheme '{scheme}://', use ws:// or wss://"
        )));
    }

    warn!("[transport] No URL scheme provided, assuming wss://{}", url);
    Ok(format!("wss://{url}"))
}

// ── Redial policy ──────────────────────────────────────────────────────────

/// What the supervisor does after a connection attempt ends.
#[derive(Debug, PartialEq, Eq)]
enum RedialDecision {
    /// Sleep `reconnect_delay(attempt)` and dial again.
    Retry { attempt: u32 },
    /// The budget of consecutive unhealthy cycles is spent. Stop.
    GiveUp,
}

/// Counts consecutive unhealthy cycles. A failed dial is always unhealthy; a
/// drop of an established connection is unhealthy unless the connection
/// proved itself first. Only a healthy run refills the budget, so a server
/// that flaps right after the handshake burns through it and terminates,
/// exactly like a server that never answers.
#[derive(Debug, Default)]
struct RedialPolicy {
    failures: u32,
}

impl RedialPolicy {
    fn dial_failed(&mut self) -> RedialDecision {
        self.bump()
    }

    fn connection_ended(&mut self, healthy: bool) -> RedialDecision {
        if healthy {
            self.failures = 0;
        }
        self.bump()
    }

    fn bump(&mut self) -> RedialDecision {
        self.failures += 1;
        if self.failures >= MAX_RECONNECT_ATTEMPTS {
            RedialDecision::GiveUp
        } else {
            RedialDecision::Retry { attempt: self.failures - 1 }
        }
    }
}

// ── Supervisor ─────────────────────────────────────────────────────────────

async fn supervise(shared: Arc<WsShared>, url: String, notices: UnboundedSender<TransportNotice>) {
    let mut had_connection = false;
    let mut policy = RedialPolicy::default();

    loop {
        if shared.closed.load(Ordering::SeqCst) {
            return;
        }

        let attempt = match dial(&shared, &url).await {
            Ok((sink, source)) => {
                *shared.sink.lock().await = Some(sink);

                let notice = if had_connection {
                    info!("[transport] Reconnected to {}", url);
                    TransportNotice::Reconnected
                } else {
                    info!("[transport] Connected to {}", url);
                    TransportNotice::Connected
                };
                had_connection = true;
                if notices.send(notice).is_err() {
                    return;
                }

                let connected_at = Instant::now();
                let (reason, delivered) = pump_frames(&shared, source, &notices).await;
                *shared.sink.lock().await = None;

                if shared.closed.load(Ordering::SeqCst) {
                    return;
                }
                warn!("[transport] Connection ended: {}", reason);

                let healthy = delivered || connected_at.elapsed() >= STABLE_UPTIME;
                match policy.connection_ended(healthy) {
                    RedialDecision::GiveUp => {
                        warn!("[transport] Giving up after repeated drops: {}", reason);
                        let _ = notices.send(TransportNotice::Lost { reason });
                        return;
                    }
                    RedialDecision::Retry { attempt } => {
                        if notices.send(TransportNotice::Disconnected { reason }).is_err() {
                            return;
                        }
                        attempt
                    }
                }
            }
            Err(e) => match policy.dial_failed() {
                RedialDecision::GiveUp => {
                    warn!("[transport] Giving up after repeated dial failures: {}", e);
                    let _ = notices.send(TransportNotice::Lost { reason: e.to_string() });
                    return;
                }
                RedialDecision::Retry { attempt } => {
                    warn!("[transport] Dial failed (attempt {}): {}", attempt + 1, e);
                    attempt
                }
            },
        };

        if !sleep_before_redial(&shared, attempt).await {
            return;
        }
    }
}

/// Backoff sleep between redials; ends early when the transport is closed.
/// Returns false when shutdown was signaled during the wait.
async fn sleep_before_redial(shared: &WsShared, attempt: u32) -> bool {
    tokio::select! {
        delay = backoff::reconnect_delay(attempt) => {
            debug!("[transport] Redialing after {}ms", delay.as_millis());
            true
        }
        _ = shared.shutdown.notified() => false,
    }
}

async fn dial(shared: &WsShared, url: &str) -> ChatResult<(WsSink, WsSource)> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ChatError::transport(format!("bad endpoint {url}: {e}")))?;
    if let Some(token) = &shared.token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ChatError::transport("session token is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws_stream, _) = connect_async(request)
        .await
        .map_err(|e| ChatError::transport(format!("connect to {url}: {e}")))?;
    Ok(ws_stream.split())
}

/// Read frames until the connection ends. Returns the reason it ended and
/// whether the server delivered anything (close frames excluded), which
/// feeds the redial policy's health check.
async fn pump_frames(
    shared: &WsShared,
    mut source: WsSource,
    notices: &UnboundedSender<TransportNotice>,
) -> (String, bool) {
    let mut delivered = false;
    loop {
        let msg = tokio::select! {
            m = source.next() => m,
            _ = tokio::time::sleep(KEEPALIVE_INTERVAL) => {
                let mut guard = shared.sink.lock().await;
                if let Some(sink) = guard.as_mut() {
                    if sink.send(WsMessage::Ping(Vec::new())).await.is_err() {
                        return ("keepalive ping failed".into(), delivered);
                    }
                }
                continue;
            }
        };

        if shared.closed.load(Ordering::SeqCst) {
            return ("closed".into(), delivered);
        }

        match msg {
            Some(Ok(WsMessage::Text(text))) => {
                delivered = true;
                match wire::decode_server_event(&text) {
                    Ok(Some(event)) => {
                        if notices.send(TransportNotice::Event(event)).is_err() {
                            return ("consumer gone".into(), delivered);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = notices.send(TransportNotice::Malformed { detail: e.to_string() });
                    }
                }
            }
            Some(Ok(WsMessage::Ping(data))) => {
                delivered = true;
                let mut guard = shared.sink.lock().await;
                if let Some(sink) = guard.as_mut() {
                    let _ = sink.send(WsMessage::Pong(data)).await;
                }
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let reason = match frame {
                    Some(f) if !f.reason.is_empty() => f.reason.to_string(),
                    _ => "server closed the connection".into(),
                };
                return (reason, delivered);
            }
            Some(Ok(_)) => {
                delivered = true;
            }
            Some(Err(e)) => return (e.to_string(), delivered),
            None => return ("connection ended".into(), delivered),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
