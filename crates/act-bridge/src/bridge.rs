//! The bridge core: loopback WebSocket listener, handshake state machine,
//! pending-request table, and command dispatch.
//!
//! One extension peer at a time. A connection starts unauthenticated and
//! must present the process token in an `auth` frame before any command
//! traffic; a second connection arriving while one is open is refused with
//! close code 4001. All bridge state (peer handle, authenticated flag,
//! pending table) lives behind a single mutex so dispatches, frame handling,
//! and peer arrival/departure serialize against each other.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, warn};
use uuid::Uuid;

use act_ledger::AuditLog;
use act_types::{BridgeError, Frame, DEFAULT_COMMAND_TIMEOUT_MS};

use crate::allowlist::OriginAllowlist;

/// Close code used to refuse a second client while one is connected.
pub const CLOSE_CODE_ALREADY_CONNECTED: u16 = 4001;

/// Close reason paired with [`CLOSE_CODE_ALREADY_CONNECTED`].
pub const REFUSED_REASON: &str = "another client is already connected";

type CommandResult = Result<Value, BridgeError>;
type Hook = Arc<dyn Fn() + Send + Sync>;

struct PeerHandle {
    tx: mpsc::UnboundedSender<Message>,
    conn_id: u64,
}

/// Peer pointer, authenticated flag, and pending table -- mutated together
/// under one lock.
#[derive(Default)]
struct BridgeState {
    peer: Option<PeerHandle>,
    authenticated: bool,
    pending: HashMap<String, oneshot::Sender<CommandResult>>,
    local_port: Option<u16>,
    accept_task: Option<JoinHandle<()>>,
}

struct BridgeInner {
    port: u16,
    token: String,
    allowlist: Arc<OriginAllowlist>,
    audit: Arc<AuditLog>,
    state: Mutex<BridgeState>,
    next_conn_id: AtomicU64,
    on_connect: std::sync::Mutex<Vec<Hook>>,
    on_disconnect: std::sync::Mutex<Vec<Hook>>,
}

/// The single-client command bridge.
///
/// Cheap to clone; all clones share the same listener, token, and pending
/// table.
#[derive(Clone)]
pub struct ExtensionBridge {
    inner: Arc<BridgeInner>,
}

impl ExtensionBridge {
    /// Build a bridge for the given loopback port with a freshly generated
    /// 32-byte token. Nothing is bound until [`start`](Self::start).
    pub fn new(port: u16, allowlist: Arc<OriginAllowlist>, audit: Arc<AuditLog>) -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);

        Self {
            inner: Arc::new(BridgeInner {
                port,
                token: hex::encode(bytes),
                allowlist,
                audit,
                state: Mutex::new(BridgeState::default()),
                next_conn_id: AtomicU64::new(0),
                on_connect: std::sync::Mutex::new(Vec::new()),
                on_disconnect: std::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// The shared secret the extension must present in its `auth` frame.
    pub fn token(&self) -> &str {
        &self.inner.token
    }

    /// The navigation allowlist this bridge enforces.
    pub fn allowlist(&self) -> Arc<OriginAllowlist> {
        Arc::clone(&self.inner.allowlist)
    }

    /// True only while an authenticated peer is attached.
    pub async fn connected(&self) -> bool {
        let st = self.inner.state.lock().await;
        st.authenticated && st.peer.is_some()
    }

    /// Port actually bound (differs from the configured port when it was 0).
    pub async fn local_port(&self) -> Option<u16> {
        self.inner.state.lock().await.local_port
    }

    /// Register a callback fired when a peer completes authentication.
    pub fn on_connect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.inner
            .on_connect
            .lock()
            .expect("hook lock poisoned")
            .push(Arc::new(f));
    }

    /// Register a callback fired when the authenticated peer is lost.
    pub fn on_disconnect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.inner
            .on_disconnect
            .lock()
            .expect("hook lock poisoned")
            .push(Arc::new(f));
    }

    /// Bind the loopback listener and start accepting connections.
    ///
    /// The listener only ever binds `127.0.0.1`; there is no configuration
    /// surface for any other address. Fails when the port is in use.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(("127.0.0.1", self.inner.port))
            .await
            .map_err(|e| {
                BridgeError::storage(format!("failed to bind 127.0.0.1:{}: {e}", self.inner.port))
            })?;
        let local_port = listener
            .local_addr()
            .map_err(|e| BridgeError::storage(e.to_string()))?
            .port();

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(accept_loop(inner, listener));

        let mut st = self.inner.state.lock().await;
        st.local_port = Some(local_port);
        st.accept_task = Some(task);
        Ok(())
    }

    /// Shut the bridge down: reject every pending request with
    /// *shutting-down*, close the peer, stop accepting. Idempotent.
    pub async fn stop(&self) {
        let (drained, peer) = {
            let mut st = self.inner.state.lock().await;
            if let Some(task) = st.accept_task.take() {
                task.abort();
            }
            st.authenticated = false;
            let drained: Vec<_> = st.pending.drain().map(|(_, tx)| tx).collect();
            (drained, st.peer.take())
        };

        for tx in drained {
            let _ = tx.send(Err(BridgeError::ShuttingDown));
        }
        if let Some(peer) = peer {
            let _ = peer.tx.send(Message::Close(None));
        }
    }

    /// Dispatch a command to the peer and await its correlated response.
    ///
    /// Errors: *not-connected* when no authenticated peer is attached;
    /// *not-allowed* for a `navigate` outside the allowlist (checked locally,
    /// no frame is sent); *timeout* after `timeout_ms` (default 30 s);
    /// *peer-disconnected* / *shutting-down* when the pending entry is
    /// cancelled; *peer-error* carrying the peer's own message.
    pub async fn send_command(
        &self,
        command: &str,
        params: Value,
        timeout_ms: Option<u64>,
    ) -> CommandResult {
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS);

        // Fail fast so a command that cannot be sent is never audited.
        if !self.connected().await {
            return Err(BridgeError::NotConnected);
        }

        if command == "navigate" {
            let target = params.get("url").and_then(Value::as_str).unwrap_or_default();
            if !self.inner.allowlist.is_allowed(target) {
                return Err(BridgeError::NotAllowed {
                    url: target.to_string(),
                });
            }
        }

        self.inner.audit.record(command, &params).await;

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut st = self.inner.state.lock().await;
            let peer_tx = match (&st.peer, st.authenticated) {
                (Some(peer), true) => peer.tx.clone(),
                _ => return Err(BridgeError::NotConnected),
            };

            st.pending.insert(id.clone(), tx);
            let frame = Frame::Command {
                id: id.clone(),
                command: command.to_string(),
                params,
                tab_id: None,
            };
            if peer_tx.send(Message::Text(frame.to_wire())).is_err() {
                st.pending.remove(&id);
                return Err(BridgeError::PeerDisconnected);
            }
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::PeerDisconnected),
            Err(_) => {
                // A later response for this id finds no entry and is dropped.
                self.inner.state.lock().await.pending.remove(&id);
                Err(BridgeError::Timeout {
                    command: command.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Listener / connection tasks
// ---------------------------------------------------------------------------

async fn accept_loop(inner: Arc<BridgeInner>, listener: TcpListener) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(err = %e, "accept error");
                continue;
            }
        };
        let inner = Arc::clone(&inner);
        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => handle_connection(inner, ws, addr).await,
                Err(e) => debug!(peer = %addr, err = %e, "websocket handshake failed"),
            }
        });
    }
}

async fn handle_connection(
    inner: Arc<BridgeInner>,
    mut ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
) {
    // Attach as the current peer, or refuse if one is already open. The
    // decision and the attach happen under one lock so two racing
    // connections cannot both become current.
    let (conn_id, tx, rx) = {
        let mut st = inner.state.lock().await;
        if st.peer.is_some() {
            drop(st);
            warn!(peer = %addr, "refusing second client");
            let _ = ws
                .close(Some(CloseFrame {
                    code: CloseCode::Library(CLOSE_CODE_ALREADY_CONNECTED),
                    reason: REFUSED_REASON.into(),
                }))
                .await;
            return;
        }

        let conn_id = inner.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        st.peer = Some(PeerHandle {
            tx: tx.clone(),
            conn_id,
        });
        (conn_id, tx, rx)
    };

    debug!(peer = %addr, "client connected, awaiting auth");

    let (sink, mut stream) = ws.split();
    let writer = tokio::spawn(write_pump(sink, rx));

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_frame(&inner, conn_id, &tx, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(peer = %addr, err = %e, "websocket read error");
                break;
            }
        }
    }

    drop(tx);
    connection_closed(&inner, conn_id).await;
    writer.abort();
    debug!(peer = %addr, "client disconnected");
}

async fn write_pump(
    mut sink: futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if sink.send(msg).await.is_err() || closing {
            break;
        }
    }
}

/// Route one text frame according to the handshake state machine. Malformed
/// frames and frames that do not fit the current state are ignored; the
/// connection is never killed over bad JSON.
async fn handle_frame(
    inner: &Arc<BridgeInner>,
    conn_id: u64,
    tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) {
    let Some(frame) = Frame::parse(text) else {
        debug!("ignoring malformed frame");
        return;
    };

    let authenticated = {
        let st = inner.state.lock().await;
        if !is_current(&st, conn_id) {
            return;
        }
        st.authenticated
    };

    match frame {
        Frame::Auth {
            token,
            extension_id,
            allowed_origins,
        } if !authenticated => {
            handle_auth(inner, conn_id, tx, &token, extension_id, allowed_origins).await;
        }

        Frame::Response {
            id,
            success,
            data,
            error,
        } if authenticated => {
            let entry = inner.state.lock().await.pending.remove(&id);
            match entry {
                Some(resolver) => {
                    let result = if success {
                        Ok(data.unwrap_or(Value::Null))
                    } else {
                        Err(BridgeError::Peer {
                            message: error.unwrap_or_else(|| "command failed".to_string()),
                        })
                    };
                    let _ = resolver.send(result);
                }
                None => debug!(id = %id, "dropping response for unknown command id"),
            }
        }

        // Peer keepalive.
        Frame::Command { id, command, .. } if authenticated && command == "ping" => {
            let reply = Frame::Response {
                id,
                success: true,
                data: Some(json!({ "pong": true, "timestamp": now_millis() })),
                error: None,
            };
            let _ = tx.send(Message::Text(reply.to_wire()));
        }

        _ => debug!("ignoring frame that does not fit the current state"),
    }
}

async fn handle_auth(
    inner: &Arc<BridgeInner>,
    conn_id: u64,
    tx: &mpsc::UnboundedSender<Message>,
    token: &str,
    extension_id: Option<String>,
    allowed_origins: Option<Vec<String>>,
) {
    let matched = token_matches(&inner.token, token);

    if matched {
        {
            let mut st = inner.state.lock().await;
            if !is_current(&st, conn_id) {
                return;
            }
            st.authenticated = true;
        }

        if let Some(origins) = &allowed_origins {
            inner.allowlist.extend(origins);
        }
        let reply = Frame::AuthResult {
            success: true,
            error: None,
            allowed_origins: Some(inner.allowlist.origins()),
        };
        let _ = tx.send(Message::Text(reply.to_wire()));
        debug!(extension = extension_id.as_deref().unwrap_or(""), "client authenticated");
        fire_hooks(&inner.on_connect);
    } else {
        warn!(
            extension = extension_id.as_deref().unwrap_or(""),
            "auth failed: invalid token"
        );
        inner
            .audit
            .record("auth_failed", &json!({ "extensionId": extension_id }))
            .await;
        let reply = Frame::AuthResult {
            success: false,
            error: Some("Invalid auth token".to_string()),
            allowed_origins: None,
        };
        // The connection stays open but never leaves the unauthenticated
        // state, so command frames from it keep being ignored.
        let _ = tx.send(Message::Text(reply.to_wire()));
    }
}

/// Transport closed: clear the peer, cancel every pending request, and fire
/// the disconnect hooks if the peer had authenticated.
async fn connection_closed(inner: &Arc<BridgeInner>, conn_id: u64) {
    let (drained, was_authenticated) = {
        let mut st = inner.state.lock().await;
        if !is_current(&st, conn_id) {
            return;
        }
        st.peer = None;
        let was_authenticated = st.authenticated;
        st.authenticated = false;
        let drained: Vec<_> = st.pending.drain().map(|(_, tx)| tx).collect();
        (drained, was_authenticated)
    };

    for resolver in drained {
        let _ = resolver.send(Err(BridgeError::PeerDisconnected));
    }
    if was_authenticated {
        fire_hooks(&inner.on_disconnect);
    }
}

fn is_current(st: &BridgeState, conn_id: u64) -> bool {
    st.peer.as_ref().is_some_and(|p| p.conn_id == conn_id)
}

fn fire_hooks(hooks: &std::sync::Mutex<Vec<Hook>>) {
    let hooks: Vec<Hook> = hooks.lock().expect("hook lock poisoned").clone();
    for hook in hooks {
        hook();
    }
}

/// Constant-time token comparison. Returns early only when the lengths
/// differ; a dummy comparison keeps that path from being a trivial oracle.
fn token_matches(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    bool::from(expected.ct_eq(provided))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(token_matches("abcdef", "abcdef"));
        assert!(!token_matches("abcdef", "abcdeg"));
        assert!(!token_matches("abcdef", "abcde"));
        assert!(!token_matches("abcdef", ""));
        assert!(token_matches("", ""));
    }

    #[test]
    fn generated_tokens_are_32_random_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path()));
        let allowlist = Arc::new(OriginAllowlist::new(vec![]));
        let a = ExtensionBridge::new(0, Arc::clone(&allowlist), Arc::clone(&audit));
        let b = ExtensionBridge::new(0, allowlist, audit);

        // 32 bytes hex-encoded.
        assert_eq!(a.token().len(), 64);
        assert!(a.token().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.token(), b.token());
    }

    #[tokio::test]
    async fn send_command_without_peer_is_not_connected() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path()));
        let allowlist = Arc::new(OriginAllowlist::new(vec![]));
        let bridge = ExtensionBridge::new(0, allowlist, audit);

        let err = bridge
            .send_command("url", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
        assert!(!bridge.connected().await);
    }

    #[tokio::test]
    async fn navigate_without_peer_is_not_connected() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path()));
        let allowlist = Arc::new(OriginAllowlist::new(vec!["localhost".into()]));
        let bridge = ExtensionBridge::new(0, allowlist, audit);

        // Without an authenticated peer every dispatch fails the same way,
        // navigations included.
        let err = bridge
            .send_command("navigate", json!({"url": "https://evil.example/"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
    }
}
