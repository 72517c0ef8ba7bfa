//! protoo-style signaling over WebSocket.
//!
//! Every text frame is one JSON message: a request, a response, or a
//! notification. Both sides may send requests; responses carry the id of
//! the request they answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::error::{Result, ServerError};
use crate::internal::lock;
use crate::room::RoomEvent;

const SUBPROTOCOL: &str = "protoo";

/// Request received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub id: u32,
    pub method: String,
    pub data: Value,
}

/// One decoded signaling message.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    Request(SignalRequest),
    Response {
        id: u32,
        result: std::result::Result<Value, (u16, String)>,
    },
    Notification {
        method: String,
        data: Value,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(default)]
    request: bool,
    #[serde(default)]
    response: bool,
    #[serde(default)]
    notification: bool,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    error_reason: Option<String>,
}

impl SignalMessage {
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(text)?;
        let data = if raw.data.is_null() { json!({}) } else { raw.data };
        if raw.request {
            let (Some(id), Some(method)) = (raw.id, raw.method) else {
                return Err(ServerError::InvalidRequest(
                    "request without id or method".into(),
                ));
            };
            return Ok(SignalMessage::Request(SignalRequest { id, method, data }));
        }
        if raw.response {
            let Some(id) = raw.id else {
                return Err(ServerError::InvalidRequest("response without id".into()));
            };
            let result = if raw.ok {
                Ok(data)
            } else {
                Err((
                    raw.error_code.unwrap_or(500),
                    raw.error_reason.unwrap_or_default(),
                ))
            };
            return Ok(SignalMessage::Response { id, result });
        }
        if raw.notification {
            let Some(method) = raw.method else {
                return Err(ServerError::InvalidRequest(
                    "notification without method".into(),
                ));
            };
            return Ok(SignalMessage::Notification { method, data });
        }
        Err(ServerError::InvalidRequest("unknown message type".into()))
    }
}

pub fn request_message(id: u32, method: &str, data: &Value) -> String {
    json!({"request": true, "id": id, "method": method, "data": data}).to_string()
}

pub fn success_response(id: u32, data: &Value) -> String {
    json!({"response": true, "id": id, "ok": true, "data": data}).to_string()
}

pub fn error_response(id: u32, code: u16, reason: &str) -> String {
    json!({
        "response": true,
        "id": id,
        "ok": false,
        "errorCode": code,
        "errorReason": reason,
    })
    .to_string()
}

pub fn notification_message(method: &str, data: &Value) -> String {
    json!({"notification": true, "method": method, "data": data}).to_string()
}

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

type PendingResponse = oneshot::Sender<std::result::Result<Value, (u16, String)>>;

/// Server side of one signaling connection.
///
/// Cloning yields another handle to the same connection.
#[derive(Debug, Clone)]
pub struct SignalingPeer {
    inner: Arc<PeerInner>,
}

#[derive(Debug)]
struct PeerInner {
    id: String,
    conn_id: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Mutex<HashMap<u32, PendingResponse>>,
    next_id: AtomicU32,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl SignalingPeer {
    /// Create a peer handle and the queue its writer drains.
    pub fn new(
        id: impl Into<String>,
        conn_id: u64,
        request_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let peer = Self {
            inner: Arc::new(PeerInner {
                id: id.into(),
                conn_id,
                outbound,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU32::new(1),
                request_timeout,
                closed: AtomicBool::new(false),
            }),
        };
        (peer, rx)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Distinguishes successive connections of the same peer id.
    pub fn conn_id(&self) -> u64 {
        self.inner.conn_id
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn send(&self, text: String) -> Result<()> {
        if self.closed() {
            return Err(ServerError::Signaling(format!("peer {} closed", self.inner.id)));
        }
        self.inner
            .outbound
            .send(Outbound::Text(text))
            .map_err(|_| ServerError::Signaling(format!("peer {} gone", self.inner.id)))
    }

    /// Send a request to the client and wait for its response.
    pub async fn request(&self, method: &str, data: Value) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id, tx);
        if let Err(err) = self.send(request_message(id, method, &data)) {
            lock(&self.inner.pending).remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err((code, reason)))) => Err(ServerError::Signaling(format!(
                "{method} rejected by peer ({code}): {reason}"
            ))),
            Ok(Err(_)) => Err(ServerError::Signaling(format!(
                "peer {} closed before answering {method}",
                self.inner.id
            ))),
            Err(_) => {
                lock(&self.inner.pending).remove(&id);
                Err(ServerError::Signaling(format!("{method} request timed out")))
            }
        }
    }

    pub fn notify(&self, method: &str, data: Value) -> Result<()> {
        self.send(notification_message(method, &data))
    }

    pub fn accept(&self, id: u32, data: Value) {
        if let Err(err) = self.send(success_response(id, &data)) {
            debug!(peer_id = %self.inner.id, id, error = %err, "response dropped");
        }
    }

    pub fn reject(&self, id: u32, code: u16, reason: &str) {
        if let Err(err) = self.send(error_response(id, code, reason)) {
            debug!(peer_id = %self.inner.id, id, error = %err, "response dropped");
        }
    }

    /// Deliver the client's response to one of our requests.
    pub fn settle(&self, id: u32, result: std::result::Result<Value, (u16, String)>) {
        match lock(&self.inner.pending).remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => warn!(peer_id = %self.inner.id, id, "response to unknown request"),
        }
    }

    /// Close the connection. Pending requests fail.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.inner.pending).clear();
        let _ = self.inner.outbound.send(Outbound::Close);
    }
}

/// `roomId` and `peerId` from the WebSocket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerQuery {
    pub room_id: String,
    pub peer_id: String,
}

impl PeerQuery {
    pub fn parse(query: Option<&str>) -> Option<Self> {
        let mut room_id = None;
        let mut peer_id = None;
        for pair in query.unwrap_or_default().split('&') {
            match pair.split_once('=') {
                Some(("roomId", value)) if !value.is_empty() => room_id = Some(value.to_string()),
                Some(("peerId", value)) if !value.is_empty() => peer_id = Some(value.to_string()),
                _ => {}
            }
        }
        Some(Self {
            room_id: room_id?,
            peer_id: peer_id?,
        })
    }
}

/// Complete the WebSocket handshake, rejecting it with 400 unless the URL
/// names both a room and a peer.
pub async fn handshake<S>(stream: S) -> Result<(WebSocketStream<S>, PeerQuery)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut query = None;
    let callback = |request: &Request, mut response: Response| {
        let Some(parsed) = PeerQuery::parse(request.uri().query()) else {
            let mut rejection = ErrorResponse::new(Some("missing roomId or peerId".to_string()));
            *rejection.status_mut() = StatusCode::BAD_REQUEST;
            return Err(rejection);
        };
        let wants_protoo = request
            .headers()
            .get_all("Sec-WebSocket-Protocol")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|protocol| protocol.trim() == SUBPROTOCOL);
        if wants_protoo {
            response
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
        }
        query = Some(parsed);
        Ok(response)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let query = query.ok_or_else(|| ServerError::InvalidRequest("missing roomId or peerId".into()))?;
    Ok((ws, query))
}

/// Pump one connection until either side closes it.
///
/// Client requests are forwarded to the room; responses settle the peer's
/// own requests. The room gets [`RoomEvent::PeerClosed`] at the end.
pub async fn run_connection<S>(
    ws: WebSocketStream<S>,
    peer: SignalingPeer,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    room: mpsc::UnboundedSender<RoomEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let peer_id = peer.id().to_string();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let message = match frame {
                Outbound::Text(text) => Message::Text(text),
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(err) = sink.send(message).await {
                debug!(error = %err, "websocket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => dispatch(&peer, &room, &text),
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => warn!(peer_id = %peer_id, "ignoring binary frame"),
            Ok(_) => {}
            Err(err) => {
                debug!(peer_id = %peer_id, error = %err, "websocket read failed");
                break;
            }
        }
    }

    peer.close();
    writer.abort();
    debug!(peer_id = %peer_id, conn_id = peer.conn_id(), "connection closed");
    let _ = room.send(RoomEvent::PeerClosed {
        peer_id,
        conn_id: peer.conn_id(),
    });
}

fn dispatch(peer: &SignalingPeer, room: &mpsc::UnboundedSender<RoomEvent>, text: &str) {
    match SignalMessage::parse(text) {
        Ok(SignalMessage::Request(request)) => {
            let id = request.id;
            let forwarded = room.send(RoomEvent::Request {
                peer_id: peer.id().to_string(),
                conn_id: peer.conn_id(),
                request,
            });
            if forwarded.is_err() {
                peer.reject(id, 500, "room closed");
            }
        }
        Ok(SignalMessage::Response { id, result }) => peer.settle(id, result),
        Ok(SignalMessage::Notification { method, .. }) => {
            debug!(peer_id = %peer.id(), method = %method, "client notification");
        }
        Err(err) => warn!(peer_id = %peer.id(), error = %err, "invalid signaling message"),
    }
}
