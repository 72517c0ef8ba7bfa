//! Framing, correlation and routing shared by [`crate::Channel`] and
//! [`crate::PayloadChannel`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde_json::Value;
use sfu_signal_frame::{encode_frame, FrameConfig, FrameError, NetstringCodec};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, RequestError, Result};
use crate::listener::ListenerRegistry;
use crate::message::{
    emit_log_line, parse_log_line, ChannelMessage, Inbound, NotificationMessage, RequestMessage,
};

/// Settles a pending request exactly once.
pub(crate) type Responder = Box<dyn FnOnce(std::result::Result<Value, RequestError>) + Send>;

/// Message delivered to the channel owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A notification with no registered listener. `target_id` is whatever
    /// the worker put there (the worker pid for `running`).
    Notification {
        target_id: Option<String>,
        event: String,
        data: Value,
        payload: Option<Bytes>,
    },
    /// The channel stopped; no further events follow.
    Closed,
}

struct PendingRequest {
    method: String,
    responder: Responder,
    timer: Option<AbortHandle>,
}

struct PendingState {
    next_id: u32,
    requests: HashMap<u32, PendingRequest>,
}

impl PendingState {
    fn allocate_id(&mut self) -> u32 {
        self.next_id = if self.next_id < u32::MAX {
            self.next_id + 1
        } else {
            1
        };
        self.next_id
    }
}

/// A notification waiting for its payload frame.
struct HeldNotification {
    target_id: Option<String>,
    event: String,
    data: Value,
}

pub(crate) struct ChannelCore {
    config: ChannelConfig,
    pending: Mutex<PendingState>,
    listeners: ListenerRegistry,
    writer: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    owner: mpsc::UnboundedSender<ChannelEvent>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl ChannelCore {
    /// Build the core and spawn its read and write tasks.
    ///
    /// `carries_payload` selects payload-channel semantics: every inbound
    /// notification is followed by one raw payload frame.
    pub(crate) fn start<R, W>(
        reader: R,
        writer: W,
        config: ChannelConfig,
        owner: mpsc::UnboundedSender<ChannelEvent>,
        carries_payload: bool,
    ) -> Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let max_payload_size = config.max_payload_size;

        let core = Arc::new(Self {
            config,
            pending: Mutex::new(PendingState {
                next_id: 0,
                requests: HashMap::new(),
            }),
            listeners: ListenerRegistry::new(),
            writer: Mutex::new(Some(write_tx)),
            owner,
            shutdown,
            closed: AtomicBool::new(false),
        });

        let codec = NetstringCodec::with_config(FrameConfig { max_payload_size });
        tokio::spawn(read_loop(
            Arc::downgrade(&core),
            FramedRead::new(reader, codec),
            shutdown_rx,
            carries_payload,
        ));
        tokio::spawn(write_loop(
            Arc::downgrade(&core),
            writer,
            write_rx,
            core.config.name.clone(),
        ));

        core
    }

    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.lock_pending().requests.len()
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&self, next_id: u32) {
        self.lock_pending().next_id = next_id;
    }

    /// Register a request, write it, and arm its timeout.
    ///
    /// On a local failure the entry is removed again and the responder is
    /// dropped without being called.
    pub(crate) fn request(
        self: &Arc<Self>,
        method: &str,
        internal: Value,
        data: Value,
        payload: Option<Bytes>,
        responder: Responder,
    ) -> Result<u32> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let id = {
            let mut pending = self.lock_pending();
            let id = pending.allocate_id();
            pending.requests.insert(
                id,
                PendingRequest {
                    method: method.to_string(),
                    responder,
                    timer: None,
                },
            );
            id
        };

        let message = RequestMessage {
            id,
            method,
            internal,
            data,
        };
        let sent = serde_json::to_vec(&message)
            .map_err(ChannelError::from)
            .and_then(|json| self.send(&json, payload.as_deref()));
        if let Err(err) = sent {
            self.lock_pending().requests.remove(&id);
            return Err(err);
        }

        let timer = tokio::spawn(expire_after(
            Arc::downgrade(self),
            id,
            self.config.request_timeout,
        ))
        .abort_handle();
        match self.lock_pending().requests.get_mut(&id) {
            Some(entry) => entry.timer = Some(timer),
            // Already answered.
            None => timer.abort(),
        }

        debug!(channel = %self.config.name, id, method, "request sent");
        Ok(id)
    }

    pub(crate) fn notify(
        &self,
        event: &str,
        internal: Value,
        data: Value,
        payload: Option<Bytes>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let message = NotificationMessage {
            event,
            internal,
            data,
        };
        let json = serde_json::to_vec(&message)?;
        self.send(&json, payload.as_deref())
    }

    /// Frame `json` (and `payload`, if any) into one contiguous write.
    fn send(&self, json: &[u8], payload: Option<&[u8]>) -> Result<()> {
        let max = self.config.max_payload_size;
        for part in std::iter::once(json).chain(payload) {
            if part.len() > max {
                return Err(FrameError::PayloadTooLarge {
                    size: part.len(),
                    max,
                }
                .into());
            }
        }

        let mut buf = BytesMut::with_capacity(json.len() + payload.map_or(0, <[u8]>::len) + 24);
        encode_frame(json, &mut buf)?;
        if let Some(payload) = payload {
            encode_frame(payload, &mut buf)?;
        }

        let writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match writer.as_ref() {
            Some(tx) => tx
                .send(buf.freeze())
                .map_err(|_| ChannelError::SendFailed("writer task stopped".to_string())),
            None => Err(ChannelError::Closed),
        }
    }

    /// Stop both tasks, reject every pending request and drop all listeners.
    /// Idempotent.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(channel = %self.config.name, "closing channel");

        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let _ = self.shutdown.send(true);

        self.reject_all();
        self.listeners.clear();
        let _ = self.owner.send(ChannelEvent::Closed);
    }

    fn reject_all(&self) {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.lock_pending();
            pending.requests.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            debug!(channel = %self.config.name, method = %entry.method, "rejecting pending request");
            (entry.responder)(Err(RequestError::ChannelClosed));
        }
    }

    fn settle(&self, id: u32, outcome: std::result::Result<Value, RequestError>) {
        let Some(entry) = self.lock_pending().requests.remove(&id) else {
            error!(
                channel = %self.config.name,
                id, "received response does not match any sent request"
            );
            return;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        match &outcome {
            Ok(_) => debug!(channel = %self.config.name, id, method = %entry.method, "request succeeded"),
            Err(err) => warn!(channel = %self.config.name, id, method = %entry.method, %err, "request failed"),
        }
        (entry.responder)(outcome);
    }

    fn expire(&self, id: u32) {
        let Some(entry) = self.lock_pending().requests.remove(&id) else {
            return;
        };
        warn!(
            channel = %self.config.name,
            id,
            method = %entry.method,
            "request timed out"
        );
        (entry.responder)(Err(RequestError::Timeout(self.config.request_timeout)));
    }

    /// Handle one inbound frame. Returns a notification when the next frame
    /// is its payload.
    fn process_frame(&self, frame: Bytes, carries_payload: bool) -> Option<HeldNotification> {
        if frame.first() != Some(&b'{') {
            match parse_log_line(&frame) {
                Some((level, text)) => emit_log_line(&self.config.name, level, &text),
                None => error!(
                    channel = %self.config.name,
                    "unexpected data: {}",
                    String::from_utf8_lossy(&frame)
                ),
            }
            return None;
        }

        let message: ChannelMessage = match serde_json::from_slice(&frame) {
            Ok(message) => message,
            Err(err) => {
                error!(channel = %self.config.name, %err, "received invalid JSON message");
                return None;
            }
        };

        let held = match message.classify() {
            Some(Inbound::Accepted { id, data }) => {
                self.settle(id, Ok(data));
                return None;
            }
            Some(Inbound::Rejected { id, error, reason }) => {
                self.settle(id, Err(RequestError::Rejected { error, reason }));
                return None;
            }
            Some(Inbound::Notification {
                target_id,
                event,
                data,
            }) => HeldNotification {
                target_id: Some(target_id),
                event,
                data,
            },
            Some(Inbound::WorkerNotification { event, data }) => HeldNotification {
                target_id: None,
                event,
                data,
            },
            None => {
                error!(
                    channel = %self.config.name,
                    "received message is not a response nor a notification"
                );
                return None;
            }
        };

        if carries_payload {
            return Some(held);
        }
        self.deliver(held, None);
        None
    }

    fn deliver(&self, held: HeldNotification, payload: Option<Bytes>) {
        let listener = held
            .target_id
            .as_deref()
            .and_then(|target| self.listeners.get(target));
        match listener {
            Some(listener) => listener.on_notification(&held.event, held.data, payload),
            None => {
                let _ = self.owner.send(ChannelEvent::Notification {
                    target_id: held.target_id,
                    event: held.event,
                    data: held.data,
                    payload,
                });
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingState> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ChannelCore {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        self.reject_all();
    }
}

async fn read_loop<R>(
    core: Weak<ChannelCore>,
    mut frames: FramedRead<R, NetstringCodec>,
    mut shutdown: watch::Receiver<bool>,
    carries_payload: bool,
) where
    R: AsyncRead + Unpin,
{
    let mut held: Option<HeldNotification> = None;
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => break,
            next = frames.next() => next,
        };
        let Some(channel) = core.upgrade() else {
            break;
        };

        match next {
            Some(Ok(frame)) => match held.take() {
                Some(notification) => channel.deliver(notification, Some(frame)),
                None => held = channel.process_frame(frame, carries_payload),
            },
            Some(Err(err)) => {
                error!(channel = %channel.name(), %err, "framing error, closing channel");
                channel.close();
                break;
            }
            None => {
                debug!(channel = %channel.name(), "channel closed by peer");
                channel.close();
                break;
            }
        }
    }
}

async fn write_loop<W>(
    core: Weak<ChannelCore>,
    mut writer: W,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
    name: String,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = queue.recv().await {
        let written = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            error!(channel = %name, %err, "write failed, closing channel");
            if let Some(core) = core.upgrade() {
                core.close();
            }
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn expire_after(core: Weak<ChannelCore>, id: u32, timeout: std::time::Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(core) = core.upgrade() {
        core.expire(id);
    }
}
