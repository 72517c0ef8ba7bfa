use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, RequestError, Result};
use crate::listener::NotificationListener;
use crate::shared::{ChannelCore, ChannelEvent};

/// Payload channel to one worker.
///
/// Same correlation and routing as [`crate::Channel`], but every outbound
/// request or notification is a JSON frame followed by a raw payload frame,
/// and every inbound notification is followed by its payload frame.
/// Responses are single frames.
#[derive(Clone)]
pub struct PayloadChannel {
    core: Arc<ChannelCore>,
}

impl PayloadChannel {
    pub fn new<R, W>(
        reader: R,
        writer: W,
        config: ChannelConfig,
        owner: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            core: ChannelCore::start(reader, writer, config, owner, true),
        }
    }

    pub fn request_with<I, D, A, F>(
        &self,
        method: &str,
        internal: &I,
        data: &D,
        payload: Bytes,
        on_accept: A,
        on_reject: F,
    ) -> Result<u32>
    where
        I: Serialize + ?Sized,
        D: Serialize + ?Sized,
        A: FnOnce(Value) + Send + 'static,
        F: FnOnce(RequestError) + Send + 'static,
    {
        let payload = non_empty(payload)?;
        self.core.request(
            method,
            serde_json::to_value(internal)?,
            serde_json::to_value(data)?,
            Some(payload),
            Box::new(move |outcome| match outcome {
                Ok(value) => on_accept(value),
                Err(err) => on_reject(err),
            }),
        )
    }

    pub async fn request<I, D>(
        &self,
        method: &str,
        internal: &I,
        data: &D,
        payload: Bytes,
    ) -> std::result::Result<Value, RequestError>
    where
        I: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let payload = non_empty(payload)?;
        let (tx, rx) = oneshot::channel();
        self.core.request(
            method,
            serde_json::to_value(internal)?,
            serde_json::to_value(data)?,
            Some(payload),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        )?;
        rx.await.unwrap_or(Err(RequestError::ChannelClosed))
    }

    /// Send a notification followed by its payload, e.g. a data channel
    /// message for `dataProducer.send`.
    pub fn notify<I, D>(&self, event: &str, internal: &I, data: &D, payload: Bytes) -> Result<()>
    where
        I: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let payload = non_empty(payload)?;
        self.core.notify(
            event,
            serde_json::to_value(internal)?,
            serde_json::to_value(data)?,
            Some(payload),
        )
    }

    pub fn add_listener(&self, id: impl Into<String>, listener: Arc<dyn NotificationListener>) {
        self.core.listeners().add(id, listener);
    }

    pub fn remove_listener(&self, id: &str) {
        self.core.listeners().remove(id);
    }

    pub fn has_listener(&self, id: &str) -> bool {
        self.core.listeners().contains(id)
    }

    pub fn pending_requests(&self) -> usize {
        self.core.pending_count()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn close(&self) {
        self.core.close();
    }
}

impl std::fmt::Debug for PayloadChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadChannel")
            .field("name", &self.core.name())
            .field("closed", &self.core.is_closed())
            .finish()
    }
}

// Netstrings cannot carry an empty payload; catch it before anything is
// queued so the JSON frame is never sent alone.
fn non_empty(payload: Bytes) -> Result<Bytes> {
    if payload.is_empty() {
        return Err(ChannelError::Frame(
            sfu_signal_frame::FrameError::EmptyPayload,
        ));
    }
    Ok(payload)
}
