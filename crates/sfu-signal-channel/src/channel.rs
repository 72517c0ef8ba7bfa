use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::config::ChannelConfig;
use crate::error::{RequestError, Result};
use crate::listener::NotificationListener;
use crate::shared::{ChannelCore, ChannelEvent};

/// Control channel to one worker.
///
/// Requests are correlated by id with their responses; notifications are
/// routed by `targetId` to registered listeners, or to the owner sink when
/// nobody is registered under that id. Frames are handled strictly in wire
/// order. Cloning yields another handle to the same channel.
///
/// Must be created and used inside a tokio runtime.
#[derive(Clone)]
pub struct Channel {
    core: Arc<ChannelCore>,
}

impl Channel {
    /// Start a channel reading from `reader` and writing to `writer`.
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
            core: ChannelCore::start(reader, writer, config, owner, false),
        }
    }

    /// Send a request and settle it through callbacks.
    ///
    /// Exactly one of `on_accept` / `on_reject` runs later, unless this call
    /// returns `Err`, in which case neither does.
    pub fn request_with<I, D, A, F>(
        &self,
        method: &str,
        internal: &I,
        data: &D,
        on_accept: A,
        on_reject: F,
    ) -> Result<u32>
    where
        I: Serialize + ?Sized,
        D: Serialize + ?Sized,
        A: FnOnce(Value) + Send + 'static,
        F: FnOnce(RequestError) + Send + 'static,
    {
        let internal = serde_json::to_value(internal)?;
        let data = serde_json::to_value(data)?;
        self.core.request(
            method,
            internal,
            data,
            None,
            Box::new(move |outcome| match outcome {
                Ok(value) => on_accept(value),
                Err(err) => on_reject(err),
            }),
        )
    }

    /// Send a request and wait for its outcome.
    pub async fn request<I, D>(
        &self,
        method: &str,
        internal: &I,
        data: &D,
    ) -> std::result::Result<Value, RequestError>
    where
        I: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let (tx, rx) = oneshot::channel();
        let internal = serde_json::to_value(internal)?;
        let data = serde_json::to_value(data)?;
        self.core.request(
            method,
            internal,
            data,
            None,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        )?;
        rx.await.unwrap_or(Err(RequestError::ChannelClosed))
    }

    /// Send a notification. No response is expected.
    pub fn notify<I, D>(&self, event: &str, internal: &I, data: &D) -> Result<()>
    where
        I: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        self.core.notify(
            event,
            serde_json::to_value(internal)?,
            serde_json::to_value(data)?,
            None,
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

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.core.pending_count()
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Stop the channel: pending requests are rejected with
    /// [`RequestError::ChannelClosed`] and listeners are dropped.
    pub fn close(&self) {
        self.core.close();
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&self, next_id: u32) {
        self.core.set_next_id(next_id);
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.core.name())
            .field("closed", &self.core.is_closed())
            .finish()
    }
}
