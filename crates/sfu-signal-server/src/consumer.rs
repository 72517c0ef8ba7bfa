use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sfu_signal_channel::Channel;
use sfu_signal_rtp::{MediaKind, RtpParameters};
use tracing::debug;

use crate::error::Result;
use crate::internal::Internal;

/// Spatial/temporal layers a consumer should forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerLayers {
    pub spatial_layer: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_layer: Option<u8>,
}

/// One producer forwarded to one receiving endpoint.
#[derive(Debug, Clone)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

#[derive(Debug)]
struct ConsumerInner {
    id: String,
    producer_id: String,
    internal: Internal,
    kind: MediaKind,
    consumer_type: String,
    rtp_parameters: RtpParameters,
    channel: Channel,
    paused: AtomicBool,
    producer_paused: AtomicBool,
    closed: AtomicBool,
}

impl Consumer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        producer_id: String,
        internal: Internal,
        kind: MediaKind,
        consumer_type: String,
        rtp_parameters: RtpParameters,
        channel: Channel,
        paused: bool,
        producer_paused: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ConsumerInner {
                id,
                producer_id,
                internal,
                kind,
                consumer_type,
                rtp_parameters,
                channel,
                paused: AtomicBool::new(paused),
                producer_paused: AtomicBool::new(producer_paused),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn producer_id(&self) -> &str {
        &self.inner.producer_id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    pub fn consumer_type(&self) -> &str {
        &self.inner.consumer_type
    }

    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.inner.rtp_parameters
    }

    pub fn paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn producer_paused(&self) -> bool {
        self.inner.producer_paused.load(Ordering::SeqCst)
    }

    pub(crate) fn set_producer_paused(&self, paused: bool) {
        self.inner.producer_paused.store(paused, Ordering::SeqCst);
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub async fn get_stats(&self) -> Result<Value> {
        Ok(self
            .inner
            .channel
            .request("consumer.getStats", &self.inner.internal, &())
            .await?)
    }

    pub async fn pause(&self) -> Result<()> {
        self.inner
            .channel
            .request("consumer.pause", &self.inner.internal, &())
            .await?;
        self.inner.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.inner
            .channel
            .request("consumer.resume", &self.inner.internal, &())
            .await?;
        self.inner.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub async fn request_key_frame(&self) -> Result<()> {
        self.inner
            .channel
            .request("consumer.requestKeyFrame", &self.inner.internal, &())
            .await?;
        Ok(())
    }

    /// Returns the worker's answer, which holds the layers now in effect.
    pub async fn set_preferred_layers(&self, layers: ConsumerLayers) -> Result<Value> {
        Ok(self
            .inner
            .channel
            .request("consumer.setPreferredLayers", &self.inner.internal, &layers)
            .await?)
    }

    /// Close on the worker. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.channel.remove_listener(&self.inner.id);
        let id = self.inner.id.clone();
        let sent = self.inner.channel.request_with(
            "consumer.close",
            &self.inner.internal,
            &(),
            |_| {},
            move |err| debug!(consumer_id = %id, error = %err, "consumer.close failed"),
        );
        if let Err(err) = sent {
            debug!(consumer_id = %self.inner.id, error = %err, "consumer.close not sent");
        }
    }

    /// Local teardown after the worker closed the consumer on its own
    /// (producer or transport went away).
    pub(crate) fn closed_by_worker(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.channel.remove_listener(&self.inner.id);
    }
}
