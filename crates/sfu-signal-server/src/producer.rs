use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sfu_signal_channel::Channel;
use sfu_signal_rtp::{MediaKind, RtpParameters};
use tracing::debug;

use crate::error::Result;
use crate::internal::Internal;

/// Media source sent into a router by a transport.
#[derive(Debug, Clone)]
pub struct Producer {
    inner: Arc<ProducerInner>,
}

#[derive(Debug)]
struct ProducerInner {
    id: String,
    internal: Internal,
    kind: MediaKind,
    producer_type: String,
    rtp_parameters: RtpParameters,
    consumable_rtp_parameters: RtpParameters,
    channel: Channel,
    paused: AtomicBool,
    closed: AtomicBool,
}

impl Producer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        internal: Internal,
        kind: MediaKind,
        producer_type: String,
        rtp_parameters: RtpParameters,
        consumable_rtp_parameters: RtpParameters,
        channel: Channel,
        paused: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ProducerInner {
                id,
                internal,
                kind,
                producer_type,
                rtp_parameters,
                consumable_rtp_parameters,
                channel,
                paused: AtomicBool::new(paused),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    /// `simple`, `simulcast` or `svc`, as reported by the worker.
    pub fn producer_type(&self) -> &str {
        &self.inner.producer_type
    }

    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.inner.rtp_parameters
    }

    /// Router-canonical parameters every consumer is derived from.
    pub fn consumable_rtp_parameters(&self) -> &RtpParameters {
        &self.inner.consumable_rtp_parameters
    }

    pub fn paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub async fn get_stats(&self) -> Result<Value> {
        Ok(self
            .inner
            .channel
            .request("producer.getStats", &self.inner.internal, &())
            .await?)
    }

    pub async fn pause(&self) -> Result<()> {
        self.inner
            .channel
            .request("producer.pause", &self.inner.internal, &())
            .await?;
        self.inner.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.inner
            .channel
            .request("producer.resume", &self.inner.internal, &())
            .await?;
        self.inner.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Close on the worker. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport_closed();
        let id = self.inner.id.clone();
        let sent = self.inner.channel.request_with(
            "producer.close",
            &self.inner.internal,
            &(),
            |_| {},
            move |err| debug!(producer_id = %id, error = %err, "producer.close failed"),
        );
        if let Err(err) = sent {
            debug!(producer_id = %self.inner.id, error = %err, "producer.close not sent");
        }
    }

    /// Local teardown when the worker already closed the producer.
    pub(crate) fn transport_closed(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.channel.remove_listener(&self.inner.id);
    }
}
