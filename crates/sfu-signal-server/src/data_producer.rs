use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sfu_signal_channel::{Channel, PayloadChannel};
use tracing::debug;

use crate::error::Result;
use crate::internal::Internal;

/// SCTP stream a data producer sends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpStreamParameters {
    pub stream_id: u16,
    #[serde(default = "default_ordered")]
    pub ordered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packet_life_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retransmits: Option<u32>,
}

fn default_ordered() -> bool {
    true
}

/// SCTP message PPIDs (RFC 8831).
pub const PPID_STRING: u32 = 51;
pub const PPID_BINARY: u32 = 53;

#[derive(Debug, Clone)]
pub struct DataProducer {
    inner: Arc<DataProducerInner>,
}

#[derive(Debug)]
struct DataProducerInner {
    id: String,
    internal: Internal,
    sctp_stream_parameters: SctpStreamParameters,
    label: String,
    protocol: String,
    channel: Channel,
    payload_channel: PayloadChannel,
    closed: AtomicBool,
}

impl DataProducer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        internal: Internal,
        sctp_stream_parameters: SctpStreamParameters,
        label: String,
        protocol: String,
        channel: Channel,
        payload_channel: PayloadChannel,
    ) -> Self {
        Self {
            inner: Arc::new(DataProducerInner {
                id,
                internal,
                sctp_stream_parameters,
                label,
                protocol,
                channel,
                payload_channel,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn sctp_stream_parameters(&self) -> &SctpStreamParameters {
        &self.inner.sctp_stream_parameters
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn protocol(&self) -> &str {
        &self.inner.protocol
    }

    /// Inject a message as if it came from the endpoint.
    pub fn send(&self, message: Bytes, ppid: u32) -> Result<()> {
        self.inner.payload_channel.notify(
            "dataProducer.send",
            &self.inner.internal,
            &json!({ "ppid": ppid }),
            message,
        )?;
        Ok(())
    }

    pub fn send_text(&self, message: &str) -> Result<()> {
        self.send(Bytes::copy_from_slice(message.as_bytes()), PPID_STRING)
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.payload_channel.remove_listener(&self.inner.id);
        let id = self.inner.id.clone();
        let sent = self.inner.channel.request_with(
            "dataProducer.close",
            &self.inner.internal,
            &(),
            |_| {},
            move |err| debug!(data_producer_id = %id, error = %err, "dataProducer.close failed"),
        );
        if let Err(err) = sent {
            debug!(data_producer_id = %self.inner.id, error = %err, "dataProducer.close not sent");
        }
    }

    pub(crate) fn transport_closed(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.payload_channel.remove_listener(&self.inner.id);
    }
}
