use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sfu_signal_channel::{Channel, PayloadChannel};
use sfu_signal_rtp::{can_consume, RtpCapabilities};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ListenIp, WebRtcTransportConfig};
use crate::error::{Result, ServerError};
use crate::internal::{lock, parse_response, Internal};
use crate::notification::{MediaEvent, NotificationTarget, TargetListener};
use crate::producer::Producer;
use crate::transport::{TransportData, WebRtcTransport};

/// SCTP stream counts negotiated for a data-channel capable transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumSctpStreams {
    #[serde(rename = "OS")]
    pub os: u16,
    #[serde(rename = "MIS")]
    pub mis: u16,
}

impl Default for NumSctpStreams {
    fn default() -> Self {
        Self {
            os: 1024,
            mis: 1024,
        }
    }
}

/// Data of a `router.createWebRtcTransport` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcTransportOptions {
    pub listen_ips: Vec<ListenIp>,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
    pub prefer_tcp: bool,
    pub initial_available_outgoing_bitrate: u32,
    pub enable_sctp: bool,
    pub num_sctp_streams: NumSctpStreams,
    pub max_sctp_message_size: u32,
    pub sctp_send_buffer_size: u32,
    pub is_data_channel: bool,
    #[serde(skip)]
    pub producing: bool,
    #[serde(skip)]
    pub consuming: bool,
}

impl WebRtcTransportOptions {
    pub fn new(listen_ips: Vec<ListenIp>) -> Self {
        Self {
            listen_ips,
            enable_udp: true,
            enable_tcp: false,
            prefer_udp: false,
            prefer_tcp: false,
            initial_available_outgoing_bitrate: 600_000,
            enable_sctp: false,
            num_sctp_streams: NumSctpStreams::default(),
            max_sctp_message_size: 262_144,
            sctp_send_buffer_size: 262_144,
            is_data_channel: true,
            producing: false,
            consuming: false,
        }
    }

    /// Options for a client transport: configured values over the defaults.
    pub fn from_config(config: &WebRtcTransportConfig) -> Self {
        let mut options = Self::new(config.listen_ips.clone());
        if let Some(bitrate) = config.initial_available_outgoing_bitrate {
            options.initial_available_outgoing_bitrate = bitrate;
        }
        if let Some(size) = config.max_sctp_message_size {
            options.max_sctp_message_size = size;
        }
        options
    }

    /// TCP only when forced, UDP only otherwise.
    pub fn force_tcp(mut self, force: bool) -> Self {
        self.enable_udp = !force;
        self.enable_tcp = force;
        self
    }

    pub fn with_sctp(mut self, streams: NumSctpStreams) -> Self {
        self.enable_sctp = true;
        self.num_sctp_streams = streams;
        self
    }

    pub fn with_direction(mut self, producing: bool, consuming: bool) -> Self {
        self.producing = producing;
        self.consuming = consuming;
        self
    }
}

/// A worker-side router: the media scope of one room.
///
/// Cloning yields another handle to the same router.
#[derive(Debug, Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

#[derive(Debug)]
struct RouterInner {
    id: String,
    internal: Internal,
    channel: Channel,
    payload_channel: PayloadChannel,
    rtp_capabilities: RtpCapabilities,
    events: mpsc::UnboundedSender<MediaEvent>,
    producers: Mutex<HashMap<String, Producer>>,
    transports: Mutex<HashMap<String, WebRtcTransport>>,
    closed: AtomicBool,
}

impl Router {
    pub(crate) fn new(
        id: String,
        channel: Channel,
        payload_channel: PayloadChannel,
        rtp_capabilities: RtpCapabilities,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Self {
        let internal = Internal::router(&id);
        Self {
            inner: Arc::new(RouterInner {
                id,
                internal,
                channel,
                payload_channel,
                rtp_capabilities,
                events,
                producers: Mutex::new(HashMap::new()),
                transports: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn rtp_capabilities(&self) -> &RtpCapabilities {
        &self.inner.rtp_capabilities
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    pub(crate) fn payload_channel(&self) -> &PayloadChannel {
        &self.inner.payload_channel
    }

    /// Deliver worker notifications for `target` to this router's room.
    /// Data producers are addressed over the payload channel.
    pub(crate) fn listen(&self, target: NotificationTarget) {
        let id = target.id().to_string();
        let on_payload = matches!(target, NotificationTarget::DataProducer(_));
        let listener = Arc::new(TargetListener::new(target, self.inner.events.clone()));
        if on_payload {
            self.inner.payload_channel.add_listener(id, listener);
        } else {
            self.inner.channel.add_listener(id, listener);
        }
    }

    pub(crate) fn unlisten(&self, target: &NotificationTarget) {
        match target {
            NotificationTarget::DataProducer(id) => self.inner.payload_channel.remove_listener(id),
            _ => self.inner.channel.remove_listener(target.id()),
        }
    }

    pub(crate) fn add_producer(&self, producer: Producer) {
        lock(&self.inner.producers).insert(producer.id().to_string(), producer);
    }

    pub(crate) fn remove_producer(&self, producer_id: &str) {
        lock(&self.inner.producers).remove(producer_id);
    }

    /// Producer in this router, from any of its transports.
    pub fn producer(&self, producer_id: &str) -> Option<Producer> {
        lock(&self.inner.producers).get(producer_id).cloned()
    }

    pub fn transport(&self, transport_id: &str) -> Option<WebRtcTransport> {
        lock(&self.inner.transports).get(transport_id).cloned()
    }

    pub(crate) fn remove_transport(&self, transport_id: &str) {
        lock(&self.inner.transports).remove(transport_id);
    }

    /// Whether an endpoint with `rtp_capabilities` can receive the producer.
    pub fn can_consume(&self, producer_id: &str, rtp_capabilities: &RtpCapabilities) -> bool {
        match self.producer(producer_id) {
            Some(producer) => can_consume(producer.consumable_rtp_parameters(), rtp_capabilities),
            None => {
                debug!(producer_id, "can_consume: producer not found");
                false
            }
        }
    }

    pub async fn create_webrtc_transport(
        &self,
        options: WebRtcTransportOptions,
    ) -> Result<WebRtcTransport> {
        if self.closed() {
            return Err(ServerError::InvalidRequest("router closed".into()));
        }
        let transport_id = Uuid::new_v4().to_string();
        let internal = self.inner.internal.with_transport(&transport_id);
        let target = NotificationTarget::Transport(transport_id.clone());
        self.listen(target.clone());
        let created: Result<TransportData> = async {
            let response = self
                .inner
                .channel
                .request("router.createWebRtcTransport", &internal, &options)
                .await?;
            parse_response(response)
        }
        .await;
        let data = created.inspect_err(|_| self.unlisten(&target))?;
        info!(router_id = %self.inner.id, transport_id = %transport_id, "transport created");

        let transport = WebRtcTransport::new(
            transport_id.clone(),
            internal,
            data,
            self.clone(),
            options.producing,
            options.consuming,
        );
        lock(&self.inner.transports).insert(transport_id, transport.clone());
        Ok(transport)
    }

    /// Close the router on the worker along with everything in it.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let transports: Vec<WebRtcTransport> =
            lock(&self.inner.transports).drain().map(|(_, t)| t).collect();
        for transport in transports {
            transport.router_closed();
        }
        lock(&self.inner.producers).clear();
        self.inner.channel.remove_listener(&self.inner.id);

        let id = self.inner.id.clone();
        let sent = self.inner.channel.request_with(
            "router.close",
            &self.inner.internal,
            &(),
            |_| {},
            move |err| debug!(router_id = %id, error = %err, "router.close failed"),
        );
        if let Err(err) = sent {
            debug!(router_id = %self.inner.id, error = %err, "router.close not sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transport_options_serialize_with_defaults() {
        let options = WebRtcTransportOptions::new(vec![ListenIp {
            ip: "0.0.0.0".into(),
            announced_ip: Some("203.0.113.7".into()),
        }])
        .with_direction(true, false);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({
                "listenIps": [{"ip": "0.0.0.0", "announcedIp": "203.0.113.7"}],
                "enableUdp": true,
                "enableTcp": false,
                "preferUdp": false,
                "preferTcp": false,
                "initialAvailableOutgoingBitrate": 600000,
                "enableSctp": false,
                "numSctpStreams": {"OS": 1024, "MIS": 1024},
                "maxSctpMessageSize": 262144,
                "sctpSendBufferSize": 262144,
                "isDataChannel": true
            })
        );
    }

    #[test]
    fn configured_values_and_tcp_override() {
        let config = WebRtcTransportConfig {
            listen_ips: vec![],
            initial_available_outgoing_bitrate: Some(1_000_000),
            minimum_available_outgoing_bitrate: Some(600_000),
            max_sctp_message_size: None,
            max_incoming_bitrate: Some(1_500_000),
        };
        let options = WebRtcTransportOptions::from_config(&config)
            .force_tcp(true)
            .with_sctp(NumSctpStreams { os: 16, mis: 8 });
        assert_eq!(options.initial_available_outgoing_bitrate, 1_000_000);
        assert_eq!(options.max_sctp_message_size, 262_144);
        assert!(options.enable_tcp && !options.enable_udp);
        assert!(options.enable_sctp);
        assert_eq!(options.num_sctp_streams.mis, 8);
    }
}
