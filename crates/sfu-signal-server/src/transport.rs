use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sfu_signal_rtp::{
    get_consumable_rtp_parameters, get_consumer_rtp_parameters,
    get_producer_rtp_parameters_mapping, MediaKind, RtpCapabilities, RtpEncodingParameters,
    RtpMapping, RtpParameters,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::consumer::Consumer;
use crate::data_producer::{DataProducer, SctpStreamParameters};
use crate::error::{Result, ServerError};
use crate::internal::{lock, parse_response, Internal};
use crate::notification::NotificationTarget;
use crate::producer::Producer;
use crate::router::Router;

/// MIDs handed to consumers wrap back to 0 here.
const MID_LIMIT: u32 = 100_000_000;

const DEFAULT_KEY_FRAME_REQUEST_DELAY: u32 = 5000;

/// ICE, DTLS and SCTP parameters the worker chose for a new transport.
/// Passed through to the client untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportData {
    #[serde(default)]
    pub ice_parameters: Value,
    #[serde(default)]
    pub ice_candidates: Value,
    #[serde(default)]
    pub dtls_parameters: Value,
    #[serde(default)]
    pub sctp_parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ProduceOptions {
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub paused: bool,
    pub key_frame_request_delay: u32,
}

impl ProduceOptions {
    pub fn new(kind: MediaKind, rtp_parameters: RtpParameters) -> Self {
        Self {
            kind,
            rtp_parameters,
            paused: false,
            key_frame_request_delay: DEFAULT_KEY_FRAME_REQUEST_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    pub producer_id: String,
    pub rtp_capabilities: RtpCapabilities,
    pub paused: bool,
    /// Router-to-router consumer: parameters are copied verbatim.
    pub pipe: bool,
}

impl ConsumeOptions {
    pub fn new(producer_id: impl Into<String>, rtp_capabilities: RtpCapabilities) -> Self {
        Self {
            producer_id: producer_id.into(),
            rtp_capabilities,
            paused: false,
            pipe: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProduceDataOptions {
    pub sctp_stream_parameters: SctpStreamParameters,
    pub label: String,
    pub protocol: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProduceRequest<'a> {
    kind: MediaKind,
    rtp_parameters: &'a RtpParameters,
    rtp_mapping: &'a RtpMapping,
    key_frame_request_delay: u32,
    paused: bool,
}

#[derive(Deserialize)]
struct ProduceResponse {
    #[serde(rename = "type")]
    producer_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsumeRequest<'a> {
    kind: MediaKind,
    rtp_parameters: &'a RtpParameters,
    #[serde(rename = "type")]
    consumer_type: &'a str,
    consumable_rtp_encodings: &'a [RtpEncodingParameters],
    paused: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumeResponse {
    #[serde(default)]
    paused: bool,
    #[serde(default)]
    producer_paused: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectResponse {
    dtls_local_role: String,
}

/// ICE/DTLS transport between one client and a router.
#[derive(Debug, Clone)]
pub struct WebRtcTransport {
    inner: Arc<TransportInner>,
}

#[derive(Debug)]
struct TransportInner {
    id: String,
    internal: Internal,
    data: TransportData,
    router: Router,
    producing: bool,
    consuming: bool,
    next_mid: Mutex<u32>,
    producers: Mutex<HashMap<String, Producer>>,
    consumers: Mutex<HashMap<String, Consumer>>,
    data_producers: Mutex<HashMap<String, DataProducer>>,
    closed: AtomicBool,
}

impl WebRtcTransport {
    pub(crate) fn new(
        id: String,
        internal: Internal,
        data: TransportData,
        router: Router,
        producing: bool,
        consuming: bool,
    ) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                id,
                internal,
                data,
                router,
                producing,
                consuming,
                next_mid: Mutex::new(0),
                producers: Mutex::new(HashMap::new()),
                consumers: Mutex::new(HashMap::new()),
                data_producers: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn data(&self) -> &TransportData {
        &self.inner.data
    }

    /// Whether the client intends to send media on this transport.
    pub fn producing(&self) -> bool {
        self.inner.producing
    }

    /// Whether the client intends to receive media on this transport.
    pub fn consuming(&self) -> bool {
        self.inner.consuming
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn producer(&self, producer_id: &str) -> Option<Producer> {
        lock(&self.inner.producers).get(producer_id).cloned()
    }

    pub fn consumer(&self, consumer_id: &str) -> Option<Consumer> {
        lock(&self.inner.consumers).get(consumer_id).cloned()
    }

    pub fn data_producer(&self, data_producer_id: &str) -> Option<DataProducer> {
        lock(&self.inner.data_producers).get(data_producer_id).cloned()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed() {
            return Err(ServerError::InvalidRequest(format!(
                "transport {} closed",
                self.inner.id
            )));
        }
        Ok(())
    }

    fn next_mid(&self) -> u32 {
        let mut next = lock(&self.inner.next_mid);
        let mid = *next;
        *next = (mid + 1) % MID_LIMIT;
        mid
    }

    /// Returns the DTLS role the worker took.
    pub async fn connect(&self, dtls_parameters: Value) -> Result<String> {
        self.ensure_open()?;
        let response = self
            .inner
            .router
            .channel()
            .request(
                "transport.connect",
                &self.inner.internal,
                &json!({ "dtlsParameters": dtls_parameters }),
            )
            .await?;
        let ConnectResponse { dtls_local_role } = parse_response(response)?;
        debug!(transport_id = %self.inner.id, %dtls_local_role, "transport connected");
        Ok(dtls_local_role)
    }

    pub async fn set_max_incoming_bitrate(&self, bitrate: u32) -> Result<()> {
        self.ensure_open()?;
        self.inner
            .router
            .channel()
            .request(
                "transport.setMaxIncomingBitrate",
                &self.inner.internal,
                &json!({ "bitrate": bitrate }),
            )
            .await?;
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<Value> {
        Ok(self
            .inner
            .router
            .channel()
            .request("transport.getStats", &self.inner.internal, &())
            .await?)
    }

    pub async fn produce(&self, options: ProduceOptions) -> Result<Producer> {
        self.ensure_open()?;
        let ProduceOptions {
            kind,
            rtp_parameters,
            paused,
            key_frame_request_delay,
        } = options;
        let caps = self.inner.router.rtp_capabilities();
        let rtp_mapping = get_producer_rtp_parameters_mapping(&rtp_parameters, caps)?;
        let consumable =
            get_consumable_rtp_parameters(kind, &rtp_parameters, caps, &rtp_mapping)?;

        let producer_id = Uuid::new_v4().to_string();
        let internal = self.inner.internal.with_producer(&producer_id);
        let target = NotificationTarget::Producer(producer_id.clone());
        self.inner.router.listen(target.clone());
        let created: Result<ProduceResponse> = async {
            let response = self
                .inner
                .router
                .channel()
                .request(
                    "transport.produce",
                    &internal,
                    &ProduceRequest {
                        kind,
                        rtp_parameters: &rtp_parameters,
                        rtp_mapping: &rtp_mapping,
                        key_frame_request_delay,
                        paused,
                    },
                )
                .await?;
            parse_response(response)
        }
        .await;
        let ProduceResponse { producer_type } =
            created.inspect_err(|_| self.inner.router.unlisten(&target))?;

        let producer = Producer::new(
            producer_id.clone(),
            internal,
            kind,
            producer_type,
            rtp_parameters,
            consumable,
            self.inner.router.channel().clone(),
            paused,
        );
        lock(&self.inner.producers).insert(producer_id.clone(), producer.clone());
        self.inner.router.add_producer(producer.clone());
        info!(
            transport_id = %self.inner.id,
            producer_id = %producer_id,
            %kind,
            producer_type = %producer.producer_type(),
            "producer created"
        );
        Ok(producer)
    }

    pub async fn consume(&self, options: ConsumeOptions) -> Result<Consumer> {
        self.ensure_open()?;
        let ConsumeOptions {
            producer_id,
            rtp_capabilities,
            paused,
            pipe,
        } = options;
        let producer = self
            .inner
            .router
            .producer(&producer_id)
            .ok_or_else(|| ServerError::not_found("producer", &producer_id))?;

        let mut rtp_parameters =
            get_consumer_rtp_parameters(producer.consumable_rtp_parameters(), &rtp_capabilities, pipe)
                .ok_or_else(|| ServerError::CannotConsume(producer_id.clone()))?;
        if !pipe {
            rtp_parameters.mid = Some(self.next_mid().to_string());
        }
        let consumer_type = if pipe { "pipe" } else { producer.producer_type() };

        let consumer_id = Uuid::new_v4().to_string();
        let internal = self
            .inner
            .internal
            .with_consumer(&consumer_id)
            .with_producer(&producer_id);
        let target = NotificationTarget::Consumer(consumer_id.clone());
        self.inner.router.listen(target.clone());
        let created: Result<ConsumeResponse> = async {
            let response = self
                .inner
                .router
                .channel()
                .request(
                    "transport.consume",
                    &internal,
                    &ConsumeRequest {
                        kind: producer.kind(),
                        rtp_parameters: &rtp_parameters,
                        consumer_type,
                        consumable_rtp_encodings: &producer.consumable_rtp_parameters().encodings,
                        paused,
                    },
                )
                .await?;
            parse_response(response)
        }
        .await;
        let ConsumeResponse {
            paused,
            producer_paused,
        } = created.inspect_err(|_| self.inner.router.unlisten(&target))?;

        let consumer = Consumer::new(
            consumer_id.clone(),
            producer_id,
            internal,
            producer.kind(),
            consumer_type.to_string(),
            rtp_parameters,
            self.inner.router.channel().clone(),
            paused,
            producer_paused,
        );
        lock(&self.inner.consumers).insert(consumer_id.clone(), consumer.clone());
        debug!(transport_id = %self.inner.id, consumer_id = %consumer_id, "consumer created");
        Ok(consumer)
    }

    pub async fn produce_data(&self, options: ProduceDataOptions) -> Result<DataProducer> {
        self.ensure_open()?;
        if self.inner.data.sctp_parameters.is_null() {
            return Err(ServerError::InvalidRequest(
                "SCTP not enabled on this transport".into(),
            ));
        }
        let data_producer_id = Uuid::new_v4().to_string();
        let internal = self.inner.internal.with_data_producer(&data_producer_id);
        let target = NotificationTarget::DataProducer(data_producer_id.clone());
        self.inner.router.listen(target.clone());
        let created = self
            .inner
            .router
            .channel()
            .request(
                "transport.produceData",
                &internal,
                &json!({
                    "type": "sctp",
                    "sctpStreamParameters": &options.sctp_stream_parameters,
                    "label": &options.label,
                    "protocol": &options.protocol,
                }),
            )
            .await;
        if let Err(err) = created {
            self.inner.router.unlisten(&target);
            return Err(err.into());
        }

        let data_producer = DataProducer::new(
            data_producer_id.clone(),
            internal,
            options.sctp_stream_parameters,
            options.label,
            options.protocol,
            self.inner.router.channel().clone(),
            self.inner.router.payload_channel().clone(),
        );
        lock(&self.inner.data_producers).insert(data_producer_id, data_producer.clone());
        Ok(data_producer)
    }

    /// Close one of this transport's producers.
    pub fn close_producer(&self, producer_id: &str) -> Option<Producer> {
        let producer = lock(&self.inner.producers).remove(producer_id)?;
        self.inner.router.remove_producer(producer_id);
        producer.close();
        Some(producer)
    }

    /// Forget a consumer the worker already closed.
    pub(crate) fn forget_consumer(&self, consumer_id: &str) -> Option<Consumer> {
        let consumer = lock(&self.inner.consumers).remove(consumer_id)?;
        consumer.closed_by_worker();
        Some(consumer)
    }

    /// Drop children and listeners without telling the worker.
    fn teardown(&self) {
        self.inner
            .router
            .unlisten(&NotificationTarget::Transport(self.inner.id.clone()));
        for (id, producer) in lock(&self.inner.producers).drain() {
            self.inner.router.remove_producer(&id);
            producer.transport_closed();
        }
        for (_, consumer) in lock(&self.inner.consumers).drain() {
            consumer.closed_by_worker();
        }
        for (_, data_producer) in lock(&self.inner.data_producers).drain() {
            data_producer.transport_closed();
        }
    }

    /// Close on the worker. Producers, consumers and data producers on
    /// this transport go with it.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.teardown();
        self.inner.router.remove_transport(&self.inner.id);

        let id = self.inner.id.clone();
        let sent = self.inner.router.channel().request_with(
            "transport.close",
            &self.inner.internal,
            &(),
            |_| {},
            move |err| debug!(transport_id = %id, error = %err, "transport.close failed"),
        );
        if let Err(err) = sent {
            debug!(transport_id = %self.inner.id, error = %err, "transport.close not sent");
        }
    }

    pub(crate) fn router_closed(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.teardown();
        }
    }
}
