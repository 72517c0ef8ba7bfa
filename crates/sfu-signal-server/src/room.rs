//! A room: one router plus the peers signaling into it.
//!
//! Each room runs as a single task that owns all peer state. Connections
//! feed it [`RoomEvent`]s; the router feeds it [`MediaEvent`]s. Requests are
//! handled one at a time, in arrival order.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use sfu_signal_rtp::{MediaKind, RtpCapabilities, RtpParameters};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WebRtcTransportConfig;
use crate::consumer::{Consumer, ConsumerLayers};
use crate::data_producer::{DataProducer, SctpStreamParameters};
use crate::error::{Result, ServerError};
use crate::notification::MediaEvent;
use crate::producer::Producer;
use crate::router::{NumSctpStreams, Router, WebRtcTransportOptions};
use crate::server::ServerEvent;
use crate::signaling::{SignalRequest, SignalingPeer};
use crate::transport::{ConsumeOptions, ProduceDataOptions, ProduceOptions, WebRtcTransport};

/// Input to a room task from the signaling side.
#[derive(Debug)]
pub enum RoomEvent {
    /// A new connection. Replaces any earlier connection of the same peer.
    PeerConnected { peer: SignalingPeer },
    Request {
        peer_id: String,
        conn_id: u64,
        request: SignalRequest,
    },
    PeerClosed { peer_id: String, conn_id: u64 },
}

/// Sending side of a room task.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: String,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sender for connection tasks.
    pub fn events(&self) -> mpsc::UnboundedSender<RoomEvent> {
        self.events.clone()
    }

    /// Hand a new connection to the room. Fails if the room already shut
    /// down.
    pub fn connect(&self, peer: SignalingPeer) -> bool {
        self.events.send(RoomEvent::PeerConnected { peer }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

struct PeerState {
    peer: SignalingPeer,
    joined: bool,
    display_name: String,
    device: Value,
    rtp_capabilities: Option<RtpCapabilities>,
    transports: HashMap<String, WebRtcTransport>,
    producers: HashMap<String, Producer>,
    consumers: HashMap<String, Consumer>,
    data_producers: HashMap<String, DataProducer>,
}

impl PeerState {
    fn new(peer: SignalingPeer) -> Self {
        Self {
            peer,
            joined: false,
            display_name: String::new(),
            device: Value::Null,
            rtp_capabilities: None,
            transports: HashMap::new(),
            producers: HashMap::new(),
            consumers: HashMap::new(),
            data_producers: HashMap::new(),
        }
    }

    fn info(&self) -> Value {
        json!({
            "id": self.peer.id(),
            "displayName": self.display_name,
            "device": self.device,
        })
    }

    fn transport(&self, transport_id: &str) -> Result<&WebRtcTransport> {
        self.transports
            .get(transport_id)
            .ok_or_else(|| ServerError::not_found("transport", transport_id))
    }

    fn producer(&self, producer_id: &str) -> Result<&Producer> {
        self.producers
            .get(producer_id)
            .ok_or_else(|| ServerError::not_found("producer", producer_id))
    }

    fn consumer(&self, consumer_id: &str) -> Result<&Consumer> {
        self.consumers
            .get(consumer_id)
            .ok_or_else(|| ServerError::not_found("consumer", consumer_id))
    }

    fn require_joined(&self) -> Result<()> {
        if !self.joined {
            return Err(ServerError::InvalidRequest("peer not yet joined".into()));
        }
        Ok(())
    }
}

/// Work to do after a request has been answered.
enum FollowUp {
    Joined,
    Produced(Producer),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    device: Value,
    #[serde(default)]
    rtp_capabilities: Option<RtpCapabilities>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SctpCapabilities {
    num_streams: NumSctpStreams,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransportRequest {
    #[serde(default)]
    force_tcp: bool,
    #[serde(default)]
    producing: bool,
    #[serde(default)]
    consuming: bool,
    #[serde(default)]
    sctp_capabilities: Option<SctpCapabilities>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectTransportRequest {
    transport_id: String,
    dtls_parameters: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProduceRequest {
    transport_id: String,
    kind: MediaKind,
    rtp_parameters: RtpParameters,
    #[serde(default)]
    paused: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProduceDataRequest {
    transport_id: String,
    sctp_stream_parameters: SctpStreamParameters,
    #[serde(default)]
    label: String,
    #[serde(default)]
    protocol: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransportRef {
    transport_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProducerRef {
    producer_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumerRef {
    consumer_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferredLayersRequest {
    consumer_id: String,
    spatial_layer: u8,
    #[serde(default)]
    temporal_layer: Option<u8>,
}

fn parse<T: serde::de::DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

pub struct Room {
    id: String,
    router: Router,
    transport_config: WebRtcTransportConfig,
    peers: HashMap<String, PeerState>,
    producer_owner: HashMap<String, String>,
    consumer_owner: HashMap<String, String>,
    server_events: mpsc::UnboundedSender<ServerEvent>,
}

impl Room {
    /// Start the room task. It stops once the last peer has left.
    pub fn spawn(
        id: impl Into<String>,
        router: Router,
        media_events: mpsc::UnboundedReceiver<MediaEvent>,
        transport_config: WebRtcTransportConfig,
        server_events: mpsc::UnboundedSender<ServerEvent>,
    ) -> RoomHandle {
        let id = id.into();
        let (events, rx) = mpsc::unbounded_channel();
        let room = Room {
            id: id.clone(),
            router,
            transport_config,
            peers: HashMap::new(),
            producer_owner: HashMap::new(),
            consumer_owner: HashMap::new(),
            server_events,
        };
        tokio::spawn(room.run(rx, media_events));
        RoomHandle { id, events }
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<RoomEvent>,
        mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
    ) {
        info!(room_id = %self.id, router_id = %self.router.id(), "room open");
        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    if self.handle_event(event).await {
                        break;
                    }
                }
                Some(event) = media_events.recv() => self.handle_media(event),
                else => break,
            }
        }

        events.close();
        while let Ok(event) = events.try_recv() {
            if let RoomEvent::PeerConnected { peer } = event {
                debug!(room_id = %self.id, peer_id = %peer.id(), "room closed, refusing peer");
                peer.close();
            }
        }
        self.router.close();
        let _ = self.server_events.send(ServerEvent::RoomClosed {
            room_id: self.id.clone(),
        });
        info!(room_id = %self.id, "room closed");
    }

    /// Returns true once the room is empty and should stop.
    async fn handle_event(&mut self, event: RoomEvent) -> bool {
        match event {
            RoomEvent::PeerConnected { peer } => {
                let peer_id = peer.id().to_string();
                if let Some(old) = self.peers.get(&peer_id) {
                    info!(room_id = %self.id, peer_id = %peer_id, "peer reconnected, closing old connection");
                    old.peer.close();
                    let conn_id = old.peer.conn_id();
                    self.remove_peer(&peer_id, conn_id);
                }
                debug!(room_id = %self.id, peer_id = %peer_id, conn_id = peer.conn_id(), "peer connected");
                self.peers.insert(peer_id, PeerState::new(peer));
                false
            }
            RoomEvent::Request {
                peer_id,
                conn_id,
                request,
            } => {
                self.handle_request(&peer_id, conn_id, request).await;
                false
            }
            RoomEvent::PeerClosed { peer_id, conn_id } => {
                self.remove_peer(&peer_id, conn_id);
                self.peers.is_empty()
            }
        }
    }

    fn current_peer(&self, peer_id: &str, conn_id: u64) -> Option<&PeerState> {
        self.peers
            .get(peer_id)
            .filter(|state| state.peer.conn_id() == conn_id)
    }

    async fn handle_request(&mut self, peer_id: &str, conn_id: u64, request: SignalRequest) {
        let Some(peer) = self.current_peer(peer_id, conn_id).map(|s| s.peer.clone()) else {
            debug!(room_id = %self.id, peer_id, conn_id, "request from stale connection");
            return;
        };
        let SignalRequest { id, method, data } = request;
        debug!(room_id = %self.id, peer_id, method = %method, "request");

        match self.dispatch(peer_id, &method, data).await {
            Ok((response, follow_up)) => {
                peer.accept(id, response);
                match follow_up {
                    Some(FollowUp::Joined) => self.after_join(peer_id).await,
                    Some(FollowUp::Produced(producer)) => {
                        self.after_produce(peer_id, &producer).await
                    }
                    None => {}
                }
            }
            Err(err) => {
                warn!(room_id = %self.id, peer_id, method = %method, error = %err, "request failed");
                peer.reject(id, err.error_code(), &err.to_string());
            }
        }
    }

    fn state(&self, peer_id: &str) -> Result<&PeerState> {
        self.peers
            .get(peer_id)
            .ok_or_else(|| ServerError::not_found("peer", peer_id))
    }

    fn state_mut(&mut self, peer_id: &str) -> Result<&mut PeerState> {
        self.peers
            .get_mut(peer_id)
            .ok_or_else(|| ServerError::not_found("peer", peer_id))
    }

    async fn dispatch(
        &mut self,
        peer_id: &str,
        method: &str,
        data: Value,
    ) -> Result<(Value, Option<FollowUp>)> {
        let response = match method {
            "getRouterRtpCapabilities" => serde_json::to_value(self.router.rtp_capabilities())?,
            "join" => return self.join(peer_id, parse(data)?),
            "createWebRtcTransport" => self.create_transport(peer_id, parse(data)?).await?,
            "connectWebRtcTransport" => {
                let req: ConnectTransportRequest = parse(data)?;
                let transport = self.state(peer_id)?.transport(&req.transport_id)?.clone();
                transport.connect(req.dtls_parameters).await?;
                json!({})
            }
            "produce" => return self.produce(peer_id, parse(data)?).await,
            "produceData" => self.produce_data(peer_id, parse(data)?).await?,
            "closeProducer" => {
                let req: ProducerRef = parse(data)?;
                self.close_producer(peer_id, &req.producer_id)?;
                json!({})
            }
            "pauseProducer" => {
                let req: ProducerRef = parse(data)?;
                self.state(peer_id)?.producer(&req.producer_id)?.clone().pause().await?;
                json!({})
            }
            "resumeProducer" => {
                let req: ProducerRef = parse(data)?;
                self.state(peer_id)?.producer(&req.producer_id)?.clone().resume().await?;
                json!({})
            }
            "pauseConsumer" => {
                let req: ConsumerRef = parse(data)?;
                self.state(peer_id)?.consumer(&req.consumer_id)?.clone().pause().await?;
                json!({})
            }
            "resumeConsumer" => {
                let req: ConsumerRef = parse(data)?;
                self.state(peer_id)?.consumer(&req.consumer_id)?.clone().resume().await?;
                json!({})
            }
            "requestConsumerKeyFrame" => {
                let req: ConsumerRef = parse(data)?;
                let consumer = self.state(peer_id)?.consumer(&req.consumer_id)?.clone();
                consumer.request_key_frame().await?;
                json!({})
            }
            "setConsumerPreferredLayers" => {
                let req: PreferredLayersRequest = parse(data)?;
                let consumer = self.state(peer_id)?.consumer(&req.consumer_id)?.clone();
                consumer
                    .set_preferred_layers(ConsumerLayers {
                        spatial_layer: req.spatial_layer,
                        temporal_layer: req.temporal_layer,
                    })
                    .await?;
                json!({})
            }
            "getTransportStats" => {
                let req: TransportRef = parse(data)?;
                let transport = self.state(peer_id)?.transport(&req.transport_id)?.clone();
                transport.get_stats().await?
            }
            "getProducerStats" => {
                let req: ProducerRef = parse(data)?;
                let producer = self.state(peer_id)?.producer(&req.producer_id)?.clone();
                producer.get_stats().await?
            }
            "getConsumerStats" => {
                let req: ConsumerRef = parse(data)?;
                let consumer = self.state(peer_id)?.consumer(&req.consumer_id)?.clone();
                consumer.get_stats().await?
            }
            other => {
                return Err(ServerError::InvalidRequest(format!(
                    "unknown method \"{other}\""
                )))
            }
        };
        Ok((response, None))
    }

    fn joined_peers_except(&self, peer_id: &str) -> impl Iterator<Item = &PeerState> {
        let peer_id = peer_id.to_string();
        self.peers
            .values()
            .filter(move |state| state.joined && state.peer.id() != peer_id)
    }

    fn join(&mut self, peer_id: &str, req: JoinRequest) -> Result<(Value, Option<FollowUp>)> {
        let state = self.state_mut(peer_id)?;
        if state.joined {
            return Err(ServerError::InvalidRequest("peer already joined".into()));
        }
        state.joined = true;
        state.display_name = req.display_name;
        state.device = req.device;
        state.rtp_capabilities = req.rtp_capabilities;

        let peers: Vec<Value> = self.joined_peers_except(peer_id).map(PeerState::info).collect();
        info!(room_id = %self.id, peer_id, others = peers.len(), "peer joined");
        Ok((json!({ "peers": peers }), Some(FollowUp::Joined)))
    }

    async fn after_join(&mut self, peer_id: &str) {
        let existing: Vec<(String, Producer)> = self
            .joined_peers_except(peer_id)
            .flat_map(|state| {
                state
                    .producers
                    .values()
                    .map(|producer| (state.peer.id().to_string(), producer.clone()))
            })
            .collect();
        for (producer_peer_id, producer) in existing {
            self.create_consumer(peer_id, &producer_peer_id, &producer).await;
        }

        let Ok(state) = self.state(peer_id) else {
            return;
        };
        let info = state.info();
        for other in self.joined_peers_except(peer_id) {
            if let Err(err) = other.peer.notify("newPeer", info.clone()) {
                debug!(peer_id = %other.peer.id(), error = %err, "newPeer not delivered");
            }
        }
    }

    async fn create_transport(&mut self, peer_id: &str, req: CreateTransportRequest) -> Result<Value> {
        self.state(peer_id)?;
        let mut options = WebRtcTransportOptions::from_config(&self.transport_config)
            .force_tcp(req.force_tcp)
            .with_direction(req.producing, req.consuming);
        if let Some(sctp) = req.sctp_capabilities {
            options = options.with_sctp(sctp.num_streams);
        }
        let transport = self.router.create_webrtc_transport(options).await?;

        if let Some(bitrate) = self.transport_config.max_incoming_bitrate {
            if let Err(err) = transport.set_max_incoming_bitrate(bitrate).await {
                warn!(transport_id = %transport.id(), error = %err, "setMaxIncomingBitrate failed");
            }
        }

        let data = transport.data();
        let response = json!({
            "id": transport.id(),
            "iceParameters": data.ice_parameters,
            "iceCandidates": data.ice_candidates,
            "dtlsParameters": data.dtls_parameters,
            "sctpParameters": data.sctp_parameters,
        });
        match self.peers.get_mut(peer_id) {
            Some(state) => {
                state
                    .transports
                    .insert(transport.id().to_string(), transport);
            }
            // Peer left while the worker was busy.
            None => transport.close(),
        }
        Ok(response)
    }

    async fn produce(&mut self, peer_id: &str, req: ProduceRequest) -> Result<(Value, Option<FollowUp>)> {
        let state = self.state(peer_id)?;
        state.require_joined()?;
        let transport = state.transport(&req.transport_id)?.clone();

        let mut options = ProduceOptions::new(req.kind, req.rtp_parameters);
        options.paused = req.paused;
        let producer = transport.produce(options).await?;

        let state = self.state_mut(peer_id)?;
        state
            .producers
            .insert(producer.id().to_string(), producer.clone());
        self.producer_owner
            .insert(producer.id().to_string(), peer_id.to_string());
        Ok((json!({ "id": producer.id() }), Some(FollowUp::Produced(producer))))
    }

    async fn after_produce(&mut self, peer_id: &str, producer: &Producer) {
        let consumers: Vec<String> = self
            .joined_peers_except(peer_id)
            .map(|state| state.peer.id().to_string())
            .collect();
        for consumer_peer_id in consumers {
            self.create_consumer(&consumer_peer_id, peer_id, producer).await;
        }
    }

    async fn produce_data(&mut self, peer_id: &str, req: ProduceDataRequest) -> Result<Value> {
        let state = self.state(peer_id)?;
        state.require_joined()?;
        let transport = state.transport(&req.transport_id)?.clone();
        let data_producer = transport
            .produce_data(ProduceDataOptions {
                sctp_stream_parameters: req.sctp_stream_parameters,
                label: req.label,
                protocol: req.protocol,
            })
            .await?;
        let id = data_producer.id().to_string();
        self.state_mut(peer_id)?
            .data_producers
            .insert(id.clone(), data_producer);
        Ok(json!({ "id": id }))
    }

    fn close_producer(&mut self, peer_id: &str, producer_id: &str) -> Result<()> {
        let state = self.state_mut(peer_id)?;
        state
            .producers
            .remove(producer_id)
            .ok_or_else(|| ServerError::not_found("producer", producer_id))?;
        for transport in state.transports.values() {
            if transport.close_producer(producer_id).is_some() {
                break;
            }
        }
        self.producer_owner.remove(producer_id);
        Ok(())
    }

    /// Create a consumer of `producer` for `consumer_peer_id` and announce
    /// it with a `newConsumer` request. Skipped quietly when the peer cannot
    /// receive it.
    async fn create_consumer(
        &mut self,
        consumer_peer_id: &str,
        producer_peer_id: &str,
        producer: &Producer,
    ) {
        let Some(state) = self.peers.get(consumer_peer_id) else {
            return;
        };
        let Some(caps) = state.rtp_capabilities.clone() else {
            debug!(peer_id = consumer_peer_id, "no RTP capabilities, not consuming");
            return;
        };
        if !self.router.can_consume(producer.id(), &caps) {
            debug!(peer_id = consumer_peer_id, producer_id = %producer.id(), "cannot consume");
            return;
        }
        let Some(transport) = state.transports.values().find(|t| t.consuming()).cloned() else {
            warn!(peer_id = consumer_peer_id, "no consuming transport");
            return;
        };
        let peer = state.peer.clone();

        let consumer = match transport
            .consume(ConsumeOptions::new(producer.id(), caps))
            .await
        {
            Ok(consumer) => consumer,
            Err(err) => {
                warn!(peer_id = consumer_peer_id, producer_id = %producer.id(), error = %err, "consume failed");
                return;
            }
        };
        let Some(state) = self.peers.get_mut(consumer_peer_id) else {
            consumer.close();
            return;
        };
        state
            .consumers
            .insert(consumer.id().to_string(), consumer.clone());
        self.consumer_owner
            .insert(consumer.id().to_string(), consumer_peer_id.to_string());

        let data = json!({
            "peerId": producer_peer_id,
            "producerId": producer.id(),
            "id": consumer.id(),
            "kind": consumer.kind(),
            "rtpParameters": consumer.rtp_parameters(),
            "type": consumer.consumer_type(),
            "appData": { "peerId": producer_peer_id },
            "producerPaused": consumer.producer_paused(),
        });
        let consumer_id = consumer.id().to_string();
        tokio::spawn(async move {
            if let Err(err) = peer.request("newConsumer", data).await {
                warn!(peer_id = %peer.id(), consumer_id = %consumer_id, error = %err, "newConsumer failed");
            }
        });
    }

    fn remove_peer(&mut self, peer_id: &str, conn_id: u64) {
        if self.current_peer(peer_id, conn_id).is_none() {
            debug!(room_id = %self.id, peer_id, conn_id, "close of stale connection");
            return;
        }
        let Some(state) = self.peers.remove(peer_id) else {
            return;
        };
        for transport in state.transports.values() {
            transport.close();
        }
        for producer_id in state.producers.keys() {
            self.producer_owner.remove(producer_id);
        }
        for consumer_id in state.consumers.keys() {
            self.consumer_owner.remove(consumer_id);
        }
        info!(room_id = %self.id, peer_id, remaining = self.peers.len(), "peer left");

        if state.joined {
            for other in self.joined_peers_except(peer_id) {
                if let Err(err) = other.peer.notify("peerClosed", json!({ "peerId": peer_id })) {
                    debug!(peer_id = %other.peer.id(), error = %err, "peerClosed not delivered");
                }
            }
        }
    }

    fn handle_media(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::ProducerScore { producer_id, score } => {
                let data = json!({ "producerId": producer_id, "score": score });
                self.notify_owner(self.producer_owner.get(&producer_id), "producerScore", data);
            }
            MediaEvent::ConsumerScore { consumer_id, score } => {
                let data = json!({ "consumerId": consumer_id, "score": score });
                self.notify_owner(self.consumer_owner.get(&consumer_id), "consumerScore", data);
            }
            MediaEvent::ConsumerLayersChanged {
                consumer_id,
                layers,
            } => {
                let data = json!({
                    "consumerId": consumer_id,
                    "spatialLayer": layers.get("spatialLayer").cloned().unwrap_or(Value::Null),
                    "temporalLayer": layers.get("temporalLayer").cloned().unwrap_or(Value::Null),
                });
                self.notify_owner(
                    self.consumer_owner.get(&consumer_id),
                    "consumerLayersChanged",
                    data,
                );
            }
            MediaEvent::ConsumerProducerPaused { consumer_id } => {
                self.set_producer_paused(&consumer_id, true);
                let data = json!({ "consumerId": consumer_id });
                self.notify_owner(self.consumer_owner.get(&consumer_id), "consumerPaused", data);
            }
            MediaEvent::ConsumerProducerResumed { consumer_id } => {
                self.set_producer_paused(&consumer_id, false);
                let data = json!({ "consumerId": consumer_id });
                self.notify_owner(self.consumer_owner.get(&consumer_id), "consumerResumed", data);
            }
            MediaEvent::ConsumerProducerClosed { consumer_id } => {
                if let Some(owner) = self.forget_consumer(&consumer_id) {
                    let data = json!({ "consumerId": consumer_id });
                    self.notify_owner(Some(&owner), "consumerClosed", data);
                }
            }
            MediaEvent::ConsumerTransportClosed { consumer_id } => {
                self.forget_consumer(&consumer_id);
            }
        }
    }

    fn notify_owner(&self, owner: Option<&String>, method: &str, data: Value) {
        let Some(state) = owner.and_then(|peer_id| self.peers.get(peer_id)) else {
            debug!(room_id = %self.id, method, "no owner for media event");
            return;
        };
        if let Err(err) = state.peer.notify(method, data) {
            debug!(peer_id = %state.peer.id(), method, error = %err, "notification not delivered");
        }
    }

    fn set_producer_paused(&self, consumer_id: &str, paused: bool) {
        if let Some(consumer) = self
            .consumer_owner
            .get(consumer_id)
            .and_then(|peer_id| self.peers.get(peer_id))
            .and_then(|state| state.consumers.get(consumer_id))
        {
            consumer.set_producer_paused(paused);
        }
    }

    /// Drop a consumer the worker closed. Returns its owner.
    fn forget_consumer(&mut self, consumer_id: &str) -> Option<String> {
        let owner = self.consumer_owner.remove(consumer_id)?;
        if let Some(state) = self.peers.get_mut(&owner) {
            state.consumers.remove(consumer_id);
            for transport in state.transports.values() {
                if transport.forget_consumer(consumer_id).is_some() {
                    break;
                }
            }
        }
        Some(owner)
    }
}
