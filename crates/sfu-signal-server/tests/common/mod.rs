//! Scripted worker and signaling client shared by the server tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use serde_json::{json, Value};
use sfu_signal_channel::{Channel, ChannelConfig, PayloadChannel};
use sfu_signal_frame::{encode_frame, NetstringCodec};
use sfu_signal_server::signaling::Outbound;
use sfu_signal_server::{RoomEvent, RoomHandle, ServerConfig, SignalRequest, SignalingPeer, Worker};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;

pub const CONFIG: &str = r#"{
    "https": {"listenIp": "127.0.0.1", "listenPort": 0},
    "mediasoup": {
        "workerPath": "/nonexistent/worker",
        "routerOptions": {"mediaCodecs": [
            {"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2},
            {"kind": "video", "mimeType": "video/VP8", "clockRate": 90000}
        ]},
        "webRtcTransportOptions": {
            "listenIps": [{"ip": "127.0.0.1"}],
            "maxIncomingBitrate": 1500000
        },
        "requestTimeoutMs": 2000
    }
}"#;

pub fn config() -> ServerConfig {
    ServerConfig::from_json(CONFIG).unwrap()
}

/// One request as the worker saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub internal: Value,
    pub data: Value,
}

/// The worker's end of a control channel. Answers every request and
/// records it; notifications can be injected.
#[derive(Clone)]
pub struct FakeWorker {
    log: Arc<Mutex<Vec<Recorded>>>,
    notifications: mpsc::UnboundedSender<Value>,
    follow_ups: FollowUps,
}

/// Notifications written right behind the response to a create request,
/// addressed to the entity that request created.
type FollowUps = Arc<Mutex<Vec<FollowUp>>>;

#[derive(Debug, Clone)]
struct FollowUp {
    method: String,
    event: String,
    data: Value,
}

pub fn fake_worker() -> (Worker, FakeWorker) {
    let (server_in, worker_out) = tokio::io::duplex(256 * 1024);
    let (server_out, worker_in) = tokio::io::duplex(256 * 1024);
    let (owner_tx, _owner_rx) = mpsc::unbounded_channel();
    let channel = Channel::new(
        server_in,
        server_out,
        ChannelConfig::new("fake-worker").with_request_timeout(Duration::from_secs(2)),
        owner_tx.clone(),
    );

    let (payload_in, payload_worker_out) = tokio::io::duplex(64 * 1024);
    let (payload_out, payload_worker_in) = tokio::io::duplex(64 * 1024);
    let payload_channel = PayloadChannel::new(
        payload_in,
        payload_out,
        ChannelConfig::new("fake-worker-payload"),
        owner_tx,
    );
    tokio::spawn(async move {
        // Keep the write side open; payload notifications need no answer.
        let _out = payload_worker_out;
        let mut frames = FramedRead::new(payload_worker_in, NetstringCodec::new());
        while let Some(Ok(_)) = frames.next().await {}
    });

    let log = Arc::new(Mutex::new(Vec::new()));
    let follow_ups = FollowUps::default();
    let (notifications, notification_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_worker(
        worker_in,
        worker_out,
        log.clone(),
        notification_rx,
        follow_ups.clone(),
    ));

    let worker = Worker::from_channels(0, channel, payload_channel);
    (
        worker,
        FakeWorker {
            log,
            notifications,
            follow_ups,
        },
    )
}

fn push_json(buf: &mut BytesMut, message: &Value) {
    encode_frame(message.to_string().as_bytes(), buf).unwrap();
}

async fn write_json(out: &mut DuplexStream, message: Value) -> bool {
    let mut buf = BytesMut::new();
    push_json(&mut buf, &message);
    out.write_all(&buf).await.is_ok()
}

/// Id of the entity a create request makes, taken from its internal ids.
fn created_id(method: &str, internal: &Value) -> Option<String> {
    let key = match method {
        "worker.createRouter" => "routerId",
        "router.createWebRtcTransport" => "transportId",
        "transport.produce" => "producerId",
        "transport.consume" => "consumerId",
        "transport.produceData" => "dataProducerId",
        _ => return None,
    };
    internal[key].as_str().map(str::to_string)
}

async fn run_worker(
    input: DuplexStream,
    mut out: DuplexStream,
    log: Arc<Mutex<Vec<Recorded>>>,
    mut notifications: mpsc::UnboundedReceiver<Value>,
    follow_ups: FollowUps,
) {
    let mut requests = FramedRead::new(input, NetstringCodec::new());
    loop {
        tokio::select! {
            frame = requests.next() => {
                let Some(Ok(frame)) = frame else { break };
                let request: Value = serde_json::from_slice(&frame).unwrap();
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let data = request.get("data").cloned().unwrap_or(Value::Null);
                let internal = request.get("internal").cloned().unwrap_or(Value::Null);
                let response = answer(&method, &data);

                let mut buf = BytesMut::new();
                push_json(&mut buf, &json!({"id": request["id"], "accepted": true, "data": response}));
                if let Some(target_id) = created_id(&method, &internal) {
                    for follow_up in follow_ups.lock().unwrap().iter().filter(|f| f.method == method) {
                        push_json(
                            &mut buf,
                            &json!({"targetId": target_id, "event": follow_up.event, "data": follow_up.data}),
                        );
                    }
                }
                log.lock().unwrap().push(Recorded {
                    method,
                    internal,
                    data,
                });
                if out.write_all(&buf).await.is_err() {
                    break;
                }
            }
            Some(notification) = notifications.recv() => {
                if !write_json(&mut out, notification).await {
                    break;
                }
            }
        }
    }
}

fn answer(method: &str, data: &Value) -> Value {
    match method {
        "router.createWebRtcTransport" => {
            let sctp = if data["enableSctp"] == true {
                json!({"port": 5000, "OS": 1024, "MIS": 1024, "maxMessageSize": 262144})
            } else {
                Value::Null
            };
            json!({
                "iceParameters": {"usernameFragment": "frag", "password": "pwd", "iceLite": true},
                "iceCandidates": [{"foundation": "udpcandidate", "ip": "127.0.0.1", "port": 40000,
                                    "priority": 1076302079, "protocol": "udp", "type": "host"}],
                "dtlsParameters": {"role": "auto", "fingerprints": []},
                "sctpParameters": sctp,
            })
        }
        "transport.connect" => json!({"dtlsLocalRole": "client"}),
        "transport.produce" => {
            let encodings = data["rtpParameters"]["encodings"]
                .as_array()
                .map_or(0, Vec::len);
            json!({"type": if encodings > 1 { "simulcast" } else { "simple" }})
        }
        "transport.consume" => json!({
            "paused": data["paused"],
            "producerPaused": false,
            "score": {"score": 10, "producerScore": 10},
        }),
        "transport.getStats" => json!([{"type": "webrtc-transport", "bytesReceived": 0}]),
        _ => json!({}),
    }
}

impl FakeWorker {
    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    /// Wait until the worker has seen `method` at least `times` times.
    pub async fn wait_for(&self, method: &str, times: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.count(method) < times {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("worker never saw {method} x{times}: {:?}", self.methods()));
    }

    /// Emit `event` for whatever `method` creates, in the same write as
    /// the accept response.
    pub fn follow(&self, method: &str, event: &str, data: Value) {
        self.follow_ups.lock().unwrap().push(FollowUp {
            method: method.to_string(),
            event: event.to_string(),
            data,
        });
    }

    pub fn notify(&self, target_id: &str, event: &str, data: Value) {
        self.notifications
            .send(json!({"targetId": target_id, "event": event, "data": data}))
            .unwrap();
    }
}

/// A signaling client attached directly to a room, without a socket.
pub struct TestClient {
    pub peer: SignalingPeer,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    room: mpsc::UnboundedSender<RoomEvent>,
    next_id: u32,
    backlog: VecDeque<Value>,
}

impl TestClient {
    pub fn connect(room: &RoomHandle, peer_id: &str, conn_id: u64) -> Self {
        let (peer, outbound) = SignalingPeer::new(peer_id, conn_id, Duration::from_secs(2));
        assert!(room.connect(peer.clone()));
        Self {
            peer,
            outbound,
            room: room.events(),
            next_id: 1,
            backlog: VecDeque::new(),
        }
    }

    async fn next_frame(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(2), self.outbound.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed");
        match frame {
            Outbound::Text(text) => serde_json::from_str(&text).unwrap(),
            Outbound::Close => json!({"close": true}),
        }
    }

    /// Send a request and return the whole response envelope.
    pub async fn request(&mut self, method: &str, data: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.room
            .send(RoomEvent::Request {
                peer_id: self.peer.id().to_string(),
                conn_id: self.peer.conn_id(),
                request: SignalRequest {
                    id,
                    method: method.to_string(),
                    data,
                },
            })
            .unwrap();
        loop {
            let frame = self.next_frame().await;
            if frame["response"] == true && frame["id"] == id {
                return frame;
            }
            self.backlog.push_back(frame);
        }
    }

    /// Send a request that must succeed and return its data.
    pub async fn ok(&mut self, method: &str, data: Value) -> Value {
        let response = self.request(method, data).await;
        assert_eq!(response["ok"], true, "{method} failed: {response}");
        response["data"].clone()
    }

    /// Next server-to-client request or notification with `method`.
    pub async fn expect(&mut self, method: &str) -> Value {
        if let Some(index) = self.backlog.iter().position(|f| f["method"] == method) {
            return self.backlog.remove(index).unwrap();
        }
        loop {
            let frame = self.next_frame().await;
            if frame["method"] == method {
                return frame;
            }
            self.backlog.push_back(frame);
        }
    }

    /// Wait for the server to close this connection.
    pub async fn expect_close(&mut self) {
        if let Some(index) = self.backlog.iter().position(|f| f["close"] == true) {
            self.backlog.remove(index);
            return;
        }
        while self.next_frame().await["close"] != true {}
    }

    /// Answer a server-to-client request.
    pub fn answer(&self, request: &Value) {
        let id = request["id"].as_u64().unwrap() as u32;
        self.peer.settle(id, Ok(json!({})));
    }

    pub fn disconnect(&self) {
        self.peer.close();
        self.room
            .send(RoomEvent::PeerClosed {
                peer_id: self.peer.id().to_string(),
                conn_id: self.peer.conn_id(),
            })
            .unwrap();
    }
}

pub fn opus_vp8_capabilities() -> Value {
    json!({
        "codecs": [
            {"kind": "audio", "mimeType": "audio/opus", "preferredPayloadType": 100,
             "clockRate": 48000, "channels": 2,
             "rtcpFeedback": [{"type": "transport-cc"}]},
            {"kind": "video", "mimeType": "video/VP8", "preferredPayloadType": 101,
             "clockRate": 90000,
             "rtcpFeedback": [{"type": "nack"}, {"type": "nack", "parameter": "pli"},
                              {"type": "goog-remb"}, {"type": "transport-cc"}]},
            {"kind": "video", "mimeType": "video/rtx", "preferredPayloadType": 102,
             "clockRate": 90000, "parameters": {"apt": 101}}
        ],
        "headerExtensions": [
            {"kind": "video", "uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "preferredId": 1},
            {"kind": "video",
             "uri": "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01",
             "preferredId": 5}
        ]
    })
}

pub fn vp8_rtp_parameters() -> Value {
    json!({
        "mid": "0",
        "codecs": [
            {"mimeType": "video/VP8", "payloadType": 96, "clockRate": 90000,
             "rtcpFeedback": [{"type": "nack"}, {"type": "nack", "parameter": "pli"}]},
            {"mimeType": "video/rtx", "payloadType": 97, "clockRate": 90000,
             "parameters": {"apt": 96}}
        ],
        "headerExtensions": [{"uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "id": 1}],
        "encodings": [{"ssrc": 11111111, "rtx": {"ssrc": 22222222}}],
        "rtcp": {"cname": "client-cname"}
    })
}
