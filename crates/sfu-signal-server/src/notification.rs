//! Routing of worker notifications to the owning room.
//!
//! Every router, transport, producer, consumer and data producer registers a
//! [`TargetListener`] on the worker channel under its id. The listener turns
//! the events a room cares about into [`MediaEvent`]s and logs the rest.

use bytes::Bytes;
use serde_json::Value;
use sfu_signal_channel::NotificationListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Entity a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Router(String),
    Transport(String),
    Producer(String),
    Consumer(String),
    DataProducer(String),
}

impl NotificationTarget {
    pub fn id(&self) -> &str {
        match self {
            NotificationTarget::Router(id)
            | NotificationTarget::Transport(id)
            | NotificationTarget::Producer(id)
            | NotificationTarget::Consumer(id)
            | NotificationTarget::DataProducer(id) => id,
        }
    }
}

/// Worker-originated event relevant to signaling clients.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    ProducerScore { producer_id: String, score: Value },
    ConsumerScore { consumer_id: String, score: Value },
    ConsumerLayersChanged { consumer_id: String, layers: Value },
    ConsumerProducerPaused { consumer_id: String },
    ConsumerProducerResumed { consumer_id: String },
    ConsumerProducerClosed { consumer_id: String },
    ConsumerTransportClosed { consumer_id: String },
}

pub struct TargetListener {
    target: NotificationTarget,
    events: mpsc::UnboundedSender<MediaEvent>,
}

impl TargetListener {
    pub fn new(target: NotificationTarget, events: mpsc::UnboundedSender<MediaEvent>) -> Self {
        Self { target, events }
    }

    fn forward(&self, event: MediaEvent) {
        if self.events.send(event).is_err() {
            debug!(target_id = self.target.id(), "room gone, dropping media event");
        }
    }

    fn on_transport(&self, id: &str, event: &str, data: Value) {
        match event {
            "icestatechange" | "sctpstatechange" => {
                debug!(transport_id = id, event, state = %data, "transport state");
            }
            "dtlsstatechange" => {
                let state = data
                    .get("dtlsState")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if state == "failed" || state == "closed" {
                    warn!(transport_id = id, state, "DTLS state changed");
                } else {
                    debug!(transport_id = id, state, "DTLS state changed");
                }
            }
            "trace" => debug!(transport_id = id, trace = %data, "transport trace"),
            _ => unknown(&self.target, event),
        }
    }

    fn on_producer(&self, id: &str, event: &str, data: Value) {
        match event {
            "score" => self.forward(MediaEvent::ProducerScore {
                producer_id: id.to_string(),
                score: data,
            }),
            "videoorientationchange" | "trace" => {
                debug!(producer_id = id, event, data = %data, "producer event");
            }
            _ => unknown(&self.target, event),
        }
    }

    fn on_consumer(&self, id: &str, event: &str, data: Value) {
        let consumer_id = id.to_string();
        match event {
            "score" => self.forward(MediaEvent::ConsumerScore {
                consumer_id,
                score: data,
            }),
            "layerschange" => self.forward(MediaEvent::ConsumerLayersChanged {
                consumer_id,
                layers: data,
            }),
            "producerpause" => self.forward(MediaEvent::ConsumerProducerPaused { consumer_id }),
            "producerresume" => self.forward(MediaEvent::ConsumerProducerResumed { consumer_id }),
            "producerclose" => self.forward(MediaEvent::ConsumerProducerClosed { consumer_id }),
            "transportclose" => self.forward(MediaEvent::ConsumerTransportClosed { consumer_id }),
            "trace" => debug!(consumer_id = id, trace = %data, "consumer trace"),
            _ => unknown(&self.target, event),
        }
    }
}

fn unknown(target: &NotificationTarget, event: &str) {
    warn!(?target, event, "ignoring unknown notification");
}

impl NotificationListener for TargetListener {
    fn on_notification(&self, event: &str, data: Value, payload: Option<Bytes>) {
        match &self.target {
            NotificationTarget::Router(id) => {
                info!(router_id = %id, event, data = %data, "router notification");
            }
            NotificationTarget::Transport(id) => self.on_transport(id, event, data),
            NotificationTarget::Producer(id) => self.on_producer(id, event, data),
            NotificationTarget::Consumer(id) => self.on_consumer(id, event, data),
            NotificationTarget::DataProducer(id) => {
                debug!(
                    data_producer_id = %id,
                    event,
                    payload_len = payload.as_ref().map(Bytes::len),
                    "data producer notification"
                );
            }
        }
    }
}
