//! Signaling side of the SFU control plane.
//!
//! Supervises media worker processes, drives routers, transports, producers
//! and consumers on them over the IPC channels, and exposes rooms to
//! clients through protoo-style WebSocket signaling.
//!
//! ```text
//! client ──ws──> signaling ──> Room ──> Router/WebRtcTransport ──> Channel ──> worker
//!                                 ^                                  │
//!                                 └──────────── MediaEvent <─────────┘
//! ```

pub mod config;
pub mod consumer;
pub mod data_producer;
pub mod error;
mod internal;
pub mod notification;
pub mod producer;
pub mod room;
pub mod router;
pub mod server;
pub mod signaling;
pub mod transport;
pub mod worker;

pub use config::ServerConfig;
pub use consumer::{Consumer, ConsumerLayers};
pub use data_producer::{DataProducer, SctpStreamParameters};
pub use error::{Result, ServerError};
pub use internal::Internal;
pub use notification::{MediaEvent, NotificationTarget, TargetListener};
pub use producer::Producer;
pub use room::{Room, RoomEvent, RoomHandle};
pub use router::{NumSctpStreams, Router, WebRtcTransportOptions};
pub use server::{Server, ServerEvent};
pub use signaling::{PeerQuery, SignalMessage, SignalRequest, SignalingPeer};
pub use transport::{ConsumeOptions, ProduceDataOptions, ProduceOptions, TransportData, WebRtcTransport};
pub use worker::{Worker, WorkerSettings, WorkerSockets};
