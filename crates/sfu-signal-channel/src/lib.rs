//! Request/response correlation and notification routing over the worker
//! IPC sockets.
//!
//! A [`Channel`] owns one read loop and one writer task. Outgoing requests
//! get a wrapping `u32` id and wait in a pending map until the matching
//! response, the request timeout, or channel teardown settles them. Inbound
//! notifications are dispatched in wire order to the [`NotificationListener`]
//! registered under their `targetId`; anything unrouted goes to the owner as
//! a [`ChannelEvent`]. [`PayloadChannel`] adds a raw payload frame after
//! every notification and request.

pub mod channel;
pub mod config;
pub mod error;
pub mod listener;
pub mod message;
pub mod payload;
mod shared;

pub use channel::Channel;
pub use config::ChannelConfig;
pub use error::{ChannelError, RequestError, Result};
pub use listener::{ListenerRegistry, NotificationListener};
pub use message::{parse_log_line, LogLevel};
pub use payload::PayloadChannel;
pub use shared::ChannelEvent;
