//! JSON envelopes exchanged with the worker and classification of inbound
//! frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Outbound request envelope.
#[derive(Debug, Serialize)]
pub struct RequestMessage<'a> {
    pub id: u32,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub internal: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Outbound notification envelope (no id, no response).
#[derive(Debug, Serialize)]
pub struct NotificationMessage<'a> {
    pub event: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub internal: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Inbound JSON message as sent by the worker.
///
/// Every field is optional on the wire; [`ChannelMessage::classify`] decides
/// what the message is.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// What an inbound JSON message turned out to be.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// Successful response to request `id`.
    Accepted { id: u32, data: Value },
    /// Failed response to request `id`.
    Rejected {
        id: u32,
        error: String,
        reason: String,
    },
    /// Notification carrying a target id. Routed to a registered listener,
    /// or to the channel owner when none is registered under that id.
    Notification {
        target_id: String,
        event: String,
        data: Value,
    },
    /// Notification without a target.
    WorkerNotification { event: String, data: Value },
}

impl ChannelMessage {
    /// Classify the message, or `None` when it is neither a response nor a
    /// notification.
    pub fn classify(self) -> Option<Inbound> {
        if self.id > 0 {
            if self.accepted {
                return Some(Inbound::Accepted {
                    id: self.id,
                    data: self.data,
                });
            }
            return match self.error {
                Some(error) if !error.is_empty() => Some(Inbound::Rejected {
                    id: self.id,
                    error,
                    reason: self.reason.unwrap_or_default(),
                }),
                _ => None,
            };
        }

        let event = self.event.filter(|event| !event.is_empty())?;
        match self.target_id.filter(|target| !target.is_empty()) {
            Some(target_id) => Some(Inbound::Notification {
                target_id,
                event,
                data: self.data,
            }),
            None => Some(Inbound::WorkerNotification {
                event,
                data: self.data,
            }),
        }
    }
}

/// Severity prefix of a worker log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warn,
    Error,
    Dump,
}

impl LogLevel {
    fn from_prefix(byte: u8) -> Option<Self> {
        match byte {
            b'D' => Some(LogLevel::Debug),
            b'W' => Some(LogLevel::Warn),
            b'E' => Some(LogLevel::Error),
            b'X' => Some(LogLevel::Dump),
            _ => None,
        }
    }
}

/// Parse a non-JSON frame as a worker log line.
///
/// Returns `None` when the first byte is not a known severity prefix.
pub fn parse_log_line(frame: &[u8]) -> Option<(LogLevel, String)> {
    let (&first, rest) = frame.split_first()?;
    let level = LogLevel::from_prefix(first)?;
    Some((level, String::from_utf8_lossy(rest).into_owned()))
}

/// Re-emit a worker log line through `tracing`.
pub(crate) fn emit_log_line(channel: &str, level: LogLevel, text: &str) {
    match level {
        LogLevel::Debug => debug!(channel, "worker: {text}"),
        LogLevel::Warn => warn!(channel, "worker: {text}"),
        LogLevel::Error => error!(channel, "worker: {text}"),
        LogLevel::Dump => info!(channel, "worker dump: {text}"),
    }
}
