use std::time::Duration;

/// Errors raised by a channel itself.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sfu_signal_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sfu_signal_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The channel was closed locally or by the worker.
    #[error("channel closed")]
    Closed,

    /// The frame could not be handed to the writer task.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Outcome of a request that did not resolve with an accepted response.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The worker answered with `error`/`reason`.
    #[error("request rejected ({error}): {reason}")]
    Rejected { error: String, reason: String },

    /// No response arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The channel closed while the request was pending.
    #[error("channel closed before response")]
    ChannelClosed,

    /// The request never made it onto the wire.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The response arrived but its data did not have the expected shape.
    #[error("invalid response data: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl From<ChannelError> for RequestError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => RequestError::ChannelClosed,
            other => RequestError::SendFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
