use sfu_signal_channel::{ChannelError, RequestError};
use sfu_signal_rtp::OrtcError;
use sfu_signal_transport::TransportError;

/// Errors from worker supervision, routing and signaling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A worker channel could not be used.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The worker rejected a request, or it never answered.
    #[error("worker request failed: {0}")]
    Request(#[from] RequestError),

    /// A worker process could not be started or did not come up.
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    /// RTP negotiation failed.
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] OrtcError),

    /// No compatible codec between a producer and a consuming endpoint.
    #[error("cannot consume producer {0}")]
    CannotConsume(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A signaling request was malformed or not allowed in the peer's state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The signaling peer went away or did not answer in time.
    #[error("signaling peer error: {0}")]
    Signaling(String),

    #[error("worker IPC socket error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ServerError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Error code reported to signaling clients.
    pub fn error_code(&self) -> u16 {
        match self {
            ServerError::Negotiation(_)
            | ServerError::CannotConsume(_)
            | ServerError::InvalidRequest(_)
            | ServerError::Json(_) => 400,
            ServerError::NotFound { .. } => 404,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(ServerError::InvalidRequest("x".into()).error_code(), 400);
        assert_eq!(
            ServerError::Negotiation(OrtcError::NoMatchingCodecs).error_code(),
            400
        );
        assert_eq!(ServerError::not_found("transport", "t1").error_code(), 404);
        assert_eq!(
            ServerError::Request(RequestError::ChannelClosed).error_code(),
            500
        );
        assert_eq!(
            ServerError::not_found("producer", "p1").to_string(),
            "producer not found: p1"
        );
    }
}
