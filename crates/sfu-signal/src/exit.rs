use std::fmt;
use std::io;

use sfu_signal_channel::{ChannelError, RequestError};
use sfu_signal_frame::FrameError;
use sfu_signal_server::ServerError;
use sfu_signal_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONFIG_INVALID: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const WORKER_FAILED: i32 = 10;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::AcceptTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::MalformedLength { .. }
        | FrameError::MissingTerminator
        | FrameError::EmptyPayload
        | FrameError::PayloadTooLarge { .. }
        | FrameError::ConnectionClosed => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Config(_) => CliError::new(CONFIG_INVALID, format!("{context}: {err}")),
        ServerError::Spawn(_) => CliError::new(WORKER_FAILED, format!("{context}: {err}")),
        ServerError::Transport(err) => transport_error(context, err),
        ServerError::Io(source) => io_error(context, source),
        ServerError::Request(RequestError::Timeout(_)) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        ServerError::Channel(ChannelError::Frame(err)) => frame_error(context, err),
        ServerError::Negotiation(_) | ServerError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}
