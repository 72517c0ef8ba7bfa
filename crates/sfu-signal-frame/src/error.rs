/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is not a valid netstring length.
    #[error("malformed netstring length: {reason}")]
    MalformedLength { reason: &'static str },

    /// The buffer does not hold a complete frame yet.
    ///
    /// This is a buffering signal, not a protocol violation.
    #[error("incomplete frame")]
    Incomplete,

    /// The byte following the payload is not `,`.
    #[error("netstring payload not terminated by ','")]
    MissingTerminator,

    /// Netstrings on worker sockets never carry empty payloads.
    #[error("empty payload cannot be framed")]
    EmptyPayload,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when more input may complete the frame.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::Incomplete)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
