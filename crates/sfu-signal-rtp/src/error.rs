/// Errors from H.264 profile-level-id negotiation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum H264Error {
    /// The local profile-level-id is not a recognized H.264 value.
    #[error("invalid local profile-level-id: {0}")]
    InvalidLocal(String),

    /// The remote profile-level-id is not a recognized H.264 value.
    #[error("invalid remote profile-level-id: {0}")]
    InvalidRemote(String),

    /// Both sides are valid but carry different profiles.
    #[error("H264 profile mismatch")]
    ProfileMismatch,

    /// The negotiated profile/level has no canonical string form.
    #[error("no profile-level-id for the negotiated profile/level")]
    Unrepresentable,
}

/// Errors from RTP capability negotiation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrtcError {
    /// The dynamic payload type pool ran out.
    #[error("no more dynamic payload types available")]
    PayloadTypesExhausted,

    /// None of the offered media codecs is supported by the router.
    #[error("no offered media codec is supported by the router")]
    NoMatchingCodecs,

    /// An encoding has no entry in the producer's RTP mapping.
    #[error("no mapped SSRC for encoding {index}")]
    MissingEncodingMapping { index: usize },

    /// RTP parameters or capabilities are structurally invalid.
    #[error("invalid RTP parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, OrtcError>;
