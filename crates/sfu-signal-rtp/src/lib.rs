//! RTP capability negotiation for the SFU control plane.
//!
//! Builds router capabilities from configured codecs, maps producer
//! parameters onto the router, and derives per-consumer parameters. Also
//! hosts the H.264 profile-level-id rules codec matching depends on.
//!
//! Nothing in this crate performs I/O.

pub mod error;
pub mod h264;
pub mod ortc;
pub mod rtp_parameters;
pub mod supported;

pub use error::{H264Error, OrtcError, Result};
pub use ortc::{
    can_consume, generate_router_rtp_capabilities, get_consumable_rtp_parameters,
    get_consumer_rtp_parameters, get_producer_rtp_parameters_mapping, match_codecs, random_ssrc,
    CodecLike,
};
pub use rtp_parameters::{
    CodecCapability, CodecParameters, HeaderExtensionDirection, MediaKind, RtcpFeedback,
    RtcpParameters, RtpCapabilities, RtpCodecCapability, RtpCodecParameters,
    RtpEncodingParameters, RtpHeaderExtension, RtpHeaderExtensionParameters, RtpMapping,
    RtpMappingCodec, RtpMappingEncoding, RtpParameters, RtxCodecCapability, RtxStream,
};
pub use supported::supported_rtp_capabilities;
