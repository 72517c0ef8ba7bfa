//! RTP capability and parameter types exchanged with clients and the worker.
//!
//! Field names follow the JSON the worker and mediasoup-style clients use
//! (`camelCase`, with codec parameters keyed by their SDP names).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Media kind of a codec, header extension or producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Kind encoded in a MIME type prefix (`audio/opus`, `video/VP8`).
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let (kind, _) = mime_type.split_once('/')?;
        if kind.eq_ignore_ascii_case("audio") {
            Some(MediaKind::Audio)
        } else if kind.eq_ignore_ascii_case("video") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction in which the router supports a header extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderExtensionDirection {
    #[default]
    Sendrecv,
    Sendonly,
    Recvonly,
    Inactive,
}

/// True when `mime_type` names a retransmission codec (`video/rtx`).
pub fn is_rtx_mime_type(mime_type: &str) -> bool {
    mime_type
        .rsplit_once('/')
        .is_some_and(|(_, subtype)| subtype.eq_ignore_ascii_case("rtx"))
}

/// Codec-specific parameters.
///
/// The ones that matter for negotiation are typed; everything else is kept
/// verbatim in `extra` and passed through to the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodecParameters {
    #[serde(
        rename = "packetization-mode",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::number"
    )]
    pub packetization_mode: Option<u8>,

    #[serde(
        rename = "level-asymmetry-allowed",
        default,
        skip_serializing_if = "Option::is_none",
        with = "lenient::flag"
    )]
    pub level_asymmetry_allowed: Option<bool>,

    #[serde(
        rename = "profile-level-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_level_id: Option<String>,

    #[serde(
        rename = "profile-id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::number"
    )]
    pub profile_id: Option<u8>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::number"
    )]
    pub apt: Option<u8>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CodecParameters {
    /// Parameters of an RTX codec associated with payload type `apt`.
    pub fn rtx(apt: u8) -> Self {
        Self {
            apt: Some(apt),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merge(&mut self, other: &CodecParameters) {
        if other.packetization_mode.is_some() {
            self.packetization_mode = other.packetization_mode;
        }
        if other.level_asymmetry_allowed.is_some() {
            self.level_asymmetry_allowed = other.level_asymmetry_allowed;
        }
        if other.profile_level_id.is_some() {
            self.profile_level_id = other.profile_level_id.clone();
        }
        if other.profile_id.is_some() {
            self.profile_id = other.profile_id;
        }
        if other.apt.is_some() {
            self.apt = other.apt;
        }
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Transport-layer or codec-specific RTCP feedback message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter: String,
}

impl RtcpFeedback {
    pub fn new(kind: &str, parameter: &str) -> Self {
        Self {
            kind: kind.to_string(),
            parameter: parameter.to_string(),
        }
    }
}

/// Media codec supported by a router or an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default)]
    pub parameters: CodecParameters,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

/// Retransmission codec paired with a media codec through `parameters.apt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtxCodecCapability {
    pub kind: MediaKind,
    pub mime_type: String,
    pub preferred_payload_type: u8,
    pub clock_rate: u32,
    pub parameters: CodecParameters,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtxCodecCapability {
    /// Associated payload type.
    pub fn apt(&self) -> Option<u8> {
        self.parameters.apt
    }
}

/// One entry of a capability codec list.
///
/// On the wire both variants are plain codec objects; an entry whose MIME
/// subtype is `rtx` is the RTX variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RtpCodecCapability")]
pub enum CodecCapability {
    Media(RtpCodecCapability),
    Rtx(RtxCodecCapability),
}

impl CodecCapability {
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecCapability::Media(codec) => codec.kind,
            CodecCapability::Rtx(codec) => codec.kind,
        }
    }

    pub fn preferred_payload_type(&self) -> Option<u8> {
        match self {
            CodecCapability::Media(codec) => codec.preferred_payload_type,
            CodecCapability::Rtx(codec) => Some(codec.preferred_payload_type),
        }
    }

    pub fn rtcp_feedback(&self) -> &[RtcpFeedback] {
        match self {
            CodecCapability::Media(codec) => &codec.rtcp_feedback,
            CodecCapability::Rtx(codec) => &codec.rtcp_feedback,
        }
    }

    pub fn as_media(&self) -> Option<&RtpCodecCapability> {
        match self {
            CodecCapability::Media(codec) => Some(codec),
            CodecCapability::Rtx(_) => None,
        }
    }

    pub fn as_rtx(&self) -> Option<&RtxCodecCapability> {
        match self {
            CodecCapability::Media(_) => None,
            CodecCapability::Rtx(codec) => Some(codec),
        }
    }
}

impl TryFrom<RtpCodecCapability> for CodecCapability {
    type Error = String;

    fn try_from(codec: RtpCodecCapability) -> Result<Self, Self::Error> {
        if !is_rtx_mime_type(&codec.mime_type) {
            return Ok(CodecCapability::Media(codec));
        }
        let preferred_payload_type = codec
            .preferred_payload_type
            .ok_or_else(|| format!("{} without preferredPayloadType", codec.mime_type))?;
        if codec.parameters.apt.is_none() {
            return Err(format!("{} without apt parameter", codec.mime_type));
        }
        Ok(CodecCapability::Rtx(RtxCodecCapability {
            kind: codec.kind,
            mime_type: codec.mime_type,
            preferred_payload_type,
            clock_rate: codec.clock_rate,
            parameters: codec.parameters,
            rtcp_feedback: codec.rtcp_feedback,
        }))
    }
}

impl Serialize for CodecCapability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CodecCapability::Media(codec) => codec.serialize(serializer),
            CodecCapability::Rtx(codec) => codec.serialize(serializer),
        }
    }
}

/// Header extension supported by a router or an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub preferred_id: u8,
    #[serde(default)]
    pub preferred_encrypt: bool,
    #[serde(default)]
    pub direction: HeaderExtensionDirection,
}

/// Codecs and header extensions a router or endpoint supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<CodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fec_mechanisms: Vec<String>,
}

impl RtpCapabilities {
    pub fn media_codecs(&self) -> impl Iterator<Item = &RtpCodecCapability> {
        self.codecs.iter().filter_map(CodecCapability::as_media)
    }

    pub fn rtx_codecs(&self) -> impl Iterator<Item = &RtxCodecCapability> {
        self.codecs.iter().filter_map(CodecCapability::as_rtx)
    }
}

/// Codec inside `RtpParameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    pub mime_type: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default)]
    pub parameters: CodecParameters,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    pub fn is_rtx(&self) -> bool {
        is_rtx_mime_type(&self.mime_type)
    }
}

/// Negotiated header extension inside `RtpParameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtensionParameters {
    pub uri: String,
    pub id: u8,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

/// SSRC of an RTX stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxStream {
    pub ssrc: u32,
}

/// One RTP stream of a producer or consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_payload_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtx: Option<RtxStream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_resolution_down_by: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
}

/// RTCP settings of an RTP stream set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(default = "default_true")]
    pub reduced_size: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux: Option<bool>,
}

impl Default for RtcpParameters {
    fn default() -> Self {
        Self {
            cname: None,
            reduced_size: true,
            mux: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Parameters of a producer, a consumer, or the router-canonical
/// ("consumable") form between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    pub codecs: Vec<RtpCodecParameters>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtensionParameters>,
    #[serde(default)]
    pub encodings: Vec<RtpEncodingParameters>,
    #[serde(default)]
    pub rtcp: RtcpParameters,
}

/// Producer payload type to router payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpMappingCodec {
    pub payload_type: u8,
    pub mapped_payload_type: u8,
}

/// Producer stream to router-side SSRC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpMappingEncoding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
    pub mapped_ssrc: u32,
}

/// How a producer's streams are rewritten inside the router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpMapping {
    pub codecs: Vec<RtpMappingCodec>,
    pub encodings: Vec<RtpMappingEncoding>,
}

/// Serde helpers for codec parameters that clients send either as numbers,
/// numeric strings, or booleans.
mod lenient {
    use serde::de::Error as _;

    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Number(u64),
        Text(String),
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        match Option::<Loose>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Loose::Number(n)) => u8::try_from(n).map(Some).map_err(D::Error::custom),
            Some(Loose::Text(text)) => text.trim().parse().map(Some).map_err(D::Error::custom),
            Some(Loose::Bool(_)) => Err(D::Error::custom("expected a number")),
        }
    }

    pub mod flag {
        use serde::de::Error as _;

        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<bool>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(flag) => serializer.serialize_u8(u8::from(*flag)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<bool>, D::Error> {
            match Option::<Loose>::deserialize(deserializer)? {
                None => Ok(None),
                Some(Loose::Bool(flag)) => Ok(Some(flag)),
                Some(Loose::Number(n)) => Ok(Some(n == 1)),
                Some(Loose::Text(text)) => Ok(Some(text.trim() == "1")),
            }
        }
    }
}
