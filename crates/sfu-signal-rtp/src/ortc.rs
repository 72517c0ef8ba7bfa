//! RTP capability negotiation between clients, routers and consumers.
//!
//! Everything here is pure: the only non-deterministic input is the random
//! SSRC base used for producer mappings and consumer encodings.

use std::collections::VecDeque;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::{OrtcError, Result};
use crate::h264;
use crate::rtp_parameters::{
    CodecCapability, CodecParameters, HeaderExtensionDirection, MediaKind, RtcpFeedback,
    RtcpParameters, RtpCapabilities, RtpCodecCapability, RtpCodecParameters,
    RtpEncodingParameters, RtpHeaderExtensionParameters, RtpMapping, RtpMappingCodec,
    RtpMappingEncoding, RtpParameters, RtxCodecCapability, RtxStream,
};
use crate::supported::supported_rtp_capabilities;

/// Dynamic payload types in the order they are handed out.
const DYNAMIC_PAYLOAD_TYPES: [u8; 32] = [
    100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111, 112, 113, 114, 115, 116, 117,
    118, 119, 120, 121, 122, 123, 124, 125, 126, 127, 96, 97, 98, 99,
];

/// Range random SSRCs are drawn from.
const SSRC_RANGE: std::ops::Range<u32> = 100_000_000..999_999_999;

const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";

/// The fields codec matching looks at, shared by capabilities and
/// negotiated codec parameters.
pub trait CodecLike {
    fn mime_type(&self) -> &str;
    fn clock_rate(&self) -> u32;
    fn channels(&self) -> Option<u8>;
    fn parameters(&self) -> &CodecParameters;
}

impl CodecLike for RtpCodecCapability {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }
    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }
    fn channels(&self) -> Option<u8> {
        self.channels
    }
    fn parameters(&self) -> &CodecParameters {
        &self.parameters
    }
}

impl CodecLike for RtxCodecCapability {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }
    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }
    fn channels(&self) -> Option<u8> {
        None
    }
    fn parameters(&self) -> &CodecParameters {
        &self.parameters
    }
}

impl CodecLike for CodecCapability {
    fn mime_type(&self) -> &str {
        match self {
            CodecCapability::Media(codec) => codec.mime_type(),
            CodecCapability::Rtx(codec) => codec.mime_type(),
        }
    }
    fn clock_rate(&self) -> u32 {
        match self {
            CodecCapability::Media(codec) => codec.clock_rate,
            CodecCapability::Rtx(codec) => codec.clock_rate,
        }
    }
    fn channels(&self) -> Option<u8> {
        match self {
            CodecCapability::Media(codec) => codec.channels,
            CodecCapability::Rtx(_) => None,
        }
    }
    fn parameters(&self) -> &CodecParameters {
        match self {
            CodecCapability::Media(codec) => &codec.parameters,
            CodecCapability::Rtx(codec) => &codec.parameters,
        }
    }
}

impl CodecLike for RtpCodecParameters {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }
    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }
    fn channels(&self) -> Option<u8> {
        self.channels
    }
    fn parameters(&self) -> &CodecParameters {
        &self.parameters
    }
}

/// Random SSRC for a mapped producer stream or a consumer encoding.
pub fn random_ssrc() -> u32 {
    rand::thread_rng().gen_range(SSRC_RANGE)
}

/// Build the router's capabilities from the configured media codecs.
///
/// Each configured codec is matched against the supported table. Video
/// codecs get an RTX companion. Header extensions are the supported table's.
pub fn generate_router_rtp_capabilities(
    media_codecs: &[RtpCodecCapability],
) -> Result<RtpCapabilities> {
    let supported = supported_rtp_capabilities();

    // Configured payload types are reserved up front so the pool never hands
    // them out to an earlier codec.
    let mut pool: VecDeque<u8> = DYNAMIC_PAYLOAD_TYPES
        .iter()
        .copied()
        .filter(|pt| {
            !media_codecs
                .iter()
                .any(|codec| codec.preferred_payload_type == Some(*pt))
        })
        .collect();

    let mut caps = RtpCapabilities {
        codecs: Vec::new(),
        header_extensions: supported.header_extensions.clone(),
        fec_mechanisms: Vec::new(),
    };

    for media_codec in media_codecs {
        if media_codec.mime_type.is_empty() || media_codec.clock_rate == 0 {
            return Err(OrtcError::InvalidParameters(format!(
                "media codec {:?} needs a mimeType and a clockRate",
                media_codec.mime_type
            )));
        }

        let mut matched = false;
        for template in supported.media_codecs() {
            if !match_codecs(media_codec, template, false) {
                continue;
            }
            matched = true;

            let mut codec = template.clone();
            let payload_type = match (media_codec.preferred_payload_type, codec.preferred_payload_type) {
                (Some(pt), _) => pt,
                (None, Some(pt)) => pt,
                (None, None) => pool.pop_front().ok_or(OrtcError::PayloadTypesExhausted)?,
            };
            codec.preferred_payload_type = Some(payload_type);

            if caps
                .codecs
                .iter()
                .any(|existing| existing.preferred_payload_type() == Some(payload_type))
            {
                error!(
                    mime_type = %codec.mime_type,
                    payload_type,
                    "duplicated preferredPayloadType, codec ignored"
                );
                continue;
            }

            codec.parameters.merge(&media_codec.parameters);
            let kind = codec.kind;
            let clock_rate = codec.clock_rate;
            debug!(mime_type = %codec.mime_type, payload_type, "router codec added");
            caps.codecs.push(CodecCapability::Media(codec));

            if kind == MediaKind::Video {
                let rtx_payload_type =
                    pool.pop_front().ok_or(OrtcError::PayloadTypesExhausted)?;
                caps.codecs.push(CodecCapability::Rtx(RtxCodecCapability {
                    kind,
                    mime_type: format!("{kind}/rtx"),
                    preferred_payload_type: rtx_payload_type,
                    clock_rate,
                    parameters: CodecParameters::rtx(payload_type),
                    rtcp_feedback: Vec::new(),
                }));
            }
        }

        if !matched {
            warn!(
                mime_type = %media_codec.mime_type,
                clock_rate = media_codec.clock_rate,
                "media codec not supported, ignored"
            );
        }
    }

    Ok(caps)
}

/// Whether two codecs describe the same thing.
///
/// MIME type (case-insensitive) and clock rate must be equal; audio channel
/// counts default to 1. H264 always compares packetization-mode. With
/// `strict`, H264 also requires a compatible profile and a derivable answer
/// profile-level-id, and VP9 compares profile-id.
pub fn match_codecs<A, B>(a: &A, b: &B, strict: bool) -> bool
where
    A: CodecLike + ?Sized,
    B: CodecLike + ?Sized,
{
    let mime_type = a.mime_type().to_ascii_lowercase();
    if mime_type != b.mime_type().to_ascii_lowercase() {
        return false;
    }
    if a.clock_rate() != b.clock_rate() {
        return false;
    }
    if MediaKind::from_mime_type(&mime_type) == Some(MediaKind::Audio)
        && a.channels().unwrap_or(1) != b.channels().unwrap_or(1)
    {
        return false;
    }

    let (pa, pb) = (a.parameters(), b.parameters());
    match mime_type.as_str() {
        "video/h264" => {
            if pa.packetization_mode.unwrap_or(0) != pb.packetization_mode.unwrap_or(0) {
                return false;
            }
            if strict {
                if let (Some(x), Some(y)) = (&pa.profile_level_id, &pb.profile_level_id) {
                    if !h264::is_same_profile(Some(x.as_str()), Some(y.as_str())) {
                        return false;
                    }
                }
                if let Err(err) = h264::generate_profile_level_id_for_answer(pa, pb) {
                    debug!(error = %err, "no answer profile-level-id, H264 codecs do not match");
                    return false;
                }
            }
        }
        "video/vp9" => {
            if strict && pa.profile_id.unwrap_or(0) != pb.profile_id.unwrap_or(0) {
                return false;
            }
        }
        _ => {}
    }
    true
}

/// Map a producer's codecs and encodings onto the router's.
///
/// Offered media codecs without a router match are logged and left out;
/// fails only when none of them matches.
pub fn get_producer_rtp_parameters_mapping(
    params: &RtpParameters,
    caps: &RtpCapabilities,
) -> Result<RtpMapping> {
    if params.encodings.is_empty() {
        return Err(OrtcError::InvalidParameters("no encodings".into()));
    }

    let mut codecs = Vec::new();
    for codec in params.codecs.iter().filter(|c| !c.is_rtx()) {
        let router_pt = caps
            .media_codecs()
            .find(|cap| match_codecs(codec, *cap, true))
            .and_then(|cap| cap.preferred_payload_type);
        match router_pt {
            Some(mapped_payload_type) => codecs.push(RtpMappingCodec {
                payload_type: codec.payload_type,
                mapped_payload_type,
            }),
            None => warn!(
                mime_type = %codec.mime_type,
                payload_type = codec.payload_type,
                "unsupported codec"
            ),
        }
    }
    if codecs.is_empty() {
        return Err(OrtcError::NoMatchingCodecs);
    }

    let media_count = codecs.len();
    for rtx in params.codecs.iter().filter(|c| c.is_rtx()) {
        let associated = rtx.parameters.apt.and_then(|apt| {
            codecs[..media_count]
                .iter()
                .find(|entry| entry.payload_type == apt)
                .map(|entry| entry.mapped_payload_type)
        });
        let Some(router_media_pt) = associated else {
            warn!(payload_type = rtx.payload_type, "no media codec found for RTX");
            continue;
        };
        match caps.rtx_codecs().find(|cap| cap.apt() == Some(router_media_pt)) {
            Some(cap) => codecs.push(RtpMappingCodec {
                payload_type: rtx.payload_type,
                mapped_payload_type: cap.preferred_payload_type,
            }),
            None => debug!(
                payload_type = rtx.payload_type,
                "router has no RTX for the associated codec"
            ),
        }
    }

    let base = random_ssrc();
    let encodings = params
        .encodings
        .iter()
        .zip(base..)
        .map(|(encoding, mapped_ssrc)| RtpMappingEncoding {
            ssrc: encoding.ssrc,
            rid: encoding.rid.clone(),
            scalability_mode: encoding.scalability_mode.clone(),
            mapped_ssrc,
        })
        .collect();

    Ok(RtpMapping { codecs, encodings })
}

/// Router-canonical form of a producer's parameters, the basis of every
/// consumer of that producer.
pub fn get_consumable_rtp_parameters(
    kind: MediaKind,
    params: &RtpParameters,
    caps: &RtpCapabilities,
    mapping: &RtpMapping,
) -> Result<RtpParameters> {
    let mut codecs = Vec::new();
    for codec in params.codecs.iter().filter(|c| !c.is_rtx()) {
        let Some(mapped_pt) = mapping
            .codecs
            .iter()
            .find(|entry| entry.payload_type == codec.payload_type)
            .map(|entry| entry.mapped_payload_type)
        else {
            continue;
        };
        let Some(cap) = caps
            .media_codecs()
            .find(|cap| cap.preferred_payload_type == Some(mapped_pt))
        else {
            continue;
        };

        codecs.push(RtpCodecParameters {
            mime_type: cap.mime_type.clone(),
            payload_type: mapped_pt,
            clock_rate: cap.clock_rate,
            channels: cap.channels,
            parameters: codec.parameters.clone(),
            rtcp_feedback: cap.rtcp_feedback.clone(),
        });

        if let Some(rtx) = caps.rtx_codecs().find(|rtx| rtx.apt() == Some(mapped_pt)) {
            codecs.push(RtpCodecParameters {
                mime_type: rtx.mime_type.clone(),
                payload_type: rtx.preferred_payload_type,
                clock_rate: rtx.clock_rate,
                channels: None,
                parameters: rtx.parameters.clone(),
                rtcp_feedback: rtx.rtcp_feedback.clone(),
            });
        }
    }

    let header_extensions = caps
        .header_extensions
        .iter()
        .filter(|ext| {
            ext.kind == kind
                && matches!(
                    ext.direction,
                    HeaderExtensionDirection::Sendrecv | HeaderExtensionDirection::Sendonly
                )
        })
        .map(|ext| RtpHeaderExtensionParameters {
            uri: ext.uri.clone(),
            id: ext.preferred_id,
            encrypt: ext.preferred_encrypt,
            parameters: Default::default(),
        })
        .collect();

    let encodings = params
        .encodings
        .iter()
        .enumerate()
        .map(|(index, encoding)| {
            let mapped = mapping
                .encodings
                .get(index)
                .ok_or(OrtcError::MissingEncodingMapping { index })?;
            Ok(RtpEncodingParameters {
                ssrc: Some(mapped.mapped_ssrc),
                rid: None,
                codec_payload_type: None,
                rtx: None,
                ..encoding.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RtpParameters {
        mid: None,
        codecs,
        header_extensions,
        encodings,
        rtcp: RtcpParameters {
            cname: params.rtcp.cname.clone(),
            reduced_size: true,
            mux: Some(true),
        },
    })
}

/// Parameters for a consumer of `consumable` given the consuming endpoint's
/// capabilities, or `None` when they share no usable codec.
pub fn get_consumer_rtp_parameters(
    consumable: &RtpParameters,
    caps: &RtpCapabilities,
    pipe: bool,
) -> Option<RtpParameters> {
    let mut codecs: Vec<RtpCodecParameters> = consumable
        .codecs
        .iter()
        .filter_map(|codec| {
            let cap = caps.codecs.iter().find(|cap| match_codecs(codec, *cap, true))?;
            Some(RtpCodecParameters {
                rtcp_feedback: cap.rtcp_feedback().to_vec(),
                ..codec.clone()
            })
        })
        .collect();

    // An RTX codec is useless without its media codec.
    let media_pts: Vec<u8> = codecs
        .iter()
        .filter(|c| !c.is_rtx())
        .map(|c| c.payload_type)
        .collect();
    codecs.retain(|c| {
        !c.is_rtx() || c.parameters.apt.is_some_and(|apt| media_pts.contains(&apt))
    });

    if codecs.first().map_or(true, RtpCodecParameters::is_rtx) {
        debug!("no codec in common with the consumer capabilities");
        return None;
    }
    let rtx_supported = codecs.iter().any(RtpCodecParameters::is_rtx);

    let header_extensions: Vec<RtpHeaderExtensionParameters> = consumable
        .header_extensions
        .iter()
        .filter(|ext| {
            caps.header_extensions
                .iter()
                .any(|cap| cap.preferred_id == ext.id && cap.uri == ext.uri)
        })
        .cloned()
        .collect();

    // Transport-CC when negotiated, REMB otherwise.
    let has_ext = |uri: &str| header_extensions.iter().any(|ext| ext.uri == uri);
    let dropped: &[&str] = if has_ext(TRANSPORT_CC_URI) {
        &["goog-remb"]
    } else if has_ext(ABS_SEND_TIME_URI) {
        &["transport-cc"]
    } else {
        &["transport-cc", "goog-remb"]
    };
    for codec in &mut codecs {
        codec
            .rtcp_feedback
            .retain(|fb: &RtcpFeedback| !dropped.contains(&fb.kind.as_str()));
    }

    let encodings = if pipe {
        consumable.encodings.clone()
    } else {
        vec![consumer_encoding(&consumable.encodings, rtx_supported)]
    };

    Some(RtpParameters {
        mid: None,
        codecs,
        header_extensions,
        encodings,
        rtcp: consumable.rtcp.clone(),
    })
}

fn consumer_encoding(consumable: &[RtpEncodingParameters], rtx: bool) -> RtpEncodingParameters {
    let ssrc = random_ssrc();

    // Only a producer that declared a mode gets one back. Simulcast streams
    // collapse into one spatially layered stream.
    let scalability_mode = consumable
        .iter()
        .find_map(|e| e.scalability_mode.as_deref())
        .map(|mode| {
            if consumable.len() > 1 {
                format!("S{}T3", consumable.len())
            } else {
                mode.to_string()
            }
        });

    let max_bitrate = consumable
        .iter()
        .filter_map(|e| e.max_bitrate)
        .max()
        .filter(|bitrate| *bitrate > 0);

    RtpEncodingParameters {
        ssrc: Some(ssrc),
        rtx: rtx.then(|| RtxStream { ssrc: ssrc + 1 }),
        scalability_mode,
        max_bitrate,
        ..RtpEncodingParameters::default()
    }
}

/// Whether an endpoint with `caps` can consume a producer whose consumable
/// parameters are `consumable`.
pub fn can_consume(consumable: &RtpParameters, caps: &RtpCapabilities) -> bool {
    consumable
        .codecs
        .iter()
        .filter(|codec| !codec.is_rtx())
        .any(|codec| caps.media_codecs().any(|cap| match_codecs(codec, cap, true)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn configured(value: serde_json::Value) -> Vec<RtpCodecCapability> {
        serde_json::from_value(value).unwrap()
    }

    fn default_media_codecs() -> Vec<RtpCodecCapability> {
        configured(json!([
            {"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2},
            {"kind": "video", "mimeType": "video/VP8", "clockRate": 90000,
             "parameters": {"x-google-start-bitrate": 1000}},
            {"kind": "video", "mimeType": "video/H264", "clockRate": 90000,
             "parameters": {"packetization-mode": 1, "profile-level-id": "42e01f",
                            "level-asymmetry-allowed": 1}}
        ]))
    }

    fn router_caps() -> RtpCapabilities {
        generate_router_rtp_capabilities(&default_media_codecs()).unwrap()
    }

    fn payload_types(caps: &RtpCapabilities) -> Vec<u8> {
        caps.codecs
            .iter()
            .filter_map(CodecCapability::preferred_payload_type)
            .collect()
    }

    fn vp8_producer(encodings: serde_json::Value) -> RtpParameters {
        serde_json::from_value(json!({
            "mid": "1",
            "codecs": [
                {"mimeType": "video/VP8", "payloadType": 96, "clockRate": 90000,
                 "rtcpFeedback": [{"type": "nack"}]},
                {"mimeType": "video/rtx", "payloadType": 97, "clockRate": 90000,
                 "parameters": {"apt": 96}}
            ],
            "headerExtensions": [
                {"uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "id": 4}
            ],
            "encodings": encodings,
            "rtcp": {"cname": "producer-cname"}
        }))
        .unwrap()
    }

    fn browser_caps(with_rtx: bool) -> RtpCapabilities {
        let mut codecs = vec![json!({
            "kind": "video", "mimeType": "video/VP8", "preferredPayloadType": 120,
            "clockRate": 90000,
            "rtcpFeedback": [{"type": "nack"}, {"type": "goog-remb"}, {"type": "transport-cc"}]
        })];
        if with_rtx {
            codecs.push(json!({
                "kind": "video", "mimeType": "video/rtx", "preferredPayloadType": 121,
                "clockRate": 90000, "parameters": {"apt": 120}
            }));
        }
        serde_json::from_value(json!({
            "codecs": codecs,
            "headerExtensions": [
                {"kind": "video", "uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "preferredId": 1},
                {"kind": "video", "uri": ABS_SEND_TIME_URI, "preferredId": 4},
                {"kind": "video", "uri": TRANSPORT_CC_URI, "preferredId": 5}
            ]
        }))
        .unwrap()
    }

    fn consumable_vp8(encodings: serde_json::Value) -> RtpParameters {
        let caps = router_caps();
        let params = vp8_producer(encodings);
        let mapping = get_producer_rtp_parameters_mapping(&params, &caps).unwrap();
        get_consumable_rtp_parameters(MediaKind::Video, &params, &caps, &mapping).unwrap()
    }

    #[test]
    fn router_capabilities_assign_payload_types_in_pool_order() {
        let caps = router_caps();
        assert_eq!(payload_types(&caps), vec![100, 101, 102, 103, 104]);

        let vp8_rtx = caps.rtx_codecs().next().unwrap();
        assert_eq!(vp8_rtx.mime_type, "video/rtx");
        assert_eq!(vp8_rtx.apt(), Some(101));

        let h264 = caps
            .media_codecs()
            .find(|c| c.mime_type == "video/H264")
            .unwrap();
        assert_eq!(h264.parameters.profile_level_id.as_deref(), Some("42e01f"));
        assert_eq!(h264.parameters.packetization_mode, Some(1));

        let vp8 = caps.media_codecs().find(|c| c.mime_type == "video/VP8").unwrap();
        assert_eq!(vp8.parameters.extra["x-google-start-bitrate"], json!(1000));
        assert_eq!(caps.header_extensions.len(), 13);
    }

    #[test]
    fn router_capabilities_are_deterministic() {
        let a = router_caps();
        let b = router_caps();
        assert_eq!(a, b);

        let mut pts = payload_types(&a);
        pts.sort_unstable();
        pts.dedup();
        assert_eq!(pts.len(), a.codecs.len());
    }

    #[test]
    fn configured_payload_type_is_kept_and_reserved() {
        let caps = generate_router_rtp_capabilities(&configured(json!([
            {"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2},
            {"kind": "video", "mimeType": "video/VP8", "clockRate": 90000,
             "preferredPayloadType": 100},
            {"kind": "audio", "mimeType": "audio/PCMU", "clockRate": 8000}
        ])))
        .unwrap();
        assert_eq!(payload_types(&caps), vec![101, 100, 102, 0]);
    }

    #[test]
    fn duplicate_payload_type_is_dropped() {
        let caps = generate_router_rtp_capabilities(&configured(json!([
            {"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2,
             "preferredPayloadType": 111},
            {"kind": "audio", "mimeType": "audio/ISAC", "clockRate": 16000,
             "preferredPayloadType": 111}
        ])))
        .unwrap();
        assert_eq!(caps.codecs.len(), 1);
        assert_eq!(caps.codecs[0].as_media().unwrap().mime_type, "audio/opus");
    }

    #[test]
    fn unsupported_codec_is_skipped() {
        let caps = generate_router_rtp_capabilities(&configured(json!([
            {"kind": "video", "mimeType": "video/AV2", "clockRate": 90000},
            {"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000}
        ])))
        .unwrap();
        // Mono opus does not match the stereo template either.
        assert!(caps.codecs.is_empty());
    }

    #[test]
    fn pool_exhaustion_is_an_error() {
        let vp8 = json!({"kind": "video", "mimeType": "video/VP8", "clockRate": 90000});
        let codecs = configured(serde_json::Value::Array(vec![vp8; 17]));
        assert_eq!(
            generate_router_rtp_capabilities(&codecs),
            Err(OrtcError::PayloadTypesExhausted)
        );
    }

    #[test]
    fn audio_channels_default_to_one() {
        let mono = configured(json!([
            {"kind": "audio", "mimeType": "audio/PCMU", "clockRate": 8000},
            {"kind": "audio", "mimeType": "audio/pcmu", "clockRate": 8000, "channels": 1},
            {"kind": "audio", "mimeType": "audio/PCMU", "clockRate": 8000, "channels": 2}
        ]));
        assert!(match_codecs(&mono[0], &mono[1], true));
        assert!(!match_codecs(&mono[0], &mono[2], false));
    }

    #[test]
    fn strict_h264_matching() {
        let codecs = configured(json!([
            {"kind": "video", "mimeType": "video/H264", "clockRate": 90000,
             "parameters": {"packetization-mode": 1, "profile-level-id": "42e01f"}},
            {"kind": "video", "mimeType": "video/H264", "clockRate": 90000,
             "parameters": {"packetization-mode": 1, "profile-level-id": "4d001f"}},
            {"kind": "video", "mimeType": "video/H264", "clockRate": 90000,
             "parameters": {"profile-level-id": "42e01f"}},
            {"kind": "video", "mimeType": "video/H264", "clockRate": 90000,
             "parameters": {"packetization-mode": 1, "profile-level-id": "42e015"}}
        ]));
        // Profile only matters when strict.
        assert!(match_codecs(&codecs[0], &codecs[1], false));
        assert!(!match_codecs(&codecs[0], &codecs[1], true));
        // Packetization mode always matters.
        assert!(!match_codecs(&codecs[0], &codecs[2], false));
        // Same profile, different level.
        assert!(match_codecs(&codecs[0], &codecs[3], true));
    }

    #[test]
    fn strict_vp9_compares_profile_id() {
        let codecs = configured(json!([
            {"kind": "video", "mimeType": "video/VP9", "clockRate": 90000},
            {"kind": "video", "mimeType": "video/VP9", "clockRate": 90000,
             "parameters": {"profile-id": 0}},
            {"kind": "video", "mimeType": "video/VP9", "clockRate": 90000,
             "parameters": {"profile-id": "2"}}
        ]));
        assert!(match_codecs(&codecs[0], &codecs[1], true));
        assert!(match_codecs(&codecs[0], &codecs[2], false));
        assert!(!match_codecs(&codecs[0], &codecs[2], true));
    }

    #[test]
    fn producer_mapping_pairs_rtx_through_router_apt() {
        let caps = router_caps();
        let params = vp8_producer(json!([
            {"rid": "r0", "maxBitrate": 100000},
            {"rid": "r1", "maxBitrate": 300000},
            {"rid": "r2", "maxBitrate": 900000}
        ]));
        let mapping = get_producer_rtp_parameters_mapping(&params, &caps).unwrap();

        assert_eq!(
            mapping.codecs,
            vec![
                RtpMappingCodec { payload_type: 96, mapped_payload_type: 101 },
                RtpMappingCodec { payload_type: 97, mapped_payload_type: 102 },
            ]
        );
        assert_eq!(mapping.encodings.len(), 3);
        let base = mapping.encodings[0].mapped_ssrc;
        assert!(SSRC_RANGE.contains(&base));
        for (i, encoding) in mapping.encodings.iter().enumerate() {
            assert_eq!(encoding.mapped_ssrc, base + i as u32);
            assert_eq!(encoding.rid.as_deref(), Some(format!("r{i}").as_str()));
        }
    }

    #[test]
    fn producer_without_supported_codec_is_rejected() {
        let caps = router_caps();
        let params: RtpParameters = serde_json::from_value(json!({
            "codecs": [{"mimeType": "video/H265", "payloadType": 96, "clockRate": 90000}],
            "encodings": [{"ssrc": 1234}]
        }))
        .unwrap();
        assert_eq!(
            get_producer_rtp_parameters_mapping(&params, &caps),
            Err(OrtcError::NoMatchingCodecs)
        );
    }

    #[test]
    fn consumable_parameters_use_router_view() {
        let consumable = consumable_vp8(json!([{"ssrc": 1111, "rid": "r0", "rtx": {"ssrc": 2222}}]));

        assert_eq!(consumable.codecs.len(), 2);
        assert_eq!(consumable.codecs[0].payload_type, 101);
        assert_eq!(consumable.codecs[0].rtcp_feedback.len(), 5);
        assert_eq!(consumable.codecs[1].payload_type, 102);
        assert_eq!(consumable.codecs[1].parameters.apt, Some(101));

        let encoding = &consumable.encodings[0];
        assert_ne!(encoding.ssrc, Some(1111));
        assert!(encoding.rid.is_none());
        assert!(encoding.rtx.is_none());

        // Receive-only extensions are not usable by consumers.
        assert!(consumable.header_extensions.iter().all(|ext| ext.id != 2 && ext.id != 3));
        assert!(consumable.header_extensions.iter().any(|ext| ext.uri == TRANSPORT_CC_URI));

        assert_eq!(consumable.rtcp.cname.as_deref(), Some("producer-cname"));
        assert_eq!(consumable.rtcp.mux, Some(true));
        assert!(consumable.rtcp.reduced_size);
    }

    #[test]
    fn consumable_needs_a_mapping_per_encoding() {
        let caps = router_caps();
        let params = vp8_producer(json!([{"ssrc": 1}, {"ssrc": 2}]));
        let mut mapping = get_producer_rtp_parameters_mapping(&params, &caps).unwrap();
        mapping.encodings.pop();
        assert_eq!(
            get_consumable_rtp_parameters(MediaKind::Video, &params, &caps, &mapping),
            Err(OrtcError::MissingEncodingMapping { index: 1 })
        );
    }

    #[test]
    fn consumer_parameters_for_simulcast_producer() {
        let consumable = consumable_vp8(json!([
            {"rid": "r0", "maxBitrate": 100000, "scalabilityMode": "L1T3"},
            {"rid": "r1", "maxBitrate": 900000, "scalabilityMode": "L1T3"},
            {"rid": "r2", "maxBitrate": 300000, "scalabilityMode": "L1T3"}
        ]));
        let consumer = get_consumer_rtp_parameters(&consumable, &browser_caps(true), false).unwrap();

        assert_eq!(consumer.codecs.len(), 2);
        let encoding = &consumer.encodings[0];
        assert_eq!(consumer.encodings.len(), 1);
        let ssrc = encoding.ssrc.unwrap();
        assert_eq!(encoding.rtx, Some(RtxStream { ssrc: ssrc + 1 }));
        assert_eq!(encoding.scalability_mode.as_deref(), Some("S3T3"));
        assert_eq!(encoding.max_bitrate, Some(900000));

        // transport-cc negotiated: REMB goes away, transport-cc stays.
        let feedback: Vec<&str> = consumer.codecs[0]
            .rtcp_feedback
            .iter()
            .map(|fb| fb.kind.as_str())
            .collect();
        assert_eq!(feedback, vec!["nack", "transport-cc"]);
        assert_eq!(consumer.header_extensions.len(), 3);
    }

    #[test]
    fn consumer_scalability_mode_only_when_declared() {
        let simulcast = consumable_vp8(json!([{"rid": "r0"}, {"rid": "r1"}]));
        let consumer = get_consumer_rtp_parameters(&simulcast, &browser_caps(true), false).unwrap();
        assert_eq!(consumer.encodings[0].scalability_mode, None);

        let svc = consumable_vp8(json!([{"ssrc": 1111, "scalabilityMode": "L3T3_KEY"}]));
        let consumer = get_consumer_rtp_parameters(&svc, &browser_caps(true), false).unwrap();
        assert_eq!(consumer.encodings[0].scalability_mode.as_deref(), Some("L3T3_KEY"));
    }

    #[test]
    fn consumer_drops_rtx_without_capability() {
        let consumable = consumable_vp8(json!([{"ssrc": 1111}]));
        let consumer =
            get_consumer_rtp_parameters(&consumable, &browser_caps(false), false).unwrap();

        assert_eq!(consumer.codecs.len(), 1);
        assert!(consumer.encodings[0].rtx.is_none());
        let media: Vec<u8> = consumer
            .codecs
            .iter()
            .filter(|c| !c.is_rtx())
            .map(|c| c.payload_type)
            .collect();
        for rtx in consumer.codecs.iter().filter(|c| c.is_rtx()) {
            assert!(media.contains(&rtx.parameters.apt.unwrap()));
        }
    }

    #[test]
    fn feedback_without_transport_cc_extension() {
        let consumable = consumable_vp8(json!([{"ssrc": 1111}]));
        let mut caps = browser_caps(true);
        caps.header_extensions.retain(|ext| ext.uri != TRANSPORT_CC_URI);
        let consumer = get_consumer_rtp_parameters(&consumable, &caps, false).unwrap();
        assert!(consumer.codecs[0].rtcp_feedback.iter().all(|fb| fb.kind != "transport-cc"));
        assert!(consumer.codecs[0].rtcp_feedback.iter().any(|fb| fb.kind == "goog-remb"));

        caps.header_extensions.retain(|ext| ext.uri != ABS_SEND_TIME_URI);
        let consumer = get_consumer_rtp_parameters(&consumable, &caps, false).unwrap();
        assert_eq!(consumer.codecs[0].rtcp_feedback, vec![RtcpFeedback::new("nack", "")]);
    }

    #[test]
    fn consumer_rejected_without_common_codec() {
        let consumable = consumable_vp8(json!([{"ssrc": 1111}]));
        let caps: RtpCapabilities = serde_json::from_value(json!({
            "codecs": [
                {"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2,
                 "preferredPayloadType": 111},
                {"kind": "video", "mimeType": "video/rtx", "clockRate": 90000,
                 "preferredPayloadType": 97, "parameters": {"apt": 96}}
            ]
        }))
        .unwrap();
        assert!(!can_consume(&consumable, &caps));
        assert!(get_consumer_rtp_parameters(&consumable, &caps, false).is_none());
        assert!(can_consume(&consumable, &browser_caps(false)));
    }

    #[test]
    fn pipe_consumer_keeps_consumable_encodings() {
        let consumable = consumable_vp8(json!([{"ssrc": 1}, {"ssrc": 2}]));
        let consumer = get_consumer_rtp_parameters(&consumable, &router_caps(), true).unwrap();
        assert_eq!(consumer.encodings, consumable.encodings);
    }
}
