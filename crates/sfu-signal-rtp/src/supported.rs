//! Codecs and header extensions the media worker can handle.
//!
//! Router capabilities are always a subset of this table: configured codecs
//! that do not match an entry here are dropped.

use crate::rtp_parameters::{
    CodecCapability, CodecParameters, HeaderExtensionDirection, MediaKind, RtcpFeedback,
    RtpCapabilities, RtpCodecCapability, RtpHeaderExtension,
};

fn audio(mime_type: &str, clock_rate: u32) -> RtpCodecCapability {
    RtpCodecCapability {
        kind: MediaKind::Audio,
        mime_type: mime_type.to_string(),
        preferred_payload_type: None,
        clock_rate,
        channels: None,
        parameters: CodecParameters::default(),
        rtcp_feedback: vec![RtcpFeedback::new("transport-cc", "")],
    }
}

fn video(mime_type: &str, parameters: CodecParameters) -> RtpCodecCapability {
    RtpCodecCapability {
        kind: MediaKind::Video,
        mime_type: mime_type.to_string(),
        preferred_payload_type: None,
        clock_rate: 90000,
        channels: None,
        parameters,
        rtcp_feedback: vec![
            RtcpFeedback::new("nack", ""),
            RtcpFeedback::new("nack", "pli"),
            RtcpFeedback::new("ccm", "fir"),
            RtcpFeedback::new("goog-remb", ""),
            RtcpFeedback::new("transport-cc", ""),
        ],
    }
}

fn packetized(mode: u8) -> CodecParameters {
    CodecParameters {
        packetization_mode: Some(mode),
        level_asymmetry_allowed: Some(true),
        ..CodecParameters::default()
    }
}

fn static_pt(mut codec: RtpCodecCapability, payload_type: u8) -> RtpCodecCapability {
    codec.preferred_payload_type = Some(payload_type);
    codec
}

fn no_feedback(mut codec: RtpCodecCapability) -> RtpCodecCapability {
    codec.rtcp_feedback.clear();
    codec
}

fn extension(
    kind: MediaKind,
    uri: &str,
    preferred_id: u8,
    direction: HeaderExtensionDirection,
) -> RtpHeaderExtension {
    RtpHeaderExtension {
        kind,
        uri: uri.to_string(),
        preferred_id,
        preferred_encrypt: false,
        direction,
    }
}

pub fn supported_rtp_capabilities() -> RtpCapabilities {
    use HeaderExtensionDirection::{Recvonly, Sendrecv};
    use MediaKind::{Audio, Video};

    let mut opus = audio("audio/opus", 48000);
    opus.channels = Some(2);

    let codecs = vec![
        opus,
        static_pt(audio("audio/PCMU", 8000), 0),
        static_pt(audio("audio/PCMA", 8000), 8),
        audio("audio/ISAC", 32000),
        audio("audio/ISAC", 16000),
        static_pt(audio("audio/G722", 8000), 9),
        audio("audio/iLBC", 8000),
        audio("audio/SILK", 24000),
        audio("audio/SILK", 16000),
        audio("audio/SILK", 12000),
        audio("audio/SILK", 8000),
        no_feedback(static_pt(audio("audio/CN", 32000), 13)),
        no_feedback(static_pt(audio("audio/CN", 16000), 13)),
        no_feedback(static_pt(audio("audio/CN", 8000), 13)),
        no_feedback(audio("audio/telephone-event", 48000)),
        no_feedback(audio("audio/telephone-event", 32000)),
        no_feedback(audio("audio/telephone-event", 16000)),
        no_feedback(audio("audio/telephone-event", 8000)),
        video("video/VP8", CodecParameters::default()),
        video("video/VP9", CodecParameters::default()),
        video("video/H264", packetized(1)),
        video("video/H264", packetized(0)),
        video("video/H265", packetized(1)),
        video("video/H265", packetized(0)),
    ];

    const MID: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
    const ABS_SEND_TIME: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
    const TRANSPORT_CC: &str =
        "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

    let header_extensions = vec![
        extension(Audio, MID, 1, Sendrecv),
        extension(Video, MID, 1, Sendrecv),
        extension(Video, "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id", 2, Recvonly),
        extension(
            Video,
            "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id",
            3,
            Recvonly,
        ),
        extension(Audio, ABS_SEND_TIME, 4, Sendrecv),
        extension(Video, ABS_SEND_TIME, 4, Sendrecv),
        // Audio only receives transport-wide cc.
        extension(Audio, TRANSPORT_CC, 5, Recvonly),
        extension(Video, TRANSPORT_CC, 5, Sendrecv),
        extension(
            Video,
            "http://tools.ietf.org/html/draft-ietf-avtext-framemarking-07",
            6,
            Sendrecv,
        ),
        extension(Video, "urn:ietf:params:rtp-hdrext:framemarking", 7, Sendrecv),
        extension(Audio, "urn:ietf:params:rtp-hdrext:ssrc-audio-level", 10, Sendrecv),
        extension(Video, "urn:3gpp:video-orientation", 11, Sendrecv),
        extension(Video, "urn:ietf:params:rtp-hdrext:toffset", 12, Sendrecv),
    ];

    RtpCapabilities {
        codecs: codecs.into_iter().map(CodecCapability::Media).collect(),
        header_extensions,
        fec_mechanisms: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_rtx_entries() {
        let caps = supported_rtp_capabilities();
        assert_eq!(caps.rtx_codecs().count(), 0);
        assert_eq!(caps.media_codecs().count(), 24);
    }

    #[test]
    fn static_payload_types_are_kept() {
        let caps = supported_rtp_capabilities();
        let pcmu = caps
            .media_codecs()
            .find(|c| c.mime_type == "audio/PCMU")
            .unwrap();
        assert_eq!(pcmu.preferred_payload_type, Some(0));
        let cn: Vec<_> = caps
            .media_codecs()
            .filter(|c| c.mime_type == "audio/CN")
            .collect();
        assert_eq!(cn.len(), 3);
        assert!(cn.iter().all(|c| c.rtcp_feedback.is_empty()));
    }

    #[test]
    fn transport_cc_extension_is_receive_only_for_audio() {
        let caps = supported_rtp_capabilities();
        let audio = caps
            .header_extensions
            .iter()
            .find(|e| e.kind == MediaKind::Audio && e.preferred_id == 5)
            .unwrap();
        assert_eq!(audio.direction, HeaderExtensionDirection::Recvonly);
    }
}
