use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};

/// Default maximum payload size: 4 MiB, the worker's own message limit.
pub const DEFAULT_MAX_PAYLOAD: usize = 4 * 1024 * 1024;

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 4 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Parse the decimal length prefix starting at `offset`.
///
/// Scanning stops at the `:` delimiter. If the buffer ends before the
/// delimiter, the digits seen so far are returned; [`extract_payload`] then
/// reports the frame as incomplete.
pub fn payload_length(buf: &[u8], offset: usize) -> Result<usize> {
    let mut value: usize = 0;
    let mut digits = 0usize;

    for (i, &byte) in buf.iter().enumerate().skip(offset) {
        if byte == b':' {
            if i == offset {
                return Err(FrameError::MalformedLength {
                    reason: "leading ':'",
                });
            }
            return Ok(value);
        }

        if !byte.is_ascii_digit() {
            return Err(FrameError::MalformedLength {
                reason: "non-digit before ':'",
            });
        }

        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(usize::from(byte - b'0')))
            .ok_or(FrameError::MalformedLength {
                reason: "length overflow",
            })?;
        if value == 0 {
            return Err(FrameError::MalformedLength {
                reason: "leading zero",
            });
        }
        digits += 1;
    }

    if digits == 0 {
        return Err(FrameError::Incomplete);
    }
    Ok(value)
}

/// Total wire size of a frame carrying `payload_len` bytes.
///
/// Fails with [`FrameError::MalformedLength`] when that size does not fit
/// in a `usize`.
pub fn frame_length(payload_len: usize) -> Result<usize> {
    let mut digits: usize = 1;
    let mut rest = payload_len / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    payload_len
        .checked_add(digits + 2)
        .ok_or(FrameError::MalformedLength {
            reason: "length overflow",
        })
}

/// Borrow the payload of the frame starting at `offset`.
///
/// Returns [`FrameError::Incomplete`] when the buffer does not yet hold the
/// whole frame. Never consumes anything, so it can be retried as the buffer
/// grows.
pub fn extract_payload(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let len = payload_length(buf, offset)?;
    let total = frame_length(len)?;

    if buf.len().saturating_sub(offset) < total {
        return Err(FrameError::Incomplete);
    }

    let start = offset + total - len - 1;
    if buf[start + len] != b',' {
        return Err(FrameError::MissingTerminator);
    }

    Ok((&buf[start..start + len], len))
}

/// Encode `payload` as a netstring into `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────────┬─────┬──────────────────┬─────┐
/// │ decimal length │ ':' │ payload          │ ',' │
/// └────────────────┴─────┴──────────────────┴─────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    let prefix = payload.len().to_string();
    dst.reserve(frame_length(payload.len())?);
    dst.put_slice(prefix.as_bytes());
    dst.put_u8(b':');
    dst.put_slice(payload);
    dst.put_u8(b',');
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer; the unconsumed
/// tail stays in place for the next call.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    let len = match payload_length(src, 0) {
        Ok(len) => len,
        Err(FrameError::Incomplete) => return Ok(None),
        Err(err) => return Err(err),
    };

    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    match extract_payload(src, 0) {
        Ok(_) => {}
        Err(FrameError::Incomplete) => return Ok(None),
        Err(err) => return Err(err),
    }

    let total = frame_length(len)?;
    let mut frame = src.split_to(total);
    frame.advance(total - len - 1);
    frame.truncate(len);
    Ok(Some(frame.freeze()))
}

/// `tokio_util` codec for netstring frames.
#[derive(Debug, Clone, Default)]
pub struct NetstringCodec {
    config: FrameConfig,
}

impl NetstringCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for NetstringCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, self.config.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for NetstringCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed<T>(result: Result<T>) -> bool {
        matches!(result, Err(FrameError::MalformedLength { .. }))
    }

    #[test]
    fn test_payload_length_edge_cases() {
        assert_eq!(payload_length(b"30:", 0).unwrap(), 30);
        assert!(matches!(payload_length(b"", 0), Err(FrameError::Incomplete)));
        assert!(malformed(payload_length(b":", 0)));
        assert!(malformed(payload_length(b"3;", 0)));
        assert!(malformed(payload_length(b"030:", 0)));
        assert!(malformed(payload_length(b"0:", 0)));
        assert_eq!(payload_length(b"xxx30", 3).unwrap(), 30);
    }

    #[test]
    fn test_payload_length_overflow() {
        let digits = "9".repeat(64);
        assert!(malformed(payload_length(digits.as_bytes(), 0)));
    }

    #[test]
    fn test_frame_length() {
        assert_eq!(frame_length(5).unwrap(), 8);
        assert_eq!(frame_length(9).unwrap(), 12);
        assert_eq!(frame_length(10).unwrap(), 14);
        assert_eq!(frame_length(123).unwrap(), 128);
    }

    #[test]
    fn test_maximal_declared_length_is_malformed() {
        let prefix = format!("{}:", usize::MAX);
        assert!(malformed(frame_length(usize::MAX)));
        assert!(malformed(extract_payload(prefix.as_bytes(), 0)));

        let mut buf = BytesMut::from(prefix.as_bytes());
        assert!(malformed(decode_frame(&mut buf, usize::MAX)));
    }

    #[test]
    fn test_encode_extract_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = br#"{"id":1,"method":"worker.dump"}"#;

        encode_frame(payload, &mut buf).unwrap();
        assert_eq!(buf.len(), frame_length(payload.len()).unwrap());
        assert!(buf.starts_with(b"31:"));
        assert!(buf.ends_with(b","));

        let (extracted, len) = extract_payload(&buf, 0).unwrap();
        assert_eq!(extracted, payload);
        assert_eq!(len, payload.len());
    }

    #[test]
    fn test_encode_rejects_empty_payload() {
        let mut buf = BytesMut::new();
        let err = encode_frame(b"", &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::EmptyPayload));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_at_offset_does_not_consume() {
        let mut buf = BytesMut::from(&b"garbage"[..]);
        encode_frame(b"hello", &mut buf).unwrap();

        for _ in 0..2 {
            let (payload, len) = extract_payload(&buf, 7).unwrap();
            assert_eq!(payload, b"hello");
            assert_eq!(len, 5);
        }
    }

    #[test]
    fn test_extract_missing_terminator() {
        let result = extract_payload(b"5:hello;", 0);
        assert!(matches!(result, Err(FrameError::MissingTerminator)));
    }

    #[test]
    fn test_split_at_every_boundary() {
        let mut whole = BytesMut::new();
        encode_frame(b"{\"event\":\"running\"}", &mut whole).unwrap();

        for split in 0..whole.len() {
            let mut buf = BytesMut::from(&whole[..split]);
            assert!(
                decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
                    .unwrap()
                    .is_none(),
                "split at {split} must be incomplete"
            );
            buf.extend_from_slice(&whole[split..]);
            let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
                .unwrap()
                .unwrap();
            assert_eq!(frame.as_ref(), b"{\"event\":\"running\"}");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_multiple_frames_keep_tail() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();
        buf.extend_from_slice(b"12:partial");

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.as_ref(), b"first");
        assert_eq!(f2.as_ref(), b"second");

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.as_ref(), b"12:partial");
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::from(&b"33554432:"[..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_decode_malformed_prefix() {
        let mut buf = BytesMut::from(&b"0:,"[..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::MalformedLength { .. })));
    }

    #[test]
    fn test_codec_decode_eof_with_leftover() {
        let mut codec = NetstringCodec::new();
        let mut buf = BytesMut::from(&b"5:hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn test_codec_encoder_enforces_max() {
        let mut codec = NetstringCodec::with_config(FrameConfig {
            max_payload_size: 4,
        });
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Bytes::from_static(b"too long"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, max: 4 }));

        codec.encode(Bytes::from_static(b"ok"), &mut dst).unwrap();
        assert_eq!(dst.as_ref(), b"2:ok,");
    }

    #[tokio::test]
    async fn test_framed_stream_over_duplex() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let (client, server) = tokio::io::duplex(16);
        let mut writer = FramedWrite::new(client, NetstringCodec::new());
        let mut reader = FramedRead::new(server, NetstringCodec::new());

        let send = tokio::spawn(async move {
            writer
                .send(Bytes::from_static(b"{\"id\":1,\"accepted\":true}"))
                .await
                .unwrap();
            writer
                .send(Bytes::from_static(b"{\"id\":2,\"accepted\":true}"))
                .await
                .unwrap();
        });

        let first = reader.next().await.unwrap().unwrap();
        let second = reader.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), b"{\"id\":1,\"accepted\":true}");
        assert_eq!(second.as_ref(), b"{\"id\":2,\"accepted\":true}");
        send.await.unwrap();
    }
}
