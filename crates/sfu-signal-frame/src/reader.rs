use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{decode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete netstring payloads from any blocking `Read` stream.
///
/// Used for offline inspection of captured worker traffic; the live
/// channels read through [`crate::NetstringCodec`].
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete payload (blocking).
    ///
    /// Returns `Ok(None)` on a clean EOF between frames and
    /// `Err(FrameError::ConnectionClosed)` on EOF inside a frame.
    pub fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(Some(frame));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::codec::encode_frame;

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(b"hello", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"hello");
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn read_multiple_frames_as_iterator() {
        let mut wire = BytesMut::new();
        encode_frame(b"one", &mut wire).unwrap();
        encode_frame(b"two", &mut wire).unwrap();
        encode_frame(b"three", &mut wire).unwrap();

        let reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frames: Vec<Bytes> = reader.map(|frame| frame.unwrap()).collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].as_ref(), b"three");
    }

    #[test]
    fn read_frame_with_large_payload() {
        let payload = vec![b'a'; 64 * 1024];
        let mut wire = BytesMut::new();
        encode_frame(&payload, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(b"slow", &mut wire).unwrap();

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"16:only-part".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn malformed_prefix_in_stream() {
        let mut reader = FrameReader::new(Cursor::new(b"abc:def,".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::MalformedLength { .. }));
    }

    #[test]
    fn retries_interrupted_reads() {
        let mut wire = BytesMut::new();
        encode_frame(b"retry", &mut wire).unwrap();

        let reader = InterruptOnceReader {
            interrupted: Arc::new(Mutex::new(false)),
            inner: Cursor::new(wire.to_vec()),
        };
        let mut reader = FrameReader::new(reader);
        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"retry");
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptOnceReader {
        interrupted: Arc<Mutex<bool>>,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptOnceReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut interrupted = self.interrupted.lock().unwrap();
            if !*interrupted {
                *interrupted = true;
                return Err(std::io::Error::new(ErrorKind::Interrupted, "interrupted"));
            }
            self.inner.read(buf)
        }
    }
}
