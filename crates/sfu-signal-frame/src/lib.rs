//! Netstring message framing for media worker IPC.
//!
//! Every message on a worker socket is framed as `<len>:<payload>,` where
//! `len` is the decimal byte length of the payload. Frames are
//! self-delimiting, so a reader can parse them incrementally from a buffer
//! split at arbitrary points.
//!
//! The pure functions in [`codec`] are the building blocks; [`NetstringCodec`]
//! plugs them into `tokio_util::codec` and [`FrameReader`] into blocking
//! `Read` streams.

pub mod codec;
pub mod error;
pub mod reader;

pub use codec::{
    decode_frame, encode_frame, extract_payload, frame_length, payload_length, FrameConfig,
    NetstringCodec, DEFAULT_MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
