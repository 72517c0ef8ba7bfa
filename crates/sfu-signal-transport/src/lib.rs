//! Unix domain socket transport for media worker IPC.
//!
//! The signaling server owns the socket paths: it binds one listener per
//! direction and the spawned worker connects to each of them. This is the
//! lowest layer of sfu-signal; framing and request correlation build on the
//! [`IpcStream`] type provided here.

pub mod error;
pub mod stream;
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::IpcStream;
pub use uds::UnixDomainSocket;
