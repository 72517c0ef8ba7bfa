//! WebRTC SFU control plane: worker IPC and client signaling.
//!
//! This facade re-exports the workspace crates under one name.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain sockets shared with worker processes
//! - [`frame`]: netstring framing of worker traffic
//! - [`channel`]: request/response correlation over a framed socket pair
//! - [`rtp`]: RTP capability negotiation and H.264 profile matching
//! - [`server`]: workers, routers, rooms and WebSocket signaling

/// Re-export transport types.
pub mod transport {
    pub use sfu_signal_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sfu_signal_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use sfu_signal_channel::*;
}

/// Re-export RTP negotiation types.
pub mod rtp {
    pub use sfu_signal_rtp::*;
}

/// Re-export server types.
pub mod server {
    pub use sfu_signal_server::*;
}
