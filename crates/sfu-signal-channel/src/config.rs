use std::time::Duration;

use sfu_signal_frame::DEFAULT_MAX_PAYLOAD;

/// Channel behavior configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Label used in log fields (for example `worker-0`).
    pub name: String,
    /// How long a request may stay unanswered before it is rejected.
    pub request_timeout: Duration,
    /// Maximum accepted netstring payload.
    pub max_payload_size: usize,
}

impl ChannelConfig {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "channel".to_string(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
