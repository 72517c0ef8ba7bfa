//! Server configuration, loaded from a JSON file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sfu_signal_rtp::RtpCodecCapability;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub https: HttpsConfig,
    pub mediasoup: MediaConfig,
}

/// Where the signaling endpoint listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    #[serde(default = "default_listen_ip")]
    pub listen_ip: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Certificate and key, also handed to workers for DTLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            listen_ip: default_listen_ip(),
            listen_port: default_listen_port(),
            tls: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Worker pool and media defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    pub worker_path: PathBuf,
    /// Directory holding the per-worker IPC sockets.
    #[serde(default = "default_unix_path")]
    pub unix_path: PathBuf,
    #[serde(default)]
    pub worker_settings: WorkerSettingsConfig,
    pub router_options: RouterOptions,
    #[serde(default)]
    pub web_rtc_transport_options: WebRtcTransportConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSettingsConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_rtc_min_port")]
    pub rtc_min_port: u16,
    #[serde(default = "default_rtc_max_port")]
    pub rtc_max_port: u16,
}

impl Default for WorkerSettingsConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            rtc_min_port: default_rtc_min_port(),
            rtc_max_port: default_rtc_max_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterOptions {
    pub media_codecs: Vec<RtpCodecCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenIp {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announced_ip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcTransportConfig {
    #[serde(default)]
    pub listen_ips: Vec<ListenIp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_available_outgoing_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_available_outgoing_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sctp_message_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_incoming_bitrate: Option<u32>,
}

fn default_listen_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    4443
}

fn default_num_workers() -> usize {
    1
}

fn default_unix_path() -> PathBuf {
    PathBuf::from("/tmp/sfu")
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_rtc_min_port() -> u16 {
    40000
}

fn default_rtc_max_port() -> u16 {
    49999
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_startup_timeout_ms() -> u64 {
    10_000
}

impl ServerConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: ServerConfig = serde_json::from_str(text)
            .map_err(|e| ServerError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let media = &self.mediasoup;
        if media.num_workers == 0 {
            return Err(ServerError::Config("numWorkers must be at least 1".into()));
        }
        let ports = &media.worker_settings;
        if ports.rtc_min_port > ports.rtc_max_port {
            return Err(ServerError::Config(format!(
                "rtcMinPort {} is greater than rtcMaxPort {}",
                ports.rtc_min_port, ports.rtc_max_port
            )));
        }
        if media.worker_path.as_os_str().is_empty() {
            return Err(ServerError::Config("workerPath is empty".into()));
        }
        if media.unix_path.as_os_str().is_empty() {
            return Err(ServerError::Config("unixPath is empty".into()));
        }
        if media.router_options.media_codecs.is_empty() {
            return Err(ServerError::Config(
                "routerOptions.mediaCodecs is empty".into(),
            ));
        }
        self.listen_addr()?;
        Ok(())
    }

    /// Address of the WebSocket endpoint.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.https.listen_ip, self.https.listen_port);
        addr.parse()
            .map_err(|e| ServerError::Config(format!("invalid listen address {addr}: {e}")))
    }

    /// Replace the configured listen address.
    pub fn set_listen_addr(&mut self, addr: SocketAddr) {
        self.https.listen_ip = addr.ip().to_string();
        self.https.listen_port = addr.port();
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.mediasoup.request_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.mediasoup.startup_timeout_ms)
    }
}
