//! Media worker process supervision.
//!
//! A worker is a separate process. The server binds four Unix sockets for it
//! (control and payload, one per direction), starts the process with their
//! paths on the command line, and waits for the worker to connect and report
//! `running`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sfu_signal_channel::{Channel, ChannelConfig, ChannelEvent, PayloadChannel};
use sfu_signal_rtp::{generate_router_rtp_capabilities, RtpCodecCapability};
use sfu_signal_transport::UnixDomainSocket;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ServerConfig, TlsConfig};
use crate::error::{Result, ServerError};
use crate::internal::{lock, Internal};
use crate::notification::{MediaEvent, NotificationTarget, TargetListener};
use crate::router::Router;
use crate::server::ServerEvent;

/// Everything needed to start one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub worker_path: PathBuf,
    pub unix_path: PathBuf,
    pub log_level: String,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    pub dtls: Option<TlsConfig>,
    pub request_timeout: Duration,
    pub startup_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        let media = &config.mediasoup;
        Self {
            worker_path: media.worker_path.clone(),
            unix_path: media.unix_path.clone(),
            log_level: media.worker_settings.log_level.clone(),
            rtc_min_port: media.worker_settings.rtc_min_port,
            rtc_max_port: media.worker_settings.rtc_max_port,
            dtls: config.https.tls.clone(),
            request_timeout: config.request_timeout(),
            startup_timeout: config.startup_timeout(),
        }
    }

    /// Command-line flags for worker `seq` using the given socket paths.
    pub fn args(&self, seq: usize, sockets: &WorkerSockets) -> Vec<String> {
        let mut args = vec![
            format!("--logLevel={}", self.log_level),
            format!("--rtcMinPort={}", self.rtc_min_port),
            format!("--rtcMaxPort={}", self.rtc_max_port),
        ];
        if let Some(dtls) = &self.dtls {
            args.push(format!("--dtlsCertificateFile={}", dtls.cert.display()));
            args.push(format!("--dtlsPrivateKeyFile={}", dtls.key.display()));
        }
        args.push(format!("--seq={seq}"));
        args.push(format!("--channelProducer={}", sockets.producer.display()));
        args.push(format!("--channelConsumer={}", sockets.consumer.display()));
        args.push(format!(
            "--channelPayloadProducer={}",
            sockets.payload_producer.display()
        ));
        args.push(format!(
            "--channelPayloadConsumer={}",
            sockets.payload_consumer.display()
        ));
        args
    }
}

/// Socket paths of one worker. The worker writes to the producer sockets
/// and reads from the consumer sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSockets {
    pub producer: PathBuf,
    pub consumer: PathBuf,
    pub payload_producer: PathBuf,
    pub payload_consumer: PathBuf,
}

impl WorkerSockets {
    pub fn new(dir: &Path, seq: usize) -> Self {
        Self {
            producer: dir.join(format!("channelProducer_{seq}")),
            consumer: dir.join(format!("channelConsumer_{seq}")),
            payload_producer: dir.join(format!("channelPayloadProducer_{seq}")),
            payload_consumer: dir.join(format!("channelPayloadConsumer_{seq}")),
        }
    }
}

/// Handle to a running worker. Cloning yields another handle to the same
/// process.
#[derive(Debug, Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

#[derive(Debug)]
struct WorkerInner {
    seq: usize,
    pid: u32,
    channel: Channel,
    payload_channel: PayloadChannel,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl Worker {
    /// Start worker `seq` and wait until it reports `running`.
    ///
    /// `events` receives [`ServerEvent::WorkerExit`] if the process dies
    /// without [`Worker::close`] having been called.
    pub async fn spawn(
        settings: &WorkerSettings,
        seq: usize,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<Worker> {
        std::fs::create_dir_all(&settings.unix_path)?;
        let paths = WorkerSockets::new(&settings.unix_path, seq);
        let producer = UnixDomainSocket::bind(&paths.producer)?;
        let consumer = UnixDomainSocket::bind(&paths.consumer)?;
        let payload_producer = UnixDomainSocket::bind(&paths.payload_producer)?;
        let payload_consumer = UnixDomainSocket::bind(&paths.payload_consumer)?;

        let mut child = Command::new(&settings.worker_path)
            .args(settings.args(seq, &paths))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ServerError::Spawn(format!("{}: {e}", settings.worker_path.display()))
            })?;
        let pid = child.id().unwrap_or_default();
        info!(seq, pid, path = %settings.worker_path.display(), "worker process started");

        // On any early return the child is killed on drop.
        let timeout = settings.startup_timeout;
        let producer = producer.accept_timeout(timeout).await?;
        if let Some((_, _, Some(peer_pid))) = producer.peer_credentials() {
            if pid != 0 && u32::try_from(peer_pid).ok() != Some(pid) {
                warn!(seq, pid, peer_pid, "worker socket connected by another process");
            }
        }
        let consumer = consumer.accept_timeout(timeout).await?;
        let payload_producer = payload_producer.accept_timeout(timeout).await?;
        let payload_consumer = payload_consumer.accept_timeout(timeout).await?;

        let (owner_tx, mut owner_rx) = mpsc::unbounded_channel();
        let channel = Channel::new(
            producer,
            consumer,
            ChannelConfig::new(format!("worker-{seq}"))
                .with_request_timeout(settings.request_timeout),
            owner_tx.clone(),
        );
        let payload_channel = PayloadChannel::new(
            payload_producer,
            payload_consumer,
            ChannelConfig::new(format!("worker-{seq}-payload"))
                .with_request_timeout(settings.request_timeout),
            owner_tx,
        );

        if let Err(err) = wait_running(&mut owner_rx, timeout).await {
            channel.close();
            payload_channel.close();
            return Err(err);
        }
        info!(seq, pid, "worker running");
        tokio::spawn(drain_owner_events(seq, owner_rx));

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(monitor_exit(
            child,
            seq,
            pid,
            kill_rx,
            channel.clone(),
            payload_channel.clone(),
            events,
        ));

        Ok(Worker {
            inner: Arc::new(WorkerInner {
                seq,
                pid,
                channel,
                payload_channel,
                kill: Mutex::new(Some(kill_tx)),
            }),
        })
    }

    /// Wrap channels that are already connected to a worker.
    pub fn from_channels(seq: usize, channel: Channel, payload_channel: PayloadChannel) -> Self {
        Worker {
            inner: Arc::new(WorkerInner {
                seq,
                pid: 0,
                channel,
                payload_channel,
                kill: Mutex::new(None),
            }),
        }
    }

    pub fn seq(&self) -> usize {
        self.inner.seq
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    pub fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    pub fn payload_channel(&self) -> &PayloadChannel {
        &self.inner.payload_channel
    }

    pub fn closed(&self) -> bool {
        self.inner.channel.is_closed()
    }

    /// Create a router whose notifications are delivered on `events`.
    pub async fn create_router(
        &self,
        media_codecs: &[RtpCodecCapability],
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Router> {
        let rtp_capabilities = generate_router_rtp_capabilities(media_codecs)?;
        let router_id = Uuid::new_v4().to_string();
        self.inner.channel.add_listener(
            router_id.clone(),
            Arc::new(TargetListener::new(
                NotificationTarget::Router(router_id.clone()),
                events.clone(),
            )),
        );
        let created = self
            .inner
            .channel
            .request("worker.createRouter", &Internal::router(&router_id), &())
            .await;
        if let Err(err) = created {
            self.inner.channel.remove_listener(&router_id);
            return Err(err.into());
        }
        info!(seq = self.inner.seq, router_id = %router_id, "router created");
        Ok(Router::new(
            router_id,
            self.inner.channel.clone(),
            self.inner.payload_channel.clone(),
            rtp_capabilities,
            events,
        ))
    }

    /// Stop the process. No exit event is reported for it.
    pub fn close(&self) {
        self.inner.channel.close();
        self.inner.payload_channel.close();
        if let Some(kill) = lock(&self.inner.kill).take() {
            let _ = kill.send(());
        }
    }
}

async fn wait_running(
    owner_rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    timeout: Duration,
) -> Result<()> {
    let wait = async {
        while let Some(event) = owner_rx.recv().await {
            match event {
                ChannelEvent::Notification { event, .. } if event == "running" => return Ok(()),
                ChannelEvent::Notification { event, .. } => {
                    debug!(event = %event, "notification before running");
                }
                ChannelEvent::Closed => break,
            }
        }
        Err(ServerError::Spawn(
            "worker channel closed before running".into(),
        ))
    };
    tokio::time::timeout(timeout, wait).await.map_err(|_| {
        ServerError::Spawn(format!("worker not running after {timeout:?}"))
    })?
}

async fn drain_owner_events(seq: usize, mut owner_rx: mpsc::UnboundedReceiver<ChannelEvent>) {
    while let Some(event) = owner_rx.recv().await {
        match event {
            ChannelEvent::Notification {
                target_id, event, ..
            } => {
                debug!(seq, ?target_id, event = %event, "notification for unknown target");
            }
            ChannelEvent::Closed => debug!(seq, "worker channel closed"),
        }
    }
}

async fn monitor_exit(
    mut child: Child,
    seq: usize,
    pid: u32,
    kill_rx: oneshot::Receiver<()>,
    channel: Channel,
    payload_channel: PayloadChannel,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let (status, killed) = tokio::select! {
        status = child.wait() => (status, false),
        _ = kill_rx => {
            if let Err(err) = child.start_kill() {
                warn!(seq, pid, error = %err, "failed to kill worker");
            }
            (child.wait().await, true)
        }
    };
    channel.close();
    payload_channel.close();
    match status {
        Ok(status) if killed => info!(seq, pid, %status, "worker stopped"),
        Ok(status) => error!(seq, pid, %status, "worker exited"),
        Err(err) => error!(seq, pid, error = %err, "failed to wait for worker"),
    }
    if !killed {
        let _ = events.send(ServerEvent::WorkerExit { seq, pid });
    }
}
