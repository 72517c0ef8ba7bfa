use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::internal::lock;
use crate::room::{Room, RoomHandle};
use crate::signaling::{handshake, run_connection, SignalingPeer};
use crate::worker::{Worker, WorkerSettings};

const RESPAWN_ATTEMPTS: u32 = 5;
const RESPAWN_DELAY: Duration = Duration::from_secs(1);

/// Lifecycle events the server reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A worker process died on its own.
    WorkerExit { seq: usize, pid: u32 },
    /// A room task stopped after its last peer left.
    RoomClosed { room_id: String },
}

/// The signaling server: a worker pool plus the rooms placed on it.
///
/// Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    settings: WorkerSettings,
    workers: Mutex<Vec<Option<Worker>>>,
    next_worker: AtomicUsize,
    rooms: tokio::sync::Mutex<HashMap<String, RoomHandle>>,
    events: mpsc::UnboundedSender<ServerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerEvent>>>,
    next_conn_id: AtomicU64,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_workers(config, Vec::new())
    }

    /// Server over workers that are already running.
    pub fn with_workers(config: ServerConfig, workers: Vec<Worker>) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let settings = WorkerSettings::from_config(&config);
        Self {
            inner: Arc::new(ServerInner {
                config,
                settings,
                workers: Mutex::new(workers.into_iter().map(Some).collect()),
                next_worker: AtomicUsize::new(0),
                rooms: tokio::sync::Mutex::new(HashMap::new()),
                events,
                events_rx: Mutex::new(Some(events_rx)),
                next_conn_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Start `numWorkers` workers and the task that supervises them.
    pub async fn run_workers(&self) -> Result<()> {
        let count = self.inner.config.mediasoup.num_workers;
        for seq in 0..count {
            let worker = Worker::spawn(&self.inner.settings, seq, self.inner.events.clone()).await?;
            lock(&self.inner.workers).push(Some(worker));
        }
        info!(count, "workers running");
        self.start_supervisor();
        Ok(())
    }

    /// Start handling [`ServerEvent`]s. Only the first call has an effect.
    pub fn start_supervisor(&self) {
        let Some(mut events) = lock(&self.inner.events_rx).take() else {
            return;
        };
        let server = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                server.handle_event(event).await;
            }
        });
    }

    async fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::WorkerExit { seq, pid } => {
                warn!(seq, pid, "worker died, respawning");
                if let Some(slot) = lock(&self.inner.workers).get_mut(seq) {
                    *slot = None;
                }
                self.respawn(seq).await;
            }
            ServerEvent::RoomClosed { room_id } => {
                let mut rooms = self.inner.rooms.lock().await;
                if rooms.get(&room_id).is_some_and(RoomHandle::is_closed) {
                    rooms.remove(&room_id);
                    debug!(room_id = %room_id, "room removed");
                }
            }
        }
    }

    async fn respawn(&self, seq: usize) {
        for attempt in 1..=RESPAWN_ATTEMPTS {
            match Worker::spawn(&self.inner.settings, seq, self.inner.events.clone()).await {
                Ok(worker) => {
                    info!(seq, pid = worker.pid(), "worker respawned");
                    if let Some(slot) = lock(&self.inner.workers).get_mut(seq) {
                        *slot = Some(worker);
                    }
                    return;
                }
                Err(err) => {
                    error!(seq, attempt, error = %err, "worker respawn failed");
                    tokio::time::sleep(RESPAWN_DELAY).await;
                }
            }
        }
        error!(seq, "giving up on worker slot");
    }

    /// Next live worker, round-robin.
    pub fn pick_worker(&self) -> Result<Worker> {
        let workers = lock(&self.inner.workers);
        let count = workers.len();
        for _ in 0..count {
            let index = self.inner.next_worker.fetch_add(1, Ordering::SeqCst) % count;
            if let Some(worker) = workers[index].as_ref().filter(|w| !w.closed()) {
                return Ok(worker.clone());
            }
        }
        Err(ServerError::Spawn("no worker available".into()))
    }

    /// Room `room_id`, created on a worker if it does not exist yet.
    pub async fn get_or_create_room(&self, room_id: &str) -> Result<RoomHandle> {
        let mut rooms = self.inner.rooms.lock().await;
        if let Some(room) = rooms.get(room_id).filter(|room| !room.is_closed()) {
            return Ok(room.clone());
        }

        let worker = self.pick_worker()?;
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let media = &self.inner.config.mediasoup;
        let router = worker
            .create_router(&media.router_options.media_codecs, media_tx)
            .await?;
        let room = Room::spawn(
            room_id,
            router,
            media_rx,
            media.web_rtc_transport_options.clone(),
            self.inner.events.clone(),
        );
        info!(room_id, worker = worker.seq(), "room created");
        rooms.insert(room_id.to_string(), room.clone());
        Ok(room)
    }

    pub async fn room_ids(&self) -> Vec<String> {
        self.inner.rooms.lock().await.keys().cloned().collect()
    }

    /// Run one WebSocket connection to completion.
    pub async fn handle_connection<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (ws, query) = handshake(stream).await?;
        let conn_id = self.inner.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let (peer, outbound) =
            SignalingPeer::new(&query.peer_id, conn_id, self.inner.config.request_timeout());
        info!(room_id = %query.room_id, peer_id = %query.peer_id, conn_id, "peer connecting");

        // A room that is shutting down refuses the peer; the retry gets a
        // fresh one.
        for _ in 0..2 {
            let room = self.get_or_create_room(&query.room_id).await?;
            if room.connect(peer.clone()) {
                run_connection(ws, peer, outbound, room.events()).await;
                return Ok(());
            }
        }
        peer.close();
        Err(ServerError::Signaling(format!(
            "room {} unavailable",
            query.room_id
        )))
    }

    /// Accept WebSocket connections until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream).await {
                            debug!(%addr, error = %err, "connection failed");
                        }
                    });
                }
                () = &mut shutdown => break,
            }
        }
        info!("shutting down");
        self.close();
        Ok(())
    }

    /// Stop every worker.
    pub fn close(&self) {
        for worker in lock(&self.inner.workers).iter().flatten() {
            worker.close();
        }
    }

    /// Start workers, listen on the configured address, and serve until
    /// ctrl-c.
    pub async fn run(config: ServerConfig) -> Result<()> {
        let addr = config.listen_addr()?;
        let server = Server::new(config);
        server.run_workers().await?;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "signaling server listening");
        server
            .serve(listener, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(error = %err, "cannot listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            })
            .await
    }
}
