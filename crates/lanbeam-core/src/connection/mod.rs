//! Connection manager for LanBeam.
//!
//! The manager owns the TLS acceptor, the one peer session that may exist
//! at a time and the beacon advertisement. Each established session runs
//! as an actor task that owns the stream writer and the transfer engine;
//! a separate reader task decodes frames and forwards them to the actor in
//! arrival order. Callers observe the session through [`SessionEvent`]s
//! and [`SessionSnapshot`]s and steer it with the async methods on
//! [`ConnectionManager`].
//!
//! ## Session lifecycle
//!
//! ```text
//! Idle ──connect/accept──▶ Connecting ──handshake──▶ Connected
//!   ▲                          │                        │
//!   └──────── failure ─────────┘            disconnect / stream error
//!                                                       ▼
//!                                     Closing ────────▶ Closed
//! ```
//!
//! A host session becomes `Connected` only once the peer's `connect` frame
//! has arrived. A host that already has a session drops further incoming
//! connections, and `connect` fails while any session exists.

mod session;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_rustls::TlsStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use session::{Command, SessionHandle};

use crate::config::{Config, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::crypto::{PinnedCredential, TlsConfig};
use crate::discovery::{self, Broadcaster};
use crate::error::{ConnectFailure, Error, Result};
use crate::file::{FileDescriptor, FileSink, PickedFile};
use crate::history::SessionHistory;
use crate::pairing::PeerAddress;
use crate::protocol::{self, Message};
use crate::transfer::{ReceiverState, SenderState, TransferEvent, DEFAULT_MAX_INCOMING_SIZE};

const EVENT_CAPACITY: usize = 256;

/// Which end of the connection this device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted the connection
    Host,
    /// Opened the connection
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Connection state of the peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session and no attempt in progress
    #[default]
    Idle,
    /// Dialing, or waiting for the TLS handshake or `connect` frame
    Connecting,
    /// Frames flow in both directions
    Connected,
    /// Tearing down
    Closing,
    /// The last session ended
    Closed,
}

/// Point-in-time view of the peer session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Connection state
    pub state: ConnectionState,
    /// Our role, once a session is being set up
    pub role: Option<Role>,
    /// Name the peer announced
    pub peer_name: Option<String>,
    /// Remote socket address
    pub peer_addr: Option<SocketAddr>,
    /// Outgoing side of the transfer engine
    pub sender_state: SenderState,
    /// Incoming side of the transfer engine
    pub receiver_state: ReceiverState,
    /// Bytes served to the peer this session
    pub bytes_sent: u64,
    /// Bytes received from the peer this session
    pub bytes_received: u64,
    /// Sent and received records of this session
    pub history: SessionHistory,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            role: None,
            peer_name: None,
            peer_addr: None,
            sender_state: SenderState::Idle,
            receiver_state: ReceiverState::Idle,
            bytes_sent: 0,
            bytes_received: 0,
            history: SessionHistory::default(),
        }
    }
}

impl SessionSnapshot {
    fn closed() -> Self {
        Self {
            state: ConnectionState::Closed,
            ..Self::default()
        }
    }
}

/// Something that happened to the peer session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session was established
    Connected {
        /// Our role
        role: Role,
        /// Name the peer announced (always known for hosts)
        peer_name: Option<String>,
        /// Remote socket address
        peer_addr: SocketAddr,
    },
    /// Transfer engine progress
    Transfer(TransferEvent),
    /// The session ended; in-flight transfers were discarded
    Disconnected {
        /// Why the session ended
        reason: String,
        /// Final sent and received records
        history: SessionHistory,
    },
}

/// Settings for a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Name sent in the `connect` frame and in beacons
    pub device_name: String,
    /// Chunk size for outgoing files
    pub chunk_size: usize,
    /// Largest incoming file accepted
    pub max_incoming_size: u64,
    /// Time a host waits for the TLS handshake and `connect` frame
    pub handshake_timeout: Duration,
    /// UDP port for beacons
    pub discovery_port: u16,
    /// Beacon destination, `255.255.255.255` when unset
    pub broadcast_target: Option<SocketAddr>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            device_name: "LanBeam Device".to_string(),
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            max_incoming_size: DEFAULT_MAX_INCOMING_SIZE,
            handshake_timeout: Duration::from_secs(10),
            discovery_port: crate::DEFAULT_DISCOVERY_PORT,
            broadcast_target: None,
        }
    }
}

impl From<&Config> for ManagerConfig {
    fn from(config: &Config) -> Self {
        Self {
            device_name: config.general.device_name.clone(),
            chunk_size: config.transfer.chunk_size,
            max_incoming_size: DEFAULT_MAX_INCOMING_SIZE,
            handshake_timeout: config.network.handshake_timeout,
            discovery_port: config.network.discovery_port,
            broadcast_target: config
                .network
                .broadcast_address
                .map(|ip| SocketAddrV4::new(ip, config.network.discovery_port).into()),
        }
    }
}

/// The single session slot.
enum Slot {
    Empty,
    Connecting {
        id: u64,
        cancel: CancellationToken,
    },
    Active(SessionHandle),
}

struct AcceptorHandle {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// A stream that passed the handshake, ready to become a session.
struct Established {
    role: Role,
    peer_name: Option<String>,
    peer_addr: SocketAddr,
    stream: TlsStream<TcpStream>,
}

struct Inner {
    config: ManagerConfig,
    tls: TlsConfig,
    sink: Arc<dyn FileSink>,
    events: broadcast::Sender<SessionEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
    slot: Mutex<Slot>,
    acceptor: Mutex<Option<AcceptorHandle>>,
    advertiser: Mutex<Option<Broadcaster>>,
    root: CancellationToken,
    next_id: AtomicU64,
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn begin_connecting(&self, role: Role) -> Result<(u64, CancellationToken)> {
        let mut slot = self.slot.lock().await;
        if !matches!(*slot, Slot::Empty) {
            return Err(Error::Connection(ConnectFailure::SessionActive));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();
        *slot = Slot::Connecting {
            id,
            cancel: cancel.clone(),
        };

        self.snapshot.send_replace(SessionSnapshot {
            state: ConnectionState::Connecting,
            role: Some(role),
            ..SessionSnapshot::default()
        });

        Ok((id, cancel))
    }

    async fn release_connecting(&self, id: u64) {
        let mut slot = self.slot.lock().await;
        if matches!(&*slot, Slot::Connecting { id: pending, .. } if *pending == id) {
            *slot = Slot::Empty;
            self.snapshot.send_replace(SessionSnapshot::default());
        }
    }

    async fn install(
        self: &Arc<Self>,
        id: u64,
        cancel: CancellationToken,
        established: Established,
    ) -> Result<()> {
        let Established {
            role,
            peer_name,
            peer_addr,
            stream,
        } = established;

        let mut slot = self.slot.lock().await;
        if !matches!(&*slot, Slot::Connecting { id: pending, .. } if *pending == id) {
            tracing::debug!("Dropping stream to {}: attempt was cancelled", peer_addr);
            return Err(Error::Connection(ConnectFailure::Cancelled));
        }

        self.stop_advertising().await;

        self.snapshot.send_replace(SessionSnapshot {
            state: ConnectionState::Connected,
            role: Some(role),
            peer_name: peer_name.clone(),
            peer_addr: Some(peer_addr),
            ..SessionSnapshot::default()
        });
        self.emit(SessionEvent::Connected {
            role,
            peer_name: peer_name.clone(),
            peer_addr,
        });

        *slot = Slot::Active(session::spawn(Arc::clone(self), id, stream, cancel));
        drop(slot);

        tracing::info!(
            "Connected to {} ({}) as {}",
            peer_name.as_deref().unwrap_or("unnamed peer"),
            peer_addr,
            role
        );
        Ok(())
    }

    /// Called by a session actor once its stream is gone.
    async fn finish_session(&self, id: u64, reason: String, history: SessionHistory) {
        let mut slot = self.slot.lock().await;
        let current = matches!(&*slot, Slot::Active(handle) if handle.id == id);
        if current {
            *slot = Slot::Empty;
        }
        if matches!(*slot, Slot::Empty) {
            self.snapshot.send_replace(SessionSnapshot::closed());
        }
        drop(slot);

        self.emit(SessionEvent::Disconnected { reason, history });
    }

    async fn commands(&self) -> Option<mpsc::Sender<Command>> {
        match &*self.slot.lock().await {
            Slot::Active(handle) => Some(handle.commands.clone()),
            _ => None,
        }
    }

    async fn stop_advertising(&self) {
        let advertiser = self.advertiser.lock().await.take();
        if let Some(advertiser) = advertiser {
            advertiser.stop().await;
            tracing::debug!("Stopped advertising");
        }
    }
}

/// Owns the acceptor, the peer session and the beacon advertisement.
///
/// Dropping the manager cancels every task it started.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.inner.config)
            .field("state", &self.inner.snapshot.borrow().state)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create an idle manager.
    ///
    /// Received files are handed to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the chunk size is outside
    /// [`MIN_CHUNK_SIZE`]..=[`MAX_CHUNK_SIZE`], or an error if the TLS
    /// configuration cannot be built from the credential.
    pub fn new(
        config: ManagerConfig,
        credential: &PinnedCredential,
        sink: Arc<dyn FileSink>,
    ) -> Result<Self> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&config.chunk_size) {
            return Err(Error::InvalidConfig {
                key: "chunk_size".to_string(),
                reason: format!(
                    "{} is not between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}",
                    config.chunk_size
                ),
            });
        }

        let tls = TlsConfig::pinned(credential)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot, _) = watch::channel(SessionSnapshot::default());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                tls,
                sink,
                events,
                snapshot,
                slot: Mutex::new(Slot::Empty),
                acceptor: Mutex::new(None),
                advertiser: Mutex::new(None),
                root: CancellationToken::new(),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// The manager's settings.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Receive session events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the session state and counters.
    #[must_use]
    pub fn snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Accept connections on `0.0.0.0:port`. Port `0` picks a free port.
    ///
    /// Calling this while already listening returns the existing address.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound.
    pub async fn listen(&self, port: u16) -> Result<SocketAddr> {
        let mut acceptor = self.inner.acceptor.lock().await;
        if let Some(existing) = acceptor.as_ref() {
            tracing::info!("Already listening on {}", existing.addr);
            return Ok(existing.addr);
        }

        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).await?;
        let addr = listener.local_addr()?;
        let cancel = self.inner.root.child_token();
        let task = tokio::spawn(accept_loop(
            Arc::clone(&self.inner),
            listener,
            cancel.clone(),
        ));

        *acceptor = Some(AcceptorHandle { addr, cancel, task });
        tracing::info!("Listening on {}", addr);
        Ok(addr)
    }

    /// Address the acceptor is bound to.
    pub async fn listening_addr(&self) -> Option<SocketAddr> {
        self.inner.acceptor.lock().await.as_ref().map(|a| a.addr)
    }

    /// Pairing address peers can use to reach the acceptor.
    ///
    /// The host part is this machine's LAN address when it can be
    /// determined.
    pub async fn pairing_address(&self) -> Option<PeerAddress> {
        let addr = self.listening_addr().await?;
        let ip = discovery::local_ip()
            .filter(|ip| !ip.is_unspecified())
            .unwrap_or_else(|| addr.ip());
        Some(PeerAddress::new(
            ip.to_string(),
            addr.port(),
            &self.inner.config.device_name,
        ))
    }

    /// Open a session to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the peer cannot be reached within
    /// `timeout`, the handshake fails, a session already exists or the
    /// attempt is cancelled by [`disconnect`](Self::disconnect).
    pub async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        self.dial(host, port, None, timeout).await
    }

    /// Open a session to a decoded pairing address, recording the
    /// advertised device name as the peer name.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_peer(&self, address: &PeerAddress, timeout: Duration) -> Result<()> {
        self.dial(
            &address.host,
            address.port,
            Some(address.device_name.clone()),
            timeout,
        )
        .await
    }

    async fn dial(
        &self,
        host: &str,
        port: u16,
        peer_name: Option<String>,
        timeout: Duration,
    ) -> Result<()> {
        let (id, cancel) = self.inner.begin_connecting(Role::Client).await?;
        tracing::info!("Connecting to {}:{}", host, port);

        let attempt = tokio::select! {
            () = cancel.cancelled() => Err(Error::Connection(ConnectFailure::Cancelled)),
            result = tokio::time::timeout(timeout, open_client(&self.inner, host, port)) => {
                result.unwrap_or_else(|_| Err(Error::Connection(ConnectFailure::Timeout(timeout))))
            }
        };

        match attempt {
            Ok((stream, peer_addr)) => {
                self.inner
                    .install(
                        id,
                        cancel,
                        Established {
                            role: Role::Client,
                            peer_name,
                            peer_addr,
                            stream,
                        },
                    )
                    .await
            }
            Err(e) => {
                tracing::warn!("Failed to connect to {}:{}: {}", host, port, e);
                self.inner.release_connecting(id).await;
                Err(e)
            }
        }
    }

    /// Write a raw message to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connected session, or
    /// [`Error::ConnectionLost`] if the stream fails.
    pub async fn send(&self, message: Message) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send { message, reply }).await?;
        rx.await
            .map_err(|_| Error::ConnectionLost("session ended".to_string()))?
    }

    /// Offer a file to the peer and return its transfer id.
    ///
    /// The call returns once the offer is written; chunks are served as the
    /// peer requests them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connected session, or
    /// [`Error::TransferBusy`] while another file is being sent.
    pub async fn initiate_send(&self, file: PickedFile) -> Result<Uuid> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::InitiateSend {
            file: FileDescriptor::from(file),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| Error::ConnectionLost("session ended".to_string()))?
    }

    async fn command(&self, command: Command) -> Result<()> {
        let commands = self.inner.commands().await.ok_or(Error::NotConnected)?;
        commands
            .send(command)
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Close the session, discard in-flight transfers and stop advertising.
    ///
    /// Also cancels a `connect` that is still in progress. The acceptor
    /// stays bound. Calling this again is a no-op.
    pub async fn disconnect(&self) {
        self.inner.stop_advertising().await;

        let previous = std::mem::replace(&mut *self.inner.slot.lock().await, Slot::Empty);
        match previous {
            Slot::Empty => {
                self.inner.snapshot.send_if_modified(|s| {
                    if s.state == ConnectionState::Closed {
                        false
                    } else {
                        *s = SessionSnapshot::closed();
                        true
                    }
                });
            }
            Slot::Connecting { cancel, .. } => {
                tracing::info!("Cancelling connection attempt");
                cancel.cancel();
                self.inner.snapshot.send_replace(SessionSnapshot::closed());
            }
            Slot::Active(handle) => {
                self.inner
                    .snapshot
                    .send_modify(|s| s.state = ConnectionState::Closing);
                handle.cancel.cancel();
                if let Err(e) = handle.task.await {
                    tracing::error!("Session task failed: {}", e);
                    self.inner.snapshot.send_replace(SessionSnapshot::closed());
                }
            }
        }
    }

    /// Broadcast this host's pairing address on the discovery port until a
    /// session is established, [`disconnect`](Self::disconnect) or
    /// [`shutdown`](Self::shutdown) is called.
    ///
    /// Returns the advertised address.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager is not listening, a session exists,
    /// or the broadcast socket cannot be created.
    pub async fn advertise(&self, interval: Duration) -> Result<PeerAddress> {
        let address = self
            .pairing_address()
            .await
            .ok_or_else(|| Error::BroadcastFailed("not listening for connections".to_string()))?;

        let mut broadcaster = Broadcaster::new(self.inner.config.discovery_port)
            .await
            .map_err(|e| Error::BroadcastFailed(e.to_string()))?;
        if let Some(target) = self.inner.config.broadcast_target {
            broadcaster = broadcaster.with_target(target);
        }

        let slot = self.inner.slot.lock().await;
        if !matches!(*slot, Slot::Empty) {
            return Err(Error::Connection(ConnectFailure::SessionActive));
        }

        broadcaster.start(&address, interval).await?;
        let previous = self.inner.advertiser.lock().await.replace(broadcaster);
        drop(slot);

        if let Some(previous) = previous {
            previous.stop().await;
        }

        tracing::info!("Advertising {} on port {}", address, self.inner.config.discovery_port);
        Ok(address)
    }

    /// Whether beacons are being sent.
    pub async fn is_advertising(&self) -> bool {
        match self.inner.advertiser.lock().await.as_ref() {
            Some(advertiser) => advertiser.is_broadcasting().await,
            None => false,
        }
    }

    /// [`disconnect`](Self::disconnect) and stop accepting connections.
    pub async fn shutdown(&self) {
        let acceptor = self.inner.acceptor.lock().await.take();
        if let Some(acceptor) = acceptor {
            acceptor.cancel.cancel();
            if let Err(e) = acceptor.task.await {
                tracing::error!("Acceptor task failed: {}", e);
            }
            tracing::info!("Stopped listening on {}", acceptor.addr);
        }

        self.disconnect().await;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.root.cancel();
    }
}

async fn accept_loop(inner: Arc<Inner>, listener: TcpListener, cancel: CancellationToken) {
    loop {
        let (tcp, peer_addr) = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
        };

        let Ok((id, session_cancel)) = inner.begin_connecting(Role::Host).await else {
            tracing::warn!(
                "Refusing connection from {}: a session is already active",
                peer_addr
            );
            continue;
        };

        tracing::info!("Incoming connection from {}", peer_addr);
        tokio::spawn(host_handshake(
            Arc::clone(&inner),
            tcp,
            peer_addr,
            id,
            session_cancel,
        ));
    }

    tracing::debug!("Acceptor stopped");
}

async fn host_handshake(
    inner: Arc<Inner>,
    tcp: TcpStream,
    peer_addr: SocketAddr,
    id: u64,
    cancel: CancellationToken,
) {
    let timeout = inner.config.handshake_timeout;

    let attempt = tokio::select! {
        () = cancel.cancelled() => Err(Error::Connection(ConnectFailure::Cancelled)),
        result = tokio::time::timeout(timeout, accept_peer(&inner.tls, tcp)) => {
            result.unwrap_or_else(|_| Err(Error::Connection(ConnectFailure::Timeout(timeout))))
        }
    };

    match attempt {
        Ok((stream, name)) => {
            let established = Established {
                role: Role::Host,
                peer_name: Some(name),
                peer_addr,
                stream,
            };
            if let Err(e) = inner.install(id, cancel, established).await {
                tracing::debug!("Incoming session from {} not installed: {}", peer_addr, e);
            }
        }
        Err(e) => {
            tracing::warn!("Handshake with {} failed: {}", peer_addr, e);
            inner.release_connecting(id).await;
        }
    }
}

/// Host side: TLS accept, then wait for the peer's `connect` frame.
async fn accept_peer(tls: &TlsConfig, tcp: TcpStream) -> Result<(TlsStream<TcpStream>, String)> {
    configure_tcp_keepalive(&tcp)?;

    let mut stream = tls
        .acceptor()
        .accept(tcp)
        .await
        .map_err(|e| Error::Connection(ConnectFailure::Handshake(e.to_string())))?;

    let body = protocol::read_frame(&mut stream).await?;
    match protocol::decode_body(&body)? {
        Message::Connect { device_name } => Ok((stream.into(), device_name)),
        other => Err(Error::ProtocolViolation(format!(
            "expected connect frame, got {}",
            other.kind()
        ))),
    }
}

/// Client side: TCP connect, TLS handshake, then announce ourselves.
async fn open_client(
    inner: &Inner,
    host: &str,
    port: u16,
) -> Result<(TlsStream<TcpStream>, SocketAddr)> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(connect_failure)?;
    configure_tcp_keepalive(&tcp)?;
    let peer_addr = tcp.peer_addr()?;

    let mut stream = inner
        .tls
        .connector()
        .connect(TlsConfig::server_name()?, tcp)
        .await
        .map_err(|e| Error::Connection(ConnectFailure::Handshake(e.to_string())))?;

    protocol::write_message(
        &mut stream,
        &Message::Connect {
            device_name: inner.config.device_name.clone(),
        },
    )
    .await?;

    Ok((stream.into(), peer_addr))
}

fn connect_failure(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => Error::Connection(ConnectFailure::Refused),
        _ => Error::Connection(ConnectFailure::Unreachable(e.to_string())),
    }
}

/// Configure TCP keep-alive so a vanished peer is noticed.
fn configure_tcp_keepalive(stream: &TcpStream) -> Result<()> {
    let socket_ref = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(10))
        .with_interval(Duration::from_secs(5));

    socket_ref
        .set_tcp_keepalive(&keepalive)
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    tracing::debug!("TCP keep-alive enabled on socket");
    Ok(())
}
