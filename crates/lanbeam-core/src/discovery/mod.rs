//! Network discovery for LanBeam.
//!
//! A host waiting to be paired broadcasts its pairing string over UDP at a
//! fixed interval. Peers listening on the discovery port collect the
//! beacons and present them as connectable devices.
//!
//! ## Protocol
//!
//! - Port: 57143 (UDP)
//! - Broadcast interval: every 3 seconds while advertising
//! - Target: `255.255.255.255`, or a subnet broadcast address
//!
//! ## Beacon
//!
//! ```text
//! tcp://192.168.1.20:4000|Laptop
//! ```
//!
//! Beacons are deduplicated by device name. Lost datagrams are harmless
//! since the next interval repeats them.

mod beacon;

pub use beacon::{encode_beacon, parse_beacon, DiscoveredPeer, PeerTable, MAX_BEACON_SIZE};

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};

use crate::error::Result;
use crate::pairing::PeerAddress;

pub use crate::DEFAULT_DISCOVERY_PORT;

/// Best guess at this machine's LAN address.
///
/// Uses the routing table by "connecting" a UDP socket; no packet is sent.
#[must_use]
pub fn local_ip() -> Option<IpAddr> {
    let socket = StdUdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Start advertising `device_name` reachable at `self_address`.
///
/// The returned broadcaster keeps advertising until it is stopped or
/// dropped.
///
/// # Errors
///
/// Returns an error if the broadcast socket cannot be created.
pub async fn advertise(
    self_address: SocketAddr,
    device_name: &str,
    discovery_port: u16,
    interval: Duration,
) -> Result<Broadcaster> {
    let broadcaster = Broadcaster::new(discovery_port).await?;
    let address = PeerAddress::new(
        self_address.ip().to_string(),
        self_address.port(),
        device_name,
    );
    broadcaster.start(&address, interval).await?;
    Ok(broadcaster)
}

/// Bind a listener and return the deduplicated stream of peers.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub async fn listen(port: u16) -> Result<impl Stream<Item = DiscoveredPeer> + Send> {
    Ok(Listener::new(port).await?.into_stream())
}

/// Broadcaster for announcing this host on the network.
#[derive(Debug)]
pub struct Broadcaster {
    /// UDP socket for broadcasting
    socket: Arc<UdpSocket>,
    /// Where beacons are sent
    target: SocketAddr,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    /// Whether broadcasting is active
    is_active: Arc<Mutex<bool>>,
}

impl Broadcaster {
    /// Create a new broadcaster targeting `255.255.255.255:port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created.
    pub async fn new(port: u16) -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        socket.set_broadcast(true)?;
        socket.set_reuse_address(true)?;

        #[cfg(target_os = "macos")]
        socket.set_reuse_port(true)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        socket.bind(&addr.into())?;

        socket.set_nonblocking(true)?;

        let std_socket: StdUdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            socket: Arc::new(socket),
            target: SocketAddrV4::new(Ipv4Addr::BROADCAST, port).into(),
            shutdown_tx,
            is_active: Arc::new(Mutex::new(false)),
        })
    }

    /// Send beacons to a different address, such as a subnet broadcast
    /// address or a single peer.
    #[must_use]
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    /// Where beacons are sent.
    #[must_use]
    pub const fn target(&self) -> SocketAddr {
        self.target
    }

    /// Start broadcasting a pairing address.
    ///
    /// Calling this while already broadcasting is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if broadcasting fails.
    pub async fn start(&self, address: &PeerAddress, interval: Duration) -> Result<()> {
        let mut is_active = self.is_active.lock().await;
        if *is_active {
            return Ok(());
        }
        *is_active = true;
        drop(is_active);

        let socket = Arc::clone(&self.socket);
        let target = self.target;
        let is_active = Arc::clone(&self.is_active);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let payload = encode_beacon(address);

        tracing::debug!("Advertising {} to {} every {:?}", address, target, interval);

        tokio::spawn(async move {
            loop {
                if let Err(e) = socket.send_to(&payload, target).await {
                    tracing::warn!("Failed to send beacon: {}", e);
                }

                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Broadcaster received shutdown signal");
                        break;
                    }
                }
            }

            *is_active.lock().await = false;
        });

        Ok(())
    }

    /// Stop broadcasting and wait for the timer task to exit.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        while *self.is_active.lock().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Check if currently broadcasting.
    pub async fn is_broadcasting(&self) -> bool {
        *self.is_active.lock().await
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Listener collecting beacons from peers.
#[derive(Debug)]
pub struct Listener {
    /// UDP socket for receiving broadcasts
    socket: UdpSocket,
    /// Peers seen by this listener
    table: PeerTable,
}

impl Listener {
    /// Create a new listener on the specified port.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created.
    pub async fn new(port: u16) -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        socket.set_reuse_address(true)?;

        #[cfg(target_os = "macos")]
        socket.set_reuse_port(true)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&addr.into())?;

        socket.set_nonblocking(true)?;

        let std_socket: StdUdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        Ok(Self {
            socket,
            table: PeerTable::new(),
        })
    }

    /// The bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Peers seen so far.
    #[must_use]
    pub const fn table(&self) -> &PeerTable {
        &self.table
    }

    /// Wait for the next beacon from a device name not seen before.
    ///
    /// Beacons from known peers refresh their entry and are otherwise
    /// skipped. Malformed datagrams are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if receiving from the socket fails.
    pub async fn next_peer(&mut self) -> Result<DiscoveredPeer> {
        let mut buf = [0u8; MAX_BEACON_SIZE];

        loop {
            let (len, source) = self.socket.recv_from(&mut buf).await?;
            if let Some(peer) = self.accept(&buf[..len], source) {
                return Ok(peer);
            }
        }
    }

    /// Listen for `duration` and return every peer seen, deduplicated by
    /// device name.
    pub async fn scan(&mut self, duration: Duration) -> Vec<DiscoveredPeer> {
        let deadline = Instant::now() + duration;
        let mut buf = [0u8; MAX_BEACON_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let result = tokio::time::timeout(remaining, self.socket.recv_from(&mut buf)).await;

            match result {
                Ok(Ok((len, source))) => {
                    self.accept(&buf[..len], source);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Error receiving UDP packet: {}", e);
                }
                Err(_) => {
                    break;
                }
            }
        }

        self.table.peers()
    }

    /// Turn the listener into an endless stream of newly seen peers.
    ///
    /// Dropping the stream closes the socket.
    pub fn into_stream(mut self) -> impl Stream<Item = DiscoveredPeer> + Send {
        async_stream::stream! {
            loop {
                match self.next_peer().await {
                    Ok(peer) => yield peer,
                    Err(e) => {
                        tracing::warn!("Error receiving UDP packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
    }

    fn accept(&mut self, datagram: &[u8], source: SocketAddr) -> Option<DiscoveredPeer> {
        let address = match parse_beacon(datagram) {
            Ok(address) => address,
            Err(e) => {
                tracing::debug!("Ignoring datagram from {}: {}", source, e);
                return None;
            }
        };

        let name = address.device_name.clone();
        if self.table.observe(address, source) {
            tracing::debug!("Discovered {} via {}", name, source);
            self.table.get(&name).cloned()
        } else {
            None
        }
    }
}
