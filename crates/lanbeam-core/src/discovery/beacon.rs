//! Beacon payloads and the table of peers seen on the network.
//!
//! A beacon is a single UDP datagram carrying the host's pairing string as
//! UTF-8 text, for example `tcp://192.168.1.20:4000|Laptop`.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::pairing::{decode_address, PeerAddress};

/// Largest datagram a listener will read.
pub const MAX_BEACON_SIZE: usize = 1024;

/// Encode a pairing address into beacon bytes.
#[must_use]
pub fn encode_beacon(address: &PeerAddress) -> Vec<u8> {
    address.to_string().into_bytes()
}

/// Parse beacon bytes into a pairing address.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the datagram is not UTF-8 or not a valid
/// pairing string.
pub fn parse_beacon(datagram: &[u8]) -> Result<PeerAddress> {
    let text = std::str::from_utf8(datagram)
        .map_err(|_| Error::Parse("beacon is not valid UTF-8".to_string()))?;
    decode_address(text)
}

/// A peer found through its beacon.
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    /// Advertised pairing address
    pub address: PeerAddress,
    /// Source of the most recent beacon
    pub source: SocketAddr,
    /// When the peer was first seen
    pub first_seen: Instant,
    /// When the most recent beacon arrived
    pub last_seen: Instant,
}

impl DiscoveredPeer {
    /// Device name from the beacon.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.address.device_name
    }

    /// Host and port to connect to.
    ///
    /// Falls back to the datagram's source IP when the advertised host is an
    /// unspecified address such as `0.0.0.0`.
    #[must_use]
    pub fn connect_target(&self) -> (String, u16) {
        match self.address.host.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => (self.source.ip().to_string(), self.address.port),
            _ => (self.address.host.clone(), self.address.port),
        }
    }
}

/// Peers seen so far, keyed by device name.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<String, DiscoveredPeer>,
}

impl PeerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a beacon. Returns `true` if the device name was not known yet.
    pub fn observe(&mut self, address: PeerAddress, source: SocketAddr) -> bool {
        let now = Instant::now();

        if let Some(existing) = self.peers.get_mut(&address.device_name) {
            existing.address = address;
            existing.source = source;
            existing.last_seen = now;
            return false;
        }

        self.peers.insert(
            address.device_name.clone(),
            DiscoveredPeer {
                address,
                source,
                first_seen: now,
                last_seen: now,
            },
        );
        true
    }

    /// Look up a peer by device name.
    #[must_use]
    pub fn get(&self, device_name: &str) -> Option<&DiscoveredPeer> {
        self.peers.get(device_name)
    }

    /// All known peers, sorted by device name.
    #[must_use]
    pub fn peers(&self) -> Vec<DiscoveredPeer> {
        let mut peers: Vec<_> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.address.device_name.cmp(&b.address.device_name));
        peers
    }

    /// Drop peers whose last beacon is older than `max_age`.
    ///
    /// Returns the number of peers removed.
    pub fn prune(&mut self, max_age: Duration) -> usize {
        let before = self.peers.len();
        self.peers.retain(|_, peer| peer.last_seen.elapsed() <= max_age);
        before - self.peers.len()
    }

    /// Number of known peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
