//! Pairing address exchange.
//!
//! A host advertises itself with a single line of text, shown as a QR code
//! and broadcast by the discovery beacon:
//!
//! ```text
//! tcp://192.168.1.20:4000|My-Laptop
//! ```
//!
//! The `tcp://` prefix is optional when decoding. IPv6 hosts are written in
//! brackets (`tcp://[fe80::1]:4000|Phone`). Everything after the first `|`
//! is the device name.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};

/// URI scheme written in front of every pairing address.
pub const SCHEME: &str = "tcp";

/// Connection parameters decoded from a pairing string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    /// Host name or IP literal (without brackets)
    pub host: String,
    /// TCP port of the host's acceptor
    pub port: u16,
    /// Advertised device name
    pub device_name: String,
}

impl PeerAddress {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16, device_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            device_name: device_name.into(),
        }
    }

    /// Returns the socket address if the host is an IP literal.
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.host, self.port, &self.device_name))
    }
}

impl std::str::FromStr for PeerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_address(s)
    }
}

/// Format a pairing string.
#[must_use]
pub fn encode_address(host: &str, port: u16, device_name: &str) -> String {
    if host.contains(':') {
        format!("{SCHEME}://[{host}]:{port}|{device_name}")
    } else {
        format!("{SCHEME}://{host}:{port}|{device_name}")
    }
}

/// Parse a pairing string.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the separator, host, port or device name is
/// missing or invalid, or if the scheme is not `tcp`.
pub fn decode_address(text: &str) -> Result<PeerAddress> {
    let text = text.trim();

    let rest = match text.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(SCHEME) => rest,
        Some((scheme, _)) => {
            return Err(Error::Parse(format!("unsupported scheme '{scheme}'")));
        }
        None => text,
    };

    let (endpoint, device_name) = rest
        .split_once('|')
        .ok_or_else(|| Error::Parse("missing '|' before the device name".to_string()))?;

    let (host, port) = split_host_port(endpoint)?;

    if device_name.trim().is_empty() {
        return Err(Error::Parse("device name is empty".to_string()));
    }

    Ok(PeerAddress {
        host: host.to_string(),
        port,
        device_name: device_name.to_string(),
    })
}

fn split_host_port(endpoint: &str) -> Result<(&str, u16)> {
    let (host, port) = if let Some(bracketed) = endpoint.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| Error::Parse("unterminated '[' in host".to_string()))?;
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| Error::Parse("missing ':' before the port".to_string()))?;
        (host, port)
    } else {
        endpoint
            .rsplit_once(':')
            .ok_or_else(|| Error::Parse("missing ':' before the port".to_string()))?
    };

    if host.is_empty() {
        return Err(Error::Parse("host is empty".to_string()));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| Error::Parse(format!("invalid port '{port}'")))?;
    if port == 0 {
        return Err(Error::Parse("port must not be 0".to_string()));
    }

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_address() {
        let addr = decode_address("tcp://10.0.0.5:4000|Pixel-7").expect("decode");
        assert_eq!(addr.host, "10.0.0.5");
        assert_eq!(addr.port, 4000);
        assert_eq!(addr.device_name, "Pixel-7");
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_address("garbage"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_decode_without_scheme() {
        let addr = decode_address("192.168.1.2:4000|Laptop").expect("decode");
        assert_eq!(addr, PeerAddress::new("192.168.1.2", 4000, "Laptop"));
    }

    #[test]
    fn test_decode_rejects_bad_parts() {
        for input in [
            "tcp://10.0.0.5:4000",
            "tcp://10.0.0.5|Pixel",
            "tcp://:4000|Pixel",
            "tcp://10.0.0.5:abc|Pixel",
            "tcp://10.0.0.5:0|Pixel",
            "tcp://10.0.0.5:70000|Pixel",
            "tcp://10.0.0.5:4000|",
            "http://10.0.0.5:4000|Pixel",
            "",
        ] {
            assert!(
                matches!(decode_address(input), Err(Error::Parse(_))),
                "'{input}' should not decode"
            );
        }
    }

    #[test]
    fn test_device_name_keeps_separators() {
        let addr = decode_address("tcp://10.0.0.5:4000|Alex's|Phone").expect("decode");
        assert_eq!(addr.device_name, "Alex's|Phone");
    }

    #[test]
    fn test_ipv6_round_trip() {
        let text = encode_address("fe80::1", 4000, "Tablet");
        assert_eq!(text, "tcp://[fe80::1]:4000|Tablet");

        let addr = decode_address(&text).expect("decode");
        assert_eq!(addr.host, "fe80::1");
        assert_eq!(addr.socket_addr().map(|s| s.port()), Some(4000));
    }

    #[test]
    fn test_encode_matches_display() {
        let addr = PeerAddress::new("10.0.0.5", 4000, "Pixel-7");
        assert_eq!(addr.to_string(), "tcp://10.0.0.5:4000|Pixel-7");
        assert_eq!(
            addr.to_string().parse::<PeerAddress>().expect("parse"),
            addr
        );
    }
}
