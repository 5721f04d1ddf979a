//! Error types for LanBeam.
//!
//! This module provides a unified error type for all LanBeam operations,
//! with specific error variants for different failure modes.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// A specialized `Result` type for LanBeam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an outgoing or incoming connection could not be established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The peer did not answer within the connect timeout
    Timeout(Duration),
    /// The peer actively refused the TCP connection
    Refused,
    /// The host could not be reached or resolved
    Unreachable(String),
    /// TLS negotiation failed, usually a certificate mismatch
    Handshake(String),
    /// A peer session already exists on this manager
    SessionActive,
    /// The attempt was cancelled by a disconnect
    Cancelled,
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(d) => write!(f, "timed out after {}ms", d.as_millis()),
            Self::Refused => write!(f, "connection refused"),
            Self::Unreachable(reason) => write!(f, "peer unreachable: {reason}"),
            Self::Handshake(reason) => write!(f, "handshake failed: {reason}"),
            Self::SessionActive => write!(f, "a peer session is already active"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The main error type for LanBeam.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection could not be established (E001)
    #[error("connection failed: {0}")]
    Connection(ConnectFailure),

    /// Unable to broadcast on network (E002)
    #[error("unable to broadcast on network: {0}")]
    BroadcastFailed(String),

    /// No connected peer session (E003)
    #[error("not connected to a peer")]
    NotConnected,

    /// A transfer in the same direction is still running (E004)
    #[error("a transfer is already in progress, wait for it to finish")]
    TransferBusy,

    /// The peer session ended while an operation was pending (E005)
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Writing an assembled file failed (E006)
    #[error("failed to write '{name}': {reason}")]
    Write {
        /// File name that was being written
        name: String,
        /// Reason for failure
        reason: String,
    },

    /// Reading a picked file failed (E007)
    #[error("failed to read '{name}': {reason}")]
    Read {
        /// File name or path that was being read
        name: String,
        /// Reason for failure
        reason: String,
    },

    /// A frame body could not be decoded; the stream is still aligned
    #[error("malformed frame: {0}")]
    Framing(String),

    /// A frame header is invalid; the stream can no longer be trusted
    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    /// Unsupported protocol version
    #[error("unsupported protocol version: {major}.{minor}")]
    UnsupportedVersion {
        /// Major version
        major: u8,
        /// Minor version
        minor: u8,
    },

    /// A well-formed message arrived that makes no sense in the current state
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Pairing address could not be parsed
    #[error("invalid pairing address: {0}")]
    Parse(String),

    /// TLS setup or credential error
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),

    /// Operation timeout
    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl Error {
    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern EXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::Connection(_) => Some("E001"),
            Self::BroadcastFailed(_) => Some("E002"),
            Self::NotConnected => Some("E003"),
            Self::TransferBusy => Some("E004"),
            Self::ConnectionLost(_) => Some("E005"),
            Self::Write { .. } => Some("E006"),
            Self::Read { .. } => Some("E007"),
            _ => None,
        }
    }

    /// Returns whether this error is recoverable (can be retried).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection(
                ConnectFailure::Timeout(_) | ConnectFailure::Refused | ConnectFailure::Unreachable(_)
            ) | Self::TransferBusy
                | Self::ConnectionLost(_)
                | Self::Timeout(_)
        )
    }

    /// Returns whether this error only affects a single frame and the
    /// session may keep going.
    #[must_use]
    pub const fn is_frame_local(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::ProtocolViolation(_))
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Connection(ConnectFailure::Refused | ConnectFailure::Timeout(_)) => Some(
                "Make sure the other device is running `lanbeam host` and that both\n\
                 devices are on the same network.",
            ),
            Self::Connection(ConnectFailure::Handshake(_)) | Self::TlsError(_) => Some(
                "Both devices must use the same pinned certificate. Create one with\n\
                   lanbeam keygen\n\
                 and copy the certificate and key files to the other device.",
            ),
            Self::TransferBusy => Some("Wait for the current file to be sent, then try again."),
            Self::Parse(_) => Some("Pairing addresses look like tcp://192.168.1.20:4000|My-Laptop"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::Connection(ConnectFailure::Refused).code(),
            Some("E001")
        );
        assert_eq!(Error::TransferBusy.code(), Some("E004"));
        assert_eq!(Error::Framing("bad".into()).code(), None);
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::Connection(ConnectFailure::Timeout(Duration::from_secs(1))).is_recoverable());
        assert!(!Error::Connection(ConnectFailure::Handshake("x".into())).is_recoverable());
        assert!(!Error::NotConnected.is_recoverable());
    }

    #[test]
    fn test_frame_local() {
        assert!(Error::Framing("x".into()).is_frame_local());
        assert!(Error::ProtocolViolation("x".into()).is_frame_local());
        assert!(!Error::InvalidHeader("x".into()).is_frame_local());
    }

    #[test]
    fn test_connect_failure_display() {
        let err = Error::Connection(ConnectFailure::Timeout(Duration::from_millis(1500)));
        assert_eq!(err.to_string(), "connection failed: timed out after 1500ms");
    }
}
