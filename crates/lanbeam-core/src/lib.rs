//! # LanBeam Core Library
//!
//! `lanbeam-core` provides the core functionality for LanBeam, a
//! peer-to-peer file transfer tool for devices on the same local network.
//!
//! ## Features
//!
//! - **Zero-setup pairing**: Hosts broadcast a pairing address over UDP and
//!   render it as a QR code
//! - **Pinned TLS**: Every connection uses TLS with a certificate both
//!   devices were shipped with
//! - **Pull-based transfers**: Files move in 8 KiB chunks, one request at a
//!   time, in both directions over the same connection
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`connection`] - Acceptor, dialer and the peer session actor
//! - [`crypto`] - Pinned certificate and TLS configuration
//! - [`discovery`] - UDP beacon broadcast and listening
//! - [`mod@file`] - Picked files, chunking and the file sink
//! - [`history`] - Sent and received file records
//! - [`pairing`] - Pairing address parsing and formatting
//! - [`protocol`] - Frame codec
//! - [`qr`] - QR rendering of pairing addresses
//! - [`transfer`] - Sender and receiver state machines
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanbeam_core::connection::{ConnectionManager, ManagerConfig};
//!
//! let manager = ConnectionManager::new(ManagerConfig::default(), &credential, sink)?;
//! manager.listen(lanbeam_core::DEFAULT_TRANSFER_PORT).await?;
//! manager.advertise(lanbeam_core::DEFAULT_BEACON_INTERVAL).await?;
//!
//! // On another device
//! let address = lanbeam_core::pairing::decode_address("tcp://192.168.1.20:4000|Laptop")?;
//! client.connect_peer(&address, timeout).await?;
//! client.initiate_send(picked_file).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use std::time::Duration;

pub mod config;
pub mod connection;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod file;
pub mod history;
pub mod pairing;
pub mod protocol;
pub mod qr;
pub mod transfer;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Frame format version
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Discovery port (UDP)
pub const DEFAULT_DISCOVERY_PORT: u16 = 57143;

/// Port a host accepts connections on (TCP)
pub const DEFAULT_TRANSFER_PORT: u16 = 4000;

/// Default chunk size for file transfers (8 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// How often a host repeats its beacon
pub const DEFAULT_BEACON_INTERVAL: Duration = Duration::from_secs(3);
