//! Configuration management for LanBeam.
//!
//! This module handles loading, saving, and managing LanBeam configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/lanbeam/config.toml` |
//! | macOS | `~/Library/Application Support/dev.lanbeam.LanBeam/config.toml` |
//! | Windows | `%APPDATA%\lanbeam\LanBeam\config\config.toml` |
//!
//! The pinned TLS certificate and key live next to the config file unless
//! `[security]` points elsewhere.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanbeam_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Device name: {}", config.general.device_name);
//! ```

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest chunk size. Offers sliced finer than this are refused, which
/// bounds the receiver's chunk table.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Largest accepted chunk size. A base64 chunk must fit in one frame.
pub const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Main configuration struct for LanBeam.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Network settings
    pub network: NetworkConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
    /// Security settings
    pub security: SecurityConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Name shown to peers
    pub device_name: String,
    /// Where received files are written (defaults to the downloads folder)
    pub output_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            device_name: hostname::get().map_or_else(
                |_| "LanBeam Device".to_string(),
                |h| h.to_string_lossy().to_string(),
            ),
            output_dir: None,
        }
    }
}

/// Network configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Discovery port (UDP)
    pub discovery_port: u16,
    /// Port the host accepts connections on (TCP)
    pub transfer_port: u16,
    /// How often the host broadcasts its beacon
    #[serde(with = "humantime_serde")]
    pub beacon_interval: Duration,
    /// Beacon destination; a subnet broadcast address works better on
    /// some routers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_address: Option<Ipv4Addr>,
    /// Time allowed for TCP connect and TLS handshake
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Time a host waits for the peer's `connect` frame
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: crate::DEFAULT_DISCOVERY_PORT,
            transfer_port: crate::DEFAULT_TRANSFER_PORT,
            beacon_interval: crate::DEFAULT_BEACON_INTERVAL,
            broadcast_address: None,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Transfer configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunk size for outgoing files
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Security configuration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Pinned certificate (PEM)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<PathBuf>,
    /// Private key for the pinned certificate (PEM)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
}

impl SecurityConfig {
    /// Resolved certificate path.
    #[must_use]
    pub fn cert_path(&self) -> PathBuf {
        self.cert_path
            .clone()
            .unwrap_or_else(|| Config::config_dir_or_cwd().join("pinned-cert.pem"))
    }

    /// Resolved private key path.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.key_path
            .clone()
            .unwrap_or_else(|| Config::config_dir_or_cwd().join("pinned-key.pem"))
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Check values that would make the transport misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.transfer.chunk_size) {
            return Err(Error::InvalidConfig {
                key: "transfer.chunk_size".to_string(),
                reason: format!("must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}"),
            });
        }

        if self.network.beacon_interval.is_zero() {
            return Err(Error::InvalidConfig {
                key: "network.beacon_interval".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.general.device_name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: "general.device_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Directory received files are written to.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.general.output_dir.clone().unwrap_or_else(|| {
            directories::UserDirs::new()
                .and_then(|dirs| dirs.download_dir().map(|d| d.join("LanBeam")))
                .unwrap_or_else(|| PathBuf::from("received"))
        })
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "lanbeam", "LanBeam")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn config_dir_or_cwd() -> PathBuf {
        Self::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir_or_cwd().join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.strip_suffix("ms")
            .map(|millis| {
                millis
                    .parse()
                    .map(Duration::from_millis)
                    .map_err(serde::de::Error::custom)
            })
            .or_else(|| {
                s.strip_suffix('s').map(|secs| {
                    secs.parse()
                        .map(Duration::from_secs)
                        .map_err(serde::de::Error::custom)
                })
            })
            .or_else(|| {
                s.strip_suffix('m').map(|mins| {
                    mins.parse::<u64>()
                        .map(|m| Duration::from_secs(m * 60))
                        .map_err(serde::de::Error::custom)
                })
            })
            .unwrap_or_else(|| Err(serde::de::Error::custom("invalid duration format")))
    }
}
