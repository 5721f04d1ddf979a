//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lanbeam_core::config::Config;
use lanbeam_core::connection::{ConnectionManager, ManagerConfig};
use lanbeam_core::crypto::PinnedCredential;
use lanbeam_core::file::DirectorySink;

pub mod config;
pub mod connect;
pub mod files;
pub mod host;
pub mod keygen;
pub mod scan;
pub mod session;

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist or can't be parsed, defaults are used.
pub fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        Config::default()
    })
}

/// Load the pinned certificate both devices share.
pub fn load_credential(config: &Config) -> Result<PinnedCredential> {
    let cert_path = config.security.cert_path();
    let key_path = config.security.key_path();

    PinnedCredential::load(&cert_path, &key_path).with_context(|| {
        format!(
            "No usable pinned certificate at {}.\n  \
             Run `lanbeam keygen` once and copy both files to the other device.",
            cert_path.display()
        )
    })
}

/// Build a connection manager writing received files into `output`.
pub fn build_manager(
    config: &Config,
    credential: &PinnedCredential,
    name: Option<String>,
    output: &Path,
) -> Result<Arc<ConnectionManager>> {
    let mut manager_config = ManagerConfig::from(config);
    if let Some(name) = name {
        manager_config.device_name = name;
    }

    let sink = Arc::new(DirectorySink::new(output));
    let manager = ConnectionManager::new(manager_config, credential, sink)
        .context("Failed to set up TLS with the pinned certificate")?;
    Ok(Arc::new(manager))
}

/// LanBeam - peer-to-peer file transfer over the local network
#[derive(Parser)]
#[command(name = "lanbeam")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Wait for a peer and exchange files with it
    Host(HostArgs),

    /// Pair with a host using its pairing address
    Connect(ConnectArgs),

    /// List hosts advertising on the network
    Scan(ScanArgs),

    /// Create the pinned certificate shared by both devices
    Keygen(KeygenArgs),

    /// List received files
    Files(FilesArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the host command
#[derive(Parser)]
pub struct HostArgs {
    /// TCP port to accept connections on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for received files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Files to send once a peer has connected
    #[arg(short, long, num_args = 1..)]
    pub send: Vec<PathBuf>,

    /// Name shown to the peer
    #[arg(long)]
    pub name: Option<String>,

    /// Do not broadcast the pairing address
    #[arg(long)]
    pub no_advertise: bool,

    /// Do not print the QR code
    #[arg(long)]
    pub no_qr: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the connect command
#[derive(Parser)]
pub struct ConnectArgs {
    /// Pairing address, e.g. "tcp://192.168.1.20:4000|Laptop"
    pub address: String,

    /// Files to send, one after another
    pub files: Vec<PathBuf>,

    /// Directory for received files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Name shown to the peer
    #[arg(long)]
    pub name: Option<String>,

    /// Disconnect after the files are sent instead of waiting for more
    #[arg(long)]
    pub exit: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the scan command
#[derive(Parser)]
pub struct ScanArgs {
    /// Duration to scan (e.g., 5s, 10s)
    #[arg(short, long, default_value = "5s")]
    pub duration: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the keygen command
#[derive(Parser)]
pub struct KeygenArgs {
    /// Overwrite an existing certificate
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the files command
#[derive(Parser)]
pub struct FilesArgs {
    /// Directory to list (defaults to the output directory)
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,
}
