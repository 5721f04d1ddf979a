//! LanBeam CLI - peer-to-peer file transfer over the local network
//!
//! One device hosts and shows a pairing address (and QR code); the other
//! connects to it. Once paired, either side can send files.
//!
//! ## Quick Start
//!
//! ```bash
//! # Once: create the pinned certificate and copy it to the other device
//! lanbeam keygen
//!
//! # On the laptop
//! lanbeam host
//!
//! # On the other device
//! lanbeam connect "tcp://192.168.1.20:4000|Laptop" ./photo.jpg
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Host(args) => commands::host::run(args).await,
        Command::Connect(args) => commands::connect::run(args).await,
        Command::Scan(args) => commands::scan::run(args).await,
        Command::Keygen(args) => commands::keygen::run(&args),
        Command::Files(args) => commands::files::run(args),
        Command::Config(args) => commands::config::run(&args),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "info,lanbeam=debug,lanbeam_core=debug"
    } else {
        "warn,lanbeam=info,lanbeam_core=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
