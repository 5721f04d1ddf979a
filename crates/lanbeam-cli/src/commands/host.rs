//! Host command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;

use lanbeam_core::connection::{ConnectionManager, SessionEvent};

use super::{session, HostArgs};
use crate::ui::AddressBox;

/// Run the host command.
pub async fn run(args: HostArgs) -> Result<()> {
    let config = super::load_config();
    let credential = super::load_credential(&config)?;
    let output = args.output.clone().unwrap_or_else(|| config.output_dir());
    let manager = super::build_manager(&config, &credential, args.name.clone(), &output)?;

    let port = args.port.unwrap_or(config.network.transfer_port);
    manager
        .listen(port)
        .await
        .with_context(|| format!("Failed to listen on port {port}"))?;
    let address = manager
        .pairing_address()
        .await
        .context("Listener address unavailable")?;

    if !args.quiet {
        println!();
        println!("LanBeam v{}", lanbeam_core::VERSION);
        println!("{}", "-".repeat(37));
        println!();
        println!("  Saving received files to {}", output.display());
        println!();
    }
    AddressBox::new(&address.to_string())
        .with_qr(!args.no_qr && !args.quiet)
        .display();
    println!();

    let interval = config.network.beacon_interval;
    let advertise = !args.no_advertise;
    if advertise {
        start_advertising(&manager, interval).await;
    }

    let printer = tokio::spawn(session::report_events(manager.subscribe(), args.quiet));
    let mut events = manager.subscribe();
    let mut pending = args.send;
    let mut sender: Option<tokio::task::JoinHandle<()>> = None;

    println!("  Waiting for a peer... (Ctrl+C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SessionEvent::Connected { .. }) if !pending.is_empty() => {
                    let files = std::mem::take(&mut pending);
                    let manager = Arc::clone(&manager);
                    sender = Some(tokio::spawn(async move {
                        if let Err(e) = session::send_files(&manager, &files).await {
                            eprintln!("  Error: {e:#}");
                        }
                    }));
                }
                Ok(SessionEvent::Disconnected { .. }) => {
                    if let Some(task) = sender.take() {
                        task.abort();
                    }
                    if advertise {
                        start_advertising(&manager, interval).await;
                    }
                    println!("  Waiting for a peer... (Ctrl+C to stop)");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    println!();
    println!("  Shutting down...");
    if let Some(task) = sender {
        task.abort();
    }
    manager.shutdown().await;
    printer.abort();

    Ok(())
}

async fn start_advertising(manager: &ConnectionManager, interval: std::time::Duration) {
    match manager.advertise(interval).await {
        Ok(address) => tracing::debug!("Advertising {}", address),
        Err(e) => {
            tracing::warn!("Discovery beacon unavailable: {}", e);
            if let Some(hint) = e.suggestion() {
                eprintln!("  {hint}");
            }
        }
    }
}
