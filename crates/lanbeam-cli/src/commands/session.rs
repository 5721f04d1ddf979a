//! Helpers shared by `host` and `connect`.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};

use lanbeam_core::connection::{ConnectionManager, ConnectionState, SessionEvent};
use lanbeam_core::file::{format_size, read_picked_file};
use lanbeam_core::history::TransferDirection;
use lanbeam_core::transfer::TransferEvent;

/// Print session events until the manager goes away.
pub async fn report_events(mut events: broadcast::Receiver<SessionEvent>, quiet: bool) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event, quiet),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Skipped {} session events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &SessionEvent, quiet: bool) {
    match event {
        SessionEvent::Connected {
            peer_name,
            peer_addr,
            ..
        } => {
            println!(
                "  Connected to {} ({})",
                peer_name.as_deref().unwrap_or("peer"),
                peer_addr
            );
        }
        SessionEvent::Transfer(TransferEvent::OfferSent(record)) if !quiet => {
            println!("  Sending {} ({})", record.name, format_size(record.size));
        }
        SessionEvent::Transfer(TransferEvent::OfferAccepted(record)) if !quiet => {
            println!("  Receiving {} ({})", record.name, format_size(record.size));
        }
        SessionEvent::Transfer(TransferEvent::Progress(progress)) if !quiet => {
            let arrow = match progress.direction {
                TransferDirection::Sent => "↑",
                TransferDirection::Received => "↓",
            };
            print!(
                "\r  {} [{:>6.2}%] {} - {}/{}    ",
                arrow,
                progress.percentage(),
                progress.name,
                format_size(progress.bytes),
                format_size(progress.total_bytes)
            );
            let _ = io::stdout().flush();
        }
        SessionEvent::Transfer(TransferEvent::SendCompleted(record)) => {
            println!("\r  Sent {} ({})                ", record.name, format_size(record.size));
        }
        SessionEvent::Transfer(TransferEvent::ReceiveCompleted(record)) => {
            let location = record
                .location
                .as_ref()
                .map_or_else(|| record.name.clone(), |p| p.display().to_string());
            println!("\r  Received {} -> {}                ", record.name, location);
        }
        SessionEvent::Transfer(TransferEvent::OfferRefused { offer, reason }) => {
            println!("  Refused {} from peer: {}", offer.name, reason);
        }
        SessionEvent::Transfer(TransferEvent::Aborted {
            record,
            direction,
            reason,
        }) => {
            println!("\r  {} {} failed: {}", direction, record.name, reason);
        }
        SessionEvent::Disconnected { reason, history } => {
            println!();
            println!(
                "  Disconnected ({}). Sent {} file(s), received {} file(s).",
                reason,
                history.sent.iter().filter(|r| r.available).count(),
                history.received.iter().filter(|r| r.available).count()
            );
        }
        SessionEvent::Transfer(_) => {}
    }
}

/// Send files one after another, waiting for each to finish.
///
/// A file the peer refuses is reported and skipped.
pub async fn send_files(manager: &ConnectionManager, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        let picked = read_picked_file(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let id = manager
            .initiate_send(picked)
            .await
            .with_context(|| format!("Failed to send {}", path.display()))?;

        let mut snapshot = manager.snapshot();
        let state = snapshot
            .wait_for(|s| {
                s.state != ConnectionState::Connected
                    || s.history
                        .sent
                        .iter()
                        .any(|r| r.id == id && (r.available || r.is_failed()))
            })
            .await
            .context("Session closed")?
            .clone();

        if state.state != ConnectionState::Connected {
            bail!("Connection closed before {} was sent", path.display());
        }
    }

    Ok(())
}

/// Wait until the current session ends.
pub async fn wait_for_disconnect(manager: &ConnectionManager) {
    let mut snapshot = manager.snapshot();
    let _ = snapshot
        .wait_for(|s| s.state != ConnectionState::Connected)
        .await;
}
