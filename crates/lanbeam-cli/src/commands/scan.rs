//! Scan command implementation.

use anyhow::{Context, Result};

use lanbeam_core::discovery::{DiscoveredPeer, Listener};

use super::ScanArgs;
use crate::ui::{parse_duration, truncate_string};

/// Run the scan command.
pub async fn run(args: ScanArgs) -> Result<()> {
    let config = super::load_config();

    let duration = parse_duration(&args.duration)
        .context("Invalid duration format. Use formats like '5s', '10s', '30s'")?;

    if !args.json {
        println!();
        println!("Scanning for hosts ({})...", args.duration);
        println!();
    }

    let mut listener = Listener::new(config.network.discovery_port)
        .await
        .with_context(|| {
            format!(
                "Failed to listen for beacons on UDP port {}",
                config.network.discovery_port
            )
        })?;

    let peers = listener.scan(duration).await;

    if args.json {
        output_json_peers(&peers)?;
    } else {
        display_peers(&peers);
    }

    Ok(())
}

/// Output peers as JSON.
fn output_json_peers(peers: &[DiscoveredPeer]) -> Result<()> {
    let output = serde_json::json!({
        "peers": peers.iter().map(|p| {
            let (host, port) = p.connect_target();
            serde_json::json!({
                "device": p.device_name(),
                "address": p.address.to_string(),
                "host": host,
                "port": port,
                "source": p.source.to_string(),
            })
        }).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Display peers as text table.
fn display_peers(peers: &[DiscoveredPeer]) {
    println!("Hosts on Network:");
    println!("{}", "─".repeat(70));
    println!("  {:20}  {:44}", "Device", "Pairing address");
    println!("{}", "─".repeat(70));

    if peers.is_empty() {
        println!("  (no hosts found)");
        println!("{}", "─".repeat(70));
        return;
    }

    for peer in peers {
        let (host, port) = peer.connect_target();
        let address =
            lanbeam_core::pairing::encode_address(&host, port, peer.device_name());
        println!(
            "  {:20}  {:44}",
            truncate_string(peer.device_name(), 20),
            address
        );
    }

    println!("{}", "─".repeat(70));
    println!();
    println!("  Connect with: lanbeam connect \"<pairing address>\"");
}
