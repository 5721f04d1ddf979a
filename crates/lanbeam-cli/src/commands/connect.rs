//! Connect command implementation.

use anyhow::{Context, Result};

use lanbeam_core::pairing::decode_address;

use super::{session, ConnectArgs};

/// Run the connect command.
pub async fn run(args: ConnectArgs) -> Result<()> {
    let config = super::load_config();
    let address = decode_address(&args.address).with_context(|| {
        format!(
            "Invalid pairing address '{}'. Expected tcp://HOST:PORT|NAME",
            args.address
        )
    })?;

    let credential = super::load_credential(&config)?;
    let output = args.output.clone().unwrap_or_else(|| config.output_dir());
    let manager = super::build_manager(&config, &credential, args.name.clone(), &output)?;

    if !args.quiet {
        println!();
        println!("LanBeam v{}", lanbeam_core::VERSION);
        println!("{}", "-".repeat(37));
        println!();
        println!(
            "  Connecting to {} at {}:{}...",
            address.device_name, address.host, address.port
        );
    }

    let printer = tokio::spawn(session::report_events(manager.subscribe(), args.quiet));

    if let Err(e) = manager
        .connect_peer(&address, config.network.connect_timeout)
        .await
    {
        printer.abort();
        if let Some(hint) = e.suggestion() {
            eprintln!();
            eprintln!("  {hint}");
            eprintln!();
        }
        return Err(e).with_context(|| format!("Could not connect to {}", address.device_name));
    }

    let sent = tokio::select! {
        result = session::send_files(&manager, &args.files) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    if let Err(e) = sent {
        manager.shutdown().await;
        printer.abort();
        return Err(e);
    }

    if !args.exit {
        if !args.quiet {
            println!("  Ready to receive files. (Ctrl+C to stop)");
        }
        tokio::select! {
            () = session::wait_for_disconnect(&manager) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    manager.shutdown().await;
    printer.abort();

    Ok(())
}
