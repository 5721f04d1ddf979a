//! Keygen command implementation.

use anyhow::{bail, Context, Result};

use lanbeam_core::crypto::PinnedCredential;

use super::KeygenArgs;

/// Run the keygen command.
pub fn run(args: &KeygenArgs) -> Result<()> {
    let config = super::load_config();
    let cert_path = config.security.cert_path();
    let key_path = config.security.key_path();

    if !args.force && (cert_path.exists() || key_path.exists()) {
        bail!(
            "A certificate already exists at {}. Use --force to replace it \
             (the other device must then receive the new files too).",
            cert_path.display()
        );
    }

    let credential = PinnedCredential::generate().context("Failed to generate certificate")?;
    credential
        .save(&cert_path, &key_path)
        .context("Failed to write certificate files")?;

    println!();
    println!("  Certificate: {}", cert_path.display());
    println!("  Private key: {}", key_path.display());
    println!("  Fingerprint: {}", credential.fingerprint());
    println!();
    println!("  Copy both files to the same location on the other device.");
    println!("  Only devices holding this certificate can pair with each other.");
    println!();

    Ok(())
}
