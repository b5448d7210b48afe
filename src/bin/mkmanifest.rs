//! Release packager CLI.
//!
//! ```text
//! mkmanifest --bump minor path/to/firmware
//! ```
//!
//! Bumps `version.txt`, hashes the tree and writes `manifest.json` next to
//! it, ready to publish at the update server's base URL.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use sensornode::config::OtaConfig;
use sensornode::ota::version::Bump;
use sensornode::packager;

#[derive(Parser)]
#[command(name = "mkmanifest")]
#[command(version, about = "Generate manifest.json and version.txt for an OTA release")]
struct Cli {
    /// Which part of the version to increment
    #[arg(long, value_enum, default_value = "patch")]
    bump: Bump,

    /// Firmware tree to package
    #[arg(default_value = ".")]
    root: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let text_extensions = OtaConfig::default().text_extensions;

    let release = packager::build_release(&cli.root, cli.bump, &text_extensions)?;
    println!(
        "Bumped version: {} -> {}",
        release.previous_version, release.manifest.version
    );
    println!("Wrote {} with {} files:", packager::MANIFEST_FILE, release.manifest.files.len());
    for (path, entry) in release.manifest.files.iter() {
        println!("  {path} ({} bytes)", entry.size);
    }
    Ok(())
}
