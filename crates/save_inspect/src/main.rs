//! Save Inspector CLI
//!
//! Describes a save container's envelope without touching its payload, and
//! upgrades legacy files (written before the envelope carried a version
//! header) into versioned containers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use slotpack::{decode, upgrade_legacy, EngineVersion, Envelope, VersionInfo};

#[derive(Parser)]
#[command(name = "save_inspect")]
#[command(about = "Inspect and upgrade compressed save containers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print envelope metadata for a save file
    Info {
        /// Save file path
        file: PathBuf,

        /// Emit machine-readable JSON instead of text
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Wrap a legacy save file in a versioned envelope
    Upgrade {
        /// Legacy save file path
        file: PathBuf,

        /// Output file path
        #[arg(long)]
        out: PathBuf,

        /// Package format version of the build that wrote the file
        #[arg(long)]
        package_version: u32,

        /// Engine version of the build that wrote the file (e.g. "4.8.0")
        #[arg(long)]
        engine_version: EngineVersion,

        /// Engine changelist, if known
        #[arg(long, default_value = "0")]
        changelist: u32,

        /// Engine branch, if known
        #[arg(long, default_value = "")]
        branch: String,
    },
}

#[derive(Serialize)]
struct EnvelopeInfo {
    layout: &'static str,
    format_version: u32,
    class_name: String,
    payload_size: usize,
    package_version: Option<u32>,
    engine_version: Option<String>,
}

impl EnvelopeInfo {
    fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            layout: if envelope.is_legacy() { "legacy" } else { "versioned" },
            format_version: envelope.format_version(),
            class_name: envelope.class_name().to_string(),
            payload_size: envelope.payload().len(),
            package_version: envelope.versions().map(|v| v.package_version),
            engine_version: envelope.versions().map(|v| v.engine.to_string()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file, json } => {
            let bytes = fs::read(&file)
                .with_context(|| format!("failed to read save file: {}", file.display()))?;

            let envelope = decode(&bytes)
                .with_context(|| format!("failed to decode save file: {}", file.display()))?;

            let info = EnvelopeInfo::from_envelope(&envelope);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
        }

        Commands::Upgrade { file, out, package_version, engine_version, changelist, branch } => {
            let bytes = fs::read(&file)
                .with_context(|| format!("failed to read save file: {}", file.display()))?;

            let versions = VersionInfo {
                package_version,
                engine: EngineVersion { changelist, branch, ..engine_version },
            };

            let upgraded = upgrade_legacy(&bytes, &versions)
                .with_context(|| format!("failed to upgrade save file: {}", file.display()))?;

            fs::write(&out, &upgraded)
                .with_context(|| format!("failed to write output: {}", out.display()))?;

            println!("Upgraded {} -> {} ({} bytes)", file.display(), out.display(), upgraded.len());
        }
    }

    Ok(())
}

fn print_info(info: &EnvelopeInfo) {
    println!("Layout:          {}", info.layout);
    println!("Format version:  {}", info.format_version);
    println!("Class name:      {}", info.class_name);
    println!("Payload size:    {} bytes", info.payload_size);
    match (&info.package_version, &info.engine_version) {
        (Some(package), Some(engine)) => {
            println!("Package version: {}", package);
            println!("Engine version:  {}", engine);
        }
        _ => println!("Writer versions: not recorded (legacy file)"),
    }
}
