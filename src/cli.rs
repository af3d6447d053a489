//! CLI argument parsing

use crate::devices;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    goflash_core::config::parse_number(s)
}

/// Generate dynamic help text for the device argument
fn device_help() -> String {
    format!(
        "Flash device to update [available: {}]",
        devices::device_names_short()
    )
}

#[derive(Parser)]
#[command(name = "goflash")]
#[command(author, version, about = "ODROID-GO firmware updater", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device and firmware configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flash a firmware container and switch the boot slot
    Flash {
        /// Flash device to update
        #[arg(short, long, help = device_help())]
        device: String,

        /// Firmware container (.fw)
        firmware: PathBuf,

        /// Auxiliary payload flashed as the utility partition
        /// (defaults to the configured file in the firmware directory, if present)
        #[arg(long, conflicts_with = "no_utility")]
        utility: Option<PathBuf>,

        /// Do not flash an auxiliary payload
        #[arg(long)]
        no_utility: bool,

        /// Confirm without waiting for [START]
        #[arg(short, long)]
        yes: bool,
    },

    /// Show a container's header, records and checksum without flashing
    Inspect {
        /// Firmware container (.fw)
        firmware: PathBuf,

        /// Address the first record is placed at (end of the factory partition)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x100000")]
        base: u32,
    },

    /// List firmware containers in the firmware directory
    List {
        /// Directory to scan (overrides the configured one)
        directory: Option<PathBuf>,
    },

    /// Partition table operations on raw flash images
    #[command(subcommand)]
    Table(TableCommands),

    /// List available flash devices
    Backends,
}

#[derive(Subcommand)]
pub enum TableCommands {
    /// Print the partition table of a flash image
    Show {
        /// Raw flash image
        image: PathBuf,
    },

    /// Copy a flash image up to the end of its last partition
    Extract {
        /// Raw flash image
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}
