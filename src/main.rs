//! goflash - ODROID-GO firmware updater
//!
//! Flashes `.fw` firmware containers into an ESP32's SPI flash the way the
//! device's own updater does: verify the container, place each partition
//! record after the factory application, rewrite the partition table and
//! point the bootloader at the new application.
//!
//! # Architecture
//!
//! All update logic lives in `goflash-core` and runs against any
//! `FlashDevice`. This binary supplies the host side of it:
//! - **Devices** from `goflash-flash` (`dummy`, `file:path=<image>`)
//! - **Status** as an `indicatif` progress bar
//! - **Input** typed on stdin, or `--yes` for unattended runs

mod cli;
mod commands;
mod devices;
mod input;
mod status;

use clap::Parser;
use cli::{Cli, Commands, TableCommands};
use commands::flash::Utility;
use goflash_core::config::ConfigFile;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Flash {
            device,
            firmware,
            utility,
            no_utility,
            yes,
        } => {
            let utility = match (utility, no_utility) {
                (_, true) => Utility::Disabled,
                (Some(path), false) => Utility::Path(path),
                (None, false) => Utility::Auto,
            };
            let mut handle = devices::open(&device)?;
            commands::flash::run_flash(
                &mut handle,
                &config.device,
                &config.firmware,
                &firmware,
                &utility,
                yes,
            )
        }
        Commands::Inspect { firmware, base } => {
            commands::inspect::run_inspect(&firmware, base, &config.device)
        }
        Commands::List { directory } => {
            commands::list_firmware(&config.firmware, directory.as_deref())
        }
        Commands::Table(subcmd) => match subcmd {
            TableCommands::Show { image } => commands::table::cmd_show(&image, &config.device),
            TableCommands::Extract { input, output } => {
                commands::table::cmd_extract(&input, &output, &config.device)
            }
        },
        Commands::Backends => {
            commands::list_backends();
            Ok(())
        }
    }
}

/// Load the configuration file, or the reference device defaults
fn load_config(path: Option<&Path>) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let config = ConfigFile::from_toml_file(path)?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => {
            log::debug!("No config file, using reference device defaults");
            Ok(ConfigFile::default())
        }
    }
}
