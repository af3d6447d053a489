//! Flash command implementation

use crate::input::{AutoConfirm, TerminalInput};
use crate::status::ConsoleStatus;
use goflash_core::boot::OtaDataBoot;
use goflash_core::config::{DeviceConfig, FirmwareConfig};
use goflash_core::container::IoSource;
use goflash_core::input::{InputReader, InputTask, SharedGamepad};
use goflash_core::updater::{Outcome, UpdateSummary, Updater};
use goflash_flash::{FlashDevice, FlashHandle};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Where the auxiliary payload comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utility {
    /// Use the configured file next to the container, if present
    Auto,
    /// Use this file; it must exist
    Path(PathBuf),
    /// No auxiliary payload
    Disabled,
}

/// Resolve the auxiliary payload path
pub fn resolve_utility(utility: &Utility, firmware: &Path, config: &FirmwareConfig) -> Option<PathBuf> {
    match utility {
        Utility::Disabled => None,
        Utility::Path(path) => Some(path.clone()),
        Utility::Auto => {
            let dir = firmware.parent().unwrap_or(Path::new("."));
            let candidate = dir.join(&config.auxiliary_file);
            if candidate.is_file() {
                Some(candidate)
            } else {
                log::debug!("No auxiliary payload at {}", candidate.display());
                None
            }
        }
    }
}

/// Flash `firmware` into `handle`
///
/// With `yes` the confirmation prompt is answered automatically, otherwise
/// the operator types `start` or `b`.
pub fn run_flash(
    handle: &mut FlashHandle,
    device: &DeviceConfig,
    firmware_config: &FirmwareConfig,
    firmware: &Path,
    utility: &Utility,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let container = File::open(firmware)
        .map_err(|e| format!("Failed to open {}: {}", firmware.display(), e))?;
    let auxiliary = match resolve_utility(utility, firmware, firmware_config) {
        Some(path) => {
            let file = File::open(&path)
                .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
            log::info!("Auxiliary payload: {}", path.display());
            Some(IoSource(file))
        }
        None => None,
    };

    println!(
        "Flash size: {} bytes ({} KiB) on {}",
        handle.size(),
        handle.size() / 1024,
        handle.info().description
    );

    let mut status = ConsoleStatus::new(!yes)?;
    let outcome = if yes {
        update(handle, &mut status, AutoConfirm::default(), device, container, auxiliary)
    } else {
        let shared = SharedGamepad::new();
        let raw = TerminalInput::spawn(device.poll_interval_ms)?;
        let task = InputTask::spawn(raw, shared.clone())?;
        let outcome = update(handle, &mut status, shared, device, container, auxiliary);
        task.stop();
        outcome
    };
    status.finish();

    match outcome? {
        Outcome::Cancelled => {
            println!("Update cancelled, flash untouched");
        }
        Outcome::Restarted(summary) => print_summary(&summary),
    }
    Ok(())
}

fn update<I: InputReader>(
    handle: &mut FlashHandle,
    status: &mut ConsoleStatus,
    input: I,
    device: &DeviceConfig,
    container: File,
    auxiliary: Option<IoSource<File>>,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let mut updater = Updater::new(handle, status, input, OtaDataBoot::new(), *device)?;
    let outcome = updater.run(IoSource(container), auxiliary)?;
    Ok(outcome)
}

fn print_summary(summary: &UpdateSummary) {
    println!();
    println!("Flashed '{}' (CRC-32 0x{:08X})", summary.description, summary.checksum);
    println!(
        "{:<3} {:<16} {:>4} {:>7} {:>10} {:>10}",
        "#", "Label", "Type", "SubType", "Offset", "Size"
    );
    for (i, entry) in summary.partitions.iter().enumerate() {
        println!(
            "{:<3} {:<16} 0x{:02X} {:>7} 0x{:08X} 0x{:08X}",
            i,
            entry.slot.label.to_string(),
            entry.slot.partition_type,
            format!("0x{:02X}", entry.slot.subtype),
            entry.address,
            entry.slot.length
        );
    }
    println!("Wrote {} bytes", summary.bytes_written);
    println!(
        "Next boot: '{}' at 0x{:08X}",
        summary.boot.label, summary.boot.offset
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("goflash-cli-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_resolve_utility() {
        let dir = temp_dir("utility");
        let firmware = dir.join("game.fw");
        let config = FirmwareConfig::default();

        assert_eq!(resolve_utility(&Utility::Auto, &firmware, &config), None);

        std::fs::write(dir.join("utility.bin"), [0u8; 4]).unwrap();
        assert_eq!(
            resolve_utility(&Utility::Auto, &firmware, &config),
            Some(dir.join("utility.bin"))
        );
        assert_eq!(resolve_utility(&Utility::Disabled, &firmware, &config), None);

        let explicit = PathBuf::from("/elsewhere/other.bin");
        assert_eq!(
            resolve_utility(&Utility::Path(explicit.clone()), &firmware, &config),
            Some(explicit)
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
