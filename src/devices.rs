//! Flash device selection for the CLI
//!
//! Thin layer over the goflash-flash registry that adds help text and a
//! friendlier error for unknown device names.

use goflash_flash::{available_devices, open_flash, parse_device_params, FlashHandle};

/// Get a short comma-separated list of available device names
pub fn device_names_short() -> String {
    let devices = available_devices();
    let names: Vec<&str> = devices.iter().map(|d| d.name).collect();
    names.join(", ")
}

/// Generate help text listing all backends with their parameters
pub fn device_help() -> String {
    let mut help = String::from("Available devices:\n");
    for device in available_devices() {
        let aliases = if device.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", device.aliases.join(", "))
        };
        help.push_str(&format!(
            "  {:<8} {}{}\n",
            device.name, device.description, aliases
        ));
    }
    help
}

/// Check if a device name matches any available backend
pub fn find_device(name: &str) -> Option<&'static str> {
    available_devices()
        .into_iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
        .map(|d| d.name)
}

/// Open the device named by `device`
pub fn open(device: &str) -> Result<FlashHandle, Box<dyn std::error::Error>> {
    let params = parse_device_params(device)?;
    if find_device(&params.name).is_none() {
        return Err(unknown_device_error(&params.name));
    }
    let handle = open_flash(device)?;
    log::debug!("Opened {:?}", handle);
    Ok(handle)
}

fn unknown_device_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown device: {}\n\n", name);
    msg.push_str(&device_help());
    msg.push_str("\nUse 'goflash backends' for more details");
    msg.into()
}
