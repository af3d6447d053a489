//! Backend registry
//!
//! Opens flash backends by name and wraps them in a [`FlashHandle`].

use crate::handle::{DeviceInfo, FlashHandle};
use std::collections::HashMap;

/// Parsed device parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParams {
    /// Backend name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl DeviceParams {
    /// Parameters as borrowed pairs, for the backends' `parse_options`
    #[allow(dead_code)] // Used in feature-gated code
    fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a device string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_device_params("file:path=odroid-go.bin")?;
/// assert_eq!(params.name, "file");
/// assert_eq!(params.params.get("path"), Some(&"odroid-go.bin".to_string()));
/// ```
pub fn parse_device_params(s: &str) -> Result<DeviceParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty device name".into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(DeviceParams {
        name: name.to_string(),
        params,
    })
}

/// Open a flash backend and create a FlashHandle
///
/// # Arguments
/// * `device` - Device specification (e.g., "dummy" or "file:path=odroid-go.bin")
///
/// # Example
/// ```ignore
/// let mut handle = open_flash("dummy:layout=reference")?;
/// println!("Flash size: {} bytes", handle.size());
/// ```
pub fn open_flash(device: &str) -> Result<FlashHandle, Box<dyn std::error::Error>> {
    let params = parse_device_params(device)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        #[cfg(feature = "file")]
        "file" | "image" => open_file(&params),

        _ => Err(format!("Unknown device: {}", params.name).into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &DeviceParams) -> Result<FlashHandle, Box<dyn std::error::Error>> {
    use goflash_core::config::parse_size;
    use goflash_dummy::{reference_partitions, DummyConfig, DummyFlash};

    let mut config = DummyConfig::default();
    if let Some(size) = params.params.get("size") {
        config.size =
            parse_size(size).map_err(|e| format!("Invalid dummy size '{}': {}", size, e))? as usize;
    }
    if let Some(sector) = params.params.get("sector") {
        config.sector_size = parse_size(sector)
            .map_err(|e| format!("Invalid dummy sector size '{}': {}", sector, e))?
            as usize;
    }
    if config.sector_size == 0 || config.size % config.sector_size != 0 {
        return Err(format!(
            "Dummy size {} is not a multiple of the sector size {}",
            config.size, config.sector_size
        )
        .into());
    }

    let layout = params.params.get("layout").map_or("reference", String::as_str);
    let flash = match layout {
        "reference" => DummyFlash::with_partitions(config, &reference_partitions()),
        "blank" => DummyFlash::new(config),
        other => return Err(format!("Unknown dummy layout: {} (reference, blank)", other).into()),
    };

    log::info!(
        "Opened dummy flash ({} bytes, {} layout)",
        flash.config().size,
        layout
    );
    let info = DeviceInfo {
        backend: "dummy".to_string(),
        description: format!("in-memory emulator, {} layout", layout),
    };
    Ok(FlashHandle::new(Box::new(flash), info))
}

#[cfg(feature = "file")]
fn open_file(params: &DeviceParams) -> Result<FlashHandle, Box<dyn std::error::Error>> {
    use goflash_file::{parse_options, FileFlash};

    let config =
        parse_options(&params.options()).map_err(|e| format!("Invalid file parameters: {}", e))?;
    let flash = FileFlash::open(&config).map_err(|e| {
        format!(
            "Failed to open flash image: {}\n\
             Pass create=true to start from a blank image.",
            e
        )
    })?;

    let info = DeviceInfo {
        backend: "file".to_string(),
        description: flash.path().display().to_string(),
    };
    Ok(FlashHandle::new(Box::new(flash), info))
}

/// Information about a backend
#[derive(Debug, Clone, Copy)]
pub struct DeviceSpec {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all backends enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_devices() -> Vec<DeviceSpec> {
    let mut devices = Vec::new();

    #[cfg(feature = "dummy")]
    devices.push(DeviceSpec {
        name: "dummy",
        aliases: &[],
        description: "In-memory flash emulator (size=<bytes>,sector=<bytes>,layout=<reference|blank>)",
    });

    #[cfg(feature = "file")]
    devices.push(DeviceSpec {
        name: "file",
        aliases: &["image"],
        description: "Raw flash image on disk (path=<file>,create=true,size=<bytes>,erase=<bytes>)",
    });

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_params() {
        let params = parse_device_params("dummy").unwrap();
        assert_eq!(params.name, "dummy");
        assert!(params.params.is_empty());

        let params = parse_device_params("file:path=a.bin,create=true").unwrap();
        assert_eq!(params.name, "file");
        assert_eq!(params.params.get("path").map(String::as_str), Some("a.bin"));
        assert_eq!(params.params.get("create").map(String::as_str), Some("true"));

        assert!(parse_device_params("file:path").is_err());
        assert!(parse_device_params(":path=a").is_err());
    }

    #[test]
    fn test_unknown_device() {
        let err = open_flash("ch341a").unwrap_err();
        assert!(err.to_string().contains("Unknown device"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        use goflash_core::flash::FlashDevice;

        let mut handle = open_flash("dummy:size=2M").unwrap();
        assert_eq!(handle.name(), "dummy");
        assert_eq!(handle.size(), 2 * 1024 * 1024);
        assert_eq!(handle.erase_granularity(), 4096);

        // Reference layout starts with the nvs entry
        let mut magic = [0u8; 2];
        handle.read(0x8000, &mut magic).unwrap();
        assert_eq!(magic, [0xAA, 0x50]);

        let mut blank = open_flash("dummy:layout=blank").unwrap();
        blank.read(0x8000, &mut magic).unwrap();
        assert_eq!(magic, [0xFF, 0xFF]);

        assert!(open_flash("dummy:layout=weird").is_err());
        assert!(open_flash("dummy:size=5000").is_err());
    }

    #[test]
    fn test_available_devices_have_names() {
        for spec in available_devices() {
            assert!(!spec.name.is_empty());
            assert!(!spec.description.is_empty());
        }
    }
}
