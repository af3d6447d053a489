//! TOML configuration file parsing
//!
//! Every key is optional; missing keys fall back to the reference device.
//! Numbers may be given as integers, hex strings (`"0x8000"`) or sizes
//! (`"16 MiB"`).

use std::fs;
use std::path::{Path, PathBuf};

use super::DeviceConfig;

/// Default name of the auxiliary payload inside the firmware directory
pub const DEFAULT_AUXILIARY_FILE: &str = "utility.bin";
/// Default firmware container extension
pub const DEFAULT_EXTENSION: &str = "fw";

/// Error loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was opened
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unexpected keys
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value does not describe a usable device
    #[error("invalid device config: {0}")]
    Invalid(crate::error::Error),
}

/// Where firmware containers are found on removable storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareConfig {
    /// Directory scanned for containers
    pub directory: PathBuf,
    /// Auxiliary payload file name, relative to `directory`
    pub auxiliary_file: String,
    /// Container file extension, without the dot
    pub extension: String,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            auxiliary_file: DEFAULT_AUXILIARY_FILE.into(),
            extension: DEFAULT_EXTENSION.into(),
        }
    }
}

impl FirmwareConfig {
    /// Full path of the auxiliary payload
    pub fn auxiliary_path(&self) -> PathBuf {
        self.directory.join(&self.auxiliary_file)
    }
}

/// A parsed configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Flash geometry
    pub device: DeviceConfig,
    /// Firmware storage
    pub firmware: FirmwareConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    #[serde(default)]
    device: TomlDevice,
    #[serde(default)]
    firmware: TomlFirmware,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlDevice {
    #[serde(default, deserialize_with = "deserialize_size")]
    flash_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_size")]
    erase_block_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_size")]
    partition_alignment: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_size")]
    table_offset: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_size")]
    table_max_len: Option<u32>,
    poll_interval_ms: Option<u32>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlFirmware {
    directory: Option<PathBuf>,
    auxiliary_file: Option<String>,
    extension: Option<String>,
}

/// Deserialize a u32 that can be an integer, hex (0x...) or a size string
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(Some(n)),
        SizeOrInt::Str(s) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| std::format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| std::format!("invalid number: {}", e))
    }
}

/// Parse a size string like "16 MiB", "64K" or "0x10000"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = lower
        .strip_suffix("mib")
        .or_else(|| lower.strip_suffix("mb"))
        .or_else(|| lower.strip_suffix('m'))
    {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = lower
        .strip_suffix("kib")
        .or_else(|| lower.strip_suffix("kb"))
        .or_else(|| lower.strip_suffix('k'))
    {
        (n.trim(), 1024)
    } else {
        return Err(std::format!("invalid size: {}", s));
    };

    let num: u32 = num_str
        .parse()
        .map_err(|_| std::format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| std::format!("size too large: {}", s))
}

impl ConfigFile {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile = toml::from_str(content)?;

        let defaults = DeviceConfig::default();
        let d = file.device;
        let device = DeviceConfig {
            flash_size: d.flash_size.unwrap_or(defaults.flash_size),
            erase_block_size: d.erase_block_size.unwrap_or(defaults.erase_block_size),
            partition_alignment: d
                .partition_alignment
                .unwrap_or(defaults.partition_alignment),
            table_offset: d.table_offset.unwrap_or(defaults.table_offset),
            table_max_len: d.table_max_len.unwrap_or(defaults.table_max_len),
            poll_interval_ms: d.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
        };
        device.validate().map_err(ConfigError::Invalid)?;

        let mut firmware = FirmwareConfig::default();
        if let Some(directory) = file.firmware.directory {
            firmware.directory = directory;
        }
        if let Some(aux) = file.firmware.auxiliary_file {
            firmware.auxiliary_file = aux;
        }
        if let Some(ext) = file.firmware.extension {
            firmware.extension = ext.trim_start_matches('.').into();
        }

        log::debug!("Loaded config: {:?} {:?}", device, firmware);
        Ok(Self { device, firmware })
    }
}

impl DeviceConfig {
    /// Load only the `[device]` section of a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(ConfigFile::from_toml_file(path)?.device)
    }
}
