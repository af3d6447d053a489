//! Device and updater configuration
//!
//! [`DeviceConfig`] carries the flash geometry and partition table placement
//! of the target device. The defaults describe the reference device (ESP32
//! with 16 MiB of SPI flash, partition table at `0x8000`).
//!
//! With the `std` feature, configuration can also be loaded from a TOML file:
//!
//! ```toml
//! [device]
//! flash_size = "16 MiB"
//! erase_block_size = 4096
//! partition_alignment = "64 KiB"
//! table_offset = 0x8000
//! table_max_len = 0xC00
//! poll_interval_ms = 100
//!
//! [firmware]
//! directory = "/sd/odroid/firmware"
//! auxiliary_file = "utility.bin"
//! extension = "fw"
//! ```

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::{parse_number, parse_size, ConfigError, ConfigFile, FirmwareConfig};

use crate::error::{Error, Result};
use crate::partition::ENTRY_LEN;

/// Total flash capacity of the reference device
pub const DEFAULT_FLASH_SIZE: u32 = 16 * 1024 * 1024;
/// Smallest erasable unit
pub const DEFAULT_ERASE_BLOCK_SIZE: u32 = 4096;
/// Every managed partition starts on this boundary
pub const DEFAULT_PARTITION_ALIGNMENT: u32 = 0x10000;
/// Offset of the partition table in flash
pub const DEFAULT_TABLE_OFFSET: u32 = 0x8000;
/// Maximum length of the partition table data, including the terminator
pub const DEFAULT_TABLE_MAX_LEN: u32 = 0xC00;
/// Input polling interval while waiting for confirmation
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 100;

/// Flash geometry and partition table placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Total flash capacity in bytes
    pub flash_size: u32,
    /// Erase block size in bytes
    pub erase_block_size: u32,
    /// Required alignment of every flashed partition
    pub partition_alignment: u32,
    /// Offset of the partition table region
    pub table_offset: u32,
    /// Length of the partition table region
    pub table_max_len: u32,
    /// Interval between input polls while awaiting confirmation
    pub poll_interval_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            flash_size: DEFAULT_FLASH_SIZE,
            erase_block_size: DEFAULT_ERASE_BLOCK_SIZE,
            partition_alignment: DEFAULT_PARTITION_ALIGNMENT,
            table_offset: DEFAULT_TABLE_OFFSET,
            table_max_len: DEFAULT_TABLE_MAX_LEN,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl DeviceConfig {
    /// Number of entry slots in the partition table region
    pub fn table_max_entries(&self) -> usize {
        self.table_max_len as usize / ENTRY_LEN
    }

    /// Check that the constants describe a usable device
    ///
    /// A table region larger than one erase block cannot be rewritten with a
    /// single erase and is reported as `TableSize`.
    pub fn validate(&self) -> Result<()> {
        if self.erase_block_size == 0 || !self.erase_block_size.is_power_of_two() {
            log::error!("erase block size {} is not a power of two", self.erase_block_size);
            return Err(Error::InvalidAlignment);
        }
        if self.partition_alignment == 0
            || !self.partition_alignment.is_power_of_two()
            || self.partition_alignment < self.erase_block_size
        {
            log::error!(
                "partition alignment 0x{:X} must be a power of two >= the erase block",
                self.partition_alignment
            );
            return Err(Error::InvalidAlignment);
        }
        if self.table_max_len > self.erase_block_size
            || self.table_max_len as usize % ENTRY_LEN != 0
            || self.table_max_len == 0
        {
            log::error!(
                "partition table length 0x{:X} does not fit one erase block of 0x{:X}",
                self.table_max_len,
                self.erase_block_size
            );
            return Err(Error::TableSize);
        }
        if self.table_offset % self.erase_block_size != 0 {
            return Err(Error::InvalidAlignment);
        }
        if self.table_offset as u64 + self.table_max_len as u64 > self.flash_size as u64 {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(())
    }
}
