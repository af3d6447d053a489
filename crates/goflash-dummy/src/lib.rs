//! goflash-dummy - In-memory flash emulator for testing
//!
//! This crate provides a flash device that emulates the ODROID-GO's 16 MiB
//! SPI NOR flash in memory. Erases set whole 4 KiB sectors to `0xFF`,
//! programming can only clear bits, and every operation is recorded so tests
//! can check exactly what the updater did to the device.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use goflash_core::error::{Error, Result};
use goflash_core::flash::FlashDevice;
use goflash_core::partition::{
    subtypes, types, Label, PartitionEntry, PartitionFlags, PartitionTable,
};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Sector size for the smallest erase
    pub sector_size: usize,
    /// Offset of the partition table
    pub table_offset: u32,
    /// Length of the partition table region
    pub table_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 16 * 1024 * 1024,
            sector_size: 4096,
            table_offset: 0x8000,
            table_len: 0xC00,
        }
    }
}

/// One recorded device operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// Read of `len` bytes
    Read {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// Erase of `len` bytes
    Erase {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// Program of `len` bytes
    Write {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
}

/// Dummy flash device
///
/// Emulates a NOR flash chip in memory for testing purposes.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    ops: Vec<FlashOp>,
    fail_erase_at: Option<u32>,
    fail_write_at: Option<u32>,
}

impl DummyFlash {
    /// Create a new, fully erased dummy flash
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            ops: Vec::new(),
            fail_erase_at: None,
            fail_write_at: None,
        }
    }

    /// Create a new dummy flash with the default 16 MiB geometry
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Create a dummy flash whose partition table holds `entries`
    pub fn with_partitions(config: DummyConfig, entries: &[PartitionEntry]) -> Self {
        let mut table = PartitionTable::blank(config.table_offset, config.table_len);
        for entry in entries {
            if table.append(entry).is_err() {
                log::warn!("dummy partition table full, dropping '{}'", entry.label);
                break;
            }
        }
        let mut flash = Self::new(config);
        let start = flash.config.table_offset as usize;
        let image = table.as_bytes();
        flash.data[start..start + image.len()].copy_from_slice(image);
        flash
    }

    /// Create a 16 MiB flash with the stock ODROID-GO partition layout
    ///
    /// nvs, otadata, phy_init and a factory app ending at `0x100000`.
    pub fn reference() -> Self {
        Self::with_partitions(DummyConfig::default(), &reference_partitions())
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every operation performed so far
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    /// Forget the recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Erase operations performed so far
    pub fn erase_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, FlashOp::Erase { .. }))
            .count()
    }

    /// Program operations performed so far
    pub fn write_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, FlashOp::Write { .. }))
            .count()
    }

    /// Whether any erase or program was issued
    pub fn is_untouched(&self) -> bool {
        self.erase_count() == 0 && self.write_count() == 0
    }

    /// Make erases covering `addr` fail
    pub fn fail_erase_at(&mut self, addr: u32) {
        self.fail_erase_at = Some(addr);
    }

    /// Make programs covering `addr` fail
    pub fn fail_write_at(&mut self, addr: u32) {
        self.fail_write_at = Some(addr);
    }

    /// Current partition table as stored in flash
    pub fn partition_table(&self) -> PartitionTable {
        let start = self.config.table_offset as usize;
        PartitionTable::from_bytes(
            self.config.table_offset,
            &self.data[start..start + self.config.table_len],
        )
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(Error::AddressOutOfBounds)?;
        if end > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(start..end)
    }
}

fn covers(target: Option<u32>, addr: u32, len: usize) -> bool {
    target.is_some_and(|t| (addr as u64..addr as u64 + len as u64).contains(&(t as u64)))
}

impl FlashDevice for DummyFlash {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn erase_granularity(&self) -> u32 {
        self.config.sector_size as u32
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let range = self.check_range(addr, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        self.ops.push(FlashOp::Read {
            addr,
            len: buf.len() as u32,
        });
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let range = self.check_range(addr, data.len())?;
        if covers(self.fail_write_at, addr, data.len()) {
            log::debug!("dummy: injected write failure at 0x{:08X}", addr);
            return Err(Error::WriteError { addr });
        }

        // Flash programming: can only change 1 -> 0
        for (dst, &byte) in self.data[range].iter_mut().zip(data) {
            *dst &= byte;
        }
        self.ops.push(FlashOp::Write {
            addr,
            len: data.len() as u32,
        });
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        let sector = self.config.sector_size as u32;
        if addr % sector != 0 || len % sector != 0 {
            return Err(Error::InvalidAlignment);
        }
        let range = self.check_range(addr, len as usize)?;
        if covers(self.fail_erase_at, addr, len as usize) {
            log::debug!("dummy: injected erase failure at 0x{:08X}", addr);
            return Err(Error::EraseError { addr });
        }

        self.data[range].fill(0xFF);
        self.ops.push(FlashOp::Erase { addr, len });
        Ok(())
    }
}

/// The stock ODROID-GO partition layout
pub fn reference_partitions() -> Vec<PartitionEntry> {
    let entry = |partition_type, subtype, label, offset, size| PartitionEntry {
        partition_type,
        subtype,
        offset,
        size,
        label: Label::new(label),
        flags: PartitionFlags::empty(),
    };
    vec![
        entry(types::DATA, subtypes::DATA_NVS, "nvs", 0x9000, 0x4000),
        entry(types::DATA, subtypes::DATA_OTA, "otadata", 0xD000, 0x2000),
        entry(types::DATA, subtypes::DATA_PHY, "phy_init", 0xF000, 0x1000),
        entry(types::APP, subtypes::FACTORY, "factory", 0x10000, 0xF0000),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut flash = DummyFlash::new_default();

        let data = [0x12, 0x34, 0x56, 0x78];
        flash.write(0x1000, &data).unwrap();

        let mut buf = [0u8; 4];
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(flash.write_count(), 1);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = DummyFlash::new_default();
        flash.write(0, &[0x0F]).unwrap();
        flash.write(0, &[0xF1]).unwrap();
        assert_eq!(flash.data()[0], 0x01);
    }

    #[test]
    fn test_erase() {
        let mut flash = DummyFlash::new_default();
        flash.write(0, &[0x00u8; 256]).unwrap();

        assert_eq!(flash.erase(0x100, 0x1000), Err(Error::InvalidAlignment));
        flash.erase(0, 0x1000).unwrap();
        assert!(flash.data()[..0x1000].iter().all(|&b| b == 0xFF));
        assert_eq!(flash.ops()[1], FlashOp::Erase { addr: 0, len: 0x1000 });
    }

    #[test]
    fn test_out_of_bounds() {
        let mut flash = DummyFlash::new(DummyConfig {
            size: 0x2000,
            ..DummyConfig::default()
        });
        let mut buf = [0u8; 16];
        assert_eq!(flash.read(0x1FF8, &mut buf), Err(Error::AddressOutOfBounds));
        assert_eq!(flash.erase(0x2000, 0x1000), Err(Error::AddressOutOfBounds));
        assert!(flash.is_untouched());
    }

    #[test]
    fn test_fault_injection() {
        let mut flash = DummyFlash::new_default();
        flash.fail_erase_at(0x8000);
        flash.fail_write_at(0x20010);
        assert!(flash.erase(0x8000, 0x1000).is_err());
        assert!(flash.erase(0x9000, 0x1000).is_ok());
        assert!(flash.write(0x20000, &[0u8; 32]).is_err());
        assert!(flash.write(0x20020, &[0u8; 32]).is_ok());
    }

    #[test]
    fn test_reference_layout() {
        let flash = DummyFlash::reference();
        let table = flash.partition_table();
        let anchor = table.locate_anchor(flash.size()).unwrap();
        assert_eq!(anchor.index, 3);
        assert_eq!(anchor.base_address(), 0x100000);
        assert_eq!(table.entries().len(), 4);
    }
}
