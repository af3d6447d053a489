//! On-flash partition table image
//!
//! The table is loaded once, edited in memory and written back with a
//! single erase of the block that holds it. Entries up to and including the
//! factory anchor are never touched.

use alloc::vec::Vec;

use super::entry::{PartitionEntry, ENTRY_LEN, ERASED_MAGIC, MD5_MAGIC};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::flash::{FlashDevice, FlashWriter};
use crate::plan::FlashPlan;

/// The factory entry and its slot in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Entry index of the factory partition
    pub index: usize,
    /// The factory partition itself
    pub entry: PartitionEntry,
    base: u32,
}

impl Anchor {
    /// Flash address right after the factory partition
    ///
    /// New content is placed from here on.
    pub fn base_address(&self) -> u32 {
        self.base
    }
}

/// In-memory copy of the partition table region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    image: Vec<u8>,
    offset: u32,
}

impl PartitionTable {
    /// Read the table region from flash
    pub fn load<D: FlashDevice + ?Sized>(
        writer: &mut FlashWriter<'_, D>,
        config: &DeviceConfig,
    ) -> Result<Self> {
        let mut image = Vec::new();
        image
            .try_reserve_exact(config.table_max_len as usize)
            .map_err(|_| Error::OutOfMemory)?;
        image.resize(config.table_max_len as usize, 0xFF);
        writer
            .read(config.table_offset, &mut image)
            .map_err(|_| Error::TableRead)?;
        log::debug!(
            "loaded partition table at 0x{:X} ({} bytes)",
            config.table_offset,
            image.len()
        );
        Ok(Self {
            image,
            offset: config.table_offset,
        })
    }

    /// Wrap a raw table image located at `offset`
    pub fn from_bytes(offset: u32, bytes: &[u8]) -> Self {
        let len = bytes.len() - bytes.len() % ENTRY_LEN;
        Self {
            image: bytes[..len].to_vec(),
            offset,
        }
    }

    /// An empty (all 0xFF) table of `len` bytes
    pub fn blank(offset: u32, len: usize) -> Self {
        Self {
            image: alloc::vec![0xFF; len - len % ENTRY_LEN],
            offset,
        }
    }

    /// Flash offset of the table region
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of entry slots in the region
    pub fn max_entries(&self) -> usize {
        self.image.len() / ENTRY_LEN
    }

    /// Raw table image
    pub fn as_bytes(&self) -> &[u8] {
        &self.image
    }

    fn slot(&self, index: usize) -> &[u8] {
        &self.image[index * ENTRY_LEN..(index + 1) * ENTRY_LEN]
    }

    /// Number of slots in use before the terminator
    pub fn used_slots(&self) -> usize {
        (0..self.max_entries())
            .find(|&i| {
                matches!(
                    PartitionEntry::magic_of(self.slot(i)),
                    Some(ERASED_MAGIC) | Some(MD5_MAGIC)
                )
            })
            .unwrap_or(self.max_entries())
    }

    /// Valid entries with their slot index, up to the terminator
    pub fn indexed_entries(&self) -> impl Iterator<Item = (usize, PartitionEntry)> + '_ {
        (0..self.used_slots()).filter_map(|i| PartitionEntry::parse(self.slot(i)).map(|e| (i, e)))
    }

    /// Valid entries, up to the terminator
    pub fn entries(&self) -> Vec<PartitionEntry> {
        self.indexed_entries().map(|(_, e)| e).collect()
    }

    /// Find the (APP, FACTORY) anchor on a flash of `flash_size` bytes
    ///
    /// The factory partition must lie after the table region and end within
    /// the flash, otherwise new content could land on the bootloader.
    pub fn locate_anchor(&self, flash_size: u32) -> Result<Anchor> {
        let anchor = self.find_anchor()?;
        if anchor.base > flash_size {
            log::error!(
                "factory partition ends at 0x{:X}, beyond flash size 0x{:X}",
                anchor.base,
                flash_size
            );
            return Err(Error::NoFactoryPartition);
        }
        Ok(anchor)
    }

    fn find_anchor(&self) -> Result<Anchor> {
        let (index, entry) = self
            .indexed_entries()
            .find(|(_, e)| e.is_factory())
            .ok_or_else(|| {
                log::error!("no factory partition in table at 0x{:X}", self.offset);
                Error::NoFactoryPartition
            })?;

        let table_end = self.offset as u64 + self.image.len() as u64;
        let base = match entry.offset.checked_add(entry.size) {
            Some(base) if entry.offset as u64 >= table_end => base,
            _ => {
                log::error!(
                    "factory partition at 0x{:X} size 0x{:X} is not a usable anchor",
                    entry.offset,
                    entry.size
                );
                return Err(Error::NoFactoryPartition);
            }
        };
        Ok(Anchor { index, entry, base })
    }

    /// Blank every slot after `index`
    pub fn truncate_after(&mut self, index: usize) {
        let start = ((index + 1) * ENTRY_LEN).min(self.image.len());
        self.image[start..].fill(0xFF);
    }

    /// Store `entry` in the first free slot and return its index
    pub fn append(&mut self, entry: &PartitionEntry) -> Result<usize> {
        let index = self.used_slots();
        if index >= self.max_entries() {
            log::error!(
                "partition table full, cannot add '{}' ({} slots)",
                entry.label,
                self.max_entries()
            );
            return Err(Error::TableFull);
        }
        self.set_entry(index, entry);
        Ok(index)
    }

    /// Overwrite the slot at `index`
    pub fn set_entry(&mut self, index: usize, entry: &PartitionEntry) {
        self.image[index * ENTRY_LEN..(index + 1) * ENTRY_LEN].copy_from_slice(&entry.encode());
    }

    /// Replace everything after the anchor with the entries of `plan`
    ///
    /// Returns the anchor. The table is only changed in memory.
    pub fn rebuild(&mut self, plan: &FlashPlan) -> Result<Anchor> {
        let anchor = self.find_anchor()?;
        if anchor.index + 1 + plan.len() > self.max_entries() {
            log::error!(
                "{} new entries after slot {} do not fit {} slots",
                plan.len(),
                anchor.index,
                self.max_entries()
            );
            return Err(Error::TableFull);
        }
        self.truncate_after(anchor.index);
        for entry in plan.iter() {
            let part = entry.to_partition_entry();
            let index = self.append(&part)?;
            log::info!(
                "table[{}] '{}' type 0x{:02X}/0x{:02X} at 0x{:08X} size 0x{:X}",
                index,
                part.label,
                part.partition_type,
                part.subtype,
                part.offset,
                part.size
            );
        }
        Ok(anchor)
    }

    /// Erase the table block and write the whole image back
    pub fn commit<D: FlashDevice + ?Sized>(&self, writer: &mut FlashWriter<'_, D>) -> Result<()> {
        let block = writer.erase_block_size();
        if self.image.len() > block as usize {
            log::error!(
                "partition table of {} bytes exceeds erase block of {}",
                self.image.len(),
                block
            );
            return Err(Error::TableSize);
        }
        writer
            .erase(self.offset, block)
            .map_err(|_| Error::TableErase)?;
        writer
            .program(self.offset, &self.image)
            .map_err(|_| Error::TableWrite)?;
        log::info!("partition table written at 0x{:X}", self.offset);
        Ok(())
    }

    /// First entry with the given type and subtype
    pub fn find(&self, partition_type: u8, subtype: u8) -> Option<PartitionEntry> {
        self.indexed_entries()
            .map(|(_, e)| e)
            .find(|e| e.partition_type == partition_type && e.subtype == subtype)
    }

    /// Highest end address of any entry
    pub fn data_end(&self) -> u64 {
        self.indexed_entries().map(|(_, e)| e.end()).max().unwrap_or(0)
    }
}
