//! Boot slot selection
//!
//! After the table is rewritten the device must boot the freshly flashed
//! application. On the ESP32 this means pointing `otadata` at `ota_0`.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::checksum::crc32_le;
use crate::error::{Error, Result};
use crate::flash::{FlashDevice, FlashWriter};
use crate::partition::{subtypes, types, PartitionEntry, PartitionTable};

/// Selects what runs on the next boot and restarts the device
pub trait BootControl {
    /// Make the first application slot of `table` the next boot target
    ///
    /// Returns the selected partition.
    fn set_next_boot_slot<D: FlashDevice + ?Sized>(
        &mut self,
        writer: &mut FlashWriter<'_, D>,
        table: &PartitionTable,
    ) -> Result<PartitionEntry>;

    /// Restart into the selected slot
    ///
    /// On hardware this does not return.
    fn restart(&mut self) -> Result<()>;
}

/// One `otadata` sector entry (`esp_ota_select_entry_t`)
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
pub struct OtaSelectEntry {
    ota_seq: U32,
    seq_label: [u8; 20],
    ota_state: U32,
    crc: U32,
}

impl OtaSelectEntry {
    /// Length on flash
    pub const LEN: usize = 32;

    /// Entry selecting OTA slot `ota_seq - 1`
    pub fn new(ota_seq: u32) -> Self {
        Self {
            ota_seq: U32::new(ota_seq),
            seq_label: [0xFF; 20],
            ota_state: U32::new(0xFFFF_FFFF),
            crc: U32::new(Self::crc_of(ota_seq)),
        }
    }

    /// CRC the bootloader expects over `ota_seq`
    pub fn crc_of(ota_seq: u32) -> u32 {
        crc32_le(0xFFFF_FFFF, &ota_seq.to_le_bytes())
    }

    /// Decode an entry from flash bytes
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_from_bytes(bytes.get(..Self::LEN)?).ok()
    }

    /// Sequence number
    pub fn ota_seq(&self) -> u32 {
        self.ota_seq.get()
    }

    /// Whether the stored CRC matches the sequence number
    pub fn is_valid(&self) -> bool {
        self.ota_seq.get() != 0xFFFF_FFFF && self.crc.get() == Self::crc_of(self.ota_seq.get())
    }
}

/// Boot selection through the ESP32 `otadata` partition
///
/// `restart` only logs; the platform layer performs the actual reset.
#[derive(Debug, Default)]
pub struct OtaDataBoot {
    restarted: bool,
}

impl OtaDataBoot {
    /// New boot control
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `restart` has been called
    pub fn restarted(&self) -> bool {
        self.restarted
    }
}

impl BootControl for OtaDataBoot {
    fn set_next_boot_slot<D: FlashDevice + ?Sized>(
        &mut self,
        writer: &mut FlashWriter<'_, D>,
        table: &PartitionTable,
    ) -> Result<PartitionEntry> {
        let app = table.find(types::APP, subtypes::OTA_0).ok_or_else(|| {
            log::error!("no ota_0 application partition in table");
            Error::NoBootPartition
        })?;

        let sector = writer.erase_block_size();
        let otadata = table
            .find(types::DATA, subtypes::DATA_OTA)
            .ok_or_else(|| {
                log::error!("no otadata partition in table");
                Error::BootSet
            })?;
        if (otadata.size as u64) < 2 * sector as u64 {
            log::error!(
                "otadata at 0x{:X} is 0x{:X} bytes, need two sectors",
                otadata.offset,
                otadata.size
            );
            return Err(Error::BootSet);
        }

        writer
            .erase(otadata.offset, 2 * sector)
            .map_err(|_| Error::BootSet)?;
        let entry = OtaSelectEntry::new(1);
        writer
            .program(otadata.offset, entry.as_bytes())
            .map_err(|_| Error::BootSet)?;

        log::info!(
            "next boot: '{}' at 0x{:08X}",
            app.label,
            app.offset
        );
        Ok(app)
    }

    fn restart(&mut self) -> Result<()> {
        log::info!("restarting");
        self.restarted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{Label, PartitionFlags};
    use crate::testutil::MemFlash;

    fn entry(t: u8, s: u8, label: &str, offset: u32, size: u32) -> PartitionEntry {
        PartitionEntry {
            partition_type: t,
            subtype: s,
            offset,
            size,
            label: Label::new(label),
            flags: PartitionFlags::empty(),
        }
    }

    fn table_with(entries: &[PartitionEntry]) -> PartitionTable {
        let mut table = PartitionTable::blank(0x8000, 0xC00);
        for e in entries {
            table.append(e).unwrap();
        }
        table
    }

    #[test]
    fn test_select_entry_layout() {
        let e = OtaSelectEntry::new(1);
        let raw = e.as_bytes();
        assert_eq!(raw.len(), OtaSelectEntry::LEN);
        assert_eq!(&raw[0..4], &1u32.to_le_bytes());
        assert!(raw[4..28].iter().all(|&b| b == 0xFF));
        assert!(OtaSelectEntry::parse(raw).unwrap().is_valid());
    }

    #[test]
    fn test_set_boot_slot() {
        let table = table_with(&[
            entry(types::DATA, subtypes::DATA_OTA, "otadata", 0xD000, 0x2000),
            entry(types::APP, subtypes::FACTORY, "factory", 0x10000, 0xF0000),
            entry(types::APP, subtypes::OTA_0, "app", 0x100000, 0x100000),
        ]);
        let mut flash = MemFlash::new(0x200000);
        flash.data[0xD000..0xF000].fill(0x00);
        let mut writer = FlashWriter::new(&mut flash);
        let mut boot = OtaDataBoot::new();
        let app = boot.set_next_boot_slot(&mut writer, &table).unwrap();
        assert_eq!(app.offset, 0x100000);

        let selected = OtaSelectEntry::parse(&flash.data[0xD000..]).unwrap();
        assert!(selected.is_valid());
        assert_eq!(selected.ota_seq(), 1);
        assert!(flash.data[0xE000..0xF000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_missing_partitions() {
        let mut flash = MemFlash::new(0x200000);
        let mut writer = FlashWriter::new(&mut flash);
        let mut boot = OtaDataBoot::new();

        let no_app = table_with(&[entry(types::DATA, subtypes::DATA_OTA, "otadata", 0xD000, 0x2000)]);
        assert_eq!(
            boot.set_next_boot_slot(&mut writer, &no_app),
            Err(Error::NoBootPartition)
        );

        let no_otadata = table_with(&[entry(types::APP, subtypes::OTA_0, "app", 0x100000, 0x1000)]);
        assert_eq!(
            boot.set_next_boot_slot(&mut writer, &no_otadata),
            Err(Error::BootSet)
        );
    }
}
