//! Partition records inside a container
//!
//! Each record is a 28-byte slot header, a little-endian `u32` data length
//! and `data_length` bytes of payload. The slot header reserves `length`
//! bytes of flash; records are placed back to back starting at the base
//! address, each on a partition alignment boundary.

use alloc::vec::Vec;

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::source::ImageSource;
use crate::error::{Error, Result};
use crate::partition::{subtypes, types, Label, PartitionFlags};

/// Length of a slot header on disk
pub const SLOT_HEADER_LEN: usize = 28;
/// Length of the data length field that follows a slot header
pub const DATA_LENGTH_LEN: usize = 4;
/// Label of the synthesized auxiliary slot
pub const UTILITY_LABEL: &str = "utility";

/// On-disk slot header layout
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
struct RawSlotHeader {
    partition_type: u8,
    subtype: u8,
    reserved: [u8; 2],
    label: [u8; 16],
    flags: U32,
    length: U32,
}

/// Describes one partition carried by a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    /// Partition type (`0xFF` is reserved for erased flash)
    pub partition_type: u8,
    /// Partition subtype
    pub subtype: u8,
    /// Partition label
    pub label: Label,
    /// Partition flags, copied verbatim into the table
    pub flags: PartitionFlags,
    /// Flash capacity reserved for the partition
    pub length: u32,
}

impl SlotHeader {
    /// Build a slot header with no flags
    pub fn new(partition_type: u8, subtype: u8, label: &str, length: u32) -> Self {
        Self {
            partition_type,
            subtype,
            label: Label::new(label),
            flags: PartitionFlags::empty(),
            length,
        }
    }

    /// The slot used for an auxiliary payload of `reserved` bytes
    pub fn utility(reserved: u32) -> Self {
        Self::new(types::APP, subtypes::TEST, UTILITY_LABEL, reserved)
    }

    /// Decode from the 28-byte on-disk layout
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw = RawSlotHeader::read_from_bytes(bytes.get(..SLOT_HEADER_LEN)?).ok()?;
        Some(Self {
            partition_type: raw.partition_type,
            subtype: raw.subtype,
            label: Label::from_bytes(raw.label),
            flags: PartitionFlags::from_bits_retain(raw.flags.get()),
            length: raw.length.get(),
        })
    }

    /// Encode to the 28-byte on-disk layout
    pub fn encode(&self) -> [u8; SLOT_HEADER_LEN] {
        let raw = RawSlotHeader {
            partition_type: self.partition_type,
            subtype: self.subtype,
            reserved: [0; 2],
            label: *self.label.as_bytes(),
            flags: U32::new(self.flags.bits()),
            length: U32::new(self.length),
        };
        let mut out = [0u8; SLOT_HEADER_LEN];
        out.copy_from_slice(raw.as_bytes());
        out
    }
}

/// A validated record with its resolved flash address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Slot header
    pub slot: SlotHeader,
    /// Payload bytes stored in the container
    pub data_length: u32,
    /// Absolute flash address the payload goes to
    pub address: u32,
    /// Container offset of the payload
    pub data_offset: u64,
}

/// Walks the record stream between the header and the checksum tail
///
/// Parsing only positions the source; it never touches flash.
#[derive(Debug, Clone)]
pub struct RecordParser {
    next_offset: u64,
    tail_offset: u64,
    cursor: u32,
    flash_size: u32,
    alignment: u32,
}

impl RecordParser {
    /// Create a parser starting at container offset `start`
    pub fn new(start: u64, tail_offset: u64, base: u32, flash_size: u32, alignment: u32) -> Self {
        Self {
            next_offset: start,
            tail_offset,
            cursor: base,
            flash_size,
            alignment,
        }
    }

    /// Flash address the next record would be placed at
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Container offset of the next slot header
    pub fn offset(&self) -> u64 {
        self.next_offset
    }

    /// Parse the next record
    ///
    /// Returns `Ok(None)` when the walk lands exactly on the checksum tail.
    /// On success the source is positioned at the record's payload.
    pub fn next_record<S: ImageSource + ?Sized>(&mut self, source: &mut S) -> Result<Option<Record>> {
        if self.next_offset == self.tail_offset {
            return Ok(None);
        }
        if self.next_offset > self.tail_offset
            || self.tail_offset - self.next_offset < (SLOT_HEADER_LEN + DATA_LENGTH_LEN) as u64
        {
            log::error!(
                "record stream misaligned at 0x{:X}, checksum at 0x{:X}",
                self.next_offset,
                self.tail_offset
            );
            return Err(Error::StreamMisaligned {
                position: self.next_offset,
                expected: self.tail_offset,
            });
        }

        source.seek_to(self.next_offset)?;
        let mut raw = [0u8; SLOT_HEADER_LEN];
        source.read_exact_or(&mut raw, Error::SlotRead)?;
        let slot = SlotHeader::parse(&raw).ok_or(Error::SlotRead)?;

        if slot.partition_type == 0xFF {
            log::error!("record at 0x{:X} has erased type", self.next_offset);
            return Err(Error::ErasedSlotType);
        }

        let end = self.cursor as u64 + slot.length as u64;
        if end > self.flash_size as u64 {
            log::error!(
                "partition '{}' at 0x{:08X} length 0x{:X} exceeds flash size 0x{:X}",
                slot.label,
                self.cursor,
                slot.length,
                self.flash_size
            );
            return Err(Error::CapacityExceeded {
                address: self.cursor,
                length: slot.length,
            });
        }

        if self.cursor % self.alignment != 0 {
            log::error!(
                "partition '{}' address 0x{:08X} not aligned to 0x{:X}",
                slot.label,
                self.cursor,
                self.alignment
            );
            return Err(Error::Misaligned {
                address: self.cursor,
            });
        }

        let mut len = [0u8; DATA_LENGTH_LEN];
        source.read_exact_or(&mut len, Error::LengthRead)?;
        let data_length = u32::from_le_bytes(len);

        if data_length > slot.length {
            log::error!(
                "partition '{}' data length 0x{:X} exceeds reserved 0x{:X}",
                slot.label,
                data_length,
                slot.length
            );
            return Err(Error::DataLength {
                data_length,
                slot_length: slot.length,
            });
        }

        let data_offset = self.next_offset + (SLOT_HEADER_LEN + DATA_LENGTH_LEN) as u64;
        let payload_end = data_offset + data_length as u64;
        if payload_end > self.tail_offset {
            log::error!(
                "partition '{}' payload ends at 0x{:X}, past checksum at 0x{:X}",
                slot.label,
                payload_end,
                self.tail_offset
            );
            return Err(Error::StreamMisaligned {
                position: payload_end,
                expected: self.tail_offset,
            });
        }

        let record = Record {
            slot,
            data_length,
            address: self.cursor,
            data_offset,
        };
        log::debug!(
            "record '{}' type 0x{:02X}/0x{:02X} at 0x{:08X}, 0x{:X}/0x{:X} bytes",
            slot.label,
            slot.partition_type,
            slot.subtype,
            record.address,
            data_length,
            slot.length
        );

        // `end` fits in u32 since it is bounded by flash_size
        self.cursor = end as u32;
        self.next_offset = payload_end;
        Ok(Some(record))
    }

    /// Walk every remaining record without touching flash
    pub fn collect_records<S: ImageSource + ?Sized>(mut self, source: &mut S) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record(source)? {
            records.push(record);
        }
        Ok(records)
    }
}
