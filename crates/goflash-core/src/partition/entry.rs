//! ESP32 partition table entries

use core::fmt;

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Length of one table entry
pub const ENTRY_LEN: usize = 32;
/// Magic value of a valid entry
pub const ENTRY_MAGIC: u16 = 0x50AA;
/// Magic value of the MD5 checksum entry, which ends the table
pub const MD5_MAGIC: u16 = 0xEBEB;
/// Magic value of erased flash, which ends the table
pub const ERASED_MAGIC: u16 = 0xFFFF;
/// Length of a partition label
pub const LABEL_LEN: usize = 16;

/// Partition types
pub mod types {
    /// Application image
    pub const APP: u8 = 0x00;
    /// Data partition
    pub const DATA: u8 = 0x01;
}

/// Partition subtypes
pub mod subtypes {
    /// Factory application (the table anchor)
    pub const FACTORY: u8 = 0x00;
    /// First OTA application slot
    pub const OTA_0: u8 = 0x10;
    /// Test application
    pub const TEST: u8 = 0x20;
    /// OTA selection data
    pub const DATA_OTA: u8 = 0x00;
    /// PHY init data
    pub const DATA_PHY: u8 = 0x01;
    /// Non-volatile storage
    pub const DATA_NVS: u8 = 0x02;
}

bitflags::bitflags! {
    /// Partition flags
    ///
    /// Unknown bits are kept so that flags are copied verbatim.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartitionFlags: u32 {
        /// Contents are encrypted
        const ENCRYPTED = 1 << 0;
        /// Partition is read-only
        const READONLY = 1 << 1;
    }
}

/// A fixed 16-byte partition label, not necessarily NUL-terminated
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Label([u8; LABEL_LEN]);

impl Label {
    /// Build a label from text, cut to 16 bytes and padded with NUL
    pub fn new(text: &str) -> Self {
        let mut raw = [0u8; LABEL_LEN];
        let bytes = text.as_bytes();
        let n = bytes.len().min(LABEL_LEN);
        raw[..n].copy_from_slice(&bytes[..n]);
        Self(raw)
    }

    /// Wrap raw label bytes
    pub fn from_bytes(raw: [u8; LABEL_LEN]) -> Self {
        Self(raw)
    }

    /// Raw label bytes
    pub fn as_bytes(&self) -> &[u8; LABEL_LEN] {
        &self.0
    }

    /// Label text up to the first NUL
    pub fn text(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
        &self.0[..end]
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.text().utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{FFFD}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label(\"{}\")", self)
    }
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
struct RawEntry {
    magic: U16,
    partition_type: u8,
    subtype: u8,
    offset: U32,
    size: U32,
    label: [u8; LABEL_LEN],
    flags: U32,
}

/// One partition table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Partition type
    pub partition_type: u8,
    /// Partition subtype
    pub subtype: u8,
    /// Absolute flash offset
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Label
    pub label: Label,
    /// Flags
    pub flags: PartitionFlags,
}

impl PartitionEntry {
    /// Magic of the entry encoded at the start of `bytes`
    pub fn magic_of(bytes: &[u8]) -> Option<u16> {
        Some(U16::read_from_bytes(bytes.get(..2)?).ok()?.get())
    }

    /// Decode an entry; `None` unless it carries the entry magic
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw = RawEntry::read_from_bytes(bytes.get(..ENTRY_LEN)?).ok()?;
        if raw.magic.get() != ENTRY_MAGIC {
            return None;
        }
        Some(Self {
            partition_type: raw.partition_type,
            subtype: raw.subtype,
            offset: raw.offset.get(),
            size: raw.size.get(),
            label: Label::from_bytes(raw.label),
            flags: PartitionFlags::from_bits_retain(raw.flags.get()),
        })
    }

    /// Encode to the 32-byte on-flash layout
    pub fn encode(&self) -> [u8; ENTRY_LEN] {
        let raw = RawEntry {
            magic: U16::new(ENTRY_MAGIC),
            partition_type: self.partition_type,
            subtype: self.subtype,
            offset: U32::new(self.offset),
            size: U32::new(self.size),
            label: *self.label.as_bytes(),
            flags: U32::new(self.flags.bits()),
        };
        let mut out = [0u8; ENTRY_LEN];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// First byte past the partition
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    /// Whether this is the (APP, FACTORY) anchor
    pub fn is_factory(&self) -> bool {
        self.partition_type == types::APP && self.subtype == subtypes::FACTORY
    }

    /// Human readable type name
    pub fn type_name(&self) -> &'static str {
        match (self.partition_type, self.subtype) {
            (types::APP, subtypes::FACTORY) => "factory",
            (types::APP, subtypes::TEST) => "test",
            (types::APP, s) if (subtypes::OTA_0..subtypes::OTA_0 + 16).contains(&s) => "ota",
            (types::APP, _) => "app",
            (types::DATA, subtypes::DATA_OTA) => "otadata",
            (types::DATA, subtypes::DATA_PHY) => "phy",
            (types::DATA, subtypes::DATA_NVS) => "nvs",
            (types::DATA, _) => "data",
            _ => "custom",
        }
    }
}
