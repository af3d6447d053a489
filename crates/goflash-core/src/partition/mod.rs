//! ESP32 partition table
//!
//! The table lives in one erase block (at `0x8000` on the reference
//! device) as a run of 32-byte entries ending with an erased entry or the
//! MD5 checksum entry.

mod entry;
mod table;

pub use entry::{
    subtypes, types, Label, PartitionEntry, PartitionFlags, ENTRY_LEN, ENTRY_MAGIC, ERASED_MAGIC,
    LABEL_LEN, MD5_MAGIC,
};
pub use table::{Anchor, PartitionTable};
