//! The flash plan: every partition written during one update

use crate::container::{Record, SlotHeader};
use crate::error::{Error, Result};
use crate::partition::PartitionEntry;

/// Maximum number of partitions one update may write
pub const MAX_PLAN_ENTRIES: usize = 20;

/// A slot header with its resolved flash address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanEntry {
    /// Slot header, copied verbatim into the table
    pub slot: SlotHeader,
    /// Absolute flash address
    pub address: u32,
}

impl PlanEntry {
    /// Pair a slot header with its address
    pub fn new(slot: SlotHeader, address: u32) -> Self {
        Self { slot, address }
    }

    /// Table entry for this partition, sized by the reserved length
    pub fn to_partition_entry(&self) -> PartitionEntry {
        PartitionEntry {
            partition_type: self.slot.partition_type,
            subtype: self.slot.subtype,
            offset: self.address,
            size: self.slot.length,
            label: self.slot.label,
            flags: self.slot.flags,
        }
    }
}

impl From<&Record> for PlanEntry {
    fn from(record: &Record) -> Self {
        Self::new(record.slot, record.address)
    }
}

/// Ordered, bounded list of planned partitions
#[derive(Debug, Clone, Default)]
pub struct FlashPlan {
    entries: heapless::Vec<PlanEntry, MAX_PLAN_ENTRIES>,
}

impl FlashPlan {
    /// An empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; fails once the plan holds [`MAX_PLAN_ENTRIES`]
    pub fn push(&mut self, entry: PlanEntry) -> Result<()> {
        self.entries.push(entry).map_err(|_| {
            log::error!("more than {} partitions in one update", MAX_PLAN_ENTRIES);
            Error::PartitionCount
        })
    }

    /// Whether another entry fits
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in flash order
    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }

    /// Flash address right after the last planned partition
    pub fn end(&self) -> Option<u64> {
        self.entries
            .last()
            .map(|e| e.address as u64 + e.slot.length as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let mut plan = FlashPlan::new();
        for i in 0..MAX_PLAN_ENTRIES as u32 {
            plan.push(PlanEntry::new(SlotHeader::new(0, 0x10, "p", 0x10000), i * 0x10000))
                .unwrap();
        }
        assert!(plan.is_full());
        assert_eq!(
            plan.push(PlanEntry::new(SlotHeader::new(0, 0x10, "x", 0), 0)),
            Err(Error::PartitionCount)
        );
        assert_eq!(plan.end(), Some(20 * 0x10000));
    }

    #[test]
    fn test_to_partition_entry() {
        let slot = SlotHeader::new(1, 0x81, "fat", 0x30000);
        let entry = PlanEntry::new(slot, 0x200000).to_partition_entry();
        assert_eq!(entry.offset, 0x200000);
        assert_eq!(entry.size, 0x30000);
        assert_eq!(entry.label, slot.label);
    }
}
