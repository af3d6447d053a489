//! Updater states, outcomes and errors

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Error;
use crate::partition::PartitionEntry;
use crate::plan::PlanEntry;

/// Where the updater is in its sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Checking the magic and reading description and preview
    ValidatingHeader,
    /// Presenting the preview tile
    ShowingPreview,
    /// Waiting for START or B
    AwaitingConfirmation,
    /// Computing the container CRC-32
    VerifyingChecksum,
    /// Erasing and programming container records
    FlashingRecords,
    /// Erasing and programming the auxiliary payload
    FlashingAuxiliary,
    /// Rewriting the partition table
    RebuildingTable,
    /// Selecting the new boot slot
    SwitchingBoot,
    /// Restarting the device
    Rebooting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValidatingHeader => "validating header",
            Self::ShowingPreview => "showing preview",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::VerifyingChecksum => "verifying checksum",
            Self::FlashingRecords => "flashing records",
            Self::FlashingAuxiliary => "flashing auxiliary payload",
            Self::RebuildingTable => "rebuilding partition table",
            Self::SwitchingBoot => "switching boot slot",
            Self::Rebooting => "rebooting",
        };
        f.write_str(name)
    }
}

/// An aborted update: the failing state and the reason
///
/// Nothing is rolled back; flash is left as far along as the update got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateError {
    /// State the update was in
    pub state: State,
    /// What went wrong
    pub error: Error,
}

impl UpdateError {
    /// Short operator code of the underlying error
    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} while {}: {}", self.error.code(), self.state, self.error)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// What a finished update did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Firmware description from the container
    pub description: String,
    /// Verified CRC-32 of the container
    pub checksum: u32,
    /// Every partition placed in the table, in flash order
    pub partitions: Vec<PlanEntry>,
    /// Payload bytes programmed, including the auxiliary payload
    pub bytes_written: u64,
    /// Partition selected for the next boot
    pub boot: PartitionEntry,
}

/// How an update ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operator pressed B; flash was not touched
    Cancelled,
    /// Everything was written and the restart was requested
    Restarted(UpdateSummary),
}
