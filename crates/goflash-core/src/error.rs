//! Error types for goflash-core
//!
//! This module provides a no_std compatible error type shared by every
//! component of the updater. Each variant maps to a short fixed code that is
//! shown to the operator when an update is aborted.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Container errors
    /// The container is shorter than its magic string
    HeaderRead,
    /// The container magic string does not match
    HeaderMismatch,
    /// The description field could not be read in full
    DescriptionRead,
    /// The preview tile could not be read in full
    PreviewRead,
    /// The trailing checksum could not be read
    ChecksumRead,
    /// The computed checksum differs from the stored one
    ChecksumMismatch {
        /// Value stored in the last four bytes of the container
        expected: u32,
        /// Value computed over the container body
        actual: u32,
    },
    /// A slot header could not be read in full
    SlotRead,
    /// A record's data length field could not be read in full
    LengthRead,
    /// A slot header carries the erased type 0xFF
    ErasedSlotType,
    /// A record stores more payload than its slot reserves
    DataLength {
        /// Payload bytes stored in the container
        data_length: u32,
        /// Flash capacity reserved by the slot header
        slot_length: u32,
    },
    /// The flash cursor is not aligned to the partition alignment
    Misaligned {
        /// Flash address the record would be written to
        address: u32,
    },
    /// A partition would extend beyond the end of flash
    CapacityExceeded {
        /// Flash address the partition would start at
        address: u32,
        /// Reserved length of the partition
        length: u32,
    },
    /// Walking the records did not land exactly on the checksum tail
    StreamMisaligned {
        /// Container offset the walk reached
        position: u64,
        /// Offset of the checksum tail
        expected: u64,
    },
    /// More records than the flash plan can hold
    PartitionCount,

    // I/O errors
    /// Reading from the image source failed or ended early
    ReadError,
    /// Seeking within the image source failed
    SeekError,

    // Flash errors
    /// Erase operation failed
    EraseError {
        /// Address where the erase was attempted
        addr: u32,
    },
    /// Write/program operation failed
    WriteError {
        /// Address where the write was attempted
        addr: u32,
    },
    /// Fewer or more bytes were programmed than the record declares
    DataSize {
        /// Bytes the record declares
        expected: u32,
        /// Bytes actually programmed
        written: u32,
    },
    /// Reading flash contents failed
    FlashReadError,
    /// Address is beyond flash size
    AddressOutOfBounds,
    /// Operation requires aligned address or size
    InvalidAlignment,
    /// Provided buffer is too small for the operation
    BufferTooSmall,

    // Partition table errors
    /// The partition table region could not be read
    TableRead,
    /// No (APP, FACTORY) anchor entry exists in the partition table
    NoFactoryPartition,
    /// The partition table region does not fit one erase block
    TableSize,
    /// The rebuilt partition table has more entries than the region holds
    TableFull,
    /// Erasing the partition table block failed
    TableErase,
    /// Writing the partition table failed
    TableWrite,

    // Boot errors
    /// No application slot to boot was found in the partition table
    NoBootPartition,
    /// Selecting the boot slot failed
    BootSet,

    /// A scratch buffer could not be allocated
    OutOfMemory,
}

impl Error {
    /// Short fixed code shown to the operator when an update aborts
    pub fn code(&self) -> &'static str {
        match self {
            Self::HeaderRead => "HEADER READ ERROR",
            Self::HeaderMismatch => "HEADER MATCH ERROR",
            Self::DescriptionRead => "DESCRIPTION READ ERROR",
            Self::PreviewRead => "TILE READ ERROR",
            Self::ChecksumRead => "CHECKSUM READ ERROR",
            Self::ChecksumMismatch { .. } => "CHECKSUM MISMATCH ERROR",
            Self::SlotRead => "PARTITION READ ERROR",
            Self::LengthRead => "LENGTH READ ERROR",
            Self::ErasedSlotType => "PARTITION TYPE ERROR",
            Self::DataLength { .. } => "DATA LENGTH ERROR",
            Self::Misaligned { .. } => "PARTITION LENGTH ALIGNMENT ERROR",
            Self::CapacityExceeded { .. } => "PARTITION LENGTH ERROR",
            Self::StreamMisaligned { .. } => "RECORD ALIGNMENT ERROR",
            Self::PartitionCount => "PARTITION COUNT ERROR",
            Self::ReadError => "DATA READ ERROR",
            Self::SeekError => "SEEK ERROR",
            Self::EraseError { .. } => "ERASE ERROR",
            Self::WriteError { .. } => "WRITE ERROR",
            Self::DataSize { .. } => "DATA SIZE ERROR",
            Self::FlashReadError => "FLASH READ ERROR",
            Self::AddressOutOfBounds => "ADDRESS ERROR",
            Self::InvalidAlignment => "ALIGNMENT ERROR",
            Self::BufferTooSmall => "BUFFER ERROR",
            Self::TableRead => "TABLE READ ERROR",
            Self::NoFactoryPartition => "NO FACTORY PARTITION ERROR",
            Self::TableSize => "TABLE SIZE ERROR",
            Self::TableFull => "TABLE FULL ERROR",
            Self::TableErase => "TABLE ERASE ERROR",
            Self::TableWrite => "TABLE WRITE ERROR",
            Self::NoBootPartition => "NO BOOT PART ERROR",
            Self::BootSet => "BOOT SET ERROR",
            Self::OutOfMemory => "MEMORY ERROR",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderRead => write!(f, "firmware header could not be read"),
            Self::HeaderMismatch => write!(f, "firmware header does not match"),
            Self::DescriptionRead => write!(f, "firmware description could not be read"),
            Self::PreviewRead => write!(f, "firmware preview tile could not be read"),
            Self::ChecksumRead => write!(f, "firmware checksum could not be read"),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: stored 0x{:08X}, computed 0x{:08X}",
                expected, actual
            ),
            Self::SlotRead => write!(f, "partition record header could not be read"),
            Self::LengthRead => write!(f, "partition data length could not be read"),
            Self::ErasedSlotType => write!(f, "partition record has erased type 0xFF"),
            Self::DataLength {
                data_length,
                slot_length,
            } => write!(
                f,
                "partition data length 0x{:X} exceeds reserved length 0x{:X}",
                data_length, slot_length
            ),
            Self::Misaligned { address } => {
                write!(f, "partition address 0x{:08X} is not aligned", address)
            }
            Self::CapacityExceeded { address, length } => write!(
                f,
                "partition at 0x{:08X} with length 0x{:X} exceeds flash size",
                address, length
            ),
            Self::StreamMisaligned { position, expected } => write!(
                f,
                "record stream reached offset 0x{:X}, expected checksum at 0x{:X}",
                position, expected
            ),
            Self::PartitionCount => write!(f, "too many partition records"),
            Self::ReadError => write!(f, "read operation failed"),
            Self::SeekError => write!(f, "seek operation failed"),
            Self::EraseError { addr } => {
                write!(f, "erase command failed at address 0x{:08X}", addr)
            }
            Self::WriteError { addr } => {
                write!(f, "write operation failed at address 0x{:08X}", addr)
            }
            Self::DataSize { expected, written } => write!(
                f,
                "programmed 0x{:X} bytes, expected 0x{:X}",
                written, expected
            ),
            Self::FlashReadError => write!(f, "flash read operation failed"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::TableRead => write!(f, "partition table could not be read"),
            Self::NoFactoryPartition => write!(f, "no factory partition in partition table"),
            Self::TableSize => write!(f, "partition table does not fit one erase block"),
            Self::TableFull => write!(f, "partition table has no room for new entries"),
            Self::TableErase => write!(f, "partition table erase failed"),
            Self::TableWrite => write!(f, "partition table write failed"),
            Self::NoBootPartition => write!(f, "no bootable application partition"),
            Self::BootSet => write!(f, "boot partition could not be selected"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_short_and_uppercase() {
        let errors = [
            Error::HeaderMismatch,
            Error::ChecksumMismatch {
                expected: 1,
                actual: 2,
            },
            Error::DataLength {
                data_length: 2,
                slot_length: 1,
            },
            Error::NoFactoryPartition,
            Error::BootSet,
        ];
        for e in errors {
            let code = e.code();
            assert!(code.len() <= 32, "{} is too long", code);
            assert_eq!(code, code.to_ascii_uppercase());
        }
    }

    #[test]
    fn test_display_includes_values() {
        let e = Error::ChecksumMismatch {
            expected: 0xDEADBEEF,
            actual: 0x12345678,
        };
        let msg = std::format!("{}", e);
        assert!(msg.contains("0xDEADBEEF"));
        assert!(msg.contains("0x12345678"));
    }
}
