//! Flash device trait
//!
//! The updater talks to flash only through [`FlashDevice`]. The device is a
//! raw NOR array: erased bytes read `0xFF` and programming can only clear
//! bits, so every region must be erased before it is written.

use crate::error::Result;

/// A raw, address-based flash device
///
/// All operations use 32-bit absolute addresses.
///
/// # Example
///
/// ```ignore
/// use goflash_core::flash::FlashDevice;
///
/// fn read_table<D: FlashDevice>(device: &mut D) -> Result<[u8; 0xC00]> {
///     let mut buf = [0u8; 0xC00];
///     device.read(0x8000, &mut buf)?;
///     Ok(buf)
/// }
/// ```
pub trait FlashDevice {
    /// Get the total flash size in bytes
    fn size(&self) -> u32;

    /// Get the erase block size in bytes
    ///
    /// All erase operations must be aligned to this size and be a multiple
    /// of it.
    fn erase_granularity(&self) -> u32;

    /// Read flash contents into the provided buffer
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the read extends beyond flash size
    /// * `FlashReadError` - If the read operation fails
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Program data into flash
    ///
    /// The target region should be erased first (all bytes 0xFF).
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the write extends beyond flash size
    /// * `WriteError` - If the write operation fails
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase a region of flash
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the erase extends beyond flash size
    /// * `InvalidAlignment` - If address or length is not block aligned
    /// * `EraseError` - If the erase operation fails
    fn erase(&mut self, addr: u32, len: u32) -> Result<()>;

    /// Check if a range is valid for this device
    fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        // u64 so that len > u32::MAX cannot wrap
        let end = addr as u64 + len as u64;
        end <= self.size() as u64
    }
}

impl<D: FlashDevice + ?Sized> FlashDevice for &mut D {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn erase_granularity(&self) -> u32 {
        (**self).erase_granularity()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        (**self).erase(addr, len)
    }
}

impl<D: FlashDevice + ?Sized> FlashDevice for alloc::boxed::Box<D> {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn erase_granularity(&self) -> u32 {
        (**self).erase_granularity()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        (**self).erase(addr, len)
    }
}

/// Round `value` up to a multiple of `align` (a power of two)
///
/// Returns `None` on overflow.
pub fn align_up(value: u32, align: u32) -> Option<u32> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}
