//! FlashHandle - an opened flash backend
//!
//! Owns the type-erased device together with what the registry learned
//! while opening it.

use goflash_core::error::Result;
use goflash_core::flash::FlashDevice;

/// Information about an opened backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Backend name as given on the command line (e.g. "file")
    pub backend: String,
    /// Human readable description (e.g. the image path)
    pub description: String,
}

/// Unified flash handle
///
/// The CLI works only with this type and never needs to know which backend
/// crate sits behind it.
pub struct FlashHandle {
    /// The underlying flash device (type-erased, owned)
    device: Box<dyn FlashDevice>,
    info: DeviceInfo,
}

impl FlashHandle {
    pub(crate) fn new(device: Box<dyn FlashDevice>, info: DeviceInfo) -> Self {
        Self { device, info }
    }

    /// Backend information
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Backend name
    pub fn name(&self) -> &str {
        &self.info.backend
    }

    /// Get mutable reference to the underlying FlashDevice
    pub fn as_device_mut(&mut self) -> &mut dyn FlashDevice {
        self.device.as_mut()
    }
}

impl FlashDevice for FlashHandle {
    fn size(&self) -> u32 {
        self.device.size()
    }

    fn erase_granularity(&self) -> u32 {
        self.device.erase_granularity()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.device.read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.device.write(addr, data)
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        self.device.erase(addr, len)
    }
}

impl core::fmt::Debug for FlashHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlashHandle")
            .field("backend", &self.info.backend)
            .field("size", &self.device.size())
            .field("erase_granularity", &self.device.erase_granularity())
            .finish()
    }
}
