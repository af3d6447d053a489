//! Erase, program and streaming copy on top of a [`FlashDevice`]

use super::device::{align_up, FlashDevice};
use crate::container::ImageSource;
use crate::error::{Error, Result};

/// Updater-facing flash operations
///
/// Device failures are logged with their detail and reported as the
/// operator-facing `EraseError`/`WriteError`/`FlashReadError`.
pub struct FlashWriter<'a, D: FlashDevice + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: FlashDevice + ?Sized> FlashWriter<'a, D> {
    /// Wrap a device
    pub fn new(device: &'a mut D) -> Self {
        Self { device }
    }

    /// Total flash size
    pub fn size(&self) -> u32 {
        self.device.size()
    }

    /// Erase block size of the device
    pub fn erase_block_size(&self) -> u32 {
        self.device.erase_granularity()
    }

    /// Erase `length` bytes at `addr`, rounded up to whole erase blocks
    ///
    /// Returns the number of bytes actually erased.
    pub fn erase(&mut self, addr: u32, length: u32) -> Result<u32> {
        let block = self.erase_block_size();
        if addr % block != 0 {
            log::error!("erase address 0x{:08X} not aligned to 0x{:X}", addr, block);
            return Err(Error::EraseError { addr });
        }
        let len = align_up(length, block).ok_or(Error::EraseError { addr })?;
        if !self.device.is_valid_range(addr, len as usize) {
            log::error!("erase 0x{:08X}+0x{:X} beyond flash end", addr, len);
            return Err(Error::EraseError { addr });
        }
        if len == 0 {
            return Ok(0);
        }

        log::debug!("erasing 0x{:08X}..0x{:08X}", addr, addr as u64 + len as u64);
        self.device.erase(addr, len).map_err(|e| {
            log::error!("erase at 0x{:08X} len 0x{:X} failed: {}", addr, len, e);
            Error::EraseError { addr }
        })?;
        Ok(len)
    }

    /// Program `data` at `addr`
    pub fn program(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if !self.device.is_valid_range(addr, data.len()) {
            log::error!("write 0x{:08X}+0x{:X} beyond flash end", addr, data.len());
            return Err(Error::WriteError { addr });
        }
        self.device.write(addr, data).map_err(|e| {
            log::error!("write at 0x{:08X} len 0x{:X} failed: {}", addr, data.len(), e);
            Error::WriteError { addr }
        })
    }

    /// Read flash contents
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.device.read(addr, buf).map_err(|e| {
            log::error!("read at 0x{:08X} len 0x{:X} failed: {}", addr, buf.len(), e);
            Error::FlashReadError
        })
    }

    /// Stream `length` bytes from `source` at `data_offset` into flash
    ///
    /// The data moves through `scratch` one chunk at a time; the last chunk
    /// is truncated to the remaining length. `progress` receives the running
    /// count of programmed bytes after every chunk. The region must already
    /// be erased.
    pub fn copy_from<S, F>(
        &mut self,
        source: &mut S,
        data_offset: u64,
        address: u32,
        length: u32,
        scratch: &mut [u8],
        mut progress: F,
    ) -> Result<u32>
    where
        S: ImageSource + ?Sized,
        F: FnMut(u32),
    {
        if scratch.is_empty() {
            return Err(Error::BufferTooSmall);
        }
        source.seek_to(data_offset)?;

        let mut written: u32 = 0;
        while written < length {
            let want = ((length - written) as usize).min(scratch.len());
            let chunk = &mut scratch[..want];
            let n = source.read_into(chunk)?;
            if n == 0 {
                log::error!(
                    "source ended after 0x{:X} of 0x{:X} bytes",
                    written,
                    length
                );
                return Err(Error::ReadError);
            }
            self.program(address + written, &chunk[..n])?;
            written += n as u32;
            progress(written);
        }

        if written != length {
            return Err(Error::DataSize {
                expected: length,
                written,
            });
        }
        Ok(written)
    }

    /// Access the underlying device
    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SliceSource;
    use crate::testutil::MemFlash;
    use alloc::vec::Vec;

    #[test]
    fn test_erase_rounds_up() {
        let mut flash = MemFlash::new(0x20000);
        flash.data[0x1000..0x3000].fill(0);
        let mut writer = FlashWriter::new(&mut flash);
        assert_eq!(writer.erase(0x1000, 0x1001).unwrap(), 0x2000);
        assert!(flash.data[0x1000..0x3000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_erase_rejects_unaligned_and_out_of_range() {
        let mut flash = MemFlash::new(0x20000);
        let mut writer = FlashWriter::new(&mut flash);
        assert_eq!(
            writer.erase(0x800, 0x1000),
            Err(Error::EraseError { addr: 0x800 })
        );
        assert_eq!(
            writer.erase(0x1F000, 0x2000),
            Err(Error::EraseError { addr: 0x1F000 })
        );
    }

    #[test]
    fn test_copy_from_chunks_and_progress() {
        let payload: Vec<u8> = (0..10000u32).map(|i| (i % 251) as u8).collect();
        let mut image = alloc::vec![0xAAu8; 16];
        image.extend_from_slice(&payload);

        let mut flash = MemFlash::new(0x20000);
        let mut writer = FlashWriter::new(&mut flash);
        let mut scratch = [0u8; 4096];
        let mut seen = Vec::new();
        let n = writer
            .copy_from(
                &mut SliceSource::new(&image),
                16,
                0x10000,
                payload.len() as u32,
                &mut scratch,
                |p| seen.push(p),
            )
            .unwrap();
        assert_eq!(n, 10000);
        assert_eq!(seen, [4096, 8192, 10000]);
        assert_eq!(&flash.data[0x10000..0x10000 + 10000], &payload[..]);
        assert_eq!(flash.writes, 3);
    }

    #[test]
    fn test_copy_from_short_source() {
        let image = [1u8; 100];
        let mut flash = MemFlash::new(0x10000);
        let mut writer = FlashWriter::new(&mut flash);
        let mut scratch = [0u8; 64];
        assert_eq!(
            writer.copy_from(&mut SliceSource::new(&image), 0, 0, 200, &mut scratch, |_| {}),
            Err(Error::ReadError)
        );
    }
}
