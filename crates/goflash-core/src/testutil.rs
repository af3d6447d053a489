//! In-crate flash double for unit tests

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::flash::FlashDevice;

/// Plain in-memory flash that counts operations
pub(crate) struct MemFlash {
    pub data: Vec<u8>,
    pub erases: usize,
    pub writes: usize,
    pub fail_erase: bool,
    pub fail_write: bool,
}

impl MemFlash {
    pub fn new(size: usize) -> Self {
        Self {
            data: alloc::vec![0xFF; size],
            erases: 0,
            writes: 0,
            fail_erase: false,
            fail_write: false,
        }
    }
}

impl FlashDevice for MemFlash {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn erase_granularity(&self) -> u32 {
        4096
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let start = addr as usize;
        let src = self
            .data
            .get(start..start + buf.len())
            .ok_or(Error::AddressOutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if self.fail_write {
            return Err(Error::WriteError { addr });
        }
        let start = addr as usize;
        let dst = self
            .data
            .get_mut(start..start + data.len())
            .ok_or(Error::AddressOutOfBounds)?;
        for (d, s) in dst.iter_mut().zip(data) {
            *d &= *s;
        }
        self.writes += 1;
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        if self.fail_erase {
            return Err(Error::EraseError { addr });
        }
        if addr % 4096 != 0 || len % 4096 != 0 {
            return Err(Error::InvalidAlignment);
        }
        let start = addr as usize;
        self.data
            .get_mut(start..start + len as usize)
            .ok_or(Error::AddressOutOfBounds)?
            .fill(0xFF);
        self.erases += 1;
        Ok(())
    }
}
