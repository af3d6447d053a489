//! CRC-32 over firmware containers
//!
//! The checksum is the IEEE CRC-32 (reflected, zlib compatible), seeded with
//! 0 and chained block by block the way the ESP32 ROM `crc32_le` chains.

use crate::container::ImageSource;
use crate::error::{Error, Result};

/// Block size used when streaming a container through the CRC
pub const CHECKSUM_BLOCK_SIZE: usize = 4096;

/// Continue a CRC-32 over `data`, starting from the running value `crc`
///
/// `crc32_le(crc32_le(0, a), b) == crc32_le(0, a ++ b)`.
pub fn crc32_le(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}

/// CRC-32 of the first `length` bytes of `source`
///
/// Reads through `scratch`, one block at a time. Any short read before
/// `length` bytes have been seen is a read error.
pub fn compute<S: ImageSource + ?Sized>(
    source: &mut S,
    length: u64,
    scratch: &mut [u8],
) -> Result<u32> {
    if scratch.is_empty() {
        return Err(Error::BufferTooSmall);
    }

    source.seek_to(0)?;
    let mut crc = 0u32;
    let mut remaining = length;
    while remaining > 0 {
        let n = remaining.min(scratch.len() as u64) as usize;
        let block = &mut scratch[..n];
        source.read_exact_or(block, Error::ReadError)?;
        crc = crc32_le(crc, block);
        remaining -= n as u64;
    }
    Ok(crc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SliceSource;

    #[test]
    fn test_matches_zlib_check_value() {
        assert_eq!(crc32_le(0, b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_chaining() {
        let data: alloc::vec::Vec<u8> = (0..10000u32).map(|i| (i * 7) as u8).collect();
        let whole = crc32_le(0, &data);
        let chained = crc32_le(crc32_le(0, &data[..4096]), &data[4096..]);
        assert_eq!(whole, chained);
    }

    #[test]
    fn test_compute_excludes_tail() {
        let data: alloc::vec::Vec<u8> = (0..9000u32).map(|i| i as u8).collect();
        let mut scratch = [0u8; CHECKSUM_BLOCK_SIZE];
        let crc = compute(&mut SliceSource::new(&data), 8996, &mut scratch).unwrap();
        assert_eq!(crc, crc32_le(0, &data[..8996]));
    }

    #[test]
    fn test_compute_short_source() {
        let data = [0u8; 10];
        let mut scratch = [0u8; 16];
        assert_eq!(
            compute(&mut SliceSource::new(&data), 20, &mut scratch),
            Err(Error::ReadError)
        );
        assert_eq!(
            compute(&mut SliceSource::new(&data), 4, &mut []),
            Err(Error::BufferTooSmall)
        );
    }
}
