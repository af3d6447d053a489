//! Container header: magic, description and preview tile

use alloc::string::String;
use alloc::vec::Vec;

use super::record::RecordParser;
use super::source::ImageSource;
use crate::checksum;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// Magic string at offset 0 of every container
pub const MAGIC: &[u8; 24] = b"ODROIDGO_FIRMWARE_V00_01";
/// Length of the fixed description field
pub const DESCRIPTION_LEN: usize = 40;
/// Preview tile width in pixels
pub const TILE_WIDTH: usize = 86;
/// Preview tile height in pixels
pub const TILE_HEIGHT: usize = 48;
/// Preview tile length in bytes (RGB565)
pub const TILE_LEN: usize = TILE_WIDTH * TILE_HEIGHT * 2;
/// Offset of the first record
pub const HEADER_LEN: usize = MAGIC.len() + DESCRIPTION_LEN + TILE_LEN;
/// Length of the trailing CRC-32
pub const CHECKSUM_LEN: usize = 4;

/// An 86x48 RGB565 preview image
#[derive(Clone, PartialEq, Eq)]
pub struct PreviewTile {
    pixels: Vec<u16>,
}

impl PreviewTile {
    /// Decode little-endian RGB565 pixels
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let pixels = bytes
            .chunks_exact(2)
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .collect();
        Self { pixels }
    }

    /// A white tile
    pub fn blank() -> Self {
        Self {
            pixels: alloc::vec![0xFFFF; TILE_WIDTH * TILE_HEIGHT],
        }
    }

    /// Pixels in row-major order
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Pixel at (x, y)
    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        if x >= TILE_WIDTH || y >= TILE_HEIGHT {
            return None;
        }
        self.pixels.get(y * TILE_WIDTH + x).copied()
    }

    /// Encode back to the on-disk representation
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
    }
}

impl core::fmt::Debug for PreviewTile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PreviewTile({}x{})", TILE_WIDTH, TILE_HEIGHT)
    }
}

/// Decode the 40-byte description field
///
/// The last byte is always treated as a terminator, so at most 39 bytes of
/// text survive. Text ends at the first NUL.
pub fn decode_description(raw: &[u8; DESCRIPTION_LEN]) -> String {
    let text = &raw[..DESCRIPTION_LEN - 1];
    let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
    String::from_utf8_lossy(&text[..end]).into_owned()
}

/// A firmware container whose magic has been validated
#[derive(Debug)]
pub struct Container<S> {
    source: S,
    file_size: u64,
}

impl<S: ImageSource> Container<S> {
    /// Check the magic string and position the source after it
    pub fn open(mut source: S) -> Result<Self> {
        let file_size = source.source_len().map_err(|_| Error::HeaderRead)?;
        source.seek_to(0).map_err(|_| Error::HeaderRead)?;

        let mut magic = [0u8; MAGIC.len()];
        source.read_exact_or(&mut magic, Error::HeaderRead)?;
        if &magic != MAGIC {
            log::error!("header mismatch: {:02X?}", magic);
            return Err(Error::HeaderMismatch);
        }

        log::debug!("container header valid, {} bytes", file_size);
        Ok(Self { source, file_size })
    }

    /// Total container size including the checksum tail
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Offset of the checksum tail, where the record walk must end
    pub fn tail_offset(&self) -> u64 {
        self.file_size.saturating_sub(CHECKSUM_LEN as u64)
    }

    /// Read the description, with forced termination
    pub fn read_description(&mut self) -> Result<String> {
        let mut raw = [0u8; DESCRIPTION_LEN];
        self.source.seek_to(MAGIC.len() as u64)?;
        self.source.read_exact_or(&mut raw, Error::DescriptionRead)?;
        Ok(decode_description(&raw))
    }

    /// Read the preview tile; a short read is fatal
    pub fn read_preview(&mut self) -> Result<PreviewTile> {
        let mut raw = alloc::vec![0u8; TILE_LEN];
        self.source
            .seek_to((MAGIC.len() + DESCRIPTION_LEN) as u64)?;
        self.source.read_exact_or(&mut raw, Error::PreviewRead)?;
        Ok(PreviewTile::from_le_bytes(&raw))
    }

    /// Checksum stored in the last four bytes
    pub fn stored_checksum(&mut self) -> Result<u32> {
        if self.file_size < (HEADER_LEN + CHECKSUM_LEN) as u64 {
            return Err(Error::ChecksumRead);
        }
        let mut raw = [0u8; CHECKSUM_LEN];
        self.source
            .seek_to(self.tail_offset())
            .map_err(|_| Error::ChecksumRead)?;
        self.source.read_exact_or(&mut raw, Error::ChecksumRead)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Compare the stored checksum against the CRC-32 of the body
    ///
    /// Returns the verified value. `scratch` bounds the read size.
    pub fn verify_checksum(&mut self, scratch: &mut [u8]) -> Result<u32> {
        let expected = self.stored_checksum()?;
        let tail = self.tail_offset();
        let actual = checksum::compute(&mut self.source, tail, scratch)?;
        if expected != actual {
            log::error!(
                "checksum mismatch: stored 0x{:08X}, computed 0x{:08X}",
                expected,
                actual
            );
            return Err(Error::ChecksumMismatch { expected, actual });
        }
        log::info!("checksum OK (0x{:08X})", actual);
        Ok(actual)
    }

    /// Start walking the records, placing the first one at `base`
    pub fn records(&self, base: u32, config: &DeviceConfig) -> RecordParser {
        RecordParser::new(
            HEADER_LEN as u64,
            self.tail_offset(),
            base,
            config.flash_size,
            config.partition_alignment,
        )
    }

    /// Mutable access to the underlying source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Give back the source
    pub fn into_inner(self) -> S {
        self.source
    }
}
