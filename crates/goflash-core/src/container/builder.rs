//! Container assembly
//!
//! Used by the host tools to produce test images and by the test suites.

use alloc::vec::Vec;

use super::header::{PreviewTile, DESCRIPTION_LEN, MAGIC, TILE_LEN};
use super::record::SlotHeader;
use crate::checksum;

/// Builds a firmware container in memory
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    description: [u8; DESCRIPTION_LEN],
    preview: Option<PreviewTile>,
    records: Vec<(SlotHeader, Vec<u8>)>,
}

impl ContainerBuilder {
    /// Start a container with the given description
    ///
    /// Text longer than 39 bytes is cut, since readers treat the last byte
    /// as a terminator.
    pub fn new(description: &str) -> Self {
        let mut raw = [0u8; DESCRIPTION_LEN];
        let bytes = description.as_bytes();
        let n = bytes.len().min(DESCRIPTION_LEN - 1);
        raw[..n].copy_from_slice(&bytes[..n]);
        Self {
            description: raw,
            preview: None,
            records: Vec::new(),
        }
    }

    /// Set the preview tile (blank when not set)
    pub fn preview(mut self, tile: PreviewTile) -> Self {
        self.preview = Some(tile);
        self
    }

    /// Append a record with its payload
    pub fn record(mut self, slot: SlotHeader, payload: &[u8]) -> Self {
        self.records.push((slot, payload.to_vec()));
        self
    }

    /// Serialize the container, including its trailing CRC-32
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.description);
        match self.preview {
            Some(tile) => {
                let mut pixels = tile.to_le_bytes();
                pixels.resize(TILE_LEN, 0xFF);
                out.extend_from_slice(&pixels);
            }
            None => out.resize(out.len() + TILE_LEN, 0xFF),
        }
        for (slot, payload) in &self.records {
            out.extend_from_slice(&slot.encode());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(payload);
        }
        let crc = checksum::crc32_le(0, &out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }
}
