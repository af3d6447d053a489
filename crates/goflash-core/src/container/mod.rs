//! Firmware container format
//!
//! A container is laid out as (all integers little-endian):
//!
//! | field        | size          |
//! |--------------|---------------|
//! | magic        | 24            |
//! | description  | 40            |
//! | preview tile | 86 x 48 x 2   |
//! | records      | variable      |
//! | CRC-32       | 4             |

mod builder;
mod header;
mod record;
mod source;

pub use builder::ContainerBuilder;
pub use header::{
    decode_description, Container, PreviewTile, CHECKSUM_LEN, DESCRIPTION_LEN, HEADER_LEN, MAGIC,
    TILE_HEIGHT, TILE_LEN, TILE_WIDTH,
};
pub use record::{
    Record, RecordParser, SlotHeader, DATA_LENGTH_LEN, SLOT_HEADER_LEN, UTILITY_LABEL,
};
#[cfg(feature = "std")]
pub use source::IoSource;
pub use source::{ImageSource, SliceSource};
