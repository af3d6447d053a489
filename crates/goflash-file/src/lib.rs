//! goflash-file - Flash device backed by a raw image file
//!
//! This crate lets the updater run on a host against a dump of the device's
//! SPI flash. Erases fill the image with `0xFF` and programs clear bits just
//! as NOR flash would, so the resulting image can be written back to the
//! device with any flashing tool.
//!
//! # Example
//!
//! ```ignore
//! use goflash_file::{FileFlash, FileFlashConfig};
//! use goflash_core::flash::FlashDevice;
//!
//! let mut flash = FileFlash::open(&FileFlashConfig::new("odroid-go.bin"))?;
//! let mut table = vec![0u8; 0xC00];
//! flash.read(0x8000, &mut table)?;
//! ```
//!
//! # Usage with the goflash CLI
//!
//! ```bash
//! # Flash a container into an existing dump
//! goflash flash -d file:path=odroid-go.bin firmware.fw
//!
//! # Start from a blank 16 MiB image
//! goflash flash -d file:path=blank.bin,size=16M,create=true firmware.fw
//! ```

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, FileFlash, FileFlashConfig};
pub use error::{FileFlashError, Result};

/// Open an image file and return a boxed FlashDevice
///
/// This is a convenience function for use in the CLI device dispatch.
///
/// # Example Options
///
/// - `path=<file>` - Required: image file
/// - `size=<bytes>` - Size when creating a new image
/// - `erase=<bytes>` - Erase block size (default 4096)
/// - `create=true` - Create a blank image if it does not exist
pub fn open_file_flash(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn goflash_core::flash::FlashDevice>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let flash = FileFlash::open(&config)?;
    Ok(Box::new(flash))
}
