//! goflash-core - Firmware container parsing and flashing engine
//!
//! This crate implements the hard part of an ODROID-GO style field updater:
//! it parses the `.fw` firmware container, verifies its CRC-32, streams each
//! partition record into flash through a bounded scratch buffer, rebuilds the
//! on-device partition table after the factory anchor and switches the boot
//! slot. It is `no_std` compatible (with `alloc`) so the same engine can run
//! on the device itself or on a host against a flash image.
//!
//! # Features
//!
//! - `std` - Enable standard library support: `std::io` image sources, the
//!   mutex-protected input snapshot and TOML configuration files
//!
//! # Example
//!
//! ```ignore
//! use goflash_core::updater::{Outcome, Updater};
//!
//! let mut updater = Updater::new(&mut flash, &mut status, &input, &mut boot, config)?;
//! match updater.run(firmware_file, None::<std::fs::File>) {
//!     Ok(Outcome::Cancelled) => println!("Cancelled"),
//!     Ok(Outcome::Restarted(summary)) => println!("Flashed {}", summary.description),
//!     Err(e) => println!("Update failed: {}", e),
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

pub mod boot;
pub mod checksum;
pub mod config;
pub mod container;
pub mod error;
pub mod flash;
pub mod input;
pub mod partition;
pub mod plan;
pub mod status;
pub mod updater;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
