//! Flash backend selection
//!
//! The CLI never constructs a flash device directly. It passes a device
//! string such as `dummy` or `file:path=odroid-go.bin` to [`open_flash`] and
//! gets back a [`FlashHandle`], which the updater drives like any other
//! [`FlashDevice`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CLI (bin/goflash)                     │
//! │  - Only imports goflash-flash and goflash-core              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  goflash-flash (this crate)                 │
//! │  - FlashHandle: owned, type-erased flash device             │
//! │  - Registry: opens backends by name                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    goflash-core          │   │  Backend crates          │
//! │  - FlashDevice trait     │   │  - goflash-dummy         │
//! │  - Updater engine        │   │  - goflash-file          │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use goflash_flash::open_flash;
//!
//! let mut handle = open_flash("file:path=odroid-go.bin")?;
//! let mut table = vec![0u8; 0xC00];
//! handle.read(0x8000, &mut table)?;
//! ```

mod handle;
mod registry;

pub use handle::{DeviceInfo, FlashHandle};
pub use registry::{available_devices, open_flash, parse_device_params, DeviceParams, DeviceSpec};

// Re-export core types that CLI needs
pub use goflash_core::flash::FlashDevice;
