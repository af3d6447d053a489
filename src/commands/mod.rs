//! CLI command implementations
//!
//! `flash` drives the updater against an opened device. The other commands
//! only read: containers (`inspect`), the firmware directory (`list`) and
//! raw flash images (`table`).

pub mod flash;
pub mod inspect;
mod list;
pub mod table;

pub use list::{list_backends, list_firmware};
