//! Flash access
//!
//! [`FlashDevice`] is the raw device interface; [`FlashWriter`] layers the
//! updater's erase, program and streaming copy on top of it.

mod device;
mod writer;

pub use device::{align_up, FlashDevice};
pub use writer::FlashWriter;
