//! Error types for image file flash

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Image file specific errors
#[derive(Debug, Error)]
pub enum FileFlashError {
    /// The image could not be opened or created
    #[error("Failed to open flash image '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error on an open image
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image size is not a whole number of erase blocks
    #[error("Image size {size:#x} is not a multiple of the erase size {erase_size:#x}")]
    InvalidSize { size: u64, erase_size: u32 },

    /// Image is larger than a 32-bit address space
    #[error("Image size {0:#x} exceeds the 4 GiB address space")]
    TooLarge(u64),

    /// Erase size is not a power of two
    #[error("Erase size is not a power of 2: {0}")]
    InvalidEraseSize(u32),

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Result type for image file operations
pub type Result<T> = std::result::Result<T, FileFlashError>;
