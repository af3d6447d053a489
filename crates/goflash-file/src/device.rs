//! Image file flash implementation

use crate::error::{FileFlashError, Result};
use goflash_core::config::parse_size;
use goflash_core::error::Error as CoreError;
use goflash_core::flash::FlashDevice;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default erase block size
const DEFAULT_ERASE_SIZE: u32 = 4096;

/// Chunk size used to fill erased regions
const FILL_CHUNK: usize = 64 * 1024;

/// Configuration for opening a flash image
#[derive(Debug, Clone)]
pub struct FileFlashConfig {
    /// Image file path
    pub path: PathBuf,
    /// Erase block size
    pub erase_size: u32,
    /// Create a blank image of this size if the file does not exist
    pub create_size: Option<u32>,
}

impl FileFlashConfig {
    /// Open an existing image with 4 KiB erase blocks
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            erase_size: DEFAULT_ERASE_SIZE,
            create_size: None,
        }
    }
}

/// A raw flash image on disk
///
/// The file length is the flash size.
pub struct FileFlash {
    file: File,
    path: PathBuf,
    size: u32,
    erase_size: u32,
}

impl FileFlash {
    /// Open (or create) an image file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened for reading and writing
    /// - The size is not a whole number of erase blocks
    /// - The image is larger than 4 GiB
    pub fn open(config: &FileFlashConfig) -> Result<Self> {
        if !config.erase_size.is_power_of_two() {
            return Err(FileFlashError::InvalidEraseSize(config.erase_size));
        }

        let exists = config.path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(config.create_size.is_some())
            .truncate(false)
            .open(&config.path)
            .map_err(|e| FileFlashError::Open {
                path: config.path.clone(),
                source: e,
            })?;

        let mut flash = Self {
            file,
            path: config.path.clone(),
            size: 0,
            erase_size: config.erase_size,
        };

        if !exists {
            if let Some(size) = config.create_size {
                info!("Creating blank {} byte image {}", size, config.path.display());
                flash.file.set_len(0)?;
                flash.size = size;
                flash.fill(0, size)?;
            }
        }

        let len = flash.file.metadata()?.len();
        if len > u32::MAX as u64 {
            return Err(FileFlashError::TooLarge(len));
        }
        if len % config.erase_size as u64 != 0 {
            return Err(FileFlashError::InvalidSize {
                size: len,
                erase_size: config.erase_size,
            });
        }
        if let Some(size) = config.create_size {
            if exists && size as u64 != len {
                warn!(
                    "{} is {} bytes, ignoring requested size {}",
                    config.path.display(),
                    len,
                    size
                );
            }
        }
        flash.size = len as u32;

        info!(
            "Opened {} (size={} bytes, erase_size={} bytes)",
            config.path.display(),
            flash.size,
            flash.erase_size
        );
        Ok(flash)
    }

    /// Image path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fill(&mut self, addr: u32, len: u32) -> std::io::Result<()> {
        let chunk = [0xFFu8; FILL_CHUNK];
        self.file.seek(SeekFrom::Start(addr as u64))?;
        let mut remaining = len as usize;
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK);
            self.file.write_all(&chunk[..n])?;
            remaining -= n;
        }
        self.file.flush()
    }
}

impl FlashDevice for FileFlash {
    fn size(&self) -> u32 {
        self.size
    }

    fn erase_granularity(&self) -> u32 {
        self.erase_size
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> goflash_core::error::Result<()> {
        if !self.is_valid_range(addr, buf.len()) {
            return Err(CoreError::AddressOutOfBounds);
        }
        self.file
            .seek(SeekFrom::Start(addr as u64))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e| {
                debug!("read at {:#x} failed: {}", addr, e);
                CoreError::FlashReadError
            })
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> goflash_core::error::Result<()> {
        if !self.is_valid_range(addr, data.len()) {
            return Err(CoreError::AddressOutOfBounds);
        }

        // Programming can only clear bits
        let mut current = vec![0u8; data.len()];
        self.read(addr, &mut current)?;
        for (c, &d) in current.iter_mut().zip(data) {
            *c &= d;
        }

        self.file
            .seek(SeekFrom::Start(addr as u64))
            .and_then(|_| self.file.write_all(&current))
            .and_then(|_| self.file.flush())
            .map_err(|e| {
                debug!("write at {:#x} failed: {}", addr, e);
                CoreError::WriteError { addr }
            })
    }

    fn erase(&mut self, addr: u32, len: u32) -> goflash_core::error::Result<()> {
        if addr % self.erase_size != 0 || len % self.erase_size != 0 {
            return Err(CoreError::InvalidAlignment);
        }
        if !self.is_valid_range(addr, len as usize) {
            return Err(CoreError::AddressOutOfBounds);
        }
        self.fill(addr, len).map_err(|e| {
            debug!("erase at {:#x} failed: {}", addr, e);
            CoreError::EraseError { addr }
        })
    }
}

/// Parse device options from key-value pairs
///
/// # Supported options
/// - `path=<file>` - Image file (required)
/// - `size=<bytes>` - Size of a newly created image, e.g. `16M`
/// - `erase=<bytes>` - Erase block size
/// - `create=true` - Create the image if missing (requires `size`, default 16 MiB)
///
/// # Example
/// ```ignore
/// let options = &[("path", "flash.bin"), ("create", "true")];
/// let config = parse_options(options)?;
/// ```
pub fn parse_options(options: &[(&str, &str)]) -> Result<FileFlashConfig> {
    let mut path: Option<PathBuf> = None;
    let mut size: Option<u32> = None;
    let mut erase_size = DEFAULT_ERASE_SIZE;
    let mut create = false;

    for (key, value) in options {
        match *key {
            "path" => path = Some(PathBuf::from(value)),
            "size" => {
                size = Some(parse_size(value).map_err(|message| {
                    FileFlashError::InvalidParameter {
                        name: "size",
                        message,
                    }
                })?);
            }
            "erase" => {
                erase_size = parse_size(value).map_err(|message| {
                    FileFlashError::InvalidParameter {
                        name: "erase",
                        message,
                    }
                })?;
            }
            "create" => {
                create = value.parse().map_err(|_| FileFlashError::InvalidParameter {
                    name: "create",
                    message: format!("'{}' is not true or false", value),
                })?;
            }
            _ => {
                warn!("Unknown file option: {}={}", key, value);
            }
        }
    }

    let path = path.ok_or(FileFlashError::MissingParameter("path"))?;
    let create_size = if create {
        Some(size.unwrap_or(goflash_core::config::DEFAULT_FLASH_SIZE))
    } else {
        if size.is_some() {
            warn!("size= only applies together with create=true");
        }
        None
    };

    Ok(FileFlashConfig {
        path,
        erase_size,
        create_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("goflash-file-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("path", "a.bin"), ("create", "true"), ("size", "64K")]).unwrap();
        assert_eq!(config.path, PathBuf::from("a.bin"));
        assert_eq!(config.create_size, Some(0x10000));

        assert!(matches!(
            parse_options(&[("size", "1M")]),
            Err(FileFlashError::MissingParameter("path"))
        ));
        assert!(matches!(
            parse_options(&[("path", "a"), ("create", "maybe")]),
            Err(FileFlashError::InvalidParameter { name: "create", .. })
        ));
    }

    #[test]
    fn test_create_erase_program() {
        let path = temp_path("create");
        let mut config = FileFlashConfig::new(&path);
        config.create_size = Some(0x4000);
        let mut flash = FileFlash::open(&config).unwrap();
        assert_eq!(flash.size(), 0x4000);

        let mut buf = [0u8; 16];
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 16]);

        flash.write(0x1000, &[0x0F; 16]).unwrap();
        flash.write(0x1000, &[0xF3; 16]).unwrap();
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [0x03; 16]);

        flash.erase(0x1000, 0x1000).unwrap();
        flash.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 16]);

        assert_eq!(flash.erase(0x800, 0x1000), Err(CoreError::InvalidAlignment));
        assert_eq!(
            flash.read(0x3FF8, &mut buf),
            Err(CoreError::AddressOutOfBounds)
        );

        drop(flash);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0x4000);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_image() {
        let path = temp_path("missing");
        assert!(matches!(
            FileFlash::open(&FileFlashConfig::new(&path)),
            Err(FileFlashError::Open { .. })
        ));
    }

    #[test]
    fn test_odd_sized_image_rejected() {
        let path = temp_path("odd");
        std::fs::write(&path, [0u8; 100]).unwrap();
        assert!(matches!(
            FileFlash::open(&FileFlashConfig::new(&path)),
            Err(FileFlashError::InvalidSize { size: 100, .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
