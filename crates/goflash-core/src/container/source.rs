//! Seekable byte sources for firmware containers
//!
//! The parser and the checksum engine only need positioned reads, so they
//! work over [`ImageSource`] rather than `std::io` directly. With the `std`
//! feature any `Read + Seek` value can be wrapped in `IoSource`.

use crate::error::{Error, Result};

/// A seekable, readable firmware image
pub trait ImageSource {
    /// Total length of the image in bytes
    fn source_len(&mut self) -> Result<u64>;

    /// Current read position
    fn offset(&mut self) -> Result<u64>;

    /// Move the read position to an absolute offset
    fn seek_to(&mut self, offset: u64) -> Result<()>;

    /// Read into `buf` until it is full or the end of the image is reached
    ///
    /// Returns the number of bytes read. A short count means end of image.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly `buf.len()` bytes or fail with `err`
    fn read_exact_or(&mut self, buf: &mut [u8], err: Error) -> Result<()> {
        let n = self.read_into(buf)?;
        if n != buf.len() {
            log::debug!("short read: wanted {} bytes, got {}", buf.len(), n);
            return Err(err);
        }
        Ok(())
    }
}

impl<T: ImageSource + ?Sized> ImageSource for &mut T {
    fn source_len(&mut self) -> Result<u64> {
        (**self).source_len()
    }

    fn offset(&mut self) -> Result<u64> {
        (**self).offset()
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        (**self).seek_to(offset)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_into(buf)
    }
}

#[cfg(feature = "std")]
mod io_impl {
    use super::ImageSource;
    use crate::error::{Error, Result};
    use std::io::{ErrorKind, Read, Seek, SeekFrom};

    /// Wrapper giving any `Read + Seek` value the [`ImageSource`] interface
    #[derive(Debug)]
    pub struct IoSource<T>(pub T);

    impl<T> IoSource<T> {
        /// Unwrap the inner reader
        pub fn into_inner(self) -> T {
            self.0
        }
    }

    impl<T: Read + Seek> ImageSource for IoSource<T> {
        fn source_len(&mut self) -> Result<u64> {
            let here = self.offset()?;
            let end = self.0.seek(SeekFrom::End(0)).map_err(|e| {
                log::error!("seek to end failed: {}", e);
                Error::SeekError
            })?;
            self.seek_to(here)?;
            Ok(end)
        }

        fn offset(&mut self) -> Result<u64> {
            self.0.stream_position().map_err(|e| {
                log::error!("stream position failed: {}", e);
                Error::SeekError
            })
        }

        fn seek_to(&mut self, offset: u64) -> Result<()> {
            self.0.seek(SeekFrom::Start(offset)).map_err(|e| {
                log::error!("seek to 0x{:X} failed: {}", offset, e);
                Error::SeekError
            })?;
            Ok(())
        }

        fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
            let mut filled = 0;
            while filled < buf.len() {
                match self.0.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::error!("read failed: {}", e);
                        return Err(Error::ReadError);
                    }
                }
            }
            Ok(filled)
        }
    }
}

#[cfg(feature = "std")]
pub use io_impl::IoSource;

/// An image held entirely in memory
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Wrap a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ImageSource for SliceSource<'_> {
    fn source_len(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn offset(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        // Seeking past the end is allowed, later reads return nothing
        self.pos = usize::try_from(offset).map_err(|_| Error::SeekError)?;
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = self.pos.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos = start + n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_short_read() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = SliceSource::new(&data);
        src.seek_to(3).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(src.read_into(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(src.offset().unwrap(), 5);
        assert_eq!(
            src.read_exact_or(&mut buf, Error::SlotRead),
            Err(Error::SlotRead)
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_io_source_preserves_position() {
        let mut src = IoSource(std::io::Cursor::new(std::vec![0u8; 100]));
        src.seek_to(40).unwrap();
        assert_eq!(src.source_len().unwrap(), 100);
        assert_eq!(src.offset().unwrap(), 40);
    }
}
