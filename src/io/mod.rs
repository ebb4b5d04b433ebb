//! Byte stream primitives consumed by the serialization layer
//!
//! The envelope codec is written against two small traits rather than
//! `std::io`: [`InputStream`] exposes the min/max read needed for lazy
//! segment filling, and [`OutputStream`] exposes a gathered write so a whole
//! message can be emitted as a single vectored syscall.

pub mod buffer;
#[cfg(unix)]
pub mod fd;

pub use buffer::SliceInputStream;
#[cfg(unix)]
pub use fd::{FdInputStream, FdOutputStream};

use crate::error::Result;

/// A readable byte stream
pub trait InputStream {
    /// Read between `min_bytes` and `buf.len()` bytes, returning the count
    ///
    /// Blocks until at least `min_bytes` are available; reaching end of
    /// stream earlier is an error. Implementations may return more than
    /// `min_bytes` when data is already available, up to `buf.len()`.
    fn read_range(&mut self, buf: &mut [u8], min_bytes: usize) -> Result<usize>;

    /// Fill `buf` exactly
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_range(buf, buf.len())?;
        Ok(())
    }

    /// Discard exactly `count` bytes from the stream
    fn skip(&mut self, count: usize) -> Result<()> {
        let mut scratch = [0u8; 4096];
        let mut remaining = count;
        while remaining > 0 {
            let take = remaining.min(scratch.len());
            self.read_exact(&mut scratch[..take])?;
            remaining -= take;
        }
        Ok(())
    }
}

/// A writable byte stream accepting gathered writes
pub trait OutputStream {
    /// Write all pieces, in order, as one logical operation
    ///
    /// Implementations backed by an OS descriptor issue a single vectored
    /// write when the pieces fit, so concurrent writers do not interleave
    /// within a message.
    fn write(&mut self, pieces: &[&[u8]]) -> Result<()>;
}

impl<S: InputStream + ?Sized> InputStream for &mut S {
    fn read_range(&mut self, buf: &mut [u8], min_bytes: usize) -> Result<usize> {
        (**self).read_range(buf, min_bytes)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_exact(buf)
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        (**self).skip(count)
    }
}

impl<S: OutputStream + ?Sized> OutputStream for &mut S {
    fn write(&mut self, pieces: &[&[u8]]) -> Result<()> {
        (**self).write(pieces)
    }
}
