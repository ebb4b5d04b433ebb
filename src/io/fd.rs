//! File-descriptor backed stream implementations
//!
//! Thin wrappers over OS descriptors: pipes, sockets, or files. The output
//! side gathers all pieces into one `writev` call so a message is emitted
//! with a single kernel crossing whenever it fits.

use std::io::IoSlice;
use std::os::fd::{BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::sys::uio::writev;
use nix::unistd;
use smallvec::SmallVec;

use crate::error::{MatisseError, Result};

use super::{InputStream, OutputStream};

/// An input stream reading from a raw file descriptor
///
/// The descriptor is borrowed, not owned; the caller remains responsible
/// for closing it.
#[derive(Debug)]
pub struct FdInputStream {
    fd: RawFd,
}

impl FdInputStream {
    /// Wrap an open descriptor
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl InputStream for FdInputStream {
    fn read_range(&mut self, buf: &mut [u8], min_bytes: usize) -> Result<usize> {
        let mut total = 0;
        while total < min_bytes {
            match unistd::read(self.fd, &mut buf[total..]) {
                Ok(0) => {
                    return Err(MatisseError::io(format!(
                        "premature end of stream: need {} bytes, got {}",
                        min_bytes, total
                    )));
                }
                Ok(n) => total += n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }
}

/// An output stream writing to a raw file descriptor
#[derive(Debug)]
pub struct FdOutputStream {
    fd: RawFd,
}

impl FdOutputStream {
    /// Wrap an open descriptor
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl OutputStream for FdOutputStream {
    fn write(&mut self, pieces: &[&[u8]]) -> Result<()> {
        let mut pending: SmallVec<[&[u8]; 8]> =
            pieces.iter().copied().filter(|p| !p.is_empty()).collect();

        while !pending.is_empty() {
            let iov: SmallVec<[IoSlice<'_>; 8]> =
                pending.iter().map(|p| IoSlice::new(p)).collect();

            let fd = unsafe { BorrowedFd::borrow_raw(self.fd) };
            let mut written = match writev(fd, &iov) {
                Ok(0) => {
                    return Err(MatisseError::io("writev made no progress"));
                }
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            };

            // Drop fully written pieces, trim the partially written one
            while written > 0 {
                if written >= pending[0].len() {
                    written -= pending[0].len();
                    pending.remove(0);
                } else {
                    pending[0] = &pending[0][written..];
                    written = 0;
                }
            }
        }
        Ok(())
    }
}
