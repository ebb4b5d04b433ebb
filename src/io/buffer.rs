//! In-memory stream implementations

use crate::error::{MatisseError, Result};

use super::{InputStream, OutputStream};

/// An input stream reading from a borrowed byte slice
#[derive(Debug)]
pub struct SliceInputStream<'a> {
    data: &'a [u8],
}

impl<'a> SliceInputStream<'a> {
    /// Create a stream over the given bytes
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }
}

impl InputStream for SliceInputStream<'_> {
    fn read_range(&mut self, buf: &mut [u8], min_bytes: usize) -> Result<usize> {
        let n = buf.len().min(self.data.len());
        if n < min_bytes {
            return Err(MatisseError::io(format!(
                "premature end of input: need {} bytes, have {}",
                min_bytes,
                self.data.len()
            )));
        }
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        if count > self.data.len() {
            return Err(MatisseError::io(format!(
                "premature end of input: tried to skip {} bytes, have {}",
                count,
                self.data.len()
            )));
        }
        self.data = &self.data[count..];
        Ok(())
    }
}

impl OutputStream for Vec<u8> {
    fn write(&mut self, pieces: &[&[u8]]) -> Result<()> {
        for piece in pieces {
            self.extend_from_slice(piece);
        }
        Ok(())
    }
}
