//! Reading and writing messages over byte streams

use std::ops::Range;

use smallvec::{smallvec, SmallVec};

use crate::error::{MatisseError, Result};
use crate::io::{InputStream, OutputStream};
use crate::message::word::{word_slice_to_bytes, word_slice_to_bytes_mut};
use crate::message::{ReaderOptions, Word, BYTES_PER_WORD};

use super::MAX_SEGMENT_COUNT;

/// Backing storage for segment bodies: caller scratch when it fits, one
/// owned allocation otherwise
enum Backing<'s> {
    Owned(Vec<Word>),
    Scratch(&'s mut [Word]),
}

impl Backing<'_> {
    fn words(&self) -> &[Word] {
        match self {
            Backing::Owned(words) => words,
            Backing::Scratch(words) => words,
        }
    }

    fn words_mut(&mut self) -> &mut [Word] {
        match self {
            Backing::Owned(words) => words,
            Backing::Scratch(words) => words,
        }
    }
}

/// A message reader pulling the envelope and segment bodies from a byte
/// stream
///
/// The header is read eagerly and validated before any body allocation.
/// Single-segment bodies are read during construction; multi-segment bodies
/// are filled lazily, reading further only when `get_segment` needs data
/// past the current cursor. Dropping the reader skips whatever tail is
/// still unread so the stream is left positioned after the message.
pub struct StreamMessageReader<'s, S: InputStream> {
    stream: S,
    backing: Backing<'s>,
    /// Word ranges of each segment within the backing buffer
    segments: Vec<Range<usize>>,
    /// Byte cursor for lazy fill; `None` when the body was read eagerly
    read_pos: Option<usize>,
    /// Message body size in bytes
    total_bytes: usize,
}

impl<'s, S: InputStream> StreamMessageReader<'s, S> {
    /// Read and validate a message header, then read the body as described
    /// above
    ///
    /// `scratch` is used as the backing buffer when it is large enough,
    /// avoiding allocation on hot paths that reuse one buffer across
    /// messages.
    pub fn new(
        mut stream: S,
        options: ReaderOptions,
        scratch: Option<&'s mut [Word]>,
    ) -> Result<Self> {
        let mut first_word = [0u8; BYTES_PER_WORD];
        stream.read_exact(&mut first_word)?;

        let mut field = [0u8; 4];
        field.copy_from_slice(&first_word[..4]);
        let segment_count = u32::from_le_bytes(field).wrapping_add(1);

        field.copy_from_slice(&first_word[4..]);
        let segment0_size = if segment_count == 0 {
            0
        } else {
            u32::from_le_bytes(field) as usize
        };

        // A hostile header can declare an absurd segment count; reject it
        // before reading the size table it implies.
        if segment_count >= MAX_SEGMENT_COUNT {
            return Err(MatisseError::too_many_segments(
                segment_count,
                MAX_SEGMENT_COUNT,
            ));
        }

        // Sizes for segments past the first, padding entry included
        let mut more_sizes: SmallVec<[u32; 32]> = SmallVec::new();
        if segment_count > 1 {
            let table_entries = (segment_count as usize) & !1;
            let mut table_bytes: SmallVec<[u8; 128]> = smallvec![0u8; table_entries * 4];
            stream.read_exact(&mut table_bytes)?;
            for chunk in table_bytes.chunks_exact(4) {
                field.copy_from_slice(chunk);
                more_sizes.push(u32::from_le_bytes(field));
            }
        }

        let mut total_words = segment0_size as u64;
        for &size in more_sizes.iter().take(segment_count.saturating_sub(1) as usize) {
            total_words += size as u64;
        }

        // Reject anything the receiver could not traverse within its limit;
        // otherwise a malicious peer could force an enormous allocation.
        if total_words > options.traversal_limit_words {
            return Err(MatisseError::traversal_limit_exceeded(
                total_words,
                options.traversal_limit_words,
            ));
        }

        let total = usize::try_from(total_words)
            .map_err(|_| MatisseError::io("message too large for address space"))?;

        let mut backing = match scratch {
            Some(scratch) if scratch.len() >= total => Backing::Scratch(scratch),
            _ => Backing::Owned(vec![Word::ZERO; total]),
        };

        let mut segments = Vec::new();
        if segment_count > 0 {
            segments.reserve_exact(segment_count as usize);
            segments.push(0..segment0_size);

            let mut offset = segment0_size;
            for &size in more_sizes.iter().take(segment_count as usize - 1) {
                let size = size as usize;
                segments.push(offset..offset + size);
                offset += size;
            }
        }

        let total_bytes = total * BYTES_PER_WORD;
        let mut read_pos = None;

        if segment_count == 1 {
            let bytes = &mut word_slice_to_bytes_mut(backing.words_mut())[..total_bytes];
            stream.read_exact(bytes)?;
        } else if segment_count > 1 {
            // Read at least the root segment now; the rest fills in lazily.
            let seg0_bytes = segment0_size * BYTES_PER_WORD;
            let bytes = &mut word_slice_to_bytes_mut(backing.words_mut())[..total_bytes];
            let n = stream.read_range(bytes, seg0_bytes)?;
            read_pos = Some(n);
        }

        Ok(Self {
            stream,
            backing,
            segments,
            read_pos,
            total_bytes,
        })
    }

    /// Number of segments in the message
    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    /// Borrow segment `id`, reading more of the stream first if its body
    /// has not arrived yet
    ///
    /// Returns `Ok(None)` when `id` is out of range.
    pub fn get_segment(&mut self, id: u32) -> Result<Option<&[Word]>> {
        let range = match self.segments.get(id as usize) {
            Some(range) => range.clone(),
            None => return Ok(None),
        };

        if let Some(read_pos) = self.read_pos {
            let segment_end = range.end * BYTES_PER_WORD;
            if read_pos < segment_end {
                let bytes =
                    &mut word_slice_to_bytes_mut(self.backing.words_mut())[..self.total_bytes];
                let n = self
                    .stream
                    .read_range(&mut bytes[read_pos..], segment_end - read_pos)?;
                self.read_pos = Some(read_pos + n);
            }
        }

        Ok(Some(&self.backing.words()[range]))
    }
}

impl<S: InputStream> Drop for StreamMessageReader<'_, S> {
    fn drop(&mut self) {
        if let Some(read_pos) = self.read_pos {
            if read_pos < self.total_bytes {
                // Leave the stream positioned after the message. Errors here
                // cannot propagate out of drop (and must stay quiet when the
                // thread is already unwinding), so they are only logged.
                if let Err(e) = self.stream.skip(self.total_bytes - read_pos) {
                    tracing::warn!("failed to skip unread message tail: {}", e);
                }
            }
        }
    }
}

/// Write a message to a byte stream as one gathered write
///
/// The header table and every segment body are handed to the stream as a
/// single `write` call so the message reaches descriptor-backed streams in
/// one vectored syscall, without interleaving from concurrent writers.
pub fn write_message<S: OutputStream>(output: &mut S, segments: &[&[Word]]) -> Result<()> {
    if segments.is_empty() {
        return Err(MatisseError::UninitializedMessage);
    }

    let table_entries = (segments.len() + 2) & !1;
    let mut table: SmallVec<[u8; 128]> = smallvec![0u8; table_entries * 4];

    // Storing count - 1 keeps the first word of a single-segment message
    // zero, which helps downstream compression.
    table[..4].copy_from_slice(&(segments.len() as u32 - 1).to_le_bytes());
    for (i, segment) in segments.iter().enumerate() {
        let offset = (i + 1) * 4;
        table[offset..offset + 4].copy_from_slice(&(segment.len() as u32).to_le_bytes());
    }
    // The pad entry after an even segment count stays zero.

    let mut pieces: SmallVec<[&[u8]; 8]> = SmallVec::with_capacity(segments.len() + 1);
    pieces.push(&table);
    for segment in segments {
        pieces.push(word_slice_to_bytes(segment));
    }

    output.write(&pieces)
}

#[cfg(unix)]
mod fd_helpers {
    use std::os::fd::RawFd;

    use super::*;
    use crate::io::{FdInputStream, FdOutputStream};

    /// Read one message from a file descriptor
    ///
    /// The returned reader owns the descriptor wrapper (not the descriptor)
    /// and skips any unread tail when dropped.
    pub fn read_message_from_fd<'s>(
        fd: RawFd,
        options: ReaderOptions,
    ) -> Result<StreamMessageReader<'s, FdInputStream>> {
        StreamMessageReader::new(FdInputStream::new(fd), options, None)
    }

    /// Write one message to a file descriptor as a single vectored write
    pub fn write_message_to_fd(fd: RawFd, segments: &[&[Word]]) -> Result<()> {
        let mut stream = FdOutputStream::new(fd);
        write_message(&mut stream, segments)
    }
}

#[cfg(unix)]
pub use fd_helpers::{read_message_from_fd, write_message_to_fd};
