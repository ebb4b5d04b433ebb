//! Reading and writing messages in contiguous word arrays

use crate::error::{MatisseError, Result};
use crate::message::word::{header_field, set_header_field};
use crate::message::{ReaderOptions, Word};

use super::header_words;

/// A message reader borrowing segments out of a flat word array
///
/// The input is parsed once at construction; `get_segment` then hands out
/// subranges of the original array without copying.
#[derive(Debug)]
pub struct FlatMessageReader<'a> {
    /// Segment 0, the root segment
    segment0: &'a [Word],
    /// Segments 1.. in order; empty for single-segment messages
    more_segments: Vec<&'a [Word]>,
    /// Whether the input actually contained a message
    has_segments: bool,
    /// Number of words consumed from the input, header included
    end: usize,
}

impl<'a> FlatMessageReader<'a> {
    /// Parse the envelope at the start of `words`
    ///
    /// An empty input parses as an empty message with zero segments. Inputs
    /// shorter than their declared segment table or segment bodies are
    /// rejected, as are messages whose declared total exceeds the traversal
    /// limit in `options`.
    pub fn new(words: &'a [Word], options: ReaderOptions) -> Result<Self> {
        if words.is_empty() {
            // Assume empty message.
            return Ok(Self {
                segment0: &[],
                more_segments: Vec::new(),
                has_segments: false,
                end: 0,
            });
        }

        let segment_count = header_field(words, 0).wrapping_add(1);
        let header = header_words(segment_count);

        if words.len() < header {
            return Err(MatisseError::premature_segment_table(header, words.len()));
        }

        if segment_count == 0 {
            // Only reachable when the first field is 0xFFFFFFFF and the
            // count wrapped. Treat the message as empty rather than trusting
            // anything else in the header.
            return Ok(Self {
                segment0: &[],
                more_segments: Vec::new(),
                has_segments: false,
                end: header,
            });
        }

        let mut total_words: u64 = 0;
        for i in 0..segment_count {
            total_words += header_field(words, i as usize + 1) as u64;
        }
        if total_words > options.traversal_limit_words {
            return Err(MatisseError::traversal_limit_exceeded(
                total_words,
                options.traversal_limit_words,
            ));
        }

        let segment0_size = header_field(words, 1) as usize;
        let mut offset = header;

        if words.len() - offset < segment0_size {
            return Err(MatisseError::premature_segment(
                0,
                offset.saturating_add(segment0_size),
                words.len(),
            ));
        }

        let segment0 = &words[offset..offset + segment0_size];
        offset += segment0_size;

        let mut more_segments = Vec::new();
        if segment_count > 1 {
            more_segments.reserve_exact(segment_count as usize - 1);

            for i in 1..segment_count {
                let segment_size = header_field(words, i as usize + 1) as usize;

                if words.len() - offset < segment_size {
                    return Err(MatisseError::premature_segment(
                        i,
                        offset.saturating_add(segment_size),
                        words.len(),
                    ));
                }

                more_segments.push(&words[offset..offset + segment_size]);
                offset += segment_size;
            }
        }

        Ok(Self {
            segment0,
            more_segments,
            has_segments: true,
            end: offset,
        })
    }

    /// Number of segments in the message
    pub fn segment_count(&self) -> u32 {
        if self.has_segments {
            self.more_segments.len() as u32 + 1
        } else {
            0
        }
    }

    /// Borrow segment `id`, or `None` when `id` is out of range
    pub fn get_segment(&self, id: u32) -> Option<&'a [Word]> {
        if !self.has_segments {
            None
        } else if id == 0 {
            Some(self.segment0)
        } else {
            self.more_segments.get(id as usize - 1).copied()
        }
    }

    /// Number of words the message occupied, header included
    ///
    /// Lets a caller parse consecutive messages out of one buffer by
    /// advancing this far after each parse.
    pub fn words_consumed(&self) -> usize {
        self.end
    }
}

/// Total words needed to serialize `segments` as a flat array
pub fn compute_serialized_size_in_words(segments: &[&[Word]]) -> Result<usize> {
    if segments.is_empty() {
        return Err(MatisseError::UninitializedMessage);
    }

    let body: usize = segments.iter().map(|s| s.len()).sum();
    Ok(header_words(segments.len() as u32) + body)
}

/// Serialize a message into one newly allocated word buffer
///
/// The envelope stores `segment count - 1`, which makes the first word of a
/// single-segment message zero and helps downstream compression.
pub fn message_to_flat_array(segments: &[&[Word]]) -> Result<Vec<Word>> {
    let total = compute_serialized_size_in_words(segments)?;
    let mut result = vec![Word::ZERO; total];

    set_header_field(&mut result, 0, segments.len() as u32 - 1);
    for (i, segment) in segments.iter().enumerate() {
        set_header_field(&mut result, i + 1, segment.len() as u32);
    }
    // The pad slot after an even segment count is already zero.

    let mut offset = header_words(segments.len() as u32);
    for segment in segments {
        result[offset..offset + segment.len()].copy_from_slice(segment);
        offset += segment.len();
    }

    debug_assert_eq!(offset, result.len(), "buffer overrun/underrun in writer");

    Ok(result)
}
