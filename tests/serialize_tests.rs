//! Integration tests for the framed message envelope
//!
//! Covers flat and stream round trips, exact envelope byte layouts, lazy
//! segment filling, scratch-space reuse, and adversarial inputs that must
//! be rejected without over-reading the stream.

use matisse::{
    compute_serialized_size_in_words, message_to_flat_array, write_message, FlatMessageReader,
    InputStream, MatisseError, ReaderOptions, SliceInputStream, StreamMessageReader, Word,
    BYTES_PER_WORD,
};

fn words(values: &[u64]) -> Vec<Word> {
    values.iter().map(|&v| Word::from_u64(v)).collect()
}

fn encode(segments: &[&[Word]]) -> Vec<u8> {
    let mut out = Vec::new();
    write_message(&mut out, segments).unwrap();
    out
}

/// An input stream that hands out exactly the minimum requested bytes and
/// records how many were consumed, so tests can observe lazy filling.
struct MeteredStream<'a> {
    data: &'a [u8],
    consumed: usize,
}

impl<'a> MeteredStream<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, consumed: 0 }
    }
}

impl InputStream for MeteredStream<'_> {
    fn read_range(&mut self, buf: &mut [u8], min_bytes: usize) -> Result<usize, MatisseError> {
        assert!(
            min_bytes <= self.data.len() - self.consumed,
            "stream over-read: asked for {} bytes with {} left",
            min_bytes,
            self.data.len() - self.consumed
        );
        buf[..min_bytes].copy_from_slice(&self.data[self.consumed..self.consumed + min_bytes]);
        self.consumed += min_bytes;
        Ok(min_bytes)
    }
}

/// Test: flat round trip preserves every segment and the segment count
#[test]
fn test_flat_round_trip() {
    let a = words(&[1, 2, 3]);
    let b = words(&[4]);
    let c = words(&[5, 6]);
    let segments: Vec<&[Word]> = vec![&a, &b, &c];

    let array = message_to_flat_array(&segments).unwrap();
    assert_eq!(
        array.len(),
        compute_serialized_size_in_words(&segments).unwrap()
    );

    let reader = FlatMessageReader::new(&array, ReaderOptions::default()).unwrap();
    assert_eq!(reader.segment_count(), 3);
    for (i, segment) in segments.iter().enumerate() {
        assert_eq!(reader.get_segment(i as u32).unwrap(), *segment);
    }
    assert!(reader.get_segment(3).is_none());
}

/// Test: stream round trip preserves segments even when accessed out of
/// order, exercising lazy fill
#[test]
fn test_stream_round_trip_out_of_order() {
    let a = words(&[10, 11]);
    let b = words(&[12]);
    let c = words(&[13, 14, 15]);
    let bytes = encode(&[&a, &b, &c]);

    let stream = SliceInputStream::new(&bytes);
    let mut reader = StreamMessageReader::new(stream, ReaderOptions::default(), None).unwrap();

    assert_eq!(reader.get_segment(2).unwrap().unwrap(), &c[..]);
    assert_eq!(reader.get_segment(0).unwrap().unwrap(), &a[..]);
    assert_eq!(reader.get_segment(1).unwrap().unwrap(), &b[..]);
    assert!(reader.get_segment(3).unwrap().is_none());
}

/// Test: two segments [[0x00, 0x01], [0x02]] produce the exact documented
/// envelope, pad included
#[test]
fn test_envelope_layout_two_segments() {
    let a = words(&[0x00, 0x01]);
    let b = words(&[0x02]);
    let array = message_to_flat_array(&[&a, &b]).unwrap();

    assert_eq!(array[0], Word::from_u32_pair(0x0000_0001, 0x0000_0002));
    assert_eq!(array[1], Word::from_u32_pair(0x0000_0001, 0x0000_0000));
    assert_eq!(&array[2..4], &a[..]);
    assert_eq!(&array[4..5], &b[..]);
}

/// Test: a single-segment message's first word is zero, aiding
/// compressibility
#[test]
fn test_envelope_single_segment_first_word_zero() {
    let segment = words(&[0xAA]);
    let array = message_to_flat_array(&[&segment]).unwrap();

    assert_eq!(array[0], Word::from_u32_pair(0x0000_0000, 0x0000_0001));
    assert_eq!(array[0].to_u64() & 0xFFFF_FFFF, 0);
    assert_eq!(array[1], Word::from_u64(0xAA));
    assert_eq!(array.len(), 2);
}

/// Test: three segments of one word each need no pad (odd count)
#[test]
fn test_envelope_layout_three_segments_no_pad() {
    let a = words(&[1]);
    let b = words(&[2]);
    let c = words(&[3]);
    let array = message_to_flat_array(&[&a, &b, &c]).unwrap();

    assert_eq!(array[0], Word::from_u32_pair(0x0000_0002, 0x0000_0001));
    assert_eq!(array[1], Word::from_u32_pair(0x0000_0001, 0x0000_0001));
    assert_eq!(array.len(), 5);
}

/// Test: a header claiming more data than the buffer holds is rejected
#[test]
fn test_flat_truncated_input_rejected() {
    // Claims 2 segments of 10 words each; buffer holds 5 words total
    let mut input = vec![Word::from_u32_pair(1, 10), Word::from_u32_pair(10, 0)];
    input.extend_from_slice(&words(&[0, 0, 0]));

    match FlatMessageReader::new(&input, ReaderOptions::default()) {
        Err(MatisseError::PrematureSegment { .. })
        | Err(MatisseError::PrematureSegmentTable { .. }) => {}
        other => panic!("expected premature-input error, got {:?}", other.map(|_| ())),
    }
}

/// Test: a stream header claiming 600 segments is rejected after reading
/// only the first word
#[test]
fn test_stream_too_many_segments() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&599u32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());

    let mut stream = MeteredStream::new(&bytes);
    match StreamMessageReader::new(&mut stream, ReaderOptions::default(), None) {
        Err(MatisseError::TooManySegments { count, .. }) => assert_eq!(count, 600),
        _ => panic!("expected TooManySegments"),
    }
    assert_eq!(stream.consumed, BYTES_PER_WORD);
}

/// Test: a stream message declaring a billion words against a
/// million-word limit is rejected without reading any body bytes
#[test]
fn test_stream_traversal_limit() {
    let options = ReaderOptions::new().with_traversal_limit_words(1_000_000);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&1_000_000_000u32.to_le_bytes());

    let mut stream = MeteredStream::new(&bytes);
    match StreamMessageReader::new(&mut stream, options, None) {
        Err(MatisseError::TraversalLimitExceeded {
            total_words,
            limit_words,
        }) => {
            assert_eq!(total_words, 1_000_000_000);
            assert_eq!(limit_words, 1_000_000);
        }
        _ => panic!("expected TraversalLimitExceeded"),
    }
    assert_eq!(stream.consumed, BYTES_PER_WORD);
}

/// Test: with a stream that yields only the minimum, construction reads
/// just the header and root segment; later segments are fetched on demand
#[test]
fn test_lazy_fill_reads_on_demand() {
    let a = words(&[1, 2]);
    let b = words(&[3, 4, 5]);
    let bytes = encode(&[&a, &b]);

    let mut stream = MeteredStream::new(&bytes);
    let header_bytes = 2 * BYTES_PER_WORD;

    {
        let mut reader =
            StreamMessageReader::new(&mut stream, ReaderOptions::default(), None).unwrap();

        // Construction consumed the header plus segment 0 only
        assert_eq!(reader.segment_count(), 2);
        assert_eq!(reader.get_segment(0).unwrap().unwrap(), &a[..]);

        // Segment 1 triggers the remaining read
        assert_eq!(reader.get_segment(1).unwrap().unwrap(), &b[..]);
    }

    assert_eq!(stream.consumed, header_bytes + 5 * BYTES_PER_WORD);
}

/// Test: dropping a reader with an unread tail skips the stream past the
/// message
#[test]
fn test_drop_skips_tail() {
    let a = words(&[1]);
    let b = words(&[2, 3, 4]);
    let bytes = encode(&[&a, &b]);

    let mut stream = MeteredStream::new(&bytes);
    {
        let mut reader =
            StreamMessageReader::new(&mut stream, ReaderOptions::default(), None).unwrap();
        // Touch only the root segment, then drop
        assert_eq!(reader.get_segment(0).unwrap().unwrap(), &a[..]);
    }
    assert_eq!(stream.consumed, bytes.len());
}

/// Test: a caller-supplied scratch buffer is used in place of an owned
/// allocation
#[test]
fn test_scratch_space_round_trip() {
    let a = words(&[6, 7]);
    let b = words(&[8]);
    let bytes = encode(&[&a, &b]);

    let mut scratch = vec![Word::ZERO; 64];
    {
        let stream = SliceInputStream::new(&bytes);
        let mut reader =
            StreamMessageReader::new(stream, ReaderOptions::default(), Some(&mut scratch[..]))
                .unwrap();
        assert_eq!(reader.get_segment(0).unwrap().unwrap(), &a[..]);
        assert_eq!(reader.get_segment(1).unwrap().unwrap(), &b[..]);
    }

    // Bodies landed in the scratch words
    assert_eq!(&scratch[..2], &a[..]);
    assert_eq!(&scratch[2..3], &b[..]);
}

/// Test: zero-length segments are legal anywhere in a message
#[test]
fn test_empty_segments() {
    let empty = words(&[]);
    let body = words(&[9]);
    let segments: Vec<&[Word]> = vec![&empty, &body, &empty];

    let array = message_to_flat_array(&segments).unwrap();
    let reader = FlatMessageReader::new(&array, ReaderOptions::default()).unwrap();
    assert_eq!(reader.segment_count(), 3);
    assert!(reader.get_segment(0).unwrap().is_empty());
    assert_eq!(reader.get_segment(1).unwrap(), &body[..]);
    assert!(reader.get_segment(2).unwrap().is_empty());

    let bytes = encode(&segments);
    let stream = SliceInputStream::new(&bytes);
    let mut reader = StreamMessageReader::new(stream, ReaderOptions::default(), None).unwrap();
    assert_eq!(reader.get_segment(1).unwrap().unwrap(), &body[..]);
    assert!(reader.get_segment(2).unwrap().unwrap().is_empty());
}

/// Test: flat writer output parses identically through the stream reader
#[test]
fn test_flat_and_stream_writers_agree() {
    let a = words(&[0xDE, 0xAD]);
    let b = words(&[0xBE, 0xEF]);
    let segments: Vec<&[Word]> = vec![&a, &b];

    let array = message_to_flat_array(&segments).unwrap();
    let streamed = encode(&segments);

    let mut flat_bytes = Vec::new();
    for word in &array {
        flat_bytes.extend_from_slice(word.as_bytes());
    }
    assert_eq!(flat_bytes, streamed);
}

#[cfg(unix)]
mod fd_tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use std::os::fd::AsRawFd;

    use matisse::{read_message_from_fd, write_message_to_fd};

    /// Test: a message written to a descriptor reads back identically
    #[test]
    fn test_fd_round_trip() {
        let a = words(&[21, 22]);
        let b = words(&[23]);

        let mut file = tempfile::tempfile().unwrap();
        write_message_to_fd(file.as_raw_fd(), &[&a, &b]).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut reader = read_message_from_fd(file.as_raw_fd(), ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 2);
        assert_eq!(reader.get_segment(0).unwrap().unwrap(), &a[..]);
        assert_eq!(reader.get_segment(1).unwrap().unwrap(), &b[..]);
    }

    /// Test: consecutive messages on one descriptor parse back to back,
    /// with drop positioning the stream at the next message
    #[test]
    fn test_fd_consecutive_messages() {
        let first = words(&[1]);
        let tail = words(&[2, 3]);
        let second = words(&[4, 5, 6]);

        let mut file = tempfile::tempfile().unwrap();
        write_message_to_fd(file.as_raw_fd(), &[&first, &tail]).unwrap();
        write_message_to_fd(file.as_raw_fd(), &[&second]).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        {
            let mut reader =
                read_message_from_fd(file.as_raw_fd(), ReaderOptions::default()).unwrap();
            // Leave the tail segment unread; drop must skip it
            assert_eq!(reader.get_segment(0).unwrap().unwrap(), &first[..]);
        }

        let mut reader = read_message_from_fd(file.as_raw_fd(), ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 1);
        assert_eq!(reader.get_segment(0).unwrap().unwrap(), &second[..]);
    }
}
