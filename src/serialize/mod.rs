//! Framed message serialization
//!
//! A message is an ordered, non-empty list of word-aligned segments. On the
//! wire it is preceded by an envelope: word 0 holds `[segment count - 1,
//! size of segment 0]` as two 32-bit little-endian fields, further segment
//! sizes follow packed two per word, and a 32-bit zero pad keeps the table
//! word-aligned when the count is even. Segment bodies follow in order.
//!
//! Readers parse the envelope under strict validation so untrusted input can
//! never make them read or allocate beyond configured bounds:
//!
//! - [`FlatMessageReader`] borrows segments out of a contiguous word array.
//! - [`StreamMessageReader`] reads from a byte stream, filling multi-segment
//!   bodies lazily on first access.
//!
//! Writers produce the same envelope:
//!
//! - [`message_to_flat_array`] builds one contiguous word buffer.
//! - [`write_message`] emits the message as a single gathered write.

pub mod flat;
pub mod stream;

pub use flat::{compute_serialized_size_in_words, message_to_flat_array, FlatMessageReader};
pub use stream::{write_message, StreamMessageReader};

/// Segment-count cap enforced by the stream reader; a header declaring this
/// many segments or more is rejected outright
pub const MAX_SEGMENT_COUNT: u32 = 512;

/// Number of header words for a message with `segment_count` segments
pub(crate) fn header_words(segment_count: u32) -> usize {
    segment_count as usize / 2 + 1
}
