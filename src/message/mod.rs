//! Message building blocks: the word unit and reader configuration
//!
//! Everything in the envelope format is sized in 8-byte words. This module
//! provides the [`Word`] type shared by readers and writers, byte-level
//! reinterpretation helpers for the little-endian header fields, and the
//! [`ReaderOptions`] configuration consumed at parse time.

pub mod options;
pub mod word;

pub use options::{ReaderOptions, DEFAULT_TRAVERSAL_LIMIT_WORDS};
pub use word::{word_slice_to_bytes, word_slice_to_bytes_mut, Word, BYTES_PER_WORD};
