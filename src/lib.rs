//! # Matisse - Framed Message Serialization & Synchronization Primitives
//!
//! Matisse provides two independent layers that share only the conventions
//! of word-aligned buffers and 32-bit little-endian integers:
//!
//! - A **framed message envelope**: messages are ordered lists of 8-byte-word
//!   segments, framed by a self-describing header. Readers parse the envelope
//!   from flat arrays or byte streams with strict validation against
//!   adversarial input; writers emit it with at most one allocation and, on
//!   descriptor-backed streams, one vectored syscall.
//! - **Futex-backed synchronization**: a reader/writer mutex and a one-shot
//!   initializer built directly on the Linux `futex` syscall, lock-free in
//!   the uncontended path, with pthread and SRWLock backends elsewhere.
//!
//! ## Features
//!
//! - **Zero-copy reads**: flat-array readers borrow segments from the input
//! - **Lazy stream filling**: multi-segment bodies are read on first access
//! - **Scratch-space reuse**: callers can supply the backing buffer
//! - **Bounded parsing**: segment-count and traversal limits are enforced
//!   before any allocation
//! - **Minimal kernel crossings**: lock state lives in one 32-bit word;
//!   the kernel is entered only to block or wake
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                Matisse Core                     │
//! ├─────────────────────────────────────────────────┤
//! │  Serialization           │  Synchronization     │
//! │  - Flat reader/writer    │  - RawRwLock/RwLock  │
//! │  - Stream reader/writer  │  - Once              │
//! │  - Envelope validation   │  - futex wait/wake   │
//! └─────────────────────────────────────────────────┘
//!           │                         │
//!           ▼                         ▼
//! ┌─────────────────┐    ┌─────────────────────────┐
//! │  Byte streams   │    │  OS wait primitives     │
//! │  (memory / fd)  │    │  (futex/pthread/SRW)    │
//! └─────────────────┘    └─────────────────────────┘
//! ```

// Core modules
pub mod error;
pub mod io;
pub mod message;
pub mod serialize;
pub mod sync;

// Main API re-exports
pub use error::{MatisseError, Result};
pub use io::{InputStream, OutputStream, SliceInputStream};
pub use message::{ReaderOptions, Word, BYTES_PER_WORD, DEFAULT_TRAVERSAL_LIMIT_WORDS};
pub use serialize::{
    compute_serialized_size_in_words, message_to_flat_array, write_message, FlatMessageReader,
    StreamMessageReader, MAX_SEGMENT_COUNT,
};
pub use sync::{Exclusivity, Once, RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(unix)]
pub use io::{FdInputStream, FdOutputStream};
#[cfg(unix)]
pub use serialize::stream::{read_message_from_fd, write_message_to_fd};
