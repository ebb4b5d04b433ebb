//! Synchronization primitives with a lock-free uncontended fast path
//!
//! This module provides a reader/writer mutex and a one-shot initializer
//! built directly on the Linux `futex` syscall, so the uncontended paths
//! are a single atomic operation with no kernel crossing. On other
//! platforms the same external contract is kept by delegating to the native
//! primitive: `pthread_rwlock_t` on non-Linux Unix, SRWLock on Windows.
//!
//! Key properties:
//! - Exclusive and shared acquisition; any number of concurrent readers
//! - Wakeups managed through a single 32-bit state word per primitive
//! - No writer priority: a reader holding the lock can take it again even
//!   while a writer waits, so nested shared acquisition cannot deadlock
//! - No timeouts, no cancellation, no cross-process sharing

#[cfg(target_os = "linux")]
pub(crate) mod futex;
pub mod once;
pub mod rwlock;

pub use once::Once;
pub use rwlock::{RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquisition mode of a reader/writer lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusivity {
    /// Shared (reader) access
    Shared,
    /// Exclusive (writer) access
    Exclusive,
}
