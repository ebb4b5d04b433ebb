//! Reader/writer mutex
//!
//! [`RawRwLock`] is the bare primitive; [`RwLock`] wraps a value and hands
//! out RAII guards. On Linux the raw lock packs its entire state into one
//! 32-bit futex word so every transition is a single atomic operation:
//!
//! - bit 31: a writer holds the lock
//! - bit 30: at least one writer is waiting
//! - bits 0..30: readers holding the lock, plus readers already queued
//!   behind a writer (they pre-increment before blocking)
//!
//! The three fields live in one word because transitions must be atomic as
//! a unit; splitting them would allow a reader and a writer to each observe
//! a half-updated lock.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use super::Exclusivity;

// =======================================================================
// Futex-backed implementation (Linux)

#[cfg(target_os = "linux")]
mod raw {
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::sync::futex::{futex_wait, futex_wake_all};
    use crate::sync::Exclusivity;

    const EXCLUSIVE_HELD: u32 = 1 << 31;
    const EXCLUSIVE_REQUESTED: u32 = 1 << 30;
    const SHARED_COUNT_MASK: u32 = EXCLUSIVE_REQUESTED - 1;

    /// Futex-backed reader/writer lock
    ///
    /// Uncontended acquisition and release are one atomic operation each;
    /// the kernel is only entered when a thread actually has to wait.
    /// Writers get no priority: readers keep acquiring while a writer
    /// waits, so a thread already holding a shared lock can take another
    /// without deadlocking against a pending writer.
    pub struct RawRwLock {
        futex: AtomicU32,
    }

    impl RawRwLock {
        /// Create an unlocked lock
        pub const fn new() -> Self {
            Self {
                futex: AtomicU32::new(0),
            }
        }

        /// Acquire in exclusive (writer) mode
        pub fn lock_exclusive(&self) {
            loop {
                match self
                    .futex
                    .compare_exchange(0, EXCLUSIVE_HELD, Ordering::Acquire, Ordering::Relaxed)
                {
                    Ok(_) => return,
                    Err(mut state) => {
                        // Contended. Raise the request bit, then wait.
                        if state & EXCLUSIVE_REQUESTED == 0 {
                            match self.futex.compare_exchange(
                                state,
                                state | EXCLUSIVE_REQUESTED,
                                Ordering::Relaxed,
                                Ordering::Relaxed,
                            ) {
                                Ok(_) => state |= EXCLUSIVE_REQUESTED,
                                // State changed before we could set the bit;
                                // start over.
                                Err(_) => continue,
                            }
                        }
                        futex_wait(&self.futex, state);
                    }
                }
            }
        }

        /// Acquire in shared (reader) mode
        pub fn lock_shared(&self) {
            // Readers count themselves up front, whether or not a writer
            // currently holds the lock.
            let mut state = self.futex.fetch_add(1, Ordering::Acquire) + 1;
            while state & EXCLUSIVE_HELD != 0 {
                // A writer holds the lock. The count is already ours, so
                // just wait for the writer to let go.
                futex_wait(&self.futex, state);
                state = self.futex.load(Ordering::Acquire);
            }
        }

        /// Release exclusive mode
        pub fn unlock_exclusive(&self) {
            debug_assert!(
                self.futex.load(Ordering::Relaxed) & EXCLUSIVE_HELD != 0,
                "unlocked a lock that was not held exclusively"
            );
            let old_state = self
                .futex
                .fetch_and(!(EXCLUSIVE_HELD | EXCLUSIVE_REQUESTED), Ordering::Release);

            if old_state & !EXCLUSIVE_HELD != 0 {
                // Queued readers now collectively hold the lock. Waiting
                // writers must wake too: one may win the race, and the rest
                // have to re-raise the request bit we just cleared.
                futex_wake_all(&self.futex);
            }
        }

        /// Release shared mode
        pub fn unlock_shared(&self) {
            debug_assert!(
                self.futex.load(Ordering::Relaxed) & SHARED_COUNT_MASK != 0,
                "unlocked a lock that was not held in shared mode"
            );
            let state = self.futex.fetch_sub(1, Ordering::Release) - 1;

            // The only waiter that can make progress now is a writer seeing
            // the reader count hit zero.
            if state == EXCLUSIVE_REQUESTED
                && self
                    .futex
                    .compare_exchange(EXCLUSIVE_REQUESTED, 0, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                // Wake every writer: one grabs the lock, the others
                // re-establish the request bit.
                futex_wake_all(&self.futex);
            }
        }

        /// Panic unless the lock is currently held in the given mode
        ///
        /// This checks the lock state, not the calling thread's identity;
        /// it exists to catch use of lock-skipping accessors while the lock
        /// is free.
        pub fn assert_locked_by_caller(&self, exclusivity: Exclusivity) {
            let state = self.futex.load(Ordering::Relaxed);
            match exclusivity {
                Exclusivity::Exclusive => assert!(
                    state & EXCLUSIVE_HELD != 0,
                    "lock is not held exclusively"
                ),
                Exclusivity::Shared => assert!(
                    state & SHARED_COUNT_MASK != 0,
                    "lock is not held in shared mode"
                ),
            }
        }
    }

    impl Drop for RawRwLock {
        fn drop(&mut self) {
            let state = *self.futex.get_mut();
            assert!(
                state == 0,
                "reader/writer lock destroyed while held (state {:#010x})",
                state
            );
        }
    }
}

// =======================================================================
// SRWLock-backed implementation (Windows)

#[cfg(windows)]
mod raw {
    use std::cell::UnsafeCell;

    use windows_sys::Win32::System::Threading::{
        AcquireSRWLockExclusive, AcquireSRWLockShared, ReleaseSRWLockExclusive,
        ReleaseSRWLockShared, TryAcquireSRWLockExclusive, TryAcquireSRWLockShared, RTL_SRWLOCK,
        SRWLOCK_INIT,
    };

    use crate::sync::Exclusivity;

    /// SRWLock-backed reader/writer lock
    ///
    /// Same external contract as the futex variant, with fairness left to
    /// the OS primitive.
    pub struct RawRwLock {
        lock: UnsafeCell<RTL_SRWLOCK>,
    }

    unsafe impl Send for RawRwLock {}
    unsafe impl Sync for RawRwLock {}

    impl RawRwLock {
        /// Create an unlocked lock
        pub const fn new() -> Self {
            Self {
                lock: UnsafeCell::new(SRWLOCK_INIT),
            }
        }

        /// Acquire in exclusive (writer) mode
        pub fn lock_exclusive(&self) {
            unsafe { AcquireSRWLockExclusive(self.lock.get()) };
        }

        /// Acquire in shared (reader) mode
        pub fn lock_shared(&self) {
            unsafe { AcquireSRWLockShared(self.lock.get()) };
        }

        /// Release exclusive mode
        pub fn unlock_exclusive(&self) {
            unsafe { ReleaseSRWLockExclusive(self.lock.get()) };
        }

        /// Release shared mode
        pub fn unlock_shared(&self) {
            unsafe { ReleaseSRWLockShared(self.lock.get()) };
        }

        /// Panic unless the lock is currently held in the given mode
        pub fn assert_locked_by_caller(&self, exclusivity: Exclusivity) {
            match exclusivity {
                Exclusivity::Exclusive => {
                    // An exclusive holder blocks shared acquisition; if a
                    // shared try-lock succeeds, nobody holds it exclusively.
                    if unsafe { TryAcquireSRWLockShared(self.lock.get()) } != 0 {
                        unsafe { ReleaseSRWLockShared(self.lock.get()) };
                        panic!("lock is not held exclusively");
                    }
                }
                Exclusivity::Shared => {
                    if unsafe { TryAcquireSRWLockExclusive(self.lock.get()) } != 0 {
                        unsafe { ReleaseSRWLockExclusive(self.lock.get()) };
                        panic!("lock is not held in shared mode");
                    }
                }
            }
        }
    }

    // SRW locks do not need to be explicitly destroyed.
}

// =======================================================================
// pthread-backed implementation (other Unix)

#[cfg(all(unix, not(target_os = "linux")))]
mod raw {
    use std::cell::UnsafeCell;

    use crate::sync::Exclusivity;

    /// pthread-backed reader/writer lock
    ///
    /// Same external contract as the futex variant, with fairness left to
    /// the platform's rwlock. Some platforms prioritize readers or writers
    /// differently; no starvation guarantee is made on any backend.
    pub struct RawRwLock {
        lock: UnsafeCell<libc::pthread_rwlock_t>,
    }

    unsafe impl Send for RawRwLock {}
    unsafe impl Sync for RawRwLock {}

    impl RawRwLock {
        /// Create an unlocked lock
        pub const fn new() -> Self {
            Self {
                lock: UnsafeCell::new(libc::PTHREAD_RWLOCK_INITIALIZER),
            }
        }

        /// Acquire in exclusive (writer) mode
        pub fn lock_exclusive(&self) {
            let rc = unsafe { libc::pthread_rwlock_wrlock(self.lock.get()) };
            assert_eq!(rc, 0, "pthread_rwlock_wrlock failed: {}", rc);
        }

        /// Acquire in shared (reader) mode
        pub fn lock_shared(&self) {
            let rc = unsafe { libc::pthread_rwlock_rdlock(self.lock.get()) };
            assert_eq!(rc, 0, "pthread_rwlock_rdlock failed: {}", rc);
        }

        /// Release exclusive mode
        pub fn unlock_exclusive(&self) {
            let rc = unsafe { libc::pthread_rwlock_unlock(self.lock.get()) };
            assert_eq!(rc, 0, "pthread_rwlock_unlock failed: {}", rc);
        }

        /// Release shared mode
        pub fn unlock_shared(&self) {
            let rc = unsafe { libc::pthread_rwlock_unlock(self.lock.get()) };
            assert_eq!(rc, 0, "pthread_rwlock_unlock failed: {}", rc);
        }

        /// Panic unless the lock is currently held in the given mode
        pub fn assert_locked_by_caller(&self, exclusivity: Exclusivity) {
            match exclusivity {
                Exclusivity::Exclusive => {
                    // A shared try-lock fails only when a writer holds the
                    // lock.
                    if unsafe { libc::pthread_rwlock_tryrdlock(self.lock.get()) } == 0 {
                        unsafe { libc::pthread_rwlock_unlock(self.lock.get()) };
                        panic!("lock is not held exclusively");
                    }
                }
                Exclusivity::Shared => {
                    // An exclusive try-lock fails when anyone holds the
                    // lock; there is no way to prove it is held only for
                    // reading.
                    if unsafe { libc::pthread_rwlock_trywrlock(self.lock.get()) } == 0 {
                        unsafe { libc::pthread_rwlock_unlock(self.lock.get()) };
                        panic!("lock is not held in shared mode");
                    }
                }
            }
        }
    }

    impl Drop for RawRwLock {
        fn drop(&mut self) {
            let rc = unsafe { libc::pthread_rwlock_destroy(self.lock.get()) };
            if rc != 0 {
                tracing::error!("pthread_rwlock_destroy failed: {}", rc);
            }
        }
    }
}

pub use raw::RawRwLock;

// =======================================================================
// Value wrapper and guards

/// A value guarded by a [`RawRwLock`]
///
/// Access goes through [`read`](RwLock::read) and [`write`](RwLock::write),
/// which return guards releasing the lock on drop.
pub struct RwLock<T> {
    raw: RawRwLock,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    /// Create a lock around `value`
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawRwLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire shared access, blocking while a writer holds the lock
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.raw.lock_shared();
        RwLockReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire exclusive access, blocking until all other holders release
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.raw.lock_exclusive();
        RwLockWriteGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Access the value without locking; safe because `&mut self` proves
    /// no other holder exists
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consume the lock, returning the value
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Panic unless the lock is currently held in the given mode
    pub fn assert_locked_by_caller(&self, exclusivity: Exclusivity) {
        self.raw.assert_locked_by_caller(exclusivity);
    }
}

/// Shared access to the value in an [`RwLock`]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
    /// Some backends require release on the acquiring thread
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock_shared();
    }
}

/// Exclusive access to the value in an [`RwLock`]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
    /// Some backends require release on the acquiring thread
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock_exclusive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncontended_write_read() {
        let lock = RwLock::new(0u32);
        {
            let mut guard = lock.write();
            *guard = 7;
        }
        assert_eq!(*lock.read(), 7);
    }

    #[test]
    fn test_multiple_readers() {
        let lock = RwLock::new(1u32);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 2);
    }

    #[test]
    fn test_get_mut_and_into_inner() {
        let mut lock = RwLock::new(5u32);
        *lock.get_mut() += 1;
        assert_eq!(lock.into_inner(), 6);
    }

    #[test]
    fn test_assert_locked_positive() {
        let lock = RwLock::new(());
        {
            let _guard = lock.write();
            lock.assert_locked_by_caller(Exclusivity::Exclusive);
        }
        {
            let _guard = lock.read();
            lock.assert_locked_by_caller(Exclusivity::Shared);
        }
    }

    #[test]
    #[should_panic(expected = "not held exclusively")]
    fn test_assert_locked_exclusive_unheld_panics() {
        let lock = RwLock::new(());
        lock.assert_locked_by_caller(Exclusivity::Exclusive);
    }

    #[test]
    #[should_panic(expected = "not held in shared mode")]
    fn test_assert_locked_shared_unheld_panics() {
        let lock = RwLock::new(());
        lock.assert_locked_by_caller(Exclusivity::Shared);
    }
}
