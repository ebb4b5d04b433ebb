//! One-shot initializer
//!
//! [`Once`] runs an initializer at most once per initialized period, makes
//! concurrent callers wait for it, and supports two extra lifecycle moves
//! the standard library's equivalent lacks: [`reset`](Once::reset) returns
//! an initialized instance to uninitialized so a later caller
//! reinitializes, and [`disable`](Once::disable) permanently turns the
//! instance off. A failed initializer (error return or panic) also returns
//! the state to uninitialized, so the next caller retries with a fresh
//! initializer.

use crate::error::Result;

const UNINITIALIZED: u32 = 0;
const INITIALIZING: u32 = 1;
const INITIALIZING_WITH_WAITERS: u32 = 2;
const INITIALIZED: u32 = 3;
const DISABLED: u32 = 4;

// =======================================================================
// Futex-backed implementation (Linux)

#[cfg(target_os = "linux")]
mod imp {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::sync::futex::{futex_wait, futex_wake_all};

    /// One-shot initializer; see the module docs
    pub struct Once {
        futex: AtomicU32,
    }

    /// Reverts a failed initialization and wakes waiters, unless disarmed
    struct RevertOnFailure<'a> {
        futex: &'a AtomicU32,
    }

    impl Drop for RevertOnFailure<'_> {
        fn drop(&mut self) {
            if self.futex.swap(UNINITIALIZED, Ordering::Release) == INITIALIZING_WITH_WAITERS {
                futex_wake_all(self.futex);
            }
        }
    }

    impl Once {
        /// Create an uninitialized instance
        pub const fn new() -> Self {
            Self {
                futex: AtomicU32::new(UNINITIALIZED),
            }
        }

        /// Run `init` unless initialization already happened or is disabled
        ///
        /// Exactly one caller runs the initializer; concurrent callers
        /// block until it finishes. If it fails, by error or by panic, the
        /// state reverts to uninitialized, the failure propagates to the
        /// caller that ran it, and blocked callers race to run a fresh
        /// initializer.
        pub fn run_once<F: FnOnce() -> Result<()>>(&self, init: F) -> Result<()> {
            'start_over: loop {
                match self.futex.compare_exchange(
                    UNINITIALIZED,
                    INITIALIZING,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // It's our job to initialize.
                        let revert = RevertOnFailure { futex: &self.futex };
                        init()?;
                        std::mem::forget(revert);

                        if self.futex.swap(INITIALIZED, Ordering::Release)
                            == INITIALIZING_WITH_WAITERS
                        {
                            futex_wake_all(&self.futex);
                        }
                        return Ok(());
                    }
                    Err(mut state) => loop {
                        match state {
                            INITIALIZED | DISABLED => return Ok(()),
                            INITIALIZING => {
                                // Initialization is running in another
                                // thread; flag that we're waiting.
                                if let Err(current) = self.futex.compare_exchange(
                                    INITIALIZING,
                                    INITIALIZING_WITH_WAITERS,
                                    Ordering::Acquire,
                                    Ordering::Acquire,
                                ) {
                                    state = current;
                                    continue;
                                }
                            }
                            INITIALIZING_WITH_WAITERS => {}
                            // The initializer gave up before we got here.
                            _ => continue 'start_over,
                        }

                        futex_wait(&self.futex, INITIALIZING_WITH_WAITERS);
                        state = self.futex.load(Ordering::Acquire);

                        if state == UNINITIALIZED {
                            // Whoever was initializing gave up; take it
                            // from the top.
                            continue 'start_over;
                        }
                    },
                }
            }
        }

        /// Return an initialized instance to uninitialized
        ///
        /// A no-op when disabled. Calling this in any other state is a
        /// programming error and panics.
        pub fn reset(&self) {
            if let Err(state) = self.futex.compare_exchange(
                INITIALIZED,
                UNINITIALIZED,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                assert!(state == DISABLED, "reset() called while not initialized");
            }
        }

        /// Permanently disable the instance
        ///
        /// After this, `run_once` returns without invoking its initializer.
        /// If an initializer is in flight, waits for it to finish first.
        pub fn disable(&self) {
            let mut state = self.futex.load(Ordering::Acquire);
            loop {
                match state {
                    UNINITIALIZED | INITIALIZED => {
                        match self.futex.compare_exchange(
                            state,
                            DISABLED,
                            Ordering::Relaxed,
                            Ordering::Relaxed,
                        ) {
                            Ok(_) => return,
                            Err(current) => {
                                state = current;
                                continue;
                            }
                        }
                    }
                    INITIALIZING => {
                        // Flag that we're waiting, then wait below.
                        if let Err(current) = self.futex.compare_exchange(
                            INITIALIZING,
                            INITIALIZING_WITH_WAITERS,
                            Ordering::Acquire,
                            Ordering::Acquire,
                        ) {
                            state = current;
                            continue;
                        }
                    }
                    INITIALIZING_WITH_WAITERS => {}
                    _ => return, // DISABLED
                }

                futex_wait(&self.futex, INITIALIZING_WITH_WAITERS);
                state = self.futex.load(Ordering::Acquire);
            }
        }

        /// Whether initialization has completed
        pub fn is_initialized(&self) -> bool {
            self.futex.load(Ordering::Acquire) == INITIALIZED
        }
    }

    impl Drop for Once {
        fn drop(&mut self) {
            let state = *self.futex.get_mut();
            assert!(
                state != INITIALIZING && state != INITIALIZING_WITH_WAITERS,
                "one-shot initializer destroyed while initializing"
            );
        }
    }
}

// =======================================================================
// SRWLock-backed implementation (Windows)

#[cfg(windows)]
mod imp {
    use std::cell::UnsafeCell;
    use std::sync::atomic::{AtomicU32, Ordering};

    use windows_sys::Win32::System::Threading::{
        AcquireSRWLockExclusive, ReleaseSRWLockExclusive, RTL_SRWLOCK, SRWLOCK_INIT,
    };

    use super::*;

    /// One-shot initializer; see the module docs
    pub struct Once {
        lock: UnsafeCell<RTL_SRWLOCK>,
        state: AtomicU32,
    }

    unsafe impl Send for Once {}
    unsafe impl Sync for Once {}

    struct LockGuard<'a> {
        lock: &'a UnsafeCell<RTL_SRWLOCK>,
    }

    impl Drop for LockGuard<'_> {
        fn drop(&mut self) {
            unsafe { ReleaseSRWLockExclusive(self.lock.get()) };
        }
    }

    impl Once {
        /// Create an uninitialized instance
        pub const fn new() -> Self {
            Self {
                lock: UnsafeCell::new(SRWLOCK_INIT),
                state: AtomicU32::new(UNINITIALIZED),
            }
        }

        /// Run `init` unless initialization already happened or is disabled
        pub fn run_once<F: FnOnce() -> Result<()>>(&self, init: F) -> Result<()> {
            unsafe { AcquireSRWLockExclusive(self.lock.get()) };
            let _guard = LockGuard { lock: &self.lock };

            if self.state.load(Ordering::Relaxed) != UNINITIALIZED {
                return Ok(());
            }

            init()?;

            self.state.store(INITIALIZED, Ordering::Release);
            Ok(())
        }

        /// Return an initialized instance to uninitialized
        pub fn reset(&self) {
            if let Err(state) = self.state.compare_exchange(
                INITIALIZED,
                UNINITIALIZED,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                assert!(state == DISABLED, "reset() called while not initialized");
            }
        }

        /// Permanently disable the instance
        pub fn disable(&self) {
            unsafe { AcquireSRWLockExclusive(self.lock.get()) };
            let _guard = LockGuard { lock: &self.lock };

            self.state.store(DISABLED, Ordering::Relaxed);
        }

        /// Whether initialization has completed
        pub fn is_initialized(&self) -> bool {
            self.state.load(Ordering::Acquire) == INITIALIZED
        }
    }
}

// =======================================================================
// pthread-backed implementation (other Unix)

#[cfg(all(unix, not(target_os = "linux")))]
mod imp {
    use std::cell::UnsafeCell;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// One-shot initializer; see the module docs
    pub struct Once {
        mutex: UnsafeCell<libc::pthread_mutex_t>,
        state: AtomicU32,
    }

    unsafe impl Send for Once {}
    unsafe impl Sync for Once {}

    struct LockGuard<'a> {
        mutex: &'a UnsafeCell<libc::pthread_mutex_t>,
    }

    impl Drop for LockGuard<'_> {
        fn drop(&mut self) {
            let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.get()) };
            if rc != 0 {
                tracing::error!("pthread_mutex_unlock failed: {}", rc);
            }
        }
    }

    impl Once {
        /// Create an uninitialized instance
        pub const fn new() -> Self {
            Self {
                mutex: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
                state: AtomicU32::new(UNINITIALIZED),
            }
        }

        fn lock(&self) -> LockGuard<'_> {
            let rc = unsafe { libc::pthread_mutex_lock(self.mutex.get()) };
            assert_eq!(rc, 0, "pthread_mutex_lock failed: {}", rc);
            LockGuard { mutex: &self.mutex }
        }

        /// Run `init` unless initialization already happened or is disabled
        pub fn run_once<F: FnOnce() -> Result<()>>(&self, init: F) -> Result<()> {
            let _guard = self.lock();

            if self.state.load(Ordering::Relaxed) != UNINITIALIZED {
                return Ok(());
            }

            init()?;

            self.state.store(INITIALIZED, Ordering::Release);
            Ok(())
        }

        /// Return an initialized instance to uninitialized
        pub fn reset(&self) {
            if let Err(state) = self.state.compare_exchange(
                INITIALIZED,
                UNINITIALIZED,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                assert!(state == DISABLED, "reset() called while not initialized");
            }
        }

        /// Permanently disable the instance
        pub fn disable(&self) {
            let _guard = self.lock();
            self.state.store(DISABLED, Ordering::Relaxed);
        }

        /// Whether initialization has completed
        pub fn is_initialized(&self) -> bool {
            self.state.load(Ordering::Acquire) == INITIALIZED
        }
    }

    impl Drop for Once {
        fn drop(&mut self) {
            let rc = unsafe { libc::pthread_mutex_destroy(self.mutex.get()) };
            if rc != 0 {
                tracing::error!("pthread_mutex_destroy failed: {}", rc);
            }
        }
    }
}

pub use imp::Once;

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}
