//! Thin wrappers over the Linux futex syscall
//!
//! Both primitives in this module wait on a single `AtomicU32`, which is
//! exactly the granularity the kernel operates on. Waits use the private
//! (process-local) futex flavor since none of these primitives are shared
//! across processes.

use std::sync::atomic::AtomicU32;

/// Block until `futex` is woken, provided it still holds `expected`
///
/// Spurious returns are fine; every caller re-checks state in a loop. An
/// `EAGAIN` result (the word changed before the kernel could queue us) and
/// `EINTR` are handled the same way.
pub(crate) fn futex_wait(futex: &AtomicU32, expected: u32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            futex.as_ptr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake every waiter currently queued on `futex`
pub(crate) fn futex_wake_all(futex: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            futex.as_ptr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}
