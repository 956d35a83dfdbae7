// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};

/// An ergonomic wrapper around a [`Mutex`]-[`Condvar`] pair.
pub struct Status<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
}

impl<T> Status<T> {
    /// Creates a new status initialized with the given value.
    pub fn new(t: T) -> Self {
        Self {
            mutex: Mutex::new(t),
            condvar: Condvar::new(),
        }
    }

    /// Locks the status, blocking until it is available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.mutex.lock().unwrap()
    }

    /// Locks the status even if another thread panicked while holding it.
    ///
    /// This is meant for cleanup paths that run while unwinding.
    pub fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempts to lock the status without blocking.
    ///
    /// Returns [`None`] if the lock is currently held by another thread (or
    /// was poisoned).
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.mutex.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(_)) => None,
        }
    }

    /// Waits on the given guard until the predicate becomes false.
    ///
    /// The predicate is re-checked after every wake-up, so spurious wake-ups
    /// are harmless.
    pub fn wait_while<'a>(
        &self,
        guard: MutexGuard<'a, T>,
        predicate: impl FnMut(&mut T) -> bool,
    ) -> MutexGuard<'a, T> {
        self.condvar.wait_while(guard, predicate).unwrap()
    }

    /// Wakes up one waiting thread.
    pub fn notify_one(&self) {
        self.condvar.notify_one();
    }

    /// Wakes up all waiting threads.
    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_try_lock_contended() {
        let status = Status::new(0);
        let guard = status.lock();
        assert!(status.try_lock().is_none());
        drop(guard);
        assert!(status.try_lock().is_some());
    }

    #[test]
    fn test_wait_while_notified() {
        let status = Status::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                *status.lock() = true;
                status.notify_all();
            });
            let guard = status.wait_while(status.lock(), |ready| !*ready);
            assert!(*guard);
        });
    }

    #[test]
    fn test_lock_ignore_poison() {
        let status = Status::new(1);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = status.lock();
            panic!("poisoning the lock");
        }));
        assert!(status.try_lock().is_none());
        assert_eq!(*status.lock_ignore_poison(), 1);
    }
}
