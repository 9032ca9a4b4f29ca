//! Implementations of locking traits from the [`lock_api`](https://crates.io/crates/lock_api) crate.

use std::sync::atomic::Ordering::Relaxed;

use crate::config::Config;
use crate::{RwSpinLock, SpinLock};

/// A mutual exclusion primitive for protecting shared data of type `T`.
///
/// # Examples
///
/// ```
/// use spinshard::Mutex;
///
/// let mutex: Mutex<usize> = Mutex::new(0);
/// ```
pub type Mutex<T> = lock_api::Mutex<SpinLock, T>;

/// An RAII implementation of a scoped mutex.
///
/// # Examples
///
/// ```
/// use spinshard::{Mutex, MutexGuard};
///
/// let mutex: Mutex<usize> = Mutex::new(0);
/// let mut guard: MutexGuard<usize> = mutex.lock();
/// *guard += 1;
/// drop(guard);
///
/// assert_eq!(*mutex.try_lock().unwrap(), 1);
/// ```
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, SpinLock, T>;

/// A reader-writer lock for protecting shared data of type `T`.
///
/// # Examples
///
/// ```
/// use spinshard::RwLock;
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
/// ```
pub type RwLock<T> = lock_api::RwLock<RwSpinLock, T>;

/// An RAII implementation of a scoped read lock.
///
/// # Examples
///
/// ```
/// use spinshard::{RwLock, RwLockReadGuard};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
/// let first: RwLockReadGuard<usize> = rwlock.read();
/// let second: RwLockReadGuard<usize> = rwlock.read();
/// assert_eq!(*first + *second, 0);
/// assert!(rwlock.try_write().is_none());
/// ```
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RwSpinLock, T>;

/// An RAII implementation of a scoped write lock.
///
/// # Examples
///
/// ```
/// use spinshard::{RwLock, RwLockWriteGuard};
///
/// let rwlock: RwLock<usize> = RwLock::new(0);
/// let mut guard: RwLockWriteGuard<usize> = rwlock.write();
/// *guard += 1;
/// drop(guard);
///
/// assert_eq!(*rwlock.read(), 1);
/// ```
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RwSpinLock, T>;

unsafe impl<C: Config> lock_api::RawMutex for SpinLock<C> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SpinLock::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock(&self) {
        SpinLock::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        SpinLock::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        SpinLock::unlock(self);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        SpinLock::is_locked(self, Relaxed)
    }
}

unsafe impl<C: Config> lock_api::RawRwLock for RwSpinLock<C> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RwSpinLock::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock_shared(&self) {
        self.read_lock();
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_read_lock()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        self.read_unlock();
    }

    #[inline]
    fn lock_exclusive(&self) {
        RwSpinLock::lock(self);
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        RwSpinLock::try_lock(self)
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        RwSpinLock::unlock(self);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        RwSpinLock::is_locked(self, Relaxed) || self.is_shared(Relaxed)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn mutex_counter() {
        let num_threads = if cfg!(miri) { 2 } else { 8 };
        let num_iters = if cfg!(miri) { 16 } else { 1024 };

        let mutex = Arc::new(Mutex::new(0_usize));
        let threads: Vec<_> = (0..num_threads)
            .map(|_| {
                let mutex = mutex.clone();
                thread::spawn(move || {
                    for _ in 0..num_iters {
                        *mutex.lock() += 1;
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(*mutex.lock(), num_threads * num_iters);
    }

    #[test]
    fn rwlock_read_then_write() {
        let rwlock = RwLock::new(vec![1, 2, 3]);
        {
            let first = rwlock.read();
            let second = rwlock.read();
            assert_eq!(first.len(), second.len());
            assert!(rwlock.try_write().is_none());
            assert!(rwlock.is_locked());
        }
        rwlock.write().push(4);
        assert_eq!(rwlock.read().len(), 4);
        assert!(!rwlock.is_locked());
    }
}
