//! [`SpinLock`] is a single-word spin-wait exclusive lock.

#![deny(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
#[cfg(not(feature = "loom"))]
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::{self, Acquire, Relaxed, Release};

#[cfg(feature = "loom")]
use loom::sync::atomic::AtomicI32;

use crate::config::{Backoff, Config, DefaultConfig};
use crate::misuse::{Misuse, Site, fault};
use crate::sharded_lock::{ShardLock, sealed};

/// [`SpinLock`] is a single-word spin-wait exclusive lock.
///
/// Contended acquisitions yield the processor a bounded number of times and then sleep briefly,
/// as defined by the [`Config`] type parameter. [`SpinLock`] only provides low-level acquire and
/// release methods, hence the caller is responsible for bracketing the critical section.
///
/// Releasing a lock that is not held panics.
pub struct SpinLock<C: Config = DefaultConfig> {
    /// `0` when unlocked, `1` when locked.
    state: AtomicI32,
    _config: PhantomData<fn() -> C>,
}

impl<C: Config> SpinLock<C> {
    /// State value of a free lock.
    const UNLOCKED: i32 = 0;

    /// State value of a held lock.
    const LOCKED: i32 = 1;

    /// Creates a new unlocked [`SpinLock`].
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::SpinLock;
    ///
    /// static LOCK: SpinLock = SpinLock::new();
    ///
    /// LOCK.lock();
    /// LOCK.unlock();
    /// ```
    #[cfg(not(feature = "loom"))]
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicI32::new(Self::UNLOCKED),
            _config: PhantomData,
        }
    }

    /// Creates a new unlocked [`SpinLock`].
    #[cfg(feature = "loom")]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicI32::new(Self::UNLOCKED),
            _config: PhantomData,
        }
    }

    /// Returns `true` if the lock is currently held.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::SpinLock;
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// let lock: SpinLock = SpinLock::new();
    /// assert!(!lock.is_locked(Relaxed));
    ///
    /// lock.lock();
    /// assert!(lock.is_locked(Relaxed));
    /// ```
    #[inline]
    pub fn is_locked(&self, mo: Ordering) -> bool {
        self.state.load(mo) != Self::UNLOCKED
    }

    /// Acquires the lock, spinning and then sleeping until it becomes available.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::SpinLock;
    ///
    /// let lock: SpinLock = SpinLock::new();
    ///
    /// lock.lock();
    /// assert!(!lock.try_lock());
    /// ```
    #[inline]
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }
        self.lock_contended();
    }

    /// Tries to acquire the lock without waiting.
    ///
    /// Returns `false` if the lock was held.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::SpinLock;
    ///
    /// let lock: SpinLock = SpinLock::new();
    ///
    /// assert!(lock.try_lock());
    /// assert!(!lock.try_lock());
    /// ```
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(Self::UNLOCKED, Self::LOCKED, Acquire, Relaxed)
            .is_ok()
    }

    /// Releases the lock.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::SpinLock;
    ///
    /// let lock: SpinLock = SpinLock::new();
    ///
    /// lock.lock();
    /// lock.unlock();
    /// assert!(lock.try_lock());
    /// ```
    ///
    /// ```should_panic
    /// use spinshard::SpinLock;
    ///
    /// let lock: SpinLock = SpinLock::new();
    /// lock.unlock();
    /// ```
    #[inline]
    #[track_caller]
    pub fn unlock(&self) {
        if let Err(misuse) = self.release() {
            fault(Site::standalone("SpinLock::unlock"), misuse);
        }
    }

    /// Spins until the lock is acquired.
    #[cold]
    fn lock_contended(&self) {
        let mut backoff = Backoff::<C>::new();
        loop {
            // Read before retrying the CAS so waiters do not keep the line in exclusive state.
            if self.state.load(Relaxed) == Self::UNLOCKED && self.try_lock() {
                return;
            }
            backoff.snooze();
        }
    }

    /// Releases the lock, reporting a misuse instead of panicking.
    fn release(&self) -> Result<(), Misuse> {
        self.state
            .compare_exchange(Self::LOCKED, Self::UNLOCKED, Release, Relaxed)
            .map(|_| ())
            .map_err(|_| Misuse::UnlockOfUnlocked)
    }
}

impl<C: Config> Default for SpinLock<C> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> fmt::Debug for SpinLock<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load(Relaxed);
        f.debug_struct("SpinLock")
            .field("state", &state)
            .field("locked", &(state != Self::UNLOCKED))
            .finish()
    }
}

impl<C: Config> sealed::Sealed for SpinLock<C> {}

impl<C: Config> ShardLock for SpinLock<C> {
    #[inline]
    fn lock(&self) {
        SpinLock::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        SpinLock::try_lock(self)
    }

    #[inline]
    fn release(&self) -> Result<(), Misuse> {
        SpinLock::release(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        SpinLock::is_locked(self, Relaxed)
    }
}
