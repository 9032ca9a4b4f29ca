//! [`RwSpinLock`] is a single-word spin-wait reader-writer lock.

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
use crate::sharded_lock::{ShardLock, SharedShardLock, sealed};

/// [`RwSpinLock`] is a single-word spin-wait reader-writer lock.
///
/// Bit 0 of the state is the writer flag and the remaining bits count readers, so a writer and
/// readers can never be recorded at the same time. There is no preference between readers and
/// writers: a writer may wait indefinitely under a continuous stream of readers.
///
/// Like [`SpinLock`](crate::SpinLock), only low-level acquire and release methods are provided.
pub struct RwSpinLock<C: Config = DefaultConfig> {
    /// Writer flag in bit 0, reader count in the upper bits.
    state: AtomicI32,
    _config: PhantomData<fn() -> C>,
}

impl<C: Config> RwSpinLock<C> {
    /// Maximum number of concurrent readers.
    #[allow(clippy::cast_sign_loss)]
    pub const MAX_READERS: usize = (i32::MAX / Self::READER) as usize;

    /// State value of a free lock.
    const UNLOCKED: i32 = 0;

    /// Writer flag.
    const WRITER: i32 = 1;

    /// Amount one reader adds to the state.
    const READER: i32 = 2;

    /// Creates a new unlocked [`RwSpinLock`].
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// static LOCK: RwSpinLock = RwSpinLock::new();
    ///
    /// LOCK.read_lock();
    /// LOCK.read_unlock();
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

    /// Creates a new unlocked [`RwSpinLock`].
    #[cfg(feature = "loom")]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicI32::new(Self::UNLOCKED),
            _config: PhantomData,
        }
    }

    /// Returns `true` if a writer currently holds the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    /// assert!(!lock.is_locked(Relaxed));
    ///
    /// lock.lock();
    /// assert!(lock.is_locked(Relaxed));
    /// assert!(!lock.is_shared(Relaxed));
    /// ```
    #[inline]
    pub fn is_locked(&self, mo: Ordering) -> bool {
        self.state.load(mo) & Self::WRITER == Self::WRITER
    }

    /// Returns `true` if readers currently hold the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.read_lock();
    /// assert!(lock.is_shared(Relaxed));
    /// assert!(!lock.is_locked(Relaxed));
    /// ```
    #[inline]
    pub fn is_shared(&self, mo: Ordering) -> bool {
        self.state.load(mo) >= Self::READER
    }

    /// Returns the number of readers currently holding the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.read_lock();
    /// lock.read_lock();
    /// assert_eq!(lock.readers(Relaxed), 2);
    /// ```
    #[inline]
    pub fn readers(&self, mo: Ordering) -> usize {
        Self::reader_count(self.state.load(mo))
    }

    /// Acquires exclusive write access, spinning and then sleeping until it becomes available.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.lock();
    /// assert!(!lock.try_read_lock());
    /// assert!(!lock.try_lock());
    /// ```
    #[inline]
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }
        let mut backoff = Backoff::<C>::new();
        loop {
            if self.state.load(Relaxed) == Self::UNLOCKED && self.try_lock() {
                return;
            }
            backoff.snooze();
        }
    }

    /// Tries to acquire exclusive write access without waiting.
    ///
    /// Returns `false` if a writer or any reader holds the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.read_lock();
    /// assert!(!lock.try_lock());
    /// lock.read_unlock();
    /// assert!(lock.try_lock());
    /// ```
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(Self::UNLOCKED, Self::WRITER, Acquire, Relaxed)
            .is_ok()
    }

    /// Acquires shared read access, spinning and then sleeping while a writer holds the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.read_lock();
    /// lock.read_lock();
    /// assert!(!lock.try_lock());
    /// ```
    #[inline]
    pub fn read_lock(&self) {
        if self.try_read_lock() {
            return;
        }
        let mut backoff = Backoff::<C>::new();
        loop {
            backoff.snooze();
            let state = self.state.load(Relaxed);
            if Self::can_share(state)
                && self
                    .state
                    .compare_exchange(state, state + Self::READER, Acquire, Relaxed)
                    .is_ok()
            {
                return;
            }
        }
    }

    /// Tries to acquire shared read access without waiting.
    ///
    /// Returns `false` if a writer holds the lock or the number of readers has reached
    /// [`Self::MAX_READERS`].
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// assert!(lock.try_read_lock());
    /// assert!(lock.try_read_lock());
    /// assert!(!lock.try_lock());
    /// ```
    #[inline]
    pub fn try_read_lock(&self) -> bool {
        let mut state = self.state.load(Relaxed);
        while Self::can_share(state) {
            match self
                .state
                .compare_exchange(state, state + Self::READER, Acquire, Relaxed)
            {
                Ok(_) => return true,
                Err(new_state) => state = new_state,
            }
        }
        false
    }

    /// Releases write access.
    ///
    /// If no writer holds the lock but readers do, one reader is released instead.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held at all.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.lock();
    /// lock.unlock();
    /// assert!(lock.try_read_lock());
    /// ```
    ///
    /// ```should_panic
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    /// lock.unlock();
    /// ```
    #[inline]
    #[track_caller]
    pub fn unlock(&self) {
        if let Err(misuse) = self.release() {
            fault(Site::standalone("RwSpinLock::unlock"), misuse);
        }
    }

    /// Releases read access.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held, or if it is held by a writer.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    ///
    /// lock.read_lock();
    /// lock.read_lock();
    /// lock.read_unlock();
    /// assert!(!lock.try_lock());
    /// lock.read_unlock();
    /// assert!(lock.try_lock());
    /// ```
    ///
    /// ```should_panic
    /// use spinshard::RwSpinLock;
    ///
    /// let lock: RwSpinLock = RwSpinLock::new();
    /// lock.lock();
    /// lock.read_unlock();
    /// ```
    #[inline]
    #[track_caller]
    pub fn read_unlock(&self) {
        if let Err(misuse) = self.release_shared() {
            fault(Site::standalone("RwSpinLock::read_unlock"), misuse);
        }
    }

    /// Returns `true` if a reader can be added to `state`.
    #[inline]
    const fn can_share(state: i32) -> bool {
        state & Self::WRITER == 0 && state < i32::MAX - Self::READER
    }

    /// Extracts the reader count from `state`.
    #[inline]
    #[allow(clippy::cast_sign_loss)]
    const fn reader_count(state: i32) -> usize {
        if state & Self::WRITER == Self::WRITER {
            0
        } else {
            (state / Self::READER) as usize
        }
    }

    /// Releases the writer, or one reader if there is no writer.
    fn release(&self) -> Result<(), Misuse> {
        let mut state = self.state.load(Relaxed);
        loop {
            let next_state = if state & Self::WRITER == Self::WRITER {
                Self::UNLOCKED
            } else if state >= Self::READER {
                state - Self::READER
            } else {
                return Err(Misuse::UnlockOfUnlocked);
            };
            match self
                .state
                .compare_exchange(state, next_state, Release, Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(new_state) => state = new_state,
            }
        }
    }

    /// Releases one reader.
    fn release_shared(&self) -> Result<(), Misuse> {
        let mut state = self.state.load(Relaxed);
        loop {
            if state & Self::WRITER == Self::WRITER {
                return Err(Misuse::ReadUnlockOfWriteLocked);
            }
            if state < Self::READER {
                return Err(Misuse::ReadUnlockOfUnlocked);
            }
            match self
                .state
                .compare_exchange(state, state - Self::READER, Release, Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(new_state) => state = new_state,
            }
        }
    }
}

impl<C: Config> Default for RwSpinLock<C> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> fmt::Debug for RwSpinLock<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load(Relaxed);
        f.debug_struct("RwSpinLock")
            .field("state", &state)
            .field("locked", &(state & Self::WRITER == Self::WRITER))
            .field("readers", &Self::reader_count(state))
            .finish()
    }
}

impl<C: Config> sealed::Sealed for RwSpinLock<C> {}

impl<C: Config> ShardLock for RwSpinLock<C> {
    #[inline]
    fn lock(&self) {
        RwSpinLock::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        RwSpinLock::try_lock(self)
    }

    #[inline]
    fn release(&self) -> Result<(), Misuse> {
        RwSpinLock::release(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.state.load(Relaxed) != Self::UNLOCKED
    }
}

impl<C: Config> SharedShardLock for RwSpinLock<C> {
    #[inline]
    fn read_lock(&self) {
        RwSpinLock::read_lock(self);
    }

    #[inline]
    fn try_read_lock(&self) -> bool {
        RwSpinLock::try_read_lock(self)
    }

    #[inline]
    fn release_shared(&self) -> Result<(), Misuse> {
        RwSpinLock::release_shared(self)
    }
}
