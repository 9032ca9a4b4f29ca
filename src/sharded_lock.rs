//! [`ShardedLock`] spreads lock contention over independent, cache-padded shards.

#![deny(unsafe_code)]

use std::fmt;
use std::num::NonZeroUsize;
use std::thread;

use crate::cache_padded::CachePadded;
use crate::misuse::{Misuse, Site, fault};
use crate::mix::{ShardKey, index_by_mask, mix};
use crate::spin_lock::SpinLock;

pub(crate) mod sealed {
    /// Prevents [`ShardLock`](super::ShardLock) from being implemented outside of this crate.
    pub trait Sealed {}
}

/// Locks that can serve as shards of a [`ShardedLock`].
///
/// This trait is sealed; it is implemented by [`SpinLock`] and
/// [`RwSpinLock`](crate::RwSpinLock).
pub trait ShardLock: sealed::Sealed + Default {
    /// Acquires exclusive access.
    fn lock(&self);

    /// Tries to acquire exclusive access without waiting.
    fn try_lock(&self) -> bool;

    /// Releases exclusive access, returning the detected misuse instead of panicking.
    #[doc(hidden)]
    fn release(&self) -> Result<(), Misuse>;

    /// Returns `true` if the lock is held in any mode.
    fn is_locked(&self) -> bool;
}

/// Shard locks that additionally support shared access.
pub trait SharedShardLock: ShardLock {
    /// Acquires shared access.
    fn read_lock(&self);

    /// Tries to acquire shared access without waiting.
    fn try_read_lock(&self) -> bool;

    /// Releases shared access, returning the detected misuse instead of panicking.
    #[doc(hidden)]
    fn release_shared(&self) -> Result<(), Misuse>;
}

/// [`ShardedLock`] spreads lock contention over independent, cache-padded shards.
///
/// Each key is mixed and routed to one of a fixed, power-of-two number of shards, and the
/// operation is delegated to that shard. Keys routed to different shards never contend; keys
/// routed to the same shard exclude each other exactly as the shard lock does.
///
/// Shard routing is an implementation detail and may change between versions.
///
/// # Examples
///
/// ```
/// use spinshard::{RwSpinLock, ShardedLock, SpinLock};
///
/// let accounts: ShardedLock<SpinLock> = ShardedLock::new(64);
/// accounts.lock(42_u64);
/// accounts.unlock(42_u64);
///
/// let records: ShardedLock<RwSpinLock> = ShardedLock::new(16);
/// records.read_lock(-3_i32);
/// records.read_lock(-3_i32);
/// assert!(!records.try_lock(-3_i32));
/// records.read_unlock(-3_i32);
/// records.read_unlock(-3_i32);
/// ```
pub struct ShardedLock<L: ShardLock = SpinLock> {
    /// Shard locks, each on its own cache line.
    shards: Box<[CachePadded<L>]>,
    /// `shards.len() - 1`.
    mask: usize,
}

impl<L: ShardLock> ShardedLock<L> {
    /// Creates a [`ShardedLock`] with `shard_count` unlocked shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is zero or not a power of two.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::{ShardedLock, SpinLock};
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(8);
    /// assert_eq!(lock.shard_count(), 8);
    /// ```
    ///
    /// ```should_panic
    /// use spinshard::{ShardedLock, SpinLock};
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(10);
    /// ```
    #[must_use]
    #[track_caller]
    pub fn new(shard_count: usize) -> Self {
        assert!(
            shard_count.is_power_of_two(),
            "ShardedLock::new: shard count must be a positive power of two, got {shard_count}"
        );
        let shards = (0..shard_count)
            .map(|_| CachePadded::new(L::default()))
            .collect();
        Self {
            shards,
            mask: shard_count - 1,
        }
    }

    /// Returns the number of shards.
    #[inline]
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the index of the shard `key` is routed to.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::{ShardedLock, SpinLock};
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(4);
    /// assert!(lock.shard_index(u64::MAX) < 4);
    /// assert_eq!(lock.shard_index(7_u8), lock.shard_index(7_i64));
    /// ```
    #[inline]
    pub fn shard_index<K: ShardKey>(&self, key: K) -> usize {
        index_by_mask(mix(key.key_bits()), self.mask)
    }

    /// Returns the shard lock `key` is routed to.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::{ShardedLock, SpinLock};
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(4);
    /// lock.lock(9_u32);
    /// assert!(lock.shard(9_u32).is_locked(Relaxed));
    /// lock.unlock(9_u32);
    /// ```
    #[inline]
    pub fn shard<K: ShardKey>(&self, key: K) -> &L {
        &self.shards[self.shard_index(key)]
    }

    /// Returns `true` if the shard `key` is routed to is held in any mode.
    #[inline]
    pub fn is_locked<K: ShardKey>(&self, key: K) -> bool {
        self.shard(key).is_locked()
    }

    /// Acquires exclusive access to the shard `key` is routed to.
    #[inline]
    pub fn lock<K: ShardKey>(&self, key: K) {
        self.shard(key).lock();
    }

    /// Tries to acquire exclusive access to the shard `key` is routed to without waiting.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::{ShardedLock, SpinLock};
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(16);
    /// assert!(lock.try_lock(1_i32));
    /// assert!(!lock.try_lock(1_i32));
    /// lock.unlock(1_i32);
    /// ```
    #[inline]
    pub fn try_lock<K: ShardKey>(&self, key: K) -> bool {
        self.shard(key).try_lock()
    }

    /// Releases exclusive access to the shard `key` is routed to.
    ///
    /// # Panics
    ///
    /// Panics if the shard is not held; the message names the shard.
    ///
    /// # Examples
    ///
    /// ```should_panic
    /// use spinshard::{ShardedLock, SpinLock};
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(16);
    /// lock.unlock(1_i32);
    /// ```
    #[inline]
    #[track_caller]
    pub fn unlock<K: ShardKey>(&self, key: K) {
        let index = self.shard_index(key);
        if let Err(misuse) = self.shards[index].release() {
            fault(
                Site::shard("ShardedLock::unlock", index, self.shard_count()),
                misuse,
            );
        }
    }

    /// Acquires exclusive access to every shard, in ascending shard order.
    ///
    /// Acquiring in a fixed order keeps concurrent `lock_all` callers from deadlocking with each
    /// other. Holding a single shard while calling this method deadlocks.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::{ShardedLock, SpinLock};
    ///
    /// let lock: ShardedLock<SpinLock> = ShardedLock::new(4);
    /// lock.lock_all();
    /// assert!(!lock.try_lock(12_u16));
    /// lock.unlock_all();
    /// assert!(lock.try_lock(12_u16));
    /// ```
    pub fn lock_all(&self) {
        for shard in self.shards.iter() {
            shard.lock();
        }
    }

    /// Releases exclusive access to every shard, in descending shard order.
    ///
    /// # Panics
    ///
    /// Panics on the first shard that is not held; shards above it have already been released.
    #[track_caller]
    pub fn unlock_all(&self) {
        for (index, shard) in self.shards.iter().enumerate().rev() {
            if let Err(misuse) = shard.release() {
                fault(
                    Site::shard("ShardedLock::unlock_all", index, self.shard_count()),
                    misuse,
                );
            }
        }
    }
}

impl<L: SharedShardLock> ShardedLock<L> {
    /// Acquires shared access to the shard `key` is routed to.
    #[inline]
    pub fn read_lock<K: ShardKey>(&self, key: K) {
        self.shard(key).read_lock();
    }

    /// Tries to acquire shared access to the shard `key` is routed to without waiting.
    ///
    /// # Examples
    ///
    /// ```
    /// use spinshard::{RwSpinLock, ShardedLock};
    ///
    /// let lock: ShardedLock<RwSpinLock> = ShardedLock::new(16);
    /// lock.lock(5_u8);
    /// assert!(!lock.try_read_lock(5_u8));
    /// lock.unlock(5_u8);
    /// assert!(lock.try_read_lock(5_u8));
    /// ```
    #[inline]
    pub fn try_read_lock<K: ShardKey>(&self, key: K) -> bool {
        self.shard(key).try_read_lock()
    }

    /// Releases shared access to the shard `key` is routed to.
    ///
    /// # Panics
    ///
    /// Panics if the shard is not held, or if it is held by a writer; the message names the
    /// shard.
    #[inline]
    #[track_caller]
    pub fn read_unlock<K: ShardKey>(&self, key: K) {
        let index = self.shard_index(key);
        if let Err(misuse) = self.shards[index].release_shared() {
            fault(
                Site::shard("ShardedLock::read_unlock", index, self.shard_count()),
                misuse,
            );
        }
    }
}

impl<L: ShardLock> Default for ShardedLock<L> {
    /// Creates a [`ShardedLock`] with four shards per available hardware thread, rounded up to a
    /// power of two.
    fn default() -> Self {
        let parallelism = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::new((parallelism * 4).next_power_of_two())
    }
}

impl<L: ShardLock> fmt::Debug for ShardedLock<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held_shards = self.shards.iter().filter(|shard| shard.is_locked()).count();
        f.debug_struct("ShardedLock")
            .field("shard_count", &self.shard_count())
            .field("held_shards", &held_shards)
            .finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod test {
    use super::*;
    use crate::RwSpinLock;

    #[test]
    fn construct_then_lock_any_key() {
        let lock: ShardedLock<SpinLock> = ShardedLock::new(64);
        for key in [i64::MIN, -1, 0, 1, 63, 64, i64::MAX] {
            lock.lock(key);
            lock.unlock(key);
        }
        lock.lock(u128::MAX);
        lock.unlock(u128::MAX);
        assert!(!format!("{lock:?}").is_empty());
    }

    #[test]
    fn single_shard() {
        let lock: ShardedLock<SpinLock> = ShardedLock::new(1);
        lock.lock(1_u32);
        assert!(!lock.try_lock(2_u32));
        lock.unlock(1_u32);
    }

    #[test]
    fn default_shard_count_is_power_of_two() {
        let lock: ShardedLock<RwSpinLock> = ShardedLock::default();
        assert!(lock.shard_count().is_power_of_two());
        assert!(lock.shard_count() >= 4);
    }

    #[test]
    #[should_panic(expected = "shard count must be a positive power of two, got 0")]
    fn zero_shards() {
        let _lock: ShardedLock<SpinLock> = ShardedLock::new(0);
    }

    #[test]
    #[should_panic(expected = "got 100")]
    fn non_power_of_two_shards() {
        let _lock: ShardedLock<SpinLock> = ShardedLock::new(100);
    }

    #[test]
    fn unlock_names_the_shard() {
        let lock: ShardedLock<SpinLock> = ShardedLock::new(8);
        let index = lock.shard_index(77_u64);
        let message = std::panic::catch_unwind(|| lock.unlock(77_u64))
            .unwrap_err()
            .downcast::<String>()
            .unwrap();
        assert_eq!(
            *message,
            format!("ShardedLock::unlock (shard {index} of 8): unlock of an unlocked lock")
        );
    }

    #[test]
    #[should_panic(expected = "read unlock of a write-locked lock")]
    fn read_unlock_of_write_locked_shard() {
        let lock: ShardedLock<RwSpinLock> = ShardedLock::new(8);
        lock.lock(3_i8);
        lock.read_unlock(3_i8);
    }

    #[test]
    #[should_panic(expected = "ShardedLock::unlock_all")]
    fn unlock_all_without_lock_all() {
        let lock: ShardedLock<SpinLock> = ShardedLock::new(2);
        lock.unlock_all();
    }

    #[test]
    fn debug_counts_held_shards() {
        let lock: ShardedLock<RwSpinLock> = ShardedLock::new(4);
        lock.lock_all();
        assert_eq!(
            format!("{lock:?}"),
            "ShardedLock { shard_count: 4, held_shards: 4 }"
        );
        lock.unlock_all();
        lock.read_lock(0_u8);
        assert_eq!(
            format!("{lock:?}"),
            "ShardedLock { shard_count: 4, held_shards: 1 }"
        );
        lock.read_unlock(0_u8);
    }
}
