//! [`Misuse`] describes lock-protocol violations detected at run time.
//!
//! A misuse means the caller broke the lock/unlock pairing, so the protected data may already be
//! exposed to a data race. None of these are recoverable: every detection site panics through
//! [`fault`].

use std::fmt;

/// Lock-protocol violations detected by the spin-wait primitives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Misuse {
    /// An exclusive release was attempted on a lock that was not held.
    UnlockOfUnlocked,
    /// A shared release was attempted on a lock that was not held.
    ReadUnlockOfUnlocked,
    /// A shared release was attempted on a lock held by a writer.
    ReadUnlockOfWriteLocked,
}

impl fmt::Display for Misuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misuse::UnlockOfUnlocked => f.write_str("unlock of an unlocked lock"),
            Misuse::ReadUnlockOfUnlocked => f.write_str("read unlock of an unlocked lock"),
            Misuse::ReadUnlockOfWriteLocked => f.write_str("read unlock of a write-locked lock"),
        }
    }
}

/// Where a [`Misuse`] was detected.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Site {
    /// Type and method, e.g. `SpinLock::unlock`.
    pub(crate) operation: &'static str,
    /// Shard index and shard count when the lock is part of a sharded lock.
    pub(crate) shard: Option<(usize, usize)>,
}

impl Site {
    /// A standalone lock.
    #[inline]
    pub(crate) const fn standalone(operation: &'static str) -> Self {
        Self {
            operation,
            shard: None,
        }
    }

    /// A shard of a sharded lock.
    #[inline]
    pub(crate) const fn shard(operation: &'static str, index: usize, count: usize) -> Self {
        Self {
            operation,
            shard: Some((index, count)),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation)?;
        if let Some((index, count)) = self.shard {
            write!(f, " (shard {index} of {count})")?;
        }
        Ok(())
    }
}

/// Aborts the current operation with a fatal lock-protocol fault.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn fault(site: Site, misuse: Misuse) -> ! {
    panic!("{site}: {misuse}")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn site_display() {
        assert_eq!(
            Site::standalone("SpinLock::unlock").to_string(),
            "SpinLock::unlock"
        );
        assert_eq!(
            Site::shard("ShardedLock::unlock", 3, 64).to_string(),
            "ShardedLock::unlock (shard 3 of 64)"
        );
    }

    #[test]
    #[should_panic(expected = "RwSpinLock::read_unlock: read unlock of a write-locked lock")]
    fn fault_message() {
        fault(
            Site::standalone("RwSpinLock::read_unlock"),
            Misuse::ReadUnlockOfWriteLocked,
        );
    }
}
