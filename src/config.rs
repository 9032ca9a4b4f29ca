//! [`Config`] defines the backoff policy shared by the spin-wait primitives.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

#[cfg(not(feature = "loom"))]
use std::thread::{sleep, yield_now};

#[cfg(feature = "loom")]
use loom::thread::yield_now;

/// [`Config`] defines the backoff policy shared by the spin-wait primitives.
///
/// A contended acquisition first yields the processor up to [`Config::spin_count`] times, then
/// sleeps for [`Config::sleep_duration`] and starts spinning again.
///
/// # Examples
///
/// ```
/// use spinshard::{Config, SpinLock};
/// use std::time::Duration;
///
/// #[derive(Debug, Default)]
/// struct Eager;
///
/// impl Config for Eager {
///     fn spin_count() -> usize {
///         1024
///     }
///
///     fn sleep_duration() -> Duration {
///         Duration::from_micros(1)
///     }
/// }
///
/// let lock: SpinLock<Eager> = SpinLock::new();
/// lock.lock();
/// lock.unlock();
/// ```
pub trait Config: fmt::Debug + Default {
    /// Defines the number of times to yield before falling back to sleeping.
    #[inline]
    #[must_use]
    fn spin_count() -> usize {
        100
    }

    /// Defines how long to sleep once the spin budget is exhausted.
    #[inline]
    #[must_use]
    fn sleep_duration() -> Duration {
        Duration::from_micros(10)
    }
}

/// Default configuration for spin-wait primitives.
#[derive(Debug, Default)]
pub struct DefaultConfig;

impl Config for DefaultConfig {}

/// Per-call backoff state.
///
/// Each acquisition attempt owns its own [`Backoff`], so concurrent callers never advance each
/// other's spin count.
#[derive(Debug)]
pub(crate) struct Backoff<C: Config> {
    spins: usize,
    _config: PhantomData<C>,
}

impl<C: Config> Backoff<C> {
    /// Creates a fresh backoff state.
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            spins: 0,
            _config: PhantomData,
        }
    }

    /// Waits once before the next retry.
    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.spins < C::spin_count() {
            self.spins += 1;
            yield_now();
        } else {
            sleep(C::sleep_duration());
            self.spins = 0;
        }
    }
}

/// `loom` cannot model time, so a sleep becomes a yield.
#[cfg(feature = "loom")]
#[inline]
fn sleep(_duration: Duration) {
    yield_now();
}

#[cfg(all(test, not(feature = "loom")))]
mod test {
    use super::*;

    #[derive(Debug, Default)]
    struct Tiny;

    impl Config for Tiny {
        fn spin_count() -> usize {
            2
        }

        fn sleep_duration() -> Duration {
            Duration::from_nanos(1)
        }
    }

    #[test]
    fn backoff_resets_after_sleep() {
        let mut backoff = Backoff::<Tiny>::new();
        backoff.snooze();
        backoff.snooze();
        assert_eq!(backoff.spins, 2);
        backoff.snooze();
        assert_eq!(backoff.spins, 0);
        backoff.snooze();
        assert_eq!(backoff.spins, 1);
    }

    #[test]
    fn default_policy() {
        assert_eq!(DefaultConfig::spin_count(), 100);
        assert_eq!(DefaultConfig::sleep_duration(), Duration::from_micros(10));
    }
}
