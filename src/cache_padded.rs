//! [`CachePadded`] keeps a value on its own cache line.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Pads and aligns a value to the length of a cache line.
///
/// Adjacent `CachePadded` values in an array never share a cache line, so writes to one lock word
/// do not invalidate the line holding its neighbour.
///
/// x86_64, aarch64 and powerpc64 prefetch cache lines in pairs, so those targets use 128 bytes;
/// everything else uses 64.
///
/// # Examples
///
/// ```
/// use spinshard::{CachePadded, SpinLock};
///
/// let shards: Vec<CachePadded<SpinLock>> = (0..4).map(|_| CachePadded::default()).collect();
/// let a = &*shards[0] as *const SpinLock as usize;
/// let b = &*shards[1] as *const SpinLock as usize;
/// assert!(b - a >= CachePadded::<SpinLock>::LINE_SIZE);
/// ```
#[cfg_attr(
    any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64"
    ),
    repr(align(128))
)]
#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64"
    )),
    repr(align(64))
)]
#[derive(Default)]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    /// Cache line length assumed for the target.
    pub const LINE_SIZE: usize = align_of::<Self>();

    /// Pads and aligns `value`.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Returns the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout() {
        let line = CachePadded::<u8>::LINE_SIZE;
        assert!(line == 64 || line == 128);
        assert_eq!(size_of::<CachePadded<u8>>(), line);
        assert_eq!(size_of::<CachePadded<i32>>(), line);
        assert_eq!(size_of::<CachePadded<[u8; 129]>>() % line, 0);
    }

    #[test]
    fn adjacent_values_do_not_share_a_line() {
        let values = [CachePadded::new(1_i32), CachePadded::new(2_i32)];
        let first = &*values[0] as *const i32 as usize;
        let second = &*values[1] as *const i32 as usize;
        assert_eq!(first % CachePadded::<i32>::LINE_SIZE, 0);
        assert_eq!(second - first, CachePadded::<i32>::LINE_SIZE);

        let [_, last] = values;
        assert_eq!(last.into_inner(), 2);
    }
}
