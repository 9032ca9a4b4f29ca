//! Integer key mixing and shard routing.
//!
//! Shard routing is not stable across versions of this crate: shard indices must not be
//! persisted or compared between builds.

/// Mixes a 64-bit key so that every input bit affects every output bit.
///
/// Keys that differ only in their low bits, such as sequential identifiers or multiples of a
/// power of two, end up far apart after mixing.
///
/// # Examples
///
/// ```
/// use spinshard::mix;
///
/// assert_eq!(mix(0), 0);
/// assert_ne!(mix(1) & 63, mix(2) & 63);
/// ```
#[inline]
#[must_use]
pub const fn mix(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^ (x >> 33)
}

/// Returns the shard index of `key` among `shard_count` shards.
///
/// Power-of-two shard counts are indexed by masking, other counts by the remainder.
///
/// # Panics
///
/// Panics if `shard_count` is zero.
///
/// # Examples
///
/// ```
/// use spinshard::{ShardedLock, SpinLock, shard_for};
///
/// let lock: ShardedLock<SpinLock> = ShardedLock::new(16);
/// assert_eq!(shard_for(-7_i64, 16), lock.shard_index(-7_i64));
/// assert!(shard_for(12345_u32, 10) < 10);
/// ```
#[inline]
#[must_use]
#[track_caller]
#[allow(clippy::cast_possible_truncation)]
pub fn shard_for<K: ShardKey>(key: K, shard_count: usize) -> usize {
    assert_ne!(shard_count, 0, "shard_for: shard count must be positive");
    let hash = mix(key.key_bits());
    if shard_count.is_power_of_two() {
        index_by_mask(hash, shard_count - 1)
    } else {
        // The remainder is below `shard_count`, so it fits in `usize`.
        (hash % shard_count as u64) as usize
    }
}

/// Masks a mixed hash into a shard index.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn index_by_mask(hash: u64, mask: usize) -> usize {
    (hash as usize) & mask
}

/// Derives a key from the decimal representation of `data` using 32-bit FNV-1a.
///
/// This is useful when keys have to match those computed by other systems from the textual form
/// of an identifier.
///
/// # Examples
///
/// ```
/// use spinshard::key_from_decimal;
///
/// assert_eq!(key_from_decimal(0), 0x350c_a8af);
/// assert_ne!(key_from_decimal(-1), key_from_decimal(1));
/// ```
#[must_use]
pub fn key_from_decimal(data: i64) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    data.to_string()
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(PRIME)
        })
}

/// Primitive integer types usable as shard keys.
///
/// Signed keys are sign-extended, so `-1_i8`, `-1_i64` and `-1_i128` select the same shard. 128-bit
/// keys that fit in 64 bits map like their 64-bit form; wider ones are folded into 64 bits.
pub trait ShardKey: Copy {
    /// Returns the raw 64-bit representation of the key fed into [`mix`].
    fn key_bits(self) -> u64;
}

macro_rules! shard_key_widening {
    ($($int:ty),*) => {
        $(
            impl ShardKey for $int {
                #[inline]
                #[allow(clippy::cast_sign_loss, clippy::cast_lossless)]
                fn key_bits(self) -> u64 {
                    self as i64 as u64
                }
            }
        )*
    };
}

macro_rules! shard_key_unsigned {
    ($($int:ty),*) => {
        $(
            impl ShardKey for $int {
                #[inline]
                #[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
                fn key_bits(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

shard_key_widening!(i8, i16, i32, i64, isize);
shard_key_unsigned!(u8, u16, u32, u64, usize);

impl ShardKey for i128 {
    #[inline]
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    fn key_bits(self) -> u64 {
        let lo = self as u64;
        let hi = (self >> 64) as u64;
        // `hi` equals the sign extension of `lo` whenever the key fits in `i64`.
        lo ^ hi ^ ((lo as i64 >> 63) as u64)
    }
}

impl ShardKey for u128 {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn key_bits(self) -> u64 {
        (self as u64) ^ ((self >> 64) as u64)
    }
}
