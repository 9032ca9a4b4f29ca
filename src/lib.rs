#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![doc = include_str!("../README.md")]

pub mod cache_padded;
pub use cache_padded::CachePadded;

pub mod config;
pub use config::{Config, DefaultConfig};

pub mod misuse;
pub use misuse::Misuse;

pub mod mix;
pub use mix::{ShardKey, key_from_decimal, mix, shard_for};

pub mod rw_spin_lock;
pub use rw_spin_lock::RwSpinLock;

pub mod sharded_lock;
pub use sharded_lock::{ShardLock, ShardedLock, SharedShardLock};

pub mod spin_lock;
pub use spin_lock::SpinLock;

#[cfg(all(feature = "lock_api", not(feature = "loom")))]
mod lock_api;
#[cfg(all(feature = "lock_api", not(feature = "loom")))]
pub use self::lock_api::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
