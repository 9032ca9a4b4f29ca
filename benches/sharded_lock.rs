use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use spinshard::{ShardedLock, SpinLock, key_from_decimal};

fn lock_unlock(c: &mut Criterion) {
    c.bench_function("sharded-lock-unlock", |b| {
        let lock: ShardedLock<SpinLock> = ShardedLock::new(64);
        let mut key = 0_u64;
        b.iter(|| {
            lock.lock(key);
            lock.unlock(key);
            key = key.wrapping_add(1);
        });
    });
}

/// Many callers sleeping inside short critical sections, spread over shards by key.
fn sleeping_critical_sections(c: &mut Criterion) {
    let mut group = c.benchmark_group("sleeping");
    group.sample_size(10);
    for (name, shard_count) in [("single-shard", 1), ("64-shards", 64)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let lock: Arc<ShardedLock<SpinLock>> = Arc::new(ShardedLock::new(shard_count));
                let threads: Vec<_> = (0..16_i64)
                    .map(|i| {
                        let lock = lock.clone();
                        thread::spawn(move || {
                            for j in 0..10 {
                                let key = key_from_decimal(i * 10 + j);
                                lock.lock(key);
                                thread::sleep(Duration::from_micros(100));
                                lock.unlock(key);
                            }
                        })
                    })
                    .collect();
                for thread in threads {
                    thread.join().unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(sharded_lock, lock_unlock, sleeping_critical_sections);
criterion_main!(sharded_lock);
