use std::sync::Arc;
use std::thread;

use criterion::{Criterion, criterion_group, criterion_main};
use spinshard::{RwSpinLock, SpinLock};

fn lock_unlock(c: &mut Criterion) {
    c.bench_function("spin-lock-unlock", |b| {
        let lock: SpinLock = SpinLock::new();
        b.iter(|| {
            lock.lock();
            lock.unlock();
        });
    });
}

fn read_read_unlock_unlock(c: &mut Criterion) {
    c.bench_function("rw-read-read-unlock-unlock", |b| {
        let lock: RwSpinLock = RwSpinLock::new();
        b.iter(|| {
            lock.read_lock();
            lock.read_lock();
            lock.read_unlock();
            lock.read_unlock();
        });
    });
}

fn contended_lock_unlock(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(10);
    group.bench_function("spin-lock-8-threads", |b| {
        b.iter(|| {
            let lock: Arc<SpinLock> = Arc::new(SpinLock::new());
            let threads: Vec<_> = (0..8)
                .map(|_| {
                    let lock = lock.clone();
                    thread::spawn(move || {
                        for _ in 0..1000 {
                            lock.lock();
                            lock.unlock();
                        }
                    })
                })
                .collect();
            for thread in threads {
                thread.join().unwrap();
            }
        });
    });
    group.finish();
}

criterion_group!(
    spin_lock,
    lock_unlock,
    read_read_unlock_unlock,
    contended_lock_unlock
);
criterion_main!(spin_lock);
