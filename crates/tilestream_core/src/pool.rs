//! Reusable buffers for the per-layer tile lists built during collection.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Pool of cleared `Vec<T>` buffers.
///
/// At most `retain` buffers are kept; extra buffers are dropped on release.
#[derive(Debug)]
pub struct BufferPool<T> {
    free: Mutex<Vec<Vec<T>>>,
    retain: usize,
    created: AtomicU64,
    reused: AtomicU64,
}

/// Snapshot of [`BufferPool`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub available: usize,
}

impl<T> BufferPool<T> {
    pub fn new(retain: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            retain,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Take an empty buffer with room for at least `capacity` items.
    pub fn acquire(&self, capacity: usize) -> Vec<T> {
        let reused = self.free.lock().pop();
        match reused {
            Some(mut buffer) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buffer.reserve(capacity);
                buffer
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(capacity)
            }
        }
    }

    /// Return a buffer to the pool. Its contents are dropped.
    pub fn release(&self, mut buffer: Vec<T>) {
        buffer.clear();
        if buffer.capacity() == 0 {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.retain {
            free.push(buffer);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            available: self.free.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_reused() {
        let pool = BufferPool::<u32>::new(4);
        let mut buffer = pool.acquire(8);
        buffer.extend([1, 2, 3]);
        pool.release(buffer);

        let again = pool.acquire(2);
        assert!(again.is_empty());
        assert!(again.capacity() >= 8);
        assert_eq!(
            pool.stats(),
            PoolStats {
                created: 1,
                reused: 1,
                available: 0
            }
        );
    }

    #[test]
    fn test_retain_limit() {
        let pool = BufferPool::<u8>::new(1);
        pool.release(Vec::with_capacity(4));
        pool.release(Vec::with_capacity(4));
        assert_eq!(pool.stats().available, 1);
    }
}
