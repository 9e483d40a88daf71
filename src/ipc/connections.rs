//! Concurrent connection limit.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of connection slots.
pub struct ConnectionPool {
    slots: Arc<Semaphore>,
    max: usize,
}

/// Slot held for the lifetime of one connection; released on drop.
pub struct OwnedConnectionGuard {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
    pub fn new(max: usize) -> Self {
        Self { slots: Arc::new(Semaphore::new(max)), max }
    }

    /// Take a slot without waiting; `None` when the pool is full.
    pub fn try_acquire_owned(&self) -> Option<OwnedConnectionGuard> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| OwnedConnectionGuard { _permit: permit })
    }

    pub fn active(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_limits_and_releases() {
        let pool = ConnectionPool::new(2);
        let a = pool.try_acquire_owned().unwrap();
        let _b = pool.try_acquire_owned().unwrap();
        assert!(pool.try_acquire_owned().is_none());
        assert_eq!(pool.active(), 2);

        drop(a);
        assert_eq!(pool.active(), 1);
        assert!(pool.try_acquire_owned().is_some());
    }
}
