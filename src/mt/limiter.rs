//! Concurrency limiter for outbound translation calls
//!
//! A thin wrapper over [`tokio::sync::Semaphore`], which is fair: waiters are
//! served strictly in the order they started waiting. Permits are released
//! when dropped, so a holder gives its slot back on every exit path.

use crate::mt::error::{MtError, MtResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting semaphore bounding simultaneous backend calls
///
/// Cloning is cheap and clones share the same capacity.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot; dropping it releases the slot to the next waiter
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl LimiterPermit {
    /// Release the slot explicitly
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots (0 is treated as 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot
    ///
    /// Suspends the calling task without blocking others. Waiters queue
    /// without bound and are served first-in-first-out.
    pub async fn acquire(&self) -> MtResult<LimiterPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MtError::Other(format!("Concurrency limiter closed: {}", e)))?;
        Ok(LimiterPermit { _permit: permit })
    }

    /// Run `task` while holding a slot
    ///
    /// The slot is released when `task` finishes, fails or is dropped.
    pub async fn run<F, T>(&self, task: F) -> MtResult<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(task.await)
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_is_one() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = ConcurrencyLimiter::new(2);
        let first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.available(), 0);

        first.release();
        assert_eq!(limiter.available(), 1);
        drop(second);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let limiter = ConcurrencyLimiter::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..12).map(|_| {
            let limiter = limiter.clone();
            let current = current.clone();
            let peak = peak.clone();
            async move {
                limiter
                    .run(async {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            }
        });
        join_all(tasks).await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn test_waiters_served_fifo() {
        let limiter = ConcurrencyLimiter::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = limiter.acquire().await.unwrap();

        let waiters = join_all((0..5).map(|i| {
            let limiter = limiter.clone();
            let order = order.clone();
            async move {
                let _permit = limiter.acquire().await.unwrap();
                order.lock().unwrap().push(i);
                tokio::task::yield_now().await;
            }
        }));
        let opener = async move {
            tokio::task::yield_now().await;
            drop(gate);
        };
        tokio::join!(waiters, opener);

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_run_releases_on_failure() {
        let limiter = ConcurrencyLimiter::new(1);
        let result: MtResult<Result<(), MtError>> = limiter
            .run(async { Err(MtError::Other("boom".to_string())) })
            .await;
        assert!(result.unwrap().is_err());
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_run_releases_when_dropped() {
        let limiter = ConcurrencyLimiter::new(1);
        let pending = limiter.run(tokio::time::sleep(Duration::from_secs(60)));
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(limiter.available(), 1);
    }
}
