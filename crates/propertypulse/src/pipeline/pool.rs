use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::info;
use thiserror::Error;
use tokio::sync::Semaphore;

/// The pool was shut down while a call was waiting for a slot.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Worker pool is shut down")]
pub struct PoolClosed;

/// Global bound on in-flight adapter calls, shared by every job.
///
/// Waiters are served in FIFO order. Callers hold a slot for one attempt
/// only, never across a retry backoff.
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Keeps the in-flight counter honest even if the guarded future is dropped.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// A pool admitting at most `limit` concurrent calls (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        info!("Worker pool ready with {} slots", limit);
        Self {
            slots: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits for a free slot, then runs `call` while holding it.
    pub async fn run<T, E, F>(&self, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<PoolClosed>,
    {
        let _permit = self.slots.acquire().await.map_err(|_| PoolClosed)?;
        let _guard = InFlight::enter(&self.in_flight, &self.peak);
        call.await
    }

    /// Rejects all waiting and future calls. Calls already running finish.
    pub fn shutdown(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let pool = Arc::new(WorkerPool::new(2));
        let mut tasks = Vec::new();
        for i in 0..6 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                pool.run(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, PoolClosed>(i)
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(pool.peak(), 2);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_calls() {
        let pool = WorkerPool::new(1);
        pool.shutdown();
        let result = pool.run(async { Ok::<_, PoolClosed>(()) }).await;
        assert_eq!(result, Err(PoolClosed));
        assert!(pool.is_closed());
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        assert_eq!(WorkerPool::new(0).limit(), 1);
    }
}
