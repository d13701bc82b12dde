//! Bounded-concurrency executor, one per courier adapter.
//!
//! Admission is FIFO: `tokio::sync::Semaphore` is fair, so tasks start in
//! the order they first asked for a permit. Completion order is unspecified.
//! There is no timeout and no cancellation; a task that never finishes holds
//! its slot for good.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Limits how many outbound operations one adapter runs at once.
#[derive(Debug)]
pub struct Executor {
    permits: Semaphore,
    concurrency: usize,
    running: AtomicUsize,
    queued: AtomicUsize,
}

impl Executor {
    /// Create an executor admitting at most `concurrency` tasks (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Semaphore::new(concurrency),
            concurrency,
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    /// Run `task` once a slot is free and return its output.
    ///
    /// Failures are just values of `T`; they release the slot like any
    /// other completion and never affect sibling tasks.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let permit = {
            let _waiting = CounterSlot::enter(&self.queued);
            // The semaphore is private and never closed, so acquire cannot fail.
            self.permits.acquire().await.ok()
        };

        let output = {
            let _slot = CounterSlot::enter(&self.running);
            task.await
        };
        drop(permit);
        output
    }

    /// Configured concurrency ceiling.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Tasks currently executing.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

/// Holds one unit of a counter for as long as it lives, so the count stays
/// right even if the `run` future is dropped mid-wait.
struct CounterSlot<'a>(&'a AtomicUsize);

impl<'a> CounterSlot<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{oneshot, Mutex};
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_admits_at_most_n() {
        let executor = Arc::new(Executor::new(2));
        let mut releases = Vec::new();
        let mut handles = Vec::new();

        for _ in 0..3 {
            let (tx, rx) = oneshot::channel::<()>();
            releases.push(tx);
            let exec = Arc::clone(&executor);
            handles.push(tokio::spawn(async move {
                exec.run(async move {
                    let _ = rx.await;
                })
                .await
            }));
        }

        settle().await;
        assert_eq!(executor.running(), 2);
        assert_eq!(executor.queued(), 1);

        releases.remove(0).send(()).unwrap();
        settle().await;
        assert_eq!(executor.running(), 2);
        assert_eq!(executor.queued(), 0);

        for tx in releases {
            let _ = tx.send(());
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(executor.running(), 0);
    }

    #[tokio::test]
    async fn test_fifo_admission() {
        let executor = Arc::new(Executor::new(1));
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for i in 0..5 {
            let exec = Arc::clone(&executor);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                exec.run(async move {
                    order.lock().await.push(i);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                })
                .await
            }));
            // Make sure each task is queued before the next is spawned.
            settle().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failure_releases_slot() {
        let executor = Executor::new(1);
        let failed: Result<(), &str> = executor.run(async { Err("boom") }).await;
        assert!(failed.is_err());
        let ok: Result<u8, &str> = executor.run(async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        assert_eq!(executor.running(), 0);
    }

    #[test]
    fn test_queued_task_waits_for_slot() {
        let executor = Executor::new(1);
        let (tx, rx) = oneshot::channel::<()>();
        let mut first = task::spawn(executor.run(async {
            let _ = rx.await;
            1
        }));
        let mut second = task::spawn(executor.run(async { 2 }));

        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_eq!((executor.running(), executor.queued()), (1, 1));

        tx.send(()).unwrap();
        assert_ready_eq!(first.poll(), 1);
        assert!(second.is_woken());
        assert_ready_eq!(second.poll(), 2);
        assert_eq!((executor.running(), executor.queued()), (0, 0));
    }

    #[test]
    fn test_dropped_waiter_leaves_queue() {
        let executor = Executor::new(1);
        let (tx, rx) = oneshot::channel::<()>();
        let mut holder = task::spawn(executor.run(async {
            let _ = rx.await;
        }));
        assert_pending!(holder.poll());

        let mut waiter = task::spawn(executor.run(async {}));
        assert_pending!(waiter.poll());
        assert_eq!(executor.queued(), 1);

        drop(waiter);
        assert_eq!(executor.queued(), 0);

        tx.send(()).unwrap();
        assert_ready!(holder.poll());
        assert_eq!(executor.running(), 0);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        assert_eq!(Executor::new(0).concurrency(), 1);
    }
}
