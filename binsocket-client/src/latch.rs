//! Countdown latch for waiting on listener callbacks
//!
//! Listener callbacks run on the connection's dispatch task, so code that
//! drives a connection usually needs to wait until a number of callbacks
//! have happened. [`CountdownLatch`] is a one-shot barrier for that.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug)]
struct Shared {
    count: AtomicUsize,
    zero: Notify,
}

/// Async countdown latch, cloneable across tasks and threads
#[derive(Debug, Clone)]
pub struct CountdownLatch {
    shared: Arc<Shared>,
}

impl CountdownLatch {
    /// Create a latch that opens after `count` calls to [`count_down`](Self::count_down)
    pub fn new(count: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                count: AtomicUsize::new(count),
                zero: Notify::new(),
            }),
        }
    }

    /// Decrement the count, waking every waiter when it reaches zero.
    ///
    /// Extra calls once the count is zero are ignored.
    pub fn count_down(&self) {
        let previous = self
            .shared
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
        if previous == Ok(1) {
            self.shared.zero.notify_waiters();
        }
    }

    /// Remaining count
    pub fn count(&self) -> usize {
        self.shared.count.load(Ordering::Acquire)
    }

    /// Wait until the count reaches zero
    pub async fn wait(&self) {
        loop {
            let zero = self.shared.zero.notified();
            if self.count() == 0 {
                return;
            }
            zero.await;
        }
    }

    /// Wait until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the latch opened in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_latch_is_open() {
        let latch = CountdownLatch::new(0);
        latch.wait().await;
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }

    #[tokio::test]
    async fn test_latch_opens_after_count_downs() {
        let latch = CountdownLatch::new(2);
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };

        latch.count_down();
        assert_eq!(latch.count(), 1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)).await);

        std::thread::spawn({
            let latch = latch.clone();
            move || latch.count_down()
        })
        .join()
        .unwrap();

        waiter.await.unwrap();
        assert!(latch.wait_timeout(Duration::from_millis(10)).await);
    }
}
