use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Duration};
use tracing::warn;

use crate::models::NewsItem;

/// Unbounded FIFO handoff between the feed producer and the batch workers.
///
/// Multi-producer, multi-consumer. Producers never block. Consumers dequeue
/// with a bounded wait so they can run their time-based flush checks even
/// when the queue is idle.
///
/// Every dequeued item must eventually be reported back via [`task_done`],
/// success or not; [`join`] blocks until the outstanding count reaches zero.
/// The queue is in-memory only and is lost on process termination.
///
/// [`task_done`]: IngestQueue::task_done
/// [`join`]: IngestQueue::join
pub struct IngestQueue {
    items: Mutex<VecDeque<NewsItem>>,
    item_ready: Notify,
    /// Items pushed but not yet marked done (queued + in-flight)
    unfinished: AtomicUsize,
    drained: Notify,
}

impl IngestQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            item_ready: Notify::new(),
            unfinished: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    pub async fn push(&self, item: NewsItem) {
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        self.items.lock().await.push_back(item);
        self.item_ready.notify_one();
    }

    /// Dequeue the oldest item, or `None` if nothing arrives within `wait`.
    pub async fn pop_timeout(&self, wait: Duration) -> Option<NewsItem> {
        timeout(wait, self.pop()).await.ok()
    }

    async fn pop(&self) -> NewsItem {
        loop {
            // Register for wakeup before checking, so a push between the
            // check and the await still wakes us.
            let notified = self.item_ready.notified();
            if let Some(item) = self.items.lock().await.pop_front() {
                return item;
            }
            notified.await;
        }
    }

    /// Mark one previously dequeued item as fully processed.
    pub fn task_done(&self) {
        let mut current = self.unfinished.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                warn!("task_done called with no outstanding items");
                return;
            }
            match self.unfinished.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    if current == 1 {
                        self.drained.notify_waiters();
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Drain barrier: resolves once every pushed item has been dequeued and
    /// marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items pushed but not yet marked done
    pub fn outstanding(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }
}

impl Default for IngestQueue {
    fn default() -> Self {
        Self::new()
    }
}
