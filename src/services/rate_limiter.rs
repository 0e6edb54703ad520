use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};

/// Smoothing rate limiter for quota-limited APIs (e.g. a 60 req/min feed).
///
/// `wait()` spaces calls `period / max_calls` apart on average. Callers are
/// serialized through a single async mutex, and the wait happens while the
/// mutex is held, so concurrent callers queue up and each inherits the
/// previous caller's timestamp. This smooths the rate rather than allowing
/// bursts.
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `max_calls` calls allowed per `period`
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            interval: period / max_calls.max(1),
            last_call: Mutex::new(None),
        }
    }

    /// Suspend until the inter-call interval has elapsed, then record this
    /// call. Degrades to a zero wait when the interval has already passed.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

/// Gate admitting at most N simultaneous operations; the (N+1)-th caller
/// suspends until a slot frees. Used independently for content fetches and
/// store write chunks.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Acquire a slot. The returned guard frees the slot when dropped.
    pub async fn acquire(&self) -> ConcurrencyGuard {
        // The semaphore is never closed, so acquire cannot fail
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore closed");
        ConcurrencyGuard { _permit: permit }
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Slot held by an in-flight operation
pub struct ConcurrencyGuard {
    _permit: OwnedSemaphorePermit,
}
