//! Single-lane request queue for upstream calls.
//!
//! Every upstream call is funneled through one strict-FIFO queue drained by a
//! single task, so at most one call is ever in flight. That serialization is
//! intentional: it is what makes the fixed-window accounting in
//! [`crate::rate_limit`] an upper bound on real upstream traffic.
//!
//! The drain task consults the rate limiter before every dispatch, sleeps
//! until the window resets when refused, applies the backoff policy to
//! rate-limited failures, and spaces successful dispatches with a fixed
//! inter-request delay. All waits are cooperative (`tokio::time::sleep`), so
//! cache reads and new enqueues stay responsive throughout.
//!
//! Enqueuing returns a [`JobHandle`] that settles exactly once, either with
//! the call's result or with the terminal failure the policy decided on.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::sleep;

use crate::backoff::{FailureKind, RetryDecision};
use crate::config::QueueConfig;
use crate::error::FeedError;
use crate::rate_limit::FixedWindow;

type JobFuture = Pin<Box<dyn Future<Output = Result<(), FeedError>> + Send>>;

/// A queued upstream call with its retry bookkeeping.
///
/// `run` is re-invokable so the same logical request can be re-dispatched
/// after a backoff sleep; on success it settles the caller's handle itself.
/// `reject` settles the handle with a terminal failure.
struct QueuedRequest {
    run: Box<dyn FnMut() -> JobFuture + Send>,
    reject: Box<dyn FnOnce(FeedError) + Send>,
    retry_count: u32,
    delay: Duration,
}

/// A pending result for an enqueued request.
///
/// Resolves exactly once: with the fetched value, or with the failure the
/// backoff policy declared terminal. There is no way to cancel a queued
/// request through the handle; dropping it only discards the result.
#[derive(Debug)]
pub struct JobHandle<T> {
    rx: oneshot::Receiver<Result<T, FeedError>>,
}

impl<T> JobHandle<T> {
    /// Wait for the queued request to settle.
    pub async fn wait(self) -> Result<T, FeedError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(FeedError::QueueClosed),
        }
    }
}

/// Handle for enqueuing upstream calls.
///
/// Cloning the handle shares the same queue and drain task. The drain task is
/// spawned once in [`RequestQueue::new`] and is the only consumer of the
/// channel, so a second drain loop cannot come into existence.
#[derive(Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<QueuedRequest>,
}

impl RequestQueue {
    /// Create a queue and spawn its drain task.
    ///
    /// The limiter is shared with the caller so it can inspect remaining
    /// quota, but only the drain task pairs `check` with `record_dispatch`.
    pub fn new(limiter: Arc<Mutex<FixedWindow>>, config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(rx, limiter, config));
        Self { tx }
    }

    /// Append a fetch to the queue and return its pending result.
    ///
    /// `fetch` must produce a fresh future on every invocation; the drain
    /// task re-invokes it when the backoff policy schedules a retry.
    pub fn enqueue<T, F, Fut>(&self, fetch: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FeedError>> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let slot = Arc::new(StdMutex::new(Some(done_tx)));

        let run_slot = Arc::clone(&slot);
        let run = Box::new(move || -> JobFuture {
            let fut = fetch();
            let slot = Arc::clone(&run_slot);
            Box::pin(async move {
                let value = fut.await?;
                if let Some(done) = slot.lock().ok().and_then(|mut s| s.take()) {
                    let _ = done.send(Ok(value));
                }
                Ok(())
            })
        });

        let reject_slot = Arc::clone(&slot);
        let reject = Box::new(move |err: FeedError| {
            if let Some(done) = reject_slot.lock().ok().and_then(|mut s| s.take()) {
                let _ = done.send(Err(err));
            }
        });

        let request = QueuedRequest {
            run,
            reject,
            retry_count: 0,
            delay: Duration::ZERO,
        };
        if self.tx.send(request).is_err() {
            // The drain task is gone; the dropped sender settles the handle
            // with QueueClosed on wait.
            tracing::error!("request queue task is gone, dropping enqueued request");
        }
        JobHandle { rx: done_rx }
    }

    /// Enqueue a fetch and wait for it to settle.
    pub async fn submit<T, F, Fut>(&self, fetch: F) -> Result<T, FeedError>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FeedError>> + Send + 'static,
    {
        self.enqueue(fetch).wait().await
    }
}

/// The single drain loop.
///
/// Items are processed strictly in arrival order; the head item is never
/// popped for a rate-limit refusal or a scheduled retry, only for success or
/// terminal failure.
async fn drain(
    mut rx: mpsc::UnboundedReceiver<QueuedRequest>,
    limiter: Arc<Mutex<FixedWindow>>,
    config: QueueConfig,
) {
    while let Some(mut request) = rx.recv().await {
        loop {
            // Gate on the window before every dispatch, retries included.
            let refused = {
                let mut limiter = limiter.lock().await;
                match limiter.check() {
                    Ok(()) => {
                        limiter.record_dispatch();
                        None
                    }
                    Err(wait) => Some(wait),
                }
            };
            if let Some(wait) = refused {
                tracing::info!(
                    wait_secs = wait.as_secs(),
                    "rate limit window exhausted, waiting for reset"
                );
                sleep(wait).await;
                continue;
            }

            match (request.run)().await {
                Ok(()) => {
                    // Space out successful dispatches even when quota remains.
                    sleep(config.inter_request_delay).await;
                    break;
                }
                Err(err) => {
                    let kind = FailureKind::from(&err);
                    match config
                        .backoff
                        .evaluate(kind, request.retry_count, request.delay)
                    {
                        RetryDecision::Retry { delay } => {
                            request.retry_count += 1;
                            request.delay = delay;
                            tracing::warn!(
                                attempt = request.retry_count,
                                max_retries = config.backoff.max_retries,
                                delay_secs = delay.as_secs(),
                                "rate limited, backing off before retry"
                            );
                            sleep(delay).await;
                        }
                        RetryDecision::GiveUp => {
                            tracing::warn!(
                                retries = request.retry_count,
                                error = %err,
                                "request failed terminally"
                            );
                            (request.reject)(err);
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn queue_with(window: FixedWindow) -> RequestQueue {
        RequestQueue::new(Arc::new(Mutex::new(window)), QueueConfig::default())
    }

    fn roomy_queue() -> RequestQueue {
        queue_with(FixedWindow::new(Duration::from_secs(900), 100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_is_fifo() {
        let queue = roomy_queue();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                queue.enqueue(move || {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().unwrap().push(i);
                        Ok(i)
                    }
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().await.unwrap(), i);
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_throttle_failure_rejects_immediately() {
        let queue = roomy_queue();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let failing = queue.enqueue(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FeedError::InvalidResponse("bad payload".to_string()))
            }
        });
        let next = queue.enqueue(|| async { Ok(99u32) });

        assert!(matches!(
            failing.wait().await,
            Err(FeedError::InvalidResponse(_))
        ));
        // No retries for non-throttle failures, and the queue keeps draining.
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(next.wait().await.unwrap(), 99);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_retry_then_success() {
        let queue = roomy_queue();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let handle = queue.enqueue(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FeedError::RateLimited { retry_after: None })
                } else {
                    Ok(7u32)
                }
            }
        });

        let started = Instant::now();
        assert_eq!(handle.wait().await.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // One backoff sleep at the initial delay before the retry.
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_does_not_block_queue() {
        let queue = roomy_queue();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let doomed = queue.enqueue(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FeedError::RateLimited { retry_after: None })
            }
        });
        let next = queue.enqueue(|| async { Ok(1u32) });

        assert!(matches!(
            doomed.wait().await,
            Err(FeedError::RateLimited { .. })
        ));
        // Initial dispatch plus three retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(next.wait().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_refusal_delays_dispatch() {
        let queue = queue_with(FixedWindow::new(Duration::from_secs(900), 1));

        let first = queue.enqueue(|| async { Ok(1u32) });
        let second = queue.enqueue(|| async { Ok(2u32) });

        let started = Instant::now();
        assert_eq!(first.wait().await.unwrap(), 1);
        assert_eq!(second.wait().await.unwrap(), 2);
        // The second dispatch had to wait out the remainder of the window.
        assert!(started.elapsed() >= Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successes_are_spaced_by_inter_request_delay() {
        let queue = roomy_queue();

        let first = queue.enqueue(|| async { Ok(1u32) });
        let second = queue.enqueue(|| async { Ok(2u32) });

        let started = Instant::now();
        first.wait().await.unwrap();
        second.wait().await.unwrap();
        // Quota was plentiful, so the spacing comes from the fixed delay.
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
