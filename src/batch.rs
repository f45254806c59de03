//! Throttled batch execution for bulk lookups.
//!
//! Bulk per-user lookups are partitioned into fixed-size waves. Each wave runs
//! its items concurrently and the scheduler pauses between waves so a long
//! list of lookups does not flood the shared queue all at once. Per-item
//! failures are captured in place; one bad item never cancels its siblings or
//! aborts the batch.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::sleep;

use crate::error::FeedError;

/// Run `worker` over `items` in throttled waves of `batch_size`.
///
/// Items within a wave run concurrently; waves run one after another with a
/// `pause` between them (no pause after the last). The returned vector
/// preserves input order, with each slot holding that item's success value or
/// its captured error. A `batch_size` of zero is treated as one.
///
/// When the workers funnel through the shared request queue, effective
/// concurrency is still bounded by the queue's serialization; the wave width
/// only controls how many lookups are pending at once.
pub async fn run_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    pause: Duration,
    worker: F,
) -> Vec<Result<R, FeedError>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, FeedError>>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut pending = items.into_iter().peekable();

    while pending.peek().is_some() {
        let wave: Vec<T> = pending.by_ref().take(batch_size).collect();
        tracing::debug!(wave_len = wave.len(), "running lookup wave");

        let outcomes = join_all(wave.into_iter().map(&worker)).await;
        results.extend(outcomes);

        if pending.peek().is_some() {
            sleep(pause).await;
        }
    }

    results
}

/// Split batch outcomes into successes and failures, preserving order within
/// each side.
pub fn partition_outcomes<R>(outcomes: Vec<Result<R, FeedError>>) -> (Vec<R>, Vec<FeedError>) {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(value) => successes.push(value),
            Err(err) => failures.push(err),
        }
    }
    (successes, failures)
}
