//! Retry decisions for rate-limited upstream failures.
//!
//! The policy is a pure function of the failure kind, the number of retries
//! already attempted, and the current delay. It carries no hidden state; the
//! queue owns the per-item retry bookkeeping and asks the policy what to do
//! after each failure.

use std::time::Duration;

use crate::error::FeedError;

/// Classification of an upstream failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The upstream explicitly throttled the request.
    RateLimited,
    /// Any other failure: network, 4xx/5xx, malformed payload.
    Other,
}

impl From<&FeedError> for FailureKind {
    fn from(err: &FeedError) -> Self {
        if err.is_rate_limited() {
            FailureKind::RateLimited
        } else {
            FailureKind::Other
        }
    }
}

/// What to do with a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `delay`, then resubmit the same logical request.
    Retry {
        /// How long to wait before the retry.
        delay: Duration,
    },
    /// Fail terminally; the caller falls back to cached data if any.
    GiveUp,
}

/// Exponential backoff policy with bounded retries.
///
/// Only rate-limited failures are retried. The first retry waits
/// `initial_delay`; each subsequent retry doubles the previous delay up to
/// `max_delay`. After `max_retries` rate-limited failures the request fails
/// terminally.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the retry delay.
    pub max_delay: Duration,
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl BackoffPolicy {
    /// Decide the next action for a failed request.
    ///
    /// `retry_count` is the number of retries already performed for this
    /// request and `current_delay` the delay used for the most recent one.
    /// With the defaults the delay sequence is 5s, 10s, 20s, then [`GiveUp`].
    ///
    /// [`GiveUp`]: RetryDecision::GiveUp
    pub fn evaluate(
        &self,
        kind: FailureKind,
        retry_count: u32,
        current_delay: Duration,
    ) -> RetryDecision {
        if kind != FailureKind::RateLimited {
            return RetryDecision::GiveUp;
        }
        if retry_count >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        let delay = if retry_count == 0 {
            self.initial_delay
        } else {
            (current_delay * 2).min(self.max_delay)
        };
        RetryDecision::Retry { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::default()
    }

    #[test]
    fn test_rate_limited_delay_sequence() {
        let policy = policy();
        let mut delay = Duration::ZERO;
        let mut observed = Vec::new();

        for retry_count in 0..3 {
            match policy.evaluate(FailureKind::RateLimited, retry_count, delay) {
                RetryDecision::Retry { delay: next } => {
                    observed.push(next);
                    delay = next;
                }
                RetryDecision::GiveUp => panic!("gave up at retry {retry_count}"),
            }
        }

        assert_eq!(
            observed,
            vec![
                Duration::from_millis(5000),
                Duration::from_millis(10000),
                Duration::from_millis(20000),
            ]
        );

        // Fourth consecutive failure is terminal.
        assert_eq!(
            policy.evaluate(FailureKind::RateLimited, 3, delay),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = BackoffPolicy {
            max_retries: 10,
            ..BackoffPolicy::default()
        };
        let decision =
            policy.evaluate(FailureKind::RateLimited, 5, Duration::from_secs(40));
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_other_failures_never_retry() {
        let policy = policy();
        assert_eq!(
            policy.evaluate(FailureKind::Other, 0, Duration::ZERO),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_kind_from_error() {
        let throttled = FeedError::RateLimited { retry_after: None };
        assert_eq!(FailureKind::from(&throttled), FailureKind::RateLimited);

        let other = FeedError::InvalidResponse("bad".to_string());
        assert_eq!(FailureKind::from(&other), FailureKind::Other);
    }
}
