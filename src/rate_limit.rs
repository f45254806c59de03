//! Fixed-window rate limiting for upstream calls.
//!
//! A single process-wide window bounds how many upstream requests may be
//! dispatched per period. The check and the count are deliberately split:
//! [`FixedWindow::check`] only answers whether a dispatch may proceed, and the
//! caller records the dispatch with [`FixedWindow::record_dispatch`] once it
//! actually happens. A refused check returns the exact wait until the window
//! resets, so the caller can sleep precisely instead of polling.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use feedrelay::rate_limit::FixedWindow;
//!
//! # #[tokio::main] async fn main() {
//! let mut window = FixedWindow::new(Duration::from_secs(900), 10);
//!
//! if window.check().is_ok() {
//!     window.record_dispatch();
//!     // ... issue the upstream call
//! }
//! # }
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// A fixed-window rate limiter.
///
/// At most `max_requests` dispatches are counted within each window of
/// duration `window`; the window resets at period boundaries, not as a sliding
/// average. The count upper-bounds actual upstream calls as long as callers
/// check before every dispatch and record only real dispatches.
#[derive(Debug)]
pub struct FixedWindow {
    window: Duration,
    max_requests: u32,
    window_start: Instant,
    count: u32,
}

impl FixedWindow {
    /// Create a new fixed-window limiter.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Check whether a dispatch may proceed right now.
    ///
    /// If the current window has elapsed, the counter resets and the dispatch
    /// is allowed. Otherwise the dispatch is allowed iff the counter is below
    /// the maximum. Returns `Err(wait)` with the time remaining until the
    /// window resets when refused.
    ///
    /// Does not count anything; call [`record_dispatch`] when the call is
    /// actually issued.
    ///
    /// [`record_dispatch`]: FixedWindow::record_dispatch
    pub fn check(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.count = 0;
            self.window_start = now;
            return Ok(());
        }

        if self.count < self.max_requests {
            Ok(())
        } else {
            Err(self.reset_in())
        }
    }

    /// Record one dispatched upstream call in the current window.
    pub fn record_dispatch(&mut self) {
        self.count += 1;
    }

    /// Number of dispatches still allowed in the current window.
    pub fn remaining(&self) -> u32 {
        if self.window_start.elapsed() >= self.window {
            self.max_requests
        } else {
            self.max_requests.saturating_sub(self.count)
        }
    }

    /// Time until the current window resets.
    pub fn reset_in(&self) -> Duration {
        self.window.saturating_sub(self.window_start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_max() {
        let mut window = FixedWindow::new(Duration::from_secs(900), 10);

        for _ in 0..10 {
            assert!(window.check().is_ok());
            window.record_dispatch();
        }
        assert!(window.check().is_err());
        assert_eq!(window.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refusal_reports_wait_until_reset() {
        let mut window = FixedWindow::new(Duration::from_secs(900), 1);

        assert!(window.check().is_ok());
        window.record_dispatch();

        time::advance(Duration::from_secs(300)).await;
        let wait = window.check().unwrap_err();
        assert_eq!(wait, Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resets_after_window() {
        let mut window = FixedWindow::new(Duration::from_secs(900), 10);

        for _ in 0..10 {
            window.check().unwrap();
            window.record_dispatch();
        }
        assert!(window.check().is_err());

        time::advance(Duration::from_secs(901)).await;

        assert!(window.check().is_ok());
        assert_eq!(window.remaining(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_does_not_count() {
        let mut window = FixedWindow::new(Duration::from_secs(900), 1);

        // Repeated checks without a dispatch must not consume quota.
        for _ in 0..5 {
            assert!(window.check().is_ok());
        }
        window.record_dispatch();
        assert!(window.check().is_err());
    }
}
