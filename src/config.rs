//! Configuration for the feedrelay service.
//!
//! Every numeric constant of the governance core (cache TTL, rate-limit window,
//! backoff delays, batch sizing) is a configuration input rather than a
//! hardcoded value. The defaults match a conservative profile for an upstream
//! that allows 10 requests per 15-minute window.

use std::time::Duration;

use crate::auth::BearerToken;
use crate::backoff::BackoffPolicy;
use crate::error::FeedError;
use crate::upstream::endpoints::DEFAULT_BASE_URL;

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Fixed window duration.
    pub window: Duration,
    /// Maximum upstream calls allowed per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // 10 requests per 15 minutes, below the upstream's advertised cap.
            window: Duration::from_secs(15 * 60),
            max_requests: 10,
        }
    }
}

/// Request queue configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Fixed pause after every successful dispatch, before the next item is
    /// considered. Layered on top of the window accounting to avoid bursts.
    pub inter_request_delay: Duration,
    /// Backoff policy applied to rate-limited failures.
    pub backoff: BackoffPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inter_request_delay: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Batch scheduler configuration.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Number of lookups executed concurrently per wave.
    pub batch_size: usize,
    /// Pause between consecutive waves.
    pub pause: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pause: Duration::from_secs(10),
        }
    }
}

/// Upstream fetch sizing.
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    /// Number of posts requested per user lookup.
    pub posts_per_user: u32,
    /// Number of posts requested for the ranked timeline.
    pub timeline_page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            posts_per_user: 2,
            timeline_page_size: 20,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Bearer token for the upstream API. Required by [`crate::FeedService`].
    pub token: Option<BearerToken>,
    /// Upstream API base URL.
    pub base_url: String,
    /// Cache entry time-to-live. Also the sweep interval.
    pub cache_ttl: Duration,
    /// Rate limiter settings.
    pub rate_limit: RateLimitConfig,
    /// Request queue settings.
    pub queue: QueueConfig,
    /// Batch scheduler settings.
    pub batch: BatchConfig,
    /// Upstream fetch sizing.
    pub fetch: FetchConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(2 * 60 * 60),
            rate_limit: RateLimitConfig::default(),
            queue: QueueConfig::default(),
            batch: BatchConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Build a configuration with the given bearer token and default tuning.
    pub fn with_token(token: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self {
            token: Some(BearerToken::new(token)?),
            ..Self::default()
        })
    }

    /// Build a configuration with the token read from `FEEDRELAY_BEARER_TOKEN`.
    ///
    /// Returns [`FeedError::MissingCredentials`] when the variable is unset or
    /// empty.
    pub fn from_env() -> Result<Self, FeedError> {
        let token = std::env::var("FEEDRELAY_BEARER_TOKEN")
            .map_err(|_| FeedError::MissingCredentials)?;
        Self::with_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_conservative_profile() {
        let config = FeedConfig::default();
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert_eq!(config.cache_ttl, Duration::from_secs(7200));
        assert_eq!(config.queue.inter_request_delay, Duration::from_secs(5));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_with_token_rejects_empty() {
        assert!(FeedConfig::with_token("").is_err());
        assert!(FeedConfig::with_token("tok").unwrap().token.is_some());
    }
}
