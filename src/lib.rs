//! # feedrelay
//!
//! An async proxy core for social feed posts. Fetches posts and author profiles
//! from a bearer-authenticated upstream API, caches them in memory with a TTL,
//! ranks them with a deterministic trending score, and governs every upstream
//! call through a single-lane request queue.
//!
//! ## Features
//!
//! - TTL cache with stale-on-error fallback
//! - Fixed-window rate limiting of upstream calls
//! - Exponential backoff for rate-limited failures, bounded retries
//! - Strict-FIFO request queue with a single drain loop
//! - Throttled batch scheduling for bulk per-user lookups
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feedrelay::config::FeedConfig;
//! use feedrelay::service::FeedService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FeedConfig::from_env()?;
//!     let service = FeedService::new(config)?;
//!     let _sweeper = service.spawn_sweeper();
//!
//!     let timeline = service.get_ranked_timeline("1552554683546714112").await?;
//!     println!("{} posts", timeline.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod backoff;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod queue;
pub mod rate_limit;
pub mod service;
pub mod upstream;

// Re-export commonly used types at crate root
pub use cache::{SharedCache, TtlCache};
pub use error::FeedError;
pub use service::FeedService;

/// Result type alias using FeedError
pub type Result<T> = std::result::Result<T, FeedError>;
