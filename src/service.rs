//! The feed service: composition root for the governance core.
//!
//! [`FeedService`] owns the caches, the rate limiter, the request queue, and
//! the upstream client, and wires them together: reads check the cache first,
//! misses are fetched through the single-lane queue, and failed refreshes fall
//! back to stale cache entries. Bulk lookups go through the batch scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::auth::StaticToken;
use crate::batch::{partition_outcomes, run_batches};
use crate::cache::SharedCache;
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::queue::RequestQueue;
use crate::rate_limit::FixedWindow;
use crate::upstream::{Author, FeedClient, Post, RankedPost, Timeline};

/// Join posts with their expanded authors and sort by trending score,
/// highest first. Ties keep upstream order.
pub fn rank_posts(posts: Vec<Post>, authors: Vec<Author>) -> Vec<RankedPost> {
    let by_id: HashMap<String, Author> = authors
        .into_iter()
        .map(|author| (author.id.clone(), author))
        .collect();

    let mut ranked: Vec<RankedPost> = posts
        .into_iter()
        .map(|post| {
            let author = post
                .author_id
                .as_ref()
                .and_then(|id| by_id.get(id))
                .cloned();
            let score = post.engagement_score();
            RankedPost {
                post,
                author,
                score,
            }
        })
        .collect();

    ranked.sort_by_key(|r| std::cmp::Reverse(r.score));
    ranked
}

/// A proxy service for social feed posts.
///
/// All upstream traffic is serialized through one request queue gated by a
/// fixed-window rate limiter; results are cached with a TTL and served stale
/// when a refresh fails.
///
/// # Example
///
/// ```rust,no_run
/// use feedrelay::config::FeedConfig;
/// use feedrelay::service::FeedService;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = FeedService::new(FeedConfig::with_token("my_token")?)?;
///     let _sweeper = service.spawn_sweeper();
///
///     let user = service.get_user("alice").await?;
///     let posts = service.get_user_posts(&user.id).await?;
///     println!("{} has {} recent posts", user.username, posts.len());
///     Ok(())
/// }
/// ```
pub struct FeedService {
    config: FeedConfig,
    client: FeedClient,
    queue: RequestQueue,
    limiter: Arc<Mutex<FixedWindow>>,
    users: SharedCache<String, Author>,
    posts: SharedCache<String, Vec<Post>>,
    timelines: SharedCache<String, Vec<RankedPost>>,
}

impl FeedService {
    /// Create the service and spawn its queue drain task.
    ///
    /// Fails with [`FeedError::MissingCredentials`] when the configuration
    /// carries no bearer token; nothing useful can be fetched without one.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let token = config
            .token
            .clone()
            .ok_or(FeedError::MissingCredentials)?;

        let client = FeedClient::builder()
            .base_url(&config.base_url)
            .token(Arc::new(StaticToken::from_token(token)))
            .build();

        let limiter = Arc::new(Mutex::new(FixedWindow::new(
            config.rate_limit.window,
            config.rate_limit.max_requests,
        )));
        let queue = RequestQueue::new(Arc::clone(&limiter), config.queue);

        Ok(Self {
            users: SharedCache::new(config.cache_ttl),
            posts: SharedCache::new(config.cache_ttl),
            timelines: SharedCache::new(config.cache_ttl),
            client,
            queue,
            limiter,
            config,
        })
    }

    /// Get a user profile by username, cached.
    pub async fn get_user(&self, username: &str) -> Result<Author, FeedError> {
        let key = username.to_string();
        let fetch = {
            let queue = self.queue.clone();
            let client = self.client.clone();
            let username = key.clone();
            move || async move {
                queue
                    .submit(move || {
                        let client = client.clone();
                        let username = username.clone();
                        async move { client.get_user_by_username(&username).await }
                    })
                    .await
            }
        };
        self.users.get_or_fetch(key, fetch).await
    }

    /// Get a user's recent posts by user id, cached.
    pub async fn get_user_posts(&self, user_id: &str) -> Result<Vec<Post>, FeedError> {
        let key = user_id.to_string();
        let max_results = self.config.fetch.posts_per_user;
        let fetch = {
            let queue = self.queue.clone();
            let client = self.client.clone();
            let user_id = key.clone();
            move || async move {
                queue
                    .submit(move || {
                        let client = client.clone();
                        let user_id = user_id.clone();
                        async move { client.get_user_posts(&user_id, max_results).await }
                    })
                    .await
            }
        };
        self.posts.get_or_fetch(key, fetch).await
    }

    /// Get a user's timeline ranked by trending score, cached.
    pub async fn get_ranked_timeline(&self, user_id: &str) -> Result<Vec<RankedPost>, FeedError> {
        let key = user_id.to_string();
        let max_results = self.config.fetch.timeline_page_size;
        let fetch = {
            let queue = self.queue.clone();
            let client = self.client.clone();
            let user_id = key.clone();
            move || async move {
                let timeline: Timeline = queue
                    .submit(move || {
                        let client = client.clone();
                        let user_id = user_id.clone();
                        async move { client.get_timeline(&user_id, max_results).await }
                    })
                    .await?;
                Ok(rank_posts(timeline.posts, timeline.authors))
            }
        };
        self.timelines.get_or_fetch(key, fetch).await
    }

    /// Look up many user profiles in throttled waves.
    ///
    /// Per-user failures are collected, not propagated; the returned pair
    /// holds the successful profiles and the individual failures.
    pub async fn get_users_bulk(
        &self,
        usernames: Vec<String>,
    ) -> (Vec<Author>, Vec<FeedError>) {
        let outcomes = run_batches(
            usernames,
            self.config.batch.batch_size,
            self.config.batch.pause,
            |username| async move { self.get_user(&username).await },
        )
        .await;
        partition_outcomes(outcomes)
    }

    /// Spawn the periodic cache sweeper.
    ///
    /// Sweeps all caches once per TTL interval. The returned handle can be
    /// used to stop the sweeper; dropping it detaches the task.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let users = self.users.clone();
        let posts = self.posts.clone();
        let timelines = self.timelines.clone();
        let ttl = self.config.cache_ttl;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl);
            // The immediate first tick would sweep an empty cache.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed =
                    users.sweep().await + posts.sweep().await + timelines.sweep().await;
                tracing::debug!(removed, "cache sweep complete");
            }
        })
    }

    /// Upstream dispatches still allowed in the current rate-limit window.
    pub async fn remaining_quota(&self) -> u32 {
        self.limiter.lock().await.remaining()
    }

    /// The active configuration.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl std::fmt::Debug for FeedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedService")
            .field("client", &self.client)
            .field("cache_ttl", &self.config.cache_ttl)
            .finish()
    }
}
