//! Wire types for the upstream social API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Engagement counters attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetrics {
    /// Number of likes.
    #[serde(default)]
    pub like_count: u64,
    /// Number of reposts.
    #[serde(default)]
    pub retweet_count: u64,
    /// Number of replies.
    #[serde(default)]
    pub reply_count: u64,
    /// Number of quote posts.
    #[serde(default)]
    pub quote_count: u64,
}

/// A single post as returned by the upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Opaque post identifier.
    pub id: String,
    /// Post body text.
    pub text: String,
    /// Identifier of the authoring user, present when requested via expansions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// Creation timestamp (RFC 3339).
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    /// Engagement counters, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_metrics: Option<PublicMetrics>,
}

impl Post {
    /// Deterministic trending score: likes weigh double, reposts and replies
    /// weigh once. Posts without metrics score zero.
    pub fn engagement_score(&self) -> u64 {
        match &self.public_metrics {
            Some(m) => m.like_count * 2 + m.retweet_count + m.reply_count,
            None => 0,
        }
    }
}

/// Account-level counters for an author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorMetrics {
    /// Follower count.
    #[serde(default)]
    pub followers_count: u64,
    /// Following count.
    #[serde(default)]
    pub following_count: u64,
    /// Total posts.
    #[serde(default)]
    pub tweet_count: u64,
}

/// A user profile as returned by the upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    /// Opaque user identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Handle without the leading `@`.
    pub username: String,
    /// Profile bio, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Avatar URL, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    /// Account counters, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_metrics: Option<AuthorMetrics>,
}

/// Expanded objects delivered alongside the primary data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    /// Author objects referenced by `author_id` expansions.
    #[serde(default)]
    pub users: Vec<Author>,
}

/// Generic upstream response envelope.
///
/// The upstream wraps results in `{ "data": ..., "includes": {...} }`; `data`
/// is absent when a lookup matched nothing.
#[derive(Debug, Deserialize)]
pub struct Payload<T> {
    /// The primary result.
    pub data: Option<T>,
    /// Expanded referenced objects.
    #[serde(default)]
    pub includes: Option<Includes>,
}

/// A user's recent posts together with the expanded author objects.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    /// Posts in upstream order.
    pub posts: Vec<Post>,
    /// Authors referenced by the posts.
    pub authors: Vec<Author>,
}

/// A post joined with its author and trending score, ready for serving.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPost {
    /// The post itself, flattened into the envelope.
    #[serde(flatten)]
    pub post: Post,
    /// The resolved author, when the expansion carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    /// The deterministic trending score.
    pub score: u64,
}
