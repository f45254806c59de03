//! Upstream social API access.
//!
//! The upstream is treated as an opaque bearer-authenticated HTTP service that
//! returns post and user objects and signals throttling with HTTP 429. The
//! client here does no retrying or pacing of its own; all governance lives in
//! [`crate::queue`] and [`crate::rate_limit`].

mod client;
pub mod endpoints;
mod types;

pub use client::{FeedClient, FeedClientBuilder};
pub use types::{Author, AuthorMetrics, Includes, Payload, Post, PublicMetrics, RankedPost, Timeline};
