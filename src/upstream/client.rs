//! Upstream REST client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::Serialize;

use crate::auth::TokenProvider;
use crate::error::FeedError;
use crate::upstream::endpoints::{
    self, DEFAULT_BASE_URL, POST_FIELDS, TIMELINE_USER_FIELDS, USER_FIELDS,
};
use crate::upstream::types::{Author, Payload, Post, Timeline};

/// The upstream REST client.
///
/// Issues individual bearer-authenticated GET requests and classifies
/// failures; pacing, retries, and caching are the caller's concern.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use feedrelay::auth::StaticToken;
/// use feedrelay::upstream::FeedClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let token = Arc::new(StaticToken::new("my_token")?);
///     let client = FeedClient::builder().token(token).build();
///
///     let user = client.get_user_by_username("alice").await?;
///     println!("{} ({})", user.name, user.id);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct FeedClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    token: Option<Arc<dyn TokenProvider>>,
}

#[derive(Serialize)]
struct UserQuery<'a> {
    #[serde(rename = "user.fields")]
    user_fields: &'a str,
}

#[derive(Serialize)]
struct PostsQuery<'a> {
    max_results: u32,
    #[serde(rename = "tweet.fields")]
    tweet_fields: &'a str,
}

#[derive(Serialize)]
struct TimelineQuery<'a> {
    max_results: u32,
    #[serde(rename = "tweet.fields")]
    tweet_fields: &'a str,
    expansions: &'a str,
    #[serde(rename = "user.fields")]
    user_fields: &'a str,
}

impl FeedClient {
    /// Create a new client builder.
    pub fn builder() -> FeedClientBuilder {
        FeedClientBuilder::new()
    }

    /// Look up a user profile by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Author, FeedError> {
        let payload: Payload<Author> = self
            .get_json(
                &endpoints::user_by_username(username),
                &UserQuery {
                    user_fields: USER_FIELDS,
                },
            )
            .await?;
        payload.data.ok_or_else(|| {
            FeedError::InvalidResponse(format!("no user object returned for {username}"))
        })
    }

    /// Fetch a user's recent posts.
    pub async fn get_user_posts(
        &self,
        user_id: &str,
        max_results: u32,
    ) -> Result<Vec<Post>, FeedError> {
        let payload: Payload<Vec<Post>> = self
            .get_json(
                &endpoints::user_posts(user_id),
                &PostsQuery {
                    max_results,
                    tweet_fields: POST_FIELDS,
                },
            )
            .await?;
        // An empty timeline comes back without a data field.
        Ok(payload.data.unwrap_or_default())
    }

    /// Fetch a user's recent posts together with expanded author objects.
    pub async fn get_timeline(
        &self,
        user_id: &str,
        max_results: u32,
    ) -> Result<Timeline, FeedError> {
        let payload: Payload<Vec<Post>> = self
            .get_json(
                &endpoints::user_posts(user_id),
                &TimelineQuery {
                    max_results,
                    tweet_fields: POST_FIELDS,
                    expansions: "author_id",
                    user_fields: TIMELINE_USER_FIELDS,
                },
            )
            .await?;
        Ok(Timeline {
            posts: payload.data.unwrap_or_default(),
            authors: payload.includes.unwrap_or_default().users,
        })
    }

    /// Make an authenticated GET request with query parameters.
    async fn get_json<T, Q>(&self, endpoint: &str, params: &Q) -> Result<T, FeedError>
    where
        T: serde::de::DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let token = self.token.as_ref().ok_or(FeedError::MissingCredentials)?;

        let query_string = serde_urlencoded::to_string(params)
            .map_err(|e| FeedError::InvalidResponse(e.to_string()))?;
        let url = if query_string.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query_string)
        };

        let response = self
            .http_client
            .get(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", token.token().expose_token()),
            )
            .send()
            .await?;

        self.parse_response(response).await
    }

    /// Parse an upstream response, classifying throttles and failures.
    async fn parse_response<T>(&self, response: reqwest::Response) -> Result<T, FeedError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FeedError::RateLimited { retry_after });
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(FeedError::Upstream {
                status,
                message: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            FeedError::InvalidResponse(format!("failed to parse response: {e}. Body: {body}"))
        })
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

/// Keep upstream error bodies short enough for logs and error messages.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

/// Builder for [`FeedClient`].
pub struct FeedClientBuilder {
    base_url: String,
    token: Option<Arc<dyn TokenProvider>>,
    user_agent: Option<String>,
}

impl FeedClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            user_agent: None,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the bearer token provider.
    pub fn token(mut self, token: Arc<dyn TokenProvider>) -> Self {
        self.token = Some(token);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> FeedClient {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("feedrelay/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("feedrelay"));
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        FeedClient {
            http_client,
            base_url: self.base_url,
            token: self.token,
        }
    }
}

impl Default for FeedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
