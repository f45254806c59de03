//! Credential management for upstream API authentication.
//!
//! The upstream API authenticates with a bearer token sent on every request.
//! The token is held in a [`SecretString`] so it is redacted from debug output.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::error::FeedError;

/// A bearer token for the upstream API.
#[derive(Clone)]
pub struct BearerToken {
    token: SecretString,
}

impl BearerToken {
    /// Create a bearer token from a string.
    ///
    /// Returns [`FeedError::MissingCredentials`] when the token is empty,
    /// since an empty token is always a configuration mistake.
    pub fn new(token: impl Into<String>) -> Result<Self, FeedError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(FeedError::MissingCredentials);
        }
        Ok(Self {
            token: SecretString::from(token),
        })
    }

    /// Get the token value for building the Authorization header.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_token(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Trait for providing the upstream bearer token.
///
/// Implement this trait to customize how the token is retrieved, for example
/// from a secrets manager instead of the environment.
pub trait TokenProvider: Send + Sync {
    /// Get the bearer token.
    fn token(&self) -> &BearerToken;
}

/// Static token provider that holds the token directly.
#[derive(Clone, Debug)]
pub struct StaticToken {
    token: BearerToken,
}

impl StaticToken {
    /// Create a new static token provider.
    pub fn new(token: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self {
            token: BearerToken::new(token)?,
        })
    }

    /// Wrap an already-validated bearer token.
    pub fn from_token(token: BearerToken) -> Self {
        Self { token }
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> &BearerToken {
        &self.token
    }
}

impl TokenProvider for Arc<StaticToken> {
    fn token(&self) -> &BearerToken {
        &self.token
    }
}

/// Token provider that reads from an environment variable.
///
/// By default, reads from `FEEDRELAY_BEARER_TOKEN`.
pub struct EnvToken {
    token: BearerToken,
}

impl EnvToken {
    /// Create a token from the default environment variable.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_env_var("FEEDRELAY_BEARER_TOKEN")
    }

    /// Create a token from a custom environment variable name.
    pub fn from_env_var(var: &str) -> Result<Self, FeedError> {
        let value = std::env::var(var).map_err(|_| FeedError::MissingCredentials)?;
        Ok(Self {
            token: BearerToken::new(value)?,
        })
    }
}

impl TokenProvider for EnvToken {
    fn token(&self) -> &BearerToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_redacted() {
        let token = BearerToken::new("super_secret").unwrap();
        let debug_str = format!("{:?}", token);
        assert!(!debug_str.contains("super_secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            BearerToken::new(""),
            Err(FeedError::MissingCredentials)
        ));
        assert!(matches!(
            BearerToken::new("   "),
            Err(FeedError::MissingCredentials)
        ));
    }

    #[test]
    fn test_static_token() {
        let provider = StaticToken::new("abc123").unwrap();
        assert_eq!(provider.token().expose_token(), "abc123");
    }
}
